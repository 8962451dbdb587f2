use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use storefront_core::{FeatureDescriptor, ListingRef};

use crate::{CancellationToken, ListingResolver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome<T> {
    Completed(T),
    Cancelled,
}

/// Resolver call running on a background thread. The result is handed back
/// to the owning thread through [`ResolveJob::wait`] or
/// [`ResolveJob::try_finish`]; once cancelled, any result is discarded.
pub struct ResolveJob<T> {
    label: String,
    cancel: CancellationToken,
    receiver: Receiver<Result<T>>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> ResolveJob<T> {
    pub fn spawn<F>(label: &str, work: F) -> Result<Self>
    where
        F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let (sender, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(format!("resolve-{label}"))
            .spawn(move || {
                let result = work(&worker_cancel);
                // The owner may have dropped the job already.
                let _ = sender.send(result);
            })
            .with_context(|| format!("failed to spawn resolve job '{label}'"))?;

        tracing::debug!("started resolve job '{}'", label);
        Ok(Self {
            label: label.to_string(),
            cancel,
            receiver,
            handle: Some(handle),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        tracing::debug!("cancelling resolve job '{}'", self.label);
        self.cancel.cancel();
    }

    /// Non-blocking poll; `None` while the worker is still running.
    pub fn try_finish(&mut self) -> Option<Result<JobOutcome<T>>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(self.finish(result)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.lost_worker())),
        }
    }

    pub fn wait(mut self) -> Result<JobOutcome<T>> {
        match self.receiver.recv() {
            Ok(result) => self.finish(result),
            Err(_) => Err(self.lost_worker()),
        }
    }

    fn finish(&mut self, result: Result<T>) -> Result<JobOutcome<T>> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if self.cancel.is_cancelled() {
            tracing::debug!("resolve job '{}' finished after cancellation", self.label);
            return Ok(JobOutcome::Cancelled);
        }
        result
            .map(JobOutcome::Completed)
            .with_context(|| format!("resolve job '{}' failed", self.label))
    }

    fn lost_worker(&mut self) -> anyhow::Error {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        anyhow!("resolve job '{}' stopped without a result", self.label)
    }
}

impl ResolveJob<BTreeMap<String, ListingRef>> {
    pub fn listings(resolver: Arc<dyn ListingResolver>, ids: BTreeSet<String>) -> Result<Self> {
        Self::spawn("listings", move |cancel| {
            resolver.resolve_listings(&ids, cancel)
        })
    }
}

impl ResolveJob<Vec<FeatureDescriptor>> {
    pub fn features(resolver: Arc<dyn ListingResolver>, ids: BTreeSet<String>) -> Result<Self> {
        Self::spawn("features", move |cancel| {
            resolver.resolve_features(&ids, cancel)
        })
    }
}
