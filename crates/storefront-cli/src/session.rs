use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use storefront_catalog::{
    CancellationToken, JobOutcome, ListingResolver, LocalCatalog, ResolveJob,
};
use storefront_core::{is_token_safe_id, ListingRef, Operation};
use storefront_selection::{
    decode_from_url, encode_for_url, ButtonStateController, DecodedSelection, SelectionModel,
    SelectionStateSerializer, UnavailableItem, Viability,
};

use crate::render::TerminalRenderer;

/// Interactions replayed against a restored selection: clicks, then menu
/// choices, then feature unchecks, each group in command-line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SessionRequest {
    pub(crate) token: String,
    pub(crate) overrides: BTreeMap<String, Operation>,
    pub(crate) clicks: Vec<String>,
    pub(crate) choices: Vec<(String, Operation)>,
    pub(crate) unchecks: Vec<(String, String)>,
}

impl SessionRequest {
    pub(crate) fn from_args(
        token: Option<&str>,
        url: bool,
        set: &[String],
        click: &[String],
        choose: &[String],
        uncheck: &[String],
    ) -> Result<Self> {
        let token = match token {
            Some(token) if url => decode_from_url(token)?,
            Some(token) => token.to_string(),
            None => String::new(),
        };
        let overrides = parse_operation_assignments(set)?;
        let choices = choose
            .iter()
            .map(|value| parse_operation_assignment(value))
            .collect::<Result<Vec<_>>>()?;
        let unchecks = uncheck
            .iter()
            .map(|value| parse_feature_path(value))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            token,
            overrides,
            clicks: click.to_vec(),
            choices,
            unchecks,
        })
    }
}

pub(crate) fn parse_operation_assignments(values: &[String]) -> Result<BTreeMap<String, Operation>> {
    let mut assignments = BTreeMap::new();
    for value in values {
        let (id, operation) = parse_operation_assignment(value)?;
        if assignments.insert(id.clone(), operation).is_some() {
            bail!(
                "invalid selection '{}': duplicate assignment for listing '{}'",
                value,
                id
            );
        }
    }
    Ok(assignments)
}

pub(crate) fn parse_operation_assignment(value: &str) -> Result<(String, Operation)> {
    let (id, operation) = value
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid selection '{}': expected id=OPERATION", value))?;
    if !is_token_safe_id(id) {
        bail!("invalid selection '{}': listing id '{}' is not usable", value, id);
    }
    let operation = Operation::parse_loose(operation).ok_or_else(|| {
        anyhow!(
            "invalid selection '{}': unknown operation '{}' (expected one of none, install, uninstall, update, change)",
            value,
            operation
        )
    })?;
    Ok((id.to_string(), operation))
}

pub(crate) fn parse_feature_path(value: &str) -> Result<(String, String)> {
    match value.split_once('/') {
        Some((listing, feature)) if !listing.is_empty() && !feature.is_empty() => {
            Ok((listing.to_string(), feature.to_string()))
        }
        _ => bail!("invalid feature '{}': expected listing/feature", value),
    }
}

#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) model: SelectionModel,
    pub(crate) serializer: SelectionStateSerializer,
}

/// Decodes `token`, resolves its listings on a background job and applies
/// them to a fresh model.
pub(crate) fn restore_session(
    catalog: &Arc<LocalCatalog>,
    token: &str,
    overrides: &BTreeMap<String, Operation>,
    renderer: TerminalRenderer,
) -> Result<Session> {
    let mut model = SelectionModel::for_resolver(catalog.as_ref());
    let mut serializer = SelectionStateSerializer::new();
    let decoded = DecodedSelection::parse(token).with_overrides(overrides);
    if decoded.is_empty() {
        return Ok(Session { model, serializer });
    }

    let job = ResolveJob::listings(catalog.clone(), decoded.listing_ids())?;
    let spinner = renderer.start_spinner(job.label());
    let outcome = job.wait();
    spinner.finish();
    match outcome? {
        JobOutcome::Completed(resolved) => {
            serializer.apply(&mut model, &decoded, &resolved, catalog.as_ref());
        }
        JobOutcome::Cancelled => bail!("listing resolution was cancelled"),
    }
    Ok(Session { model, serializer })
}

pub(crate) fn lookup_listing(catalog: &LocalCatalog, id: &str) -> Result<ListingRef> {
    let ids = BTreeSet::from([id.to_string()]);
    catalog
        .resolve_listings(&ids, &CancellationToken::new())?
        .remove(id)
        .ok_or_else(|| anyhow!("listing '{}' was not found in the catalog", id))
}

pub(crate) fn replay_interactions(
    session: &mut Session,
    catalog: &LocalCatalog,
    request: &SessionRequest,
) -> Result<()> {
    for id in &request.clicks {
        let listing = lookup_listing(catalog, id)?;
        let mut controller = ButtonStateController::new(listing, &session.model, catalog);
        match controller.click(&mut session.model, catalog) {
            Some(operation) => tracing::info!("click on '{}' selected {}", id, operation),
            None => tracing::warn!("action for '{}' is disabled; click ignored", id),
        }
    }

    for (id, operation) in &request.choices {
        let listing = lookup_listing(catalog, id)?;
        let mut controller = ButtonStateController::new(listing, &session.model, catalog);
        if controller
            .choose_operation(*operation, &mut session.model, catalog)
            .is_none()
        {
            bail!(
                "'{}' is not on the menu for '{}' (menu: {})",
                operation.label(),
                id,
                controller
                    .selectable_states()
                    .iter()
                    .map(|state| state.label())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    for (listing_id, feature_id) in &request.unchecks {
        if !session
            .model
            .set_feature_checked(listing_id, feature_id, false)
        {
            bail!(
                "feature '{}' of '{}' is not part of the selection",
                feature_id,
                listing_id
            );
        }
    }
    Ok(())
}

/// Swaps fallback feature names for catalog metadata.
pub(crate) fn resolve_feature_names(
    session: &mut Session,
    catalog: &Arc<LocalCatalog>,
    renderer: TerminalRenderer,
) -> Result<()> {
    let unresolved = session.model.unresolved_feature_ids();
    if unresolved.is_empty() {
        return Ok(());
    }
    let job = ResolveJob::features(catalog.clone(), unresolved)?;
    let spinner = renderer.start_spinner(job.label());
    let outcome = job.wait();
    spinner.finish();
    if let JobOutcome::Completed(descriptors) = outcome? {
        session.model.apply_resolved_features(descriptors);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FeatureReport {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) checked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct EntryReport {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) operation: Operation,
    pub(crate) version: String,
    pub(crate) features: Vec<FeatureReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SessionReport {
    pub(crate) token: String,
    pub(crate) viability: Viability,
    pub(crate) entries: Vec<EntryReport>,
    pub(crate) unavailable: Vec<UnavailableItem>,
}

pub(crate) fn session_report(session: &Session, url: bool) -> SessionReport {
    let token = session.serializer.serialize(&session.model);
    let entries = session
        .model
        .item_entries()
        .iter()
        .map(|entry| EntryReport {
            id: entry.item().id().to_string(),
            name: entry.item().name().to_string(),
            operation: entry.operation(),
            version: entry.item().manifest().version.to_string(),
            features: session
                .model
                .feature_entries(entry.item().id())
                .into_iter()
                .map(|feature| FeatureReport {
                    id: feature.descriptor().id().to_string(),
                    name: feature.descriptor().name().to_string(),
                    checked: feature.is_checked(),
                })
                .collect(),
        })
        .collect();
    SessionReport {
        token: if url { encode_for_url(&token) } else { token },
        viability: session.model.viability(),
        entries,
        unavailable: session.serializer.unavailable_items().to_vec(),
    }
}
