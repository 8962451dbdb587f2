use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use storefront_core::{is_token_safe_id, ListingManifest};

/// Directory-backed catalog: `<root>/index/<listing-id>/<version>.toml`.
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    root: PathBuf,
}

impl CatalogIndex {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn listing_ids(&self) -> Result<Vec<String>> {
        self.search_ids("")
    }

    pub fn search_ids(&self, needle: &str) -> Result<Vec<String>> {
        let index_root = self.root.join("index");
        if !index_root.exists() {
            return Ok(Vec::new());
        }

        let needle = needle.to_ascii_lowercase();
        let mut ids = Vec::new();
        for entry in fs::read_dir(&index_root).context("failed to read catalog index")? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            if id.to_ascii_lowercase().contains(&needle) {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// All versions of a listing, newest first.
    pub fn listing_versions(&self, id: &str) -> Result<Vec<ListingManifest>> {
        if !is_plain_listing_id(id) {
            return Ok(Vec::new());
        }
        let listing_dir = self.root.join("index").join(id);
        if !listing_dir.exists() {
            return Ok(Vec::new());
        }

        let mut manifests = Vec::new();
        for entry in fs::read_dir(&listing_dir)
            .with_context(|| format!("failed to read listing directory: {id}"))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|v| v.to_str()) != Some("toml") {
                continue;
            }

            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed reading manifest: {}", path.display()))?;
            let manifest = ListingManifest::from_toml_str(&content)
                .with_context(|| format!("failed parsing manifest: {}", path.display()))?;
            if manifest.id != id {
                anyhow::bail!(
                    "manifest {} declares id '{}' but lives under '{}'",
                    path.display(),
                    manifest.id,
                    id
                );
            }
            manifests.push(manifest);
        }

        manifests.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(manifests)
    }

    pub fn current(&self, id: &str) -> Result<Option<ListingManifest>> {
        Ok(self.listing_versions(id)?.into_iter().next())
    }
}

// Ids arrive from untrusted tokens and are joined onto the index path.
fn is_plain_listing_id(id: &str) -> bool {
    is_token_safe_id(id) && id != "." && id != ".." && !id.contains(['/', '\\'])
}
