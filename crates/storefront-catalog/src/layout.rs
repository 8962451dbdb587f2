use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Where the catalog index and the installed state live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontLayout {
    catalog_root: PathBuf,
    state_root: PathBuf,
}

impl StorefrontLayout {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            catalog_root: home.join("catalog"),
            state_root: home.join("state"),
        }
    }

    pub fn with_roots(catalog_root: impl Into<PathBuf>, state_root: impl Into<PathBuf>) -> Self {
        Self {
            catalog_root: catalog_root.into(),
            state_root: state_root.into(),
        }
    }

    pub fn catalog_root(&self) -> &Path {
        &self.catalog_root
    }

    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    pub fn index_dir(&self) -> PathBuf {
        self.catalog_root.join("index")
    }

    pub fn installed_state_dir(&self) -> PathBuf {
        self.state_root.join("installed")
    }

    pub fn receipt_path(&self, id: &str) -> PathBuf {
        self.installed_state_dir().join(format!("{id}.receipt"))
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.index_dir(), self.installed_state_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create dir: {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_storefront_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("STOREFRONT_HOME") {
        return Ok(PathBuf::from(home));
    }

    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve storefront home")?;
        return Ok(PathBuf::from(app_data).join("Storefront"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve storefront home")?;
    Ok(PathBuf::from(home).join(".storefront"))
}
