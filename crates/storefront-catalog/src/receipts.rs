use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::StorefrontLayout;

/// Record of an installed listing and the units it brought in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReceipt {
    pub id: String,
    pub version: String,
    pub features: Vec<String>,
    pub installed_at_unix: u64,
}

pub fn write_install_receipt(
    layout: &StorefrontLayout,
    receipt: &InstallReceipt,
) -> Result<PathBuf> {
    let mut payload = String::new();
    payload.push_str(&format!("id={}\n", receipt.id));
    payload.push_str(&format!("version={}\n", receipt.version));
    for feature in &receipt.features {
        payload.push_str(&format!("feature={}\n", feature));
    }
    payload.push_str(&format!(
        "installed_at_unix={}\n",
        receipt.installed_at_unix
    ));

    let dir = layout.installed_state_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create install state dir: {}", dir.display()))?;
    let path = layout.receipt_path(&receipt.id);
    fs::write(&path, payload.as_bytes())
        .with_context(|| format!("failed to write install receipt: {}", path.display()))?;
    Ok(path)
}

pub fn read_install_receipts(layout: &StorefrontLayout) -> Result<Vec<InstallReceipt>> {
    let dir = layout.installed_state_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut receipts = Vec::new();
    for entry in fs::read_dir(&dir)
        .with_context(|| format!("failed to read install state directory: {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|v| v.to_str()) != Some("receipt") {
            continue;
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read install receipt: {}", path.display()))?;
        let receipt = parse_receipt(&raw)
            .with_context(|| format!("failed to parse install receipt: {}", path.display()))?;
        receipts.push(receipt);
    }

    receipts.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(receipts)
}

pub(crate) fn parse_receipt(raw: &str) -> Result<InstallReceipt> {
    let mut id = None;
    let mut version = None;
    let mut features = Vec::new();
    let mut installed_at_unix = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        match k {
            "id" => id = Some(v.to_string()),
            "version" => version = Some(v.to_string()),
            "feature" => features.push(v.to_string()),
            "installed_at_unix" => {
                installed_at_unix = Some(v.parse().context("installed_at_unix must be u64")?)
            }
            _ => {}
        }
    }

    Ok(InstallReceipt {
        id: id.context("missing id")?,
        version: version.context("missing version")?,
        features,
        installed_at_unix: installed_at_unix.context("missing installed_at_unix")?,
    })
}
