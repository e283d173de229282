use std::path::{Path, PathBuf};

use eyre::WrapErr;
use lockmint_core::{Deployments, PersistedSettings};
use tracing::{debug, info, warn};

use crate::store::Store;

pub(crate) const SETTINGS_FILE: &str = "settings.json";

/// Read persisted settings, falling back to defaults when the file does not
/// exist yet.
pub(crate) async fn load(path: &Path) -> eyre::Result<PersistedSettings> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No settings file, using defaults");
            return Ok(PersistedSettings::default());
        }
        Err(err) => return Err(err).wrap_err_with(|| format!("Failed to read {}", path.display())),
    };

    serde_json::from_slice(&raw).wrap_err_with(|| format!("Failed to parse {}", path.display()))
}

/// Read the contract addresses supplied for ecosystems the built-in table
/// does not fully cover. Unlike settings, a missing file is an error.
pub(crate) async fn load_deployments(path: &Path) -> eyre::Result<Deployments> {
    let raw = tokio::fs::read(path)
        .await
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    let deployments: Deployments =
        serde_json::from_slice(&raw).wrap_err_with(|| format!("Failed to parse {}", path.display()))?;

    info!(path = %path.display(), ecosystems = ?deployments.keys().collect::<Vec<_>>(), "Loaded deployments");
    Ok(deployments)
}

pub(crate) async fn save(path: &Path, settings: &PersistedSettings) -> eyre::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let raw = serde_json::to_vec_pretty(settings)?;
    tokio::fs::write(path, raw)
        .await
        .wrap_err_with(|| format!("Failed to write {}", path.display()))
}

/// Rewrite the settings file whenever the persisted part of the state
/// changes.
pub(crate) async fn persist(store: Store, path: PathBuf) {
    let mut rx = store.subscribe();
    let mut last = rx.borrow_and_update().persisted_settings();

    while rx.changed().await.is_ok() {
        let settings = rx.borrow_and_update().persisted_settings();
        if settings == last {
            continue;
        }

        debug!(path = %path.display(), "Saving settings");
        if let Err(err) = save(&path, &settings).await {
            warn!(?err, "Failed to save settings");
        }
        last = settings;
    }
}
