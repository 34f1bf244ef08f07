use crate::errors::AppError;
use crate::models::Settings;
use std::path::Path;
use tokio::fs;
use tracing::{error, info};

pub async fn load_settings(path: &Path) -> Settings {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(settings) => settings,
            Err(err) => {
                error!("failed to parse settings file: {err}");
                Settings::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no settings file yet, using defaults");
            Settings::default()
        }
        Err(err) => {
            error!("failed to read settings file: {err}");
            Settings::default()
        }
    }
}

pub async fn persist_settings(path: &Path, settings: &Settings) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(settings).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}
