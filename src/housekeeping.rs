//! Periodic temp/media directory cleanup (supplemented feature, gated by
//! `auto_clean_media_path` / `time_auto_clean_media_path`).

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};

pub struct HousekeepingConfig {
    pub media_path: PathBuf,
    pub max_age: Duration,
    pub interval: Duration,
}

/// Runs forever, removing stream-directories under `media_path` whose
/// newest file is older than `max_age`. Only engaged when the caller checks
/// `auto_clean_media_path` before spawning this task.
pub async fn run(cfg: HousekeepingConfig) {
    loop {
        if let Err(e) = sweep(&cfg.media_path, cfg.max_age).await {
            error!(error = %e, "housekeeping sweep failed");
        }
        tokio::time::sleep(cfg.interval).await;
    }
}

async fn sweep(media_path: &Path, max_age: Duration) -> std::io::Result<()> {
    if !media_path.exists() {
        return Ok(());
    }

    let now = SystemTime::now();
    let mut entries = tokio::fs::read_dir(media_path).await?;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_dir() {
            continue;
        }

        let path = entry.path();
        match newest_modification(&path).await {
            Ok(Some(modified)) => {
                let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
                if age > max_age {
                    info!(path = %path.display(), age_days = age.as_secs() / 86_400, "removing stale recording directory");
                    if let Err(e) = tokio::fs::remove_dir_all(&path).await {
                        warn!(error = %e, path = %path.display(), "failed to remove stale recording directory");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, path = %path.display(), "failed to inspect directory for housekeeping"),
        }
    }

    Ok(())
}

async fn newest_modification(dir: &Path) -> std::io::Result<Option<SystemTime>> {
    let mut newest: Option<SystemTime> = None;
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let modified = entry.metadata().await?.modified()?;
        newest = Some(match newest {
            Some(current) if current >= modified => current,
            _ => modified,
        });
    }

    Ok(newest)
}
