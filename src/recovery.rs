//! Startup repair pass: finalizes recordings left in progress by a prior
//! process (spec §4.7).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::recorder::Concatenator;

/// Walks `temp_root`, concatenating every orphan `<base>.txt` (and its
/// segment files) into `<media_root>/<same-relative-dir>/<base>.<format>`.
/// Empty list files are deleted outright. Never overwrites an existing
/// `<base>.<format>` — a naming collision leaves the `_download` file for an
/// operator to resolve.
pub async fn recover(temp_root: &Path, media_root: &Path, concatenator: &Concatenator) -> Result<()> {
    if !temp_root.exists() {
        return Ok(());
    }

    info!(temp_root = %temp_root.display(), "recovering interrupted recordings");

    let mut txt_by_dir: HashMap<PathBuf, Vec<String>> = HashMap::new();
    walk_temp_root(temp_root, &mut txt_by_dir).await?;

    for (dir, files) in txt_by_dir {
        let Ok(relative) = dir.strip_prefix(temp_root) else {
            continue;
        };
        let media_dir = media_root.join(relative);
        if let Err(e) = tokio::fs::create_dir_all(&media_dir).await {
            error!(error = %e, dir = %media_dir.display(), "failed to create media directory during recovery");
            continue;
        }

        for file in files {
            let base = file.trim_end_matches(".txt");
            let txt_path = dir.join(&file);
            let output_base = media_dir.join(base);

            if let Err(e) = concatenator.concat_and_cleanup(&txt_path, &output_base).await {
                error!(error = %e, path = %txt_path.display(), "failed to recover interrupted recording");
            }
        }
    }

    info!("recovery pass complete");
    Ok(())
}

async fn walk_temp_root(dir: &Path, txt_by_dir: &mut HashMap<PathBuf, Vec<String>>) -> Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = entry.metadata().await?;

        if metadata.is_dir() {
            Box::pin(walk_temp_root(&path, txt_by_dir)).await?;
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(".txt") {
            continue;
        }

        if metadata.len() == 0 {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(error = %e, path = %path.display(), "failed to remove empty concat list");
            }
            continue;
        }

        txt_by_dir.entry(dir.to_path_buf()).or_default().push(name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_list_files_are_deleted() {
        let temp = tempfile::tempdir().unwrap();
        let sub = temp.path().join("twitch_carol_2024-01-01");
        tokio::fs::create_dir_all(&sub).await.unwrap();
        let empty_txt = sub.join("twitch_carol_0h0m0s.txt");
        tokio::fs::write(&empty_txt, b"").await.unwrap();

        let media = tempfile::tempdir().unwrap();
        let concat = Concatenator::new("ffmpeg", "copy", "copy", "mp4");
        recover(temp.path(), media.path(), &concat).await.unwrap();

        assert!(!empty_txt.exists());
    }

    #[tokio::test]
    async fn missing_temp_root_is_a_noop() {
        let media = tempfile::tempdir().unwrap();
        let concat = Concatenator::new("ffmpeg", "copy", "copy", "mp4");
        let result = recover(Path::new("/nonexistent/does-not-exist"), media.path(), &concat).await;
        assert!(result.is_ok());
    }
}
