//! Wraps the external encoder to concatenate flushed segments into one
//! output file (spec §4.5.2, §4.7).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::process_utils::tokio_command;

#[derive(Clone)]
pub struct Concatenator {
    ffmpeg_path: String,
    video_codec: String,
    audio_codec: String,
    file_format: String,
}

impl Concatenator {
    pub fn new(ffmpeg_path: impl Into<String>, video_codec: impl Into<String>, audio_codec: impl Into<String>, file_format: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            video_codec: video_codec.into(),
            audio_codec: audio_codec.into(),
            file_format: file_format.into(),
        }
    }

    /// Remuxes a raw `.ts` buffer flushed to `ts_path` into `<N>_<segID>.<format>`
    /// at `output_path`, applying the configured video/audio codec policy
    /// (copy by default). The raw `.ts` file is removed afterward regardless
    /// of outcome, matching the upstream segment-processing behavior.
    pub async fn remux_segment(&self, ts_path: &Path, output_path: &Path) -> Result<()> {
        let result = tokio_command(&self.ffmpeg_path)
            .args(["-y", "-loglevel", "error"])
            .arg("-i")
            .arg(ts_path)
            .args(["-c:v", &self.video_codec])
            .args(["-c:a", &self.audio_codec])
            .arg(output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let remux = async {
            let status = result
                .map_err(|e| Error::Ffmpeg(format!("failed to spawn ffmpeg: {e}")))?
                .wait()
                .await?;
            if !status.success() {
                return Err(Error::Ffmpeg(format!("ffmpeg exited with status {status}")));
            }
            Ok(())
        }
        .await;

        if let Err(e) = tokio::fs::remove_file(ts_path).await {
            warn!(error = %e, path = %ts_path.display(), "failed to remove temp segment file");
        }

        remux
    }

    /// Scans `dir` for this job's flushed segment files (named `<N>_<segID>.<format>`),
    /// sorts them by the extracted numeric prefix, and writes `<path_base>.txt`
    /// as a concat list, one `file '<name>'` line per segment.
    pub async fn flush_txt_to_disk(&self, dir: &Path, path_base: &Path) -> Result<()> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut segments = Vec::new();
        let suffix = format!(".{}", self.file_format);

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy().to_string();
            if !name.ends_with(&suffix) {
                continue;
            }
            let Some(prefix) = name.split('_').next() else {
                continue;
            };
            let Ok(n) = prefix.parse::<u64>() else {
                continue;
            };
            segments.push((n, name));
        }
        segments.sort_by_key(|(n, _)| *n);

        let txt_path = path_base.with_extension("txt");
        let mut contents = String::new();
        for (_, name) in &segments {
            contents.push_str(&format!("file '{name}'\n"));
        }
        tokio::fs::write(&txt_path, contents).await?;
        Ok(())
    }

    /// Runs the encoder over `txt_path`'s concat list, producing
    /// `<output_base>_download.<format>`, then renames on success and deletes
    /// the listed segment files plus the list itself.
    pub async fn concat_and_cleanup(&self, txt_path: &Path, output_base: &Path) -> Result<()> {
        let download_path = sibling_with_suffix(output_base, "_download", &self.file_format);
        let final_path = output_base.with_extension(&self.file_format);

        let status = tokio_command(&self.ffmpeg_path)
            .args(["-y", "-err_detect", "ignore_err", "-loglevel", "warning"])
            .args(["-f", "concat", "-safe", "0"])
            .arg("-i")
            .arg(txt_path)
            .args(["-fps_mode", "cfr"])
            .args(["-c:v", &self.video_codec])
            .args(["-c:a", &self.audio_codec])
            .arg(&download_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Ffmpeg(format!("failed to spawn ffmpeg: {e}")))?
            .wait()
            .await?;

        if !status.success() {
            error!(?status, "ffmpeg concat failed, leaving _download file for recovery");
            return Err(Error::Ffmpeg(format!("ffmpeg exited with status {status}")));
        }

        tokio::fs::rename(&download_path, &final_path).await?;

        match tokio::fs::read_to_string(txt_path).await {
            Ok(listing) => {
                let dir = txt_path.parent().unwrap_or_else(|| Path::new("."));
                for line in listing.lines() {
                    if let Some(name) = extract_quoted_filename(line) {
                        let segment_path = dir.join(name);
                        if let Err(e) = tokio::fs::remove_file(&segment_path).await {
                            warn!(error = %e, path = %segment_path.display(), "failed to remove segment file");
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, path = %txt_path.display(), "failed to read concat list for cleanup"),
        }

        if let Err(e) = tokio::fs::remove_file(txt_path).await {
            warn!(error = %e, path = %txt_path.display(), "failed to remove concat list");
        }

        info!(path = %final_path.display(), "segment recorded");
        Ok(())
    }
}

fn sibling_with_suffix(base: &Path, suffix: &str, ext: &str) -> PathBuf {
    let mut name = base
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.push_str(suffix);
    name.push('.');
    name.push_str(ext);
    base.with_file_name(name)
}

fn extract_quoted_filename(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("file '")?;
    rest.strip_suffix('\'')
}
