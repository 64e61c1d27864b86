//! `PlatformProvider` capability (spec §4.1, §4.8) and the Twitch implementation.

pub mod quality;
pub mod twitch;

pub use quality::Quality;
pub use twitch::TwitchProvider;

use async_trait::async_trait;

use crate::error::{FetchError, Result};
use crate::recorder::metadata::StreamMetadata;

/// Per-platform capability. New platforms are added by providing a new
/// implementation value; callers hold it as `Arc<dyn PlatformProvider>`, not
/// by concrete type (spec §9 — deep inheritance avoided via capability).
#[async_trait]
pub trait PlatformProvider: Send + Sync {
    /// Returns a playable master HLS URL for a live broadcast. Errors are
    /// opaque to the caller, which only logs, backs off, and retries.
    async fn get_master_playlist(&self, channel: &str) -> Result<String>;

    /// Resolves the variant matching the requested quality label.
    ///
    /// Returns a classified [`FetchError`] so the caller can distinguish
    /// "master expired" (403, refresh the master) from "channel offline"
    /// (404, keep waiting) from anything else (back off and retry).
    async fn find_media_playlist(
        &self,
        master_url: &str,
        quality: &Quality,
    ) -> std::result::Result<String, FetchError>;

    /// Parses one media-playlist line, updating stream metadata in place.
    ///
    /// Returns `(skip_next, is_segment, url)`: `skip_next` is the number of
    /// following lines the caller must consume unparsed (ad markers);
    /// `is_segment` is true when `url` is a segment URL.
    fn parse_m3u8_line(&self, line: &str, meta: &mut StreamMetadata) -> (usize, bool, String);
}
