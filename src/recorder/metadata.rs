//! Per-job stream metadata, mutated in place while parsing a media playlist.

use std::time::Duration;

/// Running state for one recording job, threaded through
/// [`crate::platform::PlatformProvider::parse_m3u8_line`] (spec §4.1, §4.5).
#[derive(Debug, Clone)]
pub struct StreamMetadata {
    /// Poll interval, taken from `#EXT-X-TARGETDURATION` once seen.
    pub waiting_time: Duration,
    /// Set once `#EXT-X-TARGETDURATION` has been consumed; later occurrences are ignored.
    pub skip_target_duration: bool,
    /// Cumulative stream duration reported by `#EXT-X-TWITCH-TOTAL-SECS`.
    pub total_duration_stream: Duration,
    /// `total_duration_stream` as of the start of the current output segment.
    pub start_duration_stream: Duration,
    pub username: String,
    pub platform: String,
    pub split_segments: bool,
    pub time_segment: u64,
}

impl StreamMetadata {
    pub fn new(platform: impl Into<String>, username: impl Into<String>, split_segments: bool, time_segment: u64) -> Self {
        Self {
            waiting_time: Duration::from_secs(1),
            skip_target_duration: false,
            total_duration_stream: Duration::ZERO,
            start_duration_stream: Duration::ZERO,
            username: username.into(),
            platform: platform.into(),
            split_segments,
            time_segment,
        }
    }

    /// Whether the current output segment has run long enough to split
    /// (spec §4.5.2).
    pub fn should_split(&self) -> bool {
        self.split_segments
            && self.total_duration_stream.saturating_sub(self.start_duration_stream)
                > Duration::from_secs(self.time_segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_split_when_past_time_segment() {
        use crate::platform::{PlatformProvider, TwitchProvider};

        let mut meta = StreamMetadata::new("twitch", "someone", true, 1800);
        meta.total_duration_stream = Duration::from_secs(1801);
        assert!(meta.should_split());

        // a job zeroes start_duration_stream once a split is finalized; the
        // next #EXT-X-TWITCH-TOTAL-SECS line then reseeds it to the current total
        meta.start_duration_stream = Duration::ZERO;
        TwitchProvider::new()
            .unwrap()
            .parse_m3u8_line("#EXT-X-TWITCH-TOTAL-SECS:1801.000", &mut meta);
        assert!(!meta.should_split());
    }

    #[test]
    fn should_split_is_false_when_disabled() {
        let mut meta = StreamMetadata::new("twitch", "someone", false, 1800);
        meta.total_duration_stream = Duration::from_secs(5000);
        assert!(!meta.should_split());
    }
}
