//! Row types for the `streamers` table (spec §3, §6.4).

use serde::{Deserialize, Serialize};

/// A single watched channel, as stored in the `streamers` table.
///
/// `(platform, username)` is unique — enforced by a unique index in the
/// `0001_create_streamers` migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StreamerRecord {
    pub id: i64,
    pub platform: String,
    pub username: String,
    pub quality: String,
    pub split_segments: bool,
    pub time_segment: i64,
}

/// Fields accepted when adding a new watched channel (`GET /streamer/add`).
#[derive(Debug, Clone)]
pub struct NewStreamer {
    pub platform: String,
    pub username: String,
    pub quality: String,
    pub split_segments: bool,
    pub time_segment: i64,
}

/// Partial update accepted by `GET /streamer/update`. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct StreamerUpdate {
    pub quality: Option<String>,
    pub split_segments: Option<bool>,
    pub time_segment: Option<i64>,
}

/// Stable identifier for [`crate::state::State`] maps: `"<platform>-<username>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey(String);

impl ChannelKey {
    pub fn new(platform: &str, username: &str) -> Self {
        Self(format!("{platform}-{username}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl StreamerRecord {
    pub fn channel_key(&self) -> ChannelKey {
        ChannelKey::new(&self.platform, &self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_key_is_platform_dash_username() {
        let key = ChannelKey::new("twitch", "alice");
        assert_eq!(key.as_str(), "twitch-alice");
    }
}
