//! Configuration loading (spec §6.3).
//!
//! Options are read from the environment, optionally seeded from a `.env`
//! file via `dotenvy`. Unlike `rust-srec`'s database-backed dynamic config
//! service, this is a one-shot load at startup (see DESIGN.md Open
//! Questions) — there is no runtime reconfiguration.

use std::env;
use tracing::warn;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub logger_level: String,
    pub time_check: u64,
    pub ffmpeg_path: String,
    pub media_path: String,
    pub temp_path: String,
    pub auto_clean_media_path: bool,
    pub time_auto_clean_media_path: u64,
    pub buffer_size: u64,
    pub video_codec: String,
    pub audio_codec: String,
    pub file_format: String,
    pub port: u16,
    pub database_url: String,
}

impl Config {
    /// Load configuration from the process environment, applying `.env` if present.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Config {
            logger_level: env_or("LOGGER_LEVEL", "info"),
            time_check: env_parse_or("TIME_CHECK", 15)?,
            ffmpeg_path: env_or("FFMPEG_PATH", "ffmpeg"),
            media_path: env_or("MEDIA_PATH", "mnt"),
            temp_path: env_or("TEMP_PATH", "tmp"),
            auto_clean_media_path: env_parse_or("AUTO_CLEAN_MEDIA_PATH", false)?,
            time_auto_clean_media_path: env_parse_or("TIME_AUTO_CLEAN_MEDIA_PATH", 7)?,
            buffer_size: env_parse_or("BUFFER_SIZE", 32)?,
            video_codec: env_or("VIDEO_CODEC", "copy"),
            audio_codec: env_or("AUDIO_CODEC", "copy"),
            file_format: env_or("FILE_FORMAT", "mp4"),
            port: env_parse_or("PORT", 8080)?,
            database_url: env_or("DATABASE_URL", "sqlite://twitch-recorder.db?mode=rwc"),
        };

        cfg.normalize();
        Ok(cfg)
    }

    /// Clamp and validate options the way the original `NormalizeEnv` did.
    fn normalize(&mut self) {
        match self.logger_level.as_str() {
            "debug" | "info" | "warn" | "error" | "fatal" => {}
            other => {
                warn!(value = other, "unknown logger_level, defaulting to 'info'");
                self.logger_level = "info".to_string();
            }
        }

        if self.time_check < 5 {
            warn!(value = self.time_check, "time_check too short, clamping to 5s");
            self.time_check = 5;
        }

        if self.time_auto_clean_media_path < 1 {
            warn!("time_auto_clean_media_path too short, clamping to 1 day");
            self.time_auto_clean_media_path = 1;
        }

        if self.buffer_size < 32 {
            warn!(value = self.buffer_size, "buffer_size too small, clamping to 32 MiB");
            self.buffer_size = 32;
        }

        self.media_path = self.media_path.trim_end_matches(['/', '\\']).to_string();
        self.temp_path = self.temp_path.trim_end_matches(['/', '\\']).to_string();
    }

    /// Byte threshold derived from `buffer_size` (spec §4.5.1, §6.3).
    pub fn buffer_size_bytes(&self) -> usize {
        self.buffer_size as usize * 1024 * 1024
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|e| Error::config(format!("invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_clamps_time_check() {
        let mut cfg = Config {
            logger_level: "info".into(),
            time_check: 1,
            ffmpeg_path: "ffmpeg".into(),
            media_path: "mnt/".into(),
            temp_path: "tmp/".into(),
            auto_clean_media_path: false,
            time_auto_clean_media_path: 0,
            buffer_size: 1,
            video_codec: "copy".into(),
            audio_codec: "copy".into(),
            file_format: "mp4".into(),
            port: 8080,
            database_url: "sqlite::memory:".into(),
        };
        cfg.normalize();

        assert_eq!(cfg.time_check, 5);
        assert_eq!(cfg.time_auto_clean_media_path, 1);
        assert_eq!(cfg.buffer_size, 32);
        assert_eq!(cfg.media_path, "mnt");
        assert_eq!(cfg.temp_path, "tmp");
    }

    #[test]
    fn buffer_size_bytes_converts_mib() {
        let cfg = Config {
            logger_level: "info".into(),
            time_check: 15,
            ffmpeg_path: "ffmpeg".into(),
            media_path: "mnt".into(),
            temp_path: "tmp".into(),
            auto_clean_media_path: false,
            time_auto_clean_media_path: 7,
            buffer_size: 32,
            video_codec: "copy".into(),
            audio_codec: "copy".into(),
            file_format: "mp4".into(),
            port: 8080,
            database_url: "sqlite::memory:".into(),
        };
        assert_eq!(cfg.buffer_size_bytes(), 32 * 1024 * 1024);
    }
}
