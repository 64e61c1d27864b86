//! Twitch [`PlatformProvider`](super::PlatformProvider) implementation.
//!
//! Mirrors Twitch's public (undocumented) playback flow: a GQL persisted
//! query exchanges a channel login for a signed playback access token, which
//! is then handed to Usher to mint a master HLS URL (spec §4.1, §4.8).

use async_trait::async_trait;
use rand::RngExt;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{PlatformProvider, Quality, quality::{Variant, select_variant}};
use crate::error::{Error, FetchError, Result};
use crate::recorder::metadata::StreamMetadata;

const USHER_URL: &str = "https://usher.ttvnw.net";
const GQL_URL: &str = "https://gql.twitch.tv/gql";
const INTEGRITY_URL: &str = "https://gql.twitch.tv/integrity";
const CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";
const ACCESS_TOKEN_SHA256: &str = "0828119ded1c13477966434e15800ff57ddacf13ba1911c129dc2200705b0712";

pub struct TwitchProvider {
    client: Client,
    device_id: String,
}

impl TwitchProvider {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self {
            client,
            device_id: Self::generate_device_id(),
        })
    }

    fn generate_device_id() -> String {
        rand::rng()
            .random_range(1_000_000_000_000_000i64..9_999_999_999_999_999i64)
            .to_string()
    }

    async fn fetch_integrity(&self) -> Result<String> {
        debug!(url = INTEGRITY_URL, "fetching client integrity token");
        let resp = self
            .client
            .post(INTEGRITY_URL)
            .header("X-Device-Id", &self.device_id)
            .header("Client-Id", CLIENT_ID)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::extractor(format!(
                "integrity request failed with status {}",
                resp.status()
            )));
        }

        let body: Value = resp.json().await?;
        body.get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::extractor("integrity response missing token"))
    }

    fn persisted_query(operation_name: &str, sha256_hash: &str, variables: Value) -> Value {
        json!({
            "operationName": operation_name,
            "extensions": {
                "persistedQuery": {
                    "version": 1,
                    "sha256Hash": sha256_hash,
                },
            },
            "variables": variables,
        })
    }

    async fn access_token(&self, channel: &str) -> Result<(String, String)> {
        debug!(channel, "fetching playback access token");
        let integrity = self.fetch_integrity().await?;

        let query = Self::persisted_query(
            "PlaybackAccessToken",
            ACCESS_TOKEN_SHA256,
            json!({
                "isLive": true,
                "login": channel,
                "isVod": false,
                "vodID": "",
                "playerType": "embed",
            }),
        );

        let resp = self
            .client
            .post(GQL_URL)
            .header("Client-Id", CLIENT_ID)
            .header("X-Device-Id", &self.device_id)
            .header("Client-Integrity", integrity)
            .json(&query)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::extractor(format!(
                "GQL access token request failed with status {}",
                resp.status()
            )));
        }

        let body: Value = resp.json().await?;
        let token = body
            .pointer("/data/streamPlaybackAccessToken")
            .ok_or_else(|| Error::extractor("streamPlaybackAccessToken not found in response"))?;

        let signature = token
            .get("signature")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::extractor("access token missing signature"))?
            .to_string();
        let value = token
            .get("value")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::extractor("access token missing value"))?
            .to_string();

        Ok((signature, value))
    }
}

#[async_trait]
impl PlatformProvider for TwitchProvider {
    async fn get_master_playlist(&self, channel: &str) -> Result<String> {
        let (signature, value) = self.access_token(channel).await?;
        let token: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
        Ok(format!(
            "{USHER_URL}/api/channel/hls/{channel}.m3u8?player=twitchweb&platform=web&\
             supported_codecs=h265,h264&p=715347&type=any&allow_source=true&\
             allow_audio_only=true&allow_spectre=false&sig={signature}&token={token}"
        ))
    }

    async fn find_media_playlist(
        &self,
        master_url: &str,
        quality: &Quality,
    ) -> std::result::Result<String, FetchError> {
        let resp = self.client.get(master_url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_playlist_status(status.as_u16()));
        }

        let body = resp.text().await?;
        let mut variants = Vec::new();
        let mut pending_resolution: Option<(u32, u32)> = None;

        for line in body.lines() {
            if let Some(rest) = line.strip_prefix("#EXT-X-STREAM-INF") {
                pending_resolution = rest
                    .split("RESOLUTION=")
                    .nth(1)
                    .and_then(|s| s.split(',').next())
                    .and_then(parse_resolution);
                continue;
            }
            if line.starts_with("http") {
                if let Some((width, height)) = pending_resolution.take() {
                    variants.push(Variant { width, height, url: line.to_string() });
                }
            }
        }

        select_variant(&variants, quality).map_err(|e| FetchError::QualityNotFound(e.to_string()))
    }

    fn parse_m3u8_line(&self, line: &str, meta: &mut StreamMetadata) -> (usize, bool, String) {
        if line.starts_with("#EXT-X-TARGETDURATION") && !meta.skip_target_duration {
            if let Some(secs) = line.split(':').nth(1).and_then(|s| s.parse::<u64>().ok()) {
                meta.waiting_time = Duration::from_secs(secs);
                meta.skip_target_duration = true;
            }
            return (0, false, String::new());
        }

        if line.starts_with("#EXT-X-TWITCH-TOTAL-SECS") {
            if let Some(rest) = line.split(':').nth(1) {
                if let Some(whole) = rest.split('.').next().and_then(|s| s.parse::<u64>().ok()) {
                    meta.total_duration_stream = Duration::from_secs(whole);
                    if meta.start_duration_stream.is_zero() {
                        meta.start_duration_stream = meta.total_duration_stream;
                    }
                }
            }
            return (0, false, String::new());
        }

        if line.starts_with("#EXTINF") && line.contains("Amazon") {
            return (1, false, String::new());
        }

        if !line.starts_with('#') && !line.is_empty() {
            return (0, true, line.to_string());
        }

        (0, false, String::new())
    }
}

fn parse_resolution(res: &str) -> Option<(u32, u32)> {
    let (w, h) = res.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> TwitchProvider {
        TwitchProvider::new().unwrap()
    }

    #[test]
    fn parses_target_duration_once() {
        let mut meta = StreamMetadata::new("twitch", "someone", false, 1800);
        let (_, is_segment, _) = provider().parse_m3u8_line("#EXT-X-TARGETDURATION:6", &mut meta);
        assert!(!is_segment);
        assert_eq!(meta.waiting_time, Duration::from_secs(6));
        assert!(meta.skip_target_duration);

        provider().parse_m3u8_line("#EXT-X-TARGETDURATION:99", &mut meta);
        assert_eq!(meta.waiting_time, Duration::from_secs(6));
    }

    #[test]
    fn parses_total_secs_and_seeds_start() {
        let mut meta = StreamMetadata::new("twitch", "someone", false, 1800);
        provider().parse_m3u8_line("#EXT-X-TWITCH-TOTAL-SECS:12.345", &mut meta);
        assert_eq!(meta.total_duration_stream, Duration::from_secs(12));
        assert_eq!(meta.start_duration_stream, Duration::from_secs(12));
    }

    #[test]
    fn ad_marker_skips_next_line() {
        let mut meta = StreamMetadata::new("twitch", "someone", false, 1800);
        let (skip, is_segment, _) =
            provider().parse_m3u8_line("#EXTINF:2.000,live,Amazon", &mut meta);
        assert_eq!(skip, 1);
        assert!(!is_segment);
    }

    #[test]
    fn plain_url_is_a_segment() {
        let mut meta = StreamMetadata::new("twitch", "someone", false, 1800);
        let (skip, is_segment, url) =
            provider().parse_m3u8_line("https://example.com/seg0.ts", &mut meta);
        assert_eq!(skip, 0);
        assert!(is_segment);
        assert_eq!(url, "https://example.com/seg0.ts");
    }

    #[test]
    fn resolution_parses_wxh() {
        assert_eq!(parse_resolution("1920x1080"), Some((1920, 1080)));
        assert_eq!(parse_resolution("garbage"), None);
    }
}
