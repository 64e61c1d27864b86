//! Media playlist fetching (spec §4.2).

use reqwest::Client;
use std::sync::Arc;

use crate::error::FetchError;
use crate::platform::PlatformProvider;
use crate::recorder::metadata::StreamMetadata;

pub struct PlaylistFetcher {
    client: Client,
    provider: Arc<dyn PlatformProvider>,
}

impl PlaylistFetcher {
    pub fn new(client: Client, provider: Arc<dyn PlatformProvider>) -> Self {
        Self { client, provider }
    }

    /// Fetches `url`, scans it line-by-line through the provider's parser,
    /// and returns segment URLs in playlist order. Non-200 responses are
    /// classified via [`FetchError::from_playlist_status`]; a 404 signals
    /// end-of-broadcast to the caller.
    pub async fn fetch(&self, url: &str, meta: &mut StreamMetadata) -> Result<Vec<String>, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_playlist_status(status.as_u16()));
        }

        let body = resp.text().await?;
        let mut segments = Vec::new();
        let mut skip_count = 0usize;

        for line in body.lines() {
            if skip_count > 0 {
                skip_count -= 1;
                continue;
            }
            let (skip, is_segment, url) = self.provider.parse_m3u8_line(line, meta);
            if is_segment {
                segments.push(url);
            }
            skip_count = skip;
        }

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Quality, TwitchProvider};
    use async_trait::async_trait;

    struct FakeProvider;

    #[async_trait]
    impl PlatformProvider for FakeProvider {
        async fn get_master_playlist(&self, _channel: &str) -> crate::error::Result<String> {
            unimplemented!()
        }

        async fn find_media_playlist(&self, _master_url: &str, _quality: &Quality) -> Result<String, FetchError> {
            unimplemented!()
        }

        fn parse_m3u8_line(&self, line: &str, _meta: &mut StreamMetadata) -> (usize, bool, String) {
            if line.starts_with('#') {
                (0, false, String::new())
            } else {
                (0, true, line.to_string())
            }
        }
    }

    #[tokio::test]
    async fn fetch_returns_segments_in_order() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let body = "#EXTM3U\nhttps://ex.com/s1.ts\nhttps://ex.com/s2.ts\n";
        Mock::given(method("GET"))
            .and(path("/media.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let client = Client::new();
        let fetcher = PlaylistFetcher::new(client, Arc::new(FakeProvider));
        let mut meta = StreamMetadata::new("twitch", "someone", false, 1800);
        let segments = fetcher
            .fetch(&format!("{}/media.m3u8", server.uri()), &mut meta)
            .await
            .unwrap();

        assert_eq!(segments, vec!["https://ex.com/s1.ts", "https://ex.com/s2.ts"]);
    }

    #[tokio::test]
    async fn fetch_classifies_404_as_upstream_gone() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media.m3u8"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = Client::new();
        let fetcher = PlaylistFetcher::new(client, Arc::new(FakeProvider));
        let mut meta = StreamMetadata::new("twitch", "someone", false, 1800);
        let err = fetcher
            .fetch(&format!("{}/media.m3u8", server.uri()), &mut meta)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::UpstreamGone));
    }

    #[test]
    fn provider_type_is_used_for_real_twitch_construction() {
        let _ = TwitchProvider::new().unwrap();
    }
}
