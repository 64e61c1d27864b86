//! Segment downloading with bounded retries (spec §4.3).

use reqwest::Client;
use std::time::Duration;
use tracing::warn;

use crate::error::FetchError;

#[derive(Clone)]
pub struct SegmentDownloader {
    client: Client,
    max_attempts: u32,
}

impl SegmentDownloader {
    pub fn new(client: Client) -> Self {
        Self { client, max_attempts: 10 }
    }

    /// Downloads `url`'s body. HTTP 404 is terminal and is not retried.
    /// Network errors and other non-200 statuses consume a retry, with a
    /// linear `attempt * 3s` backoff between attempts.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let resp = match self.client.get(url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if attempt >= self.max_attempts {
                        return Err(FetchError::RetriesExhausted(attempt));
                    }
                    warn!(url, attempt, error = %e, "failed to download segment");
                    tokio::time::sleep(Duration::from_secs(3 * attempt as u64)).await;
                    continue;
                }
            };

            let status = resp.status();
            if status.as_u16() == 404 {
                return Err(FetchError::SegmentMissing);
            }
            if !status.is_success() {
                if attempt >= self.max_attempts {
                    return Err(FetchError::Status(status.as_u16()));
                }
                warn!(url, attempt, status = status.as_u16(), "non-OK status downloading segment");
                tokio::time::sleep(Duration::from_secs(3 * attempt as u64)).await;
                continue;
            }

            match resp.bytes().await {
                Ok(bytes) => return Ok(bytes.to_vec()),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        return Err(FetchError::RetriesExhausted(attempt));
                    }
                    warn!(url, attempt, error = %e, "failed to read segment body");
                    tokio::time::sleep(Duration::from_secs(3 * attempt as u64)).await;
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn downloads_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/seg.ts"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"segment-data".to_vec()))
            .mount(&server)
            .await;

        let downloader = SegmentDownloader::new(Client::new());
        let data = downloader.download(&format!("{}/seg.ts", server.uri())).await.unwrap();
        assert_eq!(data, b"segment-data");
    }

    #[tokio::test]
    async fn not_found_is_terminal_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/seg.ts"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let downloader = SegmentDownloader::new(Client::new());
        let err = downloader.download(&format!("{}/seg.ts", server.uri())).await.unwrap_err();
        assert!(matches!(err, FetchError::SegmentMissing));
    }
}
