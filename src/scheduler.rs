//! Periodically probes watched channels and launches recording jobs for
//! those that go live (spec §4.6).

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::database::models::StreamerRecord;
use crate::database::repositories::StreamerRepository;
use crate::error::FetchError;
use crate::platform::{PlatformProvider, Quality};
use crate::recorder::{RecordingJob, RecordingJobConfig};
use crate::state::State;

pub struct Scheduler {
    repository: Arc<dyn StreamerRepository>,
    provider: Arc<dyn PlatformProvider>,
    state: Arc<State>,
    job_config: RecordingJobConfig,
    time_check: Duration,
}

impl Scheduler {
    pub fn new(
        repository: Arc<dyn StreamerRepository>,
        provider: Arc<dyn PlatformProvider>,
        state: Arc<State>,
        job_config: RecordingJobConfig,
        time_check_secs: u64,
    ) -> Self {
        Self {
            repository,
            provider,
            state,
            job_config,
            time_check: Duration::from_secs(time_check_secs),
        }
    }

    /// Runs forever, polling the watched-channel list every `time_check`
    /// and spawning a watcher for every channel not already being probed.
    pub async fn run(self: Arc<Self>) {
        loop {
            match self.repository.list().await {
                Ok(streamers) => {
                    for streamer in streamers {
                        let key = streamer.channel_key();
                        if !self.state.is_active(&key) {
                            self.state.set_active(key, true);
                            let scheduler = self.clone();
                            tokio::spawn(async move { scheduler.watch_channel(streamer).await });
                        }
                    }
                }
                Err(e) => error!(error = %e, "failed to list watched streamers"),
            }

            tokio::time::sleep(self.time_check).await;
        }
    }

    async fn watch_channel(&self, streamer: StreamerRecord) {
        let key = streamer.channel_key();

        let mut master_url = match self.provider.get_master_playlist(&streamer.username).await {
            Ok(url) => url,
            Err(e) => {
                error!(platform = %streamer.platform, username = %streamer.username, error = %e, "failed to get master playlist");
                self.state.set_active(key, false);
                return;
            }
        };

        let quality: Quality = match streamer.quality.parse() {
            Ok(q) => q,
            Err(e) => {
                error!(platform = %streamer.platform, username = %streamer.username, error = %e, "invalid configured quality");
                self.state.set_active(key, false);
                return;
            }
        };

        let media_url = loop {
            if !self.state.is_active(&key) {
                return;
            }

            match self.provider.find_media_playlist(&master_url, &quality).await {
                Ok(url) => break url,
                Err(FetchError::UpstreamExpired) => {
                    match self.provider.get_master_playlist(&streamer.username).await {
                        Ok(url) => master_url = url,
                        Err(e) => {
                            error!(platform = %streamer.platform, username = %streamer.username, error = %e, "failed to refresh master playlist");
                            self.state.set_active(key, false);
                            return;
                        }
                    }
                }
                Err(_) => {
                    debug!(platform = %streamer.platform, username = %streamer.username, "streamer is not live yet, waiting");
                }
            }

            tokio::time::sleep(self.time_check).await;
        };

        info!(platform = %streamer.platform, username = %streamer.username, "streamer is live, starting recording");

        let job_result = RecordingJob::new(
            streamer.platform.clone(),
            streamer.username.clone(),
            streamer.split_segments,
            streamer.time_segment.max(0) as u64,
            self.provider.clone(),
            &self.job_config,
        );

        let (job, handle) = match job_result {
            Ok(pair) => pair,
            Err(e) => {
                error!(platform = %streamer.platform, username = %streamer.username, error = %e, "failed to create recording job");
                self.state.set_active(key, false);
                return;
            }
        };

        self.state.set_job(key.clone(), handle);

        if let Err(e) = job.run(media_url).await {
            error!(platform = %streamer.platform, username = %streamer.username, error = %e, "recording job exited with an error");
        }

        self.state.clear_job(&key);
        self.state.set_active(key, false);
    }
}
