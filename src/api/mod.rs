//! HTTP control surface: list/add/update/delete watched channels and force a
//! cut on a running recording (spec §6.1).

pub mod error;
pub mod routes;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::database::models::ChannelKey;
use crate::database::repositories::StreamerRepository;
use crate::state::State;

/// One cut request per channel per minute (spec §6.1, `GET /stream/cut`).
pub type CutLimiter = RateLimiter<ChannelKey, DefaultKeyedStateStore<ChannelKey>, DefaultClock>;

/// Shared application state threaded through every route handler.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn StreamerRepository>,
    pub recording_state: Arc<State>,
    pub cut_limiter: Arc<CutLimiter>,
}

impl AppState {
    pub fn new(repository: Arc<dyn StreamerRepository>, recording_state: Arc<State>) -> Self {
        let quota = Quota::with_period(Duration::from_secs(60))
            .expect("60s is a valid quota period")
            .allow_burst(NonZeroU32::new(1).expect("1 is nonzero"));

        Self {
            repository,
            recording_state,
            cut_limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }
}
