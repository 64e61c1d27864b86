//! Process-wide registry of active jobs and watcher flags (spec §4.5.3, §9).
//!
//! Two independent maps, each behind its own mutex: the running job's pull
//! facade ([`JobHandle`]) keyed by channel, and a bool marking whether a
//! watcher is currently probing or recording that channel. `RecordingJob`
//! never holds a back-pointer into `State` — callers signal a job only
//! through the handle they fetch here.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::database::models::ChannelKey;
use crate::recorder::JobHandle;

#[derive(Default)]
pub struct State {
    jobs: Mutex<HashMap<ChannelKey, JobHandle>>,
    active: Mutex<HashMap<ChannelKey, bool>>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, key: &ChannelKey) -> bool {
        *self.active.lock().get(key).unwrap_or(&false)
    }

    pub fn set_active(&self, key: ChannelKey, value: bool) {
        self.active.lock().insert(key, value);
    }

    pub fn job(&self, key: &ChannelKey) -> Option<JobHandle> {
        self.jobs.lock().get(key).cloned()
    }

    pub fn set_job(&self, key: ChannelKey, handle: JobHandle) {
        self.jobs.lock().insert(key, handle);
    }

    pub fn clear_job(&self, key: &ChannelKey) {
        self.jobs.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_defaults_to_false() {
        let state = State::new();
        let key = ChannelKey::new("twitch", "alice");
        assert!(!state.is_active(&key));
        state.set_active(key.clone(), true);
        assert!(state.is_active(&key));
    }

    #[test]
    fn job_lookup_is_independent_of_active_flag() {
        let state = State::new();
        let key = ChannelKey::new("twitch", "alice");
        assert!(state.job(&key).is_none());
        state.set_active(key.clone(), true);
        assert!(state.job(&key).is_none());
    }
}
