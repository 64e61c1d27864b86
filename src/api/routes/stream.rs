//! Forcing a running recording to split (spec §6.1, §8 property 8, `/stream/cut`).

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::database::models::ChannelKey;

pub fn router() -> Router<AppState> {
    Router::new().route("/cut", get(cut))
}

#[derive(Debug, Deserialize)]
struct CutQuery {
    platform: String,
    username: String,
}

/// Pairs comma-joined `platform`/`username` lists by index; a singleton on
/// either side fans out across the other.
fn pair_channels(platform: &str, username: &str) -> ApiResult<Vec<(String, String)>> {
    let platforms: Vec<&str> = platform.split(',').map(str::trim).collect();
    let usernames: Vec<&str> = username.split(',').map(str::trim).collect();

    let pairs = match (platforms.len(), usernames.len()) {
        (p, u) if p == u => platforms.into_iter().zip(usernames).map(|(p, u)| (p.to_string(), u.to_string())).collect(),
        (1, _) => usernames.iter().map(|u| (platforms[0].to_string(), u.to_string())).collect(),
        (_, 1) => platforms.iter().map(|p| (p.to_string(), usernames[0].to_string())).collect(),
        _ => return Err(ApiError::bad_request("platform and username lists must match in length, or one must be a singleton")),
    };

    Ok(pairs)
}

async fn cut(State(state): State<AppState>, Query(q): Query<CutQuery>) -> ApiResult<Json<serde_json::Value>> {
    let pairs = pair_channels(&q.platform, &q.username)?;

    let mut success = Vec::new();
    let mut failed = Vec::new();

    for (platform, username) in pairs {
        let label = format!("{platform}:{username}");
        let key = ChannelKey::new(&platform, &username);

        let Some(handle) = state.recording_state.job(&key) else {
            failed.push(format!("{label} (not live)"));
            continue;
        };

        if state.cut_limiter.check_key(&key).is_err() {
            failed.push(format!("{label} (rate limit exceeded)"));
            continue;
        }

        handle.request_cut();
        success.push(label);
    }

    Ok(Json(serde_json::json!({
        "success": success.join(", "),
        "failed": failed.join(", "),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_length_lists_pair_by_index() {
        let pairs = pair_channels("twitch,twitch", "alice,bob").unwrap();
        assert_eq!(pairs, vec![("twitch".to_string(), "alice".to_string()), ("twitch".to_string(), "bob".to_string())]);
    }

    #[test]
    fn singleton_platform_fans_out() {
        let pairs = pair_channels("twitch", "alice,bob").unwrap();
        assert_eq!(pairs, vec![("twitch".to_string(), "alice".to_string()), ("twitch".to_string(), "bob".to_string())]);
    }

    #[test]
    fn mismatched_non_singleton_lists_are_rejected() {
        assert!(pair_channels("twitch,kick", "alice,bob,carol").is_err());
    }
}
