//! Route composition for the HTTP control surface (spec §6.1).

pub mod stream;
pub mod streamer;

use axum::Router;

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/streamer", streamer::router())
        .nest("/stream", stream::router())
}
