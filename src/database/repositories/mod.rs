//! Repository layer for database access.
//!
//! Abstracts the `streamers` table (spec §6.4) behind a trait so the HTTP
//! handlers and the scheduler never touch SQL directly.

pub mod errors;
pub mod streamer;

pub use errors::{RepositoryError, RepositoryResult};
pub use streamer::{SqliteStreamerRepository, StreamerRepository};
