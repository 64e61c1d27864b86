//! The `streamers` table repository (spec §6.4).

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::errors::{RepositoryError, RepositoryResult};
use crate::database::models::{NewStreamer, StreamerRecord, StreamerUpdate};

#[async_trait]
pub trait StreamerRepository: Send + Sync {
    async fn list(&self) -> RepositoryResult<Vec<StreamerRecord>>;
    async fn find(&self, platform: &str, username: &str) -> RepositoryResult<Option<StreamerRecord>>;
    async fn create(&self, streamer: NewStreamer) -> RepositoryResult<StreamerRecord>;
    async fn update(
        &self,
        platform: &str,
        username: &str,
        update: StreamerUpdate,
    ) -> RepositoryResult<StreamerRecord>;
    async fn delete(&self, platform: &str, username: &str) -> RepositoryResult<()>;
}

pub struct SqliteStreamerRepository {
    db: SqlitePool,
}

impl SqliteStreamerRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StreamerRepository for SqliteStreamerRepository {
    async fn list(&self) -> RepositoryResult<Vec<StreamerRecord>> {
        let rows = sqlx::query_as::<_, StreamerRecord>(
            "SELECT id, platform, username, quality, split_segments, time_segment FROM streamers ORDER BY id",
        )
        .fetch_all(&self.db)
        .await
        .map_err(RepositoryError::from)?;
        Ok(rows)
    }

    async fn find(&self, platform: &str, username: &str) -> RepositoryResult<Option<StreamerRecord>> {
        let row = sqlx::query_as::<_, StreamerRecord>(
            "SELECT id, platform, username, quality, split_segments, time_segment FROM streamers \
             WHERE platform = ? AND username = ?",
        )
        .bind(platform)
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .map_err(RepositoryError::from)?;
        Ok(row)
    }

    async fn create(&self, streamer: NewStreamer) -> RepositoryResult<StreamerRecord> {
        if self.find(&streamer.platform, &streamer.username).await?.is_some() {
            return Err(RepositoryError::DuplicateKey);
        }

        let id = sqlx::query(
            "INSERT INTO streamers (platform, username, quality, split_segments, time_segment) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&streamer.platform)
        .bind(&streamer.username)
        .bind(&streamer.quality)
        .bind(streamer.split_segments)
        .bind(streamer.time_segment)
        .execute(&self.db)
        .await
        .map_err(RepositoryError::from)?
        .last_insert_rowid();

        Ok(StreamerRecord {
            id,
            platform: streamer.platform,
            username: streamer.username,
            quality: streamer.quality,
            split_segments: streamer.split_segments,
            time_segment: streamer.time_segment,
        })
    }

    async fn update(
        &self,
        platform: &str,
        username: &str,
        update: StreamerUpdate,
    ) -> RepositoryResult<StreamerRecord> {
        let mut current = self
            .find(platform, username)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if let Some(quality) = update.quality {
            current.quality = quality;
        }
        if let Some(split_segments) = update.split_segments {
            current.split_segments = split_segments;
        }
        if let Some(time_segment) = update.time_segment {
            current.time_segment = time_segment;
        }

        sqlx::query(
            "UPDATE streamers SET quality = ?, split_segments = ?, time_segment = ? \
             WHERE platform = ? AND username = ?",
        )
        .bind(&current.quality)
        .bind(current.split_segments)
        .bind(current.time_segment)
        .bind(platform)
        .bind(username)
        .execute(&self.db)
        .await
        .map_err(RepositoryError::from)?;

        Ok(current)
    }

    async fn delete(&self, platform: &str, username: &str) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM streamers WHERE platform = ? AND username = ?")
            .bind(platform)
            .bind(username)
            .execute(&self.db)
            .await
            .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
