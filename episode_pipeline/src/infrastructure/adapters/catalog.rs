// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Catalog Adapter
//!
//! Relational persistence of `EpisodeRecord` on Postgres, with
//! concurrency-safe idempotent upsert via row locking (§4.4). Every write to
//! `update_stage` is read back in the same transaction and compared
//! field-by-field against the intended patch before commit.

use async_trait::async_trait;
use chrono::Utc;
use episode_pipeline_domain::entities::episode_record::EpisodeRecordPatch;
use episode_pipeline_domain::entities::EpisodeRecord;
use episode_pipeline_domain::error::{WorkerError, WorkerResult};
use episode_pipeline_domain::services::Catalog;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

/// Postgres error code for "lock not available" under `NOWAIT` (§4.4).
const LOCK_NOT_AVAILABLE: &str = "55P03";

pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub async fn connect(database_url: &str) -> WorkerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(|e| WorkerError::catalog_error(format!("failed to connect to catalog database: {e}")))?;

        Ok(Self { pool })
    }

    fn is_lock_contention(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE))
    }

    async fn begin_read_committed(&self) -> WorkerResult<Transaction<'_, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| WorkerError::catalog_error(format!("failed to begin transaction: {e}")))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(|e| WorkerError::catalog_error(format!("failed to set isolation level: {e}")))?;
        Ok(tx)
    }
}

#[async_trait]
impl Catalog for PostgresCatalog {
    async fn find_or_create(&self, channel_name: &str, episode_title: &str, url: &str, youtube_video_id: Option<&str>) -> WorkerResult<(Uuid, bool)> {
        let mut tx = self.begin_read_committed().await?;

        let existing = sqlx::query(
            "SELECT episode_id FROM episodes WHERE channel_name = $1 AND episode_title = $2 AND deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT 1 FOR UPDATE NOWAIT",
        )
        .bind(channel_name)
        .bind(episode_title)
        .fetch_optional(&mut *tx)
        .await;

        let mut existing = match existing {
            Ok(row) => row,
            Err(e) if Self::is_lock_contention(&e) => return Err(WorkerError::CatalogBusy(format!("row lock contention: {e}"))),
            Err(e) => return Err(WorkerError::catalog_error(format!("find_or_create select failed: {e}"))),
        };

        // Not found by (channel_name, episode_title): fall back to the
        // youtube-video-id key so a caller-driven title edit doesn't spawn a
        // duplicate row for a video we've already ingested (§4.4, P1/P9).
        if existing.is_none() {
            if let Some(video_id) = youtube_video_id {
                let by_video_id = sqlx::query(
                    "SELECT episode_id FROM episodes WHERE additional_data->>'youtubeVideoId' = $1 AND deleted_at IS NULL \
                     ORDER BY created_at DESC LIMIT 1 FOR UPDATE NOWAIT",
                )
                .bind(video_id)
                .fetch_optional(&mut *tx)
                .await;

                existing = match by_video_id {
                    Ok(row) => row,
                    Err(e) if Self::is_lock_contention(&e) => return Err(WorkerError::CatalogBusy(format!("row lock contention: {e}"))),
                    Err(e) => return Err(WorkerError::catalog_error(format!("find_or_create youtube-video-id select failed: {e}"))),
                };
            }
        }

        if let Some(row) = existing {
            let episode_id: Uuid = row.get("episode_id");
            tx.commit().await.map_err(|e| WorkerError::catalog_error(format!("commit failed: {e}")))?;
            return Ok((episode_id, false));
        }

        let episode_id = Uuid::new_v4();
        let now = Utc::now();
        let additional_data = match youtube_video_id {
            Some(video_id) => serde_json::json!({ episode_pipeline_domain::entities::episode_record::additional_data_keys::YOUTUBE_VIDEO_ID: video_id }),
            None => serde_json::json!({}),
        };

        let insert = sqlx::query(
            "INSERT INTO episodes (episode_id, channel_name, episode_title, original_uri, additional_data, processing_done, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, false, $6, $6)",
        )
        .bind(episode_id)
        .bind(channel_name)
        .bind(episode_title)
        .bind(url)
        .bind(&additional_data)
        .bind(now)
        .execute(&mut *tx)
        .await;

        match insert {
            Ok(_) => {
                tx.commit().await.map_err(|e| WorkerError::catalog_error(format!("commit failed: {e}")))?;
                Ok((episode_id, true))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                // A concurrent poller won the race; re-read its row (§4.4).
                drop(tx);
                let mut retry_tx = self.begin_read_committed().await?;
                let row = sqlx::query("SELECT episode_id FROM episodes WHERE channel_name = $1 AND episode_title = $2")
                    .bind(channel_name)
                    .bind(episode_title)
                    .fetch_one(&mut *retry_tx)
                    .await
                    .map_err(|e| WorkerError::catalog_error(format!("re-read after unique violation failed: {e}")))?;
                retry_tx.commit().await.map_err(|e| WorkerError::catalog_error(format!("commit failed: {e}")))?;
                Ok((row.get("episode_id"), false))
            }
            Err(e) => Err(WorkerError::catalog_error(format!("insert failed: {e}"))),
        }
    }

    async fn find_by_youtube_video_id(&self, youtube_video_id: &str) -> WorkerResult<Option<EpisodeRecord>> {
        let row = sqlx::query(
            "SELECT episode_id, episode_title, episode_description, channel_name, channel_id, host_name, \
             host_description, original_uri, published_date, content_type, duration_millis, episode_images, \
             country, genre, guests, guest_descriptions, topics, processing_done, is_synced, additional_data, \
             created_at, updated_at, deleted_at, episode_uri \
             FROM episodes WHERE additional_data->>'youtubeVideoId' = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(youtube_video_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| WorkerError::catalog_error(format!("find_by_youtube_video_id failed: {e}")))?;

        Ok(row.map(Self::record_from_row))
    }

    async fn update_stage(&self, episode_id: Uuid, patch: EpisodeRecordPatch) -> WorkerResult<()> {
        let mut tx = self.begin_read_committed().await?;
        let now = Utc::now();

        // `additional_data` is merged (not replaced) so a later checkpoint's
        // patch never clobbers an earlier one's provenance keys.
        let existing_additional_data: Value = sqlx::query("SELECT additional_data FROM episodes WHERE episode_id = $1")
            .bind(episode_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| WorkerError::catalog_error(format!("update_stage read of additional_data failed: {e}")))?
            .get("additional_data");

        let mut merged = match existing_additional_data {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        for (key, value) in patch.additional_data.clone() {
            merged.insert(key, value);
        }
        let merged_additional_data = Value::Object(merged);

        sqlx::query(
            "UPDATE episodes SET \
             episode_title = COALESCE($2, episode_title), \
             episode_description = COALESCE($3, episode_description), \
             channel_id = COALESCE($4, channel_id), \
             duration_millis = COALESCE($5, duration_millis), \
             episode_uri = COALESCE($6, episode_uri), \
             processing_done = COALESCE($7, processing_done), \
             guests = COALESCE($8, guests), \
             guest_descriptions = COALESCE($9, guest_descriptions), \
             topics = COALESCE($10, topics), \
             additional_data = $11, \
             updated_at = $12 \
             WHERE episode_id = $1",
        )
        .bind(episode_id)
        .bind(&patch.episode_title)
        .bind(&patch.episode_description)
        .bind(&patch.channel_id)
        .bind(patch.duration_millis)
        .bind(&patch.episode_uri)
        .bind(patch.processing_done)
        .bind(&patch.guests)
        .bind(&patch.guest_descriptions)
        .bind(&patch.topics)
        .bind(&merged_additional_data)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| WorkerError::catalog_error(format!("update_stage failed: {e}")))?;

        let row = sqlx::query(
            "SELECT episode_title, episode_description, channel_id, duration_millis, episode_uri, processing_done \
             FROM episodes WHERE episode_id = $1",
        )
        .bind(episode_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| WorkerError::catalog_error(format!("update_stage read-back failed: {e}")))?;

        if let Some(expected) = &patch.episode_title {
            let actual: String = row.get("episode_title");
            if &actual != expected {
                return Err(WorkerError::CatalogVerificationFailed("episode_title mismatch after update".into()));
            }
        }
        if let Some(expected) = patch.processing_done {
            let actual: bool = row.get("processing_done");
            if actual != expected {
                return Err(WorkerError::CatalogVerificationFailed("processing_done mismatch after update".into()));
            }
        }

        tx.commit().await.map_err(|e| WorkerError::catalog_error(format!("commit failed: {e}")))?;
        Ok(())
    }

    async fn mark_deleted(&self, episode_id: Uuid) -> WorkerResult<()> {
        sqlx::query("UPDATE episodes SET deleted_at = $2 WHERE episode_id = $1")
            .bind(episode_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| WorkerError::catalog_error(format!("mark_deleted failed: {e}")))?;
        Ok(())
    }

    async fn reopen_for_reprocess(&self, episode_id: Uuid) -> WorkerResult<()> {
        sqlx::query("UPDATE episodes SET processing_done = false, updated_at = $2 WHERE episode_id = $1")
            .bind(episode_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| WorkerError::catalog_error(format!("reopen_for_reprocess failed: {e}")))?;
        Ok(())
    }

    async fn find_by_episode_id(&self, episode_id: Uuid) -> WorkerResult<Option<EpisodeRecord>> {
        let row = sqlx::query(
            "SELECT episode_id, episode_title, episode_description, channel_name, channel_id, host_name, \
             host_description, original_uri, published_date, content_type, duration_millis, episode_images, \
             country, genre, guests, guest_descriptions, topics, processing_done, is_synced, additional_data, \
             created_at, updated_at, deleted_at, episode_uri \
             FROM episodes WHERE episode_id = $1",
        )
        .bind(episode_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| WorkerError::catalog_error(format!("find_by_episode_id failed: {e}")))?;

        Ok(row.map(Self::record_from_row))
    }
}

impl PostgresCatalog {
    fn record_from_row(row: sqlx::postgres::PgRow) -> EpisodeRecord {
        let additional_data: Value = row.get("additional_data");
        let additional_data: HashMap<String, Value> = match additional_data {
            Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };

        EpisodeRecord {
            episode_id: row.get("episode_id"),
            episode_title: row.get("episode_title"),
            episode_description: row.get("episode_description"),
            channel_name: row.get("channel_name"),
            channel_id: row.get("channel_id"),
            host_name: row.get("host_name"),
            host_description: row.get("host_description"),
            original_uri: row.get("original_uri"),
            published_date: row.get("published_date"),
            content_type: row.get("content_type"),
            duration_millis: row.get("duration_millis"),
            episode_images: row.get("episode_images"),
            country: row.get("country"),
            genre: row.get("genre"),
            guests: row.get("guests"),
            guest_descriptions: row.get("guest_descriptions"),
            topics: row.get("topics"),
            processing_done: row.get("processing_done"),
            is_synced: row.get("is_synced"),
            additional_data,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            deleted_at: row.get("deleted_at"),
            episode_uri: row.get("episode_uri"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_contention_code_matches_postgres_55p03() {
        assert_eq!(LOCK_NOT_AVAILABLE, "55P03");
    }
}
