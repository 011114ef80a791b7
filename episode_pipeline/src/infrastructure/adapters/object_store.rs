// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object-Storage Adapter
//!
//! Moves bytes between local disk and an S3-shaped object store (§4.5).
//! Large uploads are split into fixed-size parts and completed as a multipart
//! upload; ranged GETs back the validator's sample checks without pulling
//! whole files.

use std::ops::Range;
use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use episode_pipeline_domain::error::{WorkerError, WorkerResult};
use episode_pipeline_domain::services::object_store::ObjectMeta;
use episode_pipeline_domain::services::ObjectStore;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

const DEFAULT_PART_SIZE: u64 = 32 * 1024 * 1024;

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_url_base: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>, public_url_base: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_url_base: public_url_base.into(),
        }
    }

    fn is_auth_error(err: &aws_sdk_s3::Error) -> bool {
        let msg = err.to_string();
        msg.contains("SignatureDoesNotMatch") || msg.contains("AccessDenied") || msg.contains("403")
    }

    async fn read_part(file: &mut tokio::fs::File, offset: u64, len: u64) -> WorkerResult<Vec<u8>> {
        file.seek(std::io::SeekFrom::Start(offset))
            .await
            .map_err(|e| WorkerError::storage_error(format!("seek failed: {e}")))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)
            .await
            .map_err(|e| WorkerError::storage_error(format!("read failed: {e}")))?;
        Ok(buf)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object_multipart(&self, path: &Path, key: &str, part_size: u64) -> WorkerResult<()> {
        let part_size = if part_size == 0 { DEFAULT_PART_SIZE } else { part_size };
        let file_size = tokio::fs::metadata(path)
            .await
            .map_err(|e| WorkerError::storage_error(format!("failed to stat {path:?}: {e}")))?
            .len();

        if file_size <= part_size {
            let body = ByteStream::from_path(path)
                .await
                .map_err(|e| WorkerError::storage_error(format!("failed to open {path:?}: {e}")))?;
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|e| {
                    let err = aws_sdk_s3::Error::from(e);
                    if Self::is_auth_error(&err) {
                        WorkerError::StorageAuthError(err.to_string())
                    } else {
                        WorkerError::storage_error(err.to_string())
                    }
                })?;
            debug!(key, "uploaded object in a single PUT");
            return Ok(());
        }

        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| WorkerError::storage_error(format!("failed to create multipart upload: {e}")))?;
        let upload_id = create.upload_id().ok_or_else(|| WorkerError::storage_error("no upload id returned"))?.to_string();

        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| WorkerError::storage_error(format!("failed to open {path:?}: {e}")))?;

        let part_count = file_size.div_ceil(part_size);
        let mut completed_parts = Vec::with_capacity(part_count as usize);

        for part_number in 1..=part_count {
            let offset = (part_number - 1) * part_size;
            let this_part_len = part_size.min(file_size - offset);
            let bytes = Self::read_part(&mut file, offset, this_part_len).await?;

            let result = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .part_number(part_number as i32)
                .body(ByteStream::from(bytes))
                .send()
                .await;

            match result {
                Ok(output) => {
                    completed_parts.push(
                        CompletedPart::builder()
                            .part_number(part_number as i32)
                            .set_e_tag(output.e_tag().map(str::to_string))
                            .build(),
                    );
                }
                Err(e) => {
                    let err = aws_sdk_s3::Error::from(e);
                    let abort_result = self
                        .client
                        .abort_multipart_upload()
                        .bucket(&self.bucket)
                        .key(key)
                        .upload_id(&upload_id)
                        .send()
                        .await;
                    if let Err(abort_err) = abort_result {
                        warn!(key, error = %abort_err, "failed to abort multipart upload after part failure");
                    }
                    if Self::is_auth_error(&err) {
                        return Err(WorkerError::StorageAuthError(err.to_string()));
                    }
                    return Err(WorkerError::storage_error(format!("part {part_number} failed: {err}")));
                }
            }
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(completed_parts)).build())
            .send()
            .await
            .map_err(|e| WorkerError::storage_error(format!("failed to complete multipart upload: {e}")))?;

        debug!(key, parts = part_count, "completed multipart upload");
        Ok(())
    }

    async fn get_object_ranged(&self, key: &str, range: Range<u64>) -> WorkerResult<Vec<u8>> {
        let range_header = format!("bytes={}-{}", range.start, range.end.saturating_sub(1));
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(range_header)
            .send()
            .await
            .map_err(|e| WorkerError::storage_error(format!("ranged get failed for {key}: {e}")))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| WorkerError::storage_error(format!("failed to read ranged body: {e}")))?;

        Ok(bytes.to_vec())
    }

    async fn head_object(&self, key: &str) -> WorkerResult<Option<ObjectMeta>> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(output) => Ok(Some(ObjectMeta {
                size_bytes: output.content_length().unwrap_or(0) as u64,
                etag: output.e_tag().map(str::to_string),
                content_type: output.content_type().map(str::to_string),
            })),
            Err(e) => {
                let err = aws_sdk_s3::Error::from(e);
                if err.to_string().contains("NotFound") || err.to_string().contains("404") {
                    Ok(None)
                } else {
                    Err(WorkerError::storage_error(format!("head_object failed for {key}: {err}")))
                }
            }
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url_base.trim_end_matches('/'), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_joins_base_and_key_without_double_slash() {
        let store = S3ObjectStore::new(
            aws_sdk_s3::Client::new(&aws_config::SdkConfig::builder().build()),
            "bucket",
            "https://cdn.example.com/",
        );
        assert_eq!(store.public_url("a/b/c.mp4"), "https://cdn.example.com/a/b/c.mp4");
    }
}
