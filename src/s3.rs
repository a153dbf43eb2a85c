use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, StorageClass};
use aws_sdk_s3::Client;
use aws_smithy_types::byte_stream::ByteStream;
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::cli::ClientConfig;
use crate::remote::{ListPage, ObjectStore, ProgressFn, RemoteObject};

/// Files at or above this size go through multipart upload (8 MiB)
pub const MULTIPART_THRESHOLD: u64 = 8 * 1024 * 1024;

// Smallest part size used for multipart uploads; S3's minimum is 5 MiB
const PART_SIZE: u64 = 8 * 1024 * 1024;

// S3 rejects multipart uploads with more parts than this
const MAX_PARTS: u64 = 10_000;

/// Part size for a file, grown past the default so the part count stays
/// within the S3 limit
fn part_size_for(file_size: u64) -> u64 {
    PART_SIZE.max(file_size.div_ceil(MAX_PARTS))
}

/// Object store backed by the AWS S3 API
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a store from the region, profile and endpoint settings
    pub async fn connect(config: &ClientConfig) -> Self {
        Self::new(create_s3_client(config).await)
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        file_size: u64,
        storage_class: &StorageClass,
    ) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .context("Failed to create byte stream from file")?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_length(file_size as i64)
            .content_type(determine_content_type(local_path))
            .storage_class(storage_class.clone())
            .send()
            .await
            .map_err(|e| anyhow!("PutObject failed: {}", DisplayErrorContext(&e)))?;

        Ok(())
    }

    async fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        file_size: u64,
        storage_class: &StorageClass,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let part_size = part_size_for(file_size);
        debug!(
            "Starting multipart upload for {} ({} bytes, {} parts of {} bytes)",
            local_path.display(),
            file_size,
            file_size.div_ceil(part_size),
            part_size
        );

        let multipart = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(determine_content_type(local_path))
            .storage_class(storage_class.clone())
            .send()
            .await
            .map_err(|e| anyhow!("CreateMultipartUpload failed: {}", DisplayErrorContext(&e)))?;

        let upload_id = multipart
            .upload_id()
            .context("No upload ID returned from S3")?
            .to_string();

        match self
            .upload_parts(bucket, key, &upload_id, local_path, part_size, progress)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                // Leave no orphaned parts behind, they are billed like stored data
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        "Failed to abort multipart upload {} for {}: {}",
                        upload_id,
                        key,
                        DisplayErrorContext(&abort_err)
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        local_path: &Path,
        part_size: u64,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let mut file = File::open(local_path)
            .await
            .context("Failed to open local file")?;
        let mut parts = Vec::new();
        let mut part_number = 1i32;

        loop {
            let mut buffer = Vec::new();
            (&mut file)
                .take(part_size)
                .read_to_end(&mut buffer)
                .await
                .context("Failed to read local file")?;

            if buffer.is_empty() {
                break;
            }
            let bytes_read = buffer.len() as u64;

            let part = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buffer))
                .send()
                .await
                .map_err(|e| {
                    anyhow!(
                        "UploadPart {} failed: {}",
                        part_number,
                        DisplayErrorContext(&e)
                    )
                })?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(part.e_tag().unwrap_or_default())
                    .build(),
            );
            progress(bytes_read);
            part_number += 1;
        }

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| anyhow!("CompleteMultipartUpload failed: {}", DisplayErrorContext(&e)))?;

        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<String>,
    ) -> Result<ListPage> {
        let mut req = self.client.list_objects_v2().bucket(bucket);

        if !prefix.is_empty() {
            req = req.prefix(prefix);
        }

        if let Some(token) = token {
            req = req.continuation_token(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| anyhow!("ListObjectsV2 failed: {}", DisplayErrorContext(&e)))?;

        let objects = resp
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                let last_modified = match object.last_modified().and_then(to_chrono) {
                    Some(ts) => ts,
                    None => {
                        // Treat as brand new: never old enough to delete
                        warn!("Object {} has no usable last-modified time", key);
                        Utc::now()
                    }
                };
                Some(RemoteObject {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    last_modified,
                })
            })
            .collect();

        Ok(ListPage {
            objects,
            next_token: resp.next_continuation_token().map(str::to_string),
            is_truncated: resp.is_truncated().unwrap_or(false),
        })
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        storage_class: &StorageClass,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let file_size = tokio::fs::metadata(local_path)
            .await
            .context("Failed to get file metadata")?
            .len();

        if file_size >= MULTIPART_THRESHOLD {
            self.put_multipart(bucket, key, local_path, file_size, storage_class, progress)
                .await
        } else {
            self.put_single(bucket, key, local_path, file_size, storage_class)
                .await?;
            progress(file_size);
            Ok(())
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("DeleteObject failed: {}", DisplayErrorContext(&e)))?;
        Ok(())
    }
}

/// Create an S3 client from the region, profile and endpoint settings
async fn create_s3_client(config: &ClientConfig) -> Client {
    let region_provider = RegionProviderChain::first_try(config.region.clone().map(Region::new))
        .or_default_provider()
        .or_else(Region::new("us-east-1"));

    let mut loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region_provider);

    if let Some(profile) = &config.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    let sdk_config = loader.load().await;

    // S3-compatible endpoints generally expect path-style addressing
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.endpoint_url.is_some())
        .build();

    Client::from_conf(s3_config)
}

fn to_chrono(ts: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
}

/// Determine the content type based on file extension
fn determine_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("txt") => "text/plain",
        Some("html") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("tar") => "application/x-tar",
        _ => "application/octet-stream",
    }
}
