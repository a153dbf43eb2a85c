use aws_sdk_s3::types::StorageClass;
use chrono::{DateTime, Utc};
use std::process::ExitCode;
use tracing::{error, info};

use crate::error::{SyncError, EXIT_TRANSFER_FAILURES};
use crate::local::LocalFile;
use crate::plan::PlannedUpload;
use crate::progress::ProgressTracker;
use crate::remote::{ObjectStore, RemoteObject};

/// Whole days between `last_modified` and `now`, fractions discarded
pub fn age_in_days(now: DateTime<Utc>, last_modified: DateTime<Utc>) -> i64 {
    (now - last_modified).num_seconds().div_euclid(86_400)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    TooYoung { age_days: i64 },
}

/// Result of a sync run
#[derive(Debug, Default)]
pub struct SyncReport {
    pub uploaded: Vec<String>,
    pub deleted: Vec<String>,
    pub skipped_too_young: Vec<String>,
    pub failures: Vec<SyncError>,
    pub bytes_uploaded: u64,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.has_failures() {
            ExitCode::from(EXIT_TRANSFER_FAILURES)
        } else {
            ExitCode::SUCCESS
        }
    }

    /// Log the end-of-run summary
    pub fn log_summary(&self) {
        if self.uploaded.is_empty() {
            info!("No files to upload.");
        } else {
            info!("Uploaded {} file(s):", self.uploaded.len());
            for key in &self.uploaded {
                info!("  {}", key);
            }
        }

        if self.deleted.is_empty() {
            info!("No files to delete.");
        } else {
            info!("Deleted {} file(s):", self.deleted.len());
            for key in &self.deleted {
                info!("  {}", key);
            }
        }

        if !self.skipped_too_young.is_empty() {
            info!(
                "Retained {} object(s) still inside the minimum age window",
                self.skipped_too_young.len()
            );
        }

        if self.has_failures() {
            error!("{} transfer(s) failed", self.failures.len());
        }
    }
}

/// Carries out planned uploads and deletions one at a time
///
/// Every item is isolated: a failure is logged and recorded, and the
/// remaining items still run.
pub struct TransferExecutor<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    bucket: &'a str,
    storage_class: &'a StorageClass,
    min_age_days: u32,
    progress: ProgressTracker,
    report: SyncReport,
}

impl<'a, S: ObjectStore + ?Sized> TransferExecutor<'a, S> {
    pub fn new(
        store: &'a S,
        bucket: &'a str,
        storage_class: &'a StorageClass,
        min_age_days: u32,
        progress: ProgressTracker,
    ) -> Self {
        Self {
            store,
            bucket,
            storage_class,
            min_age_days,
            progress,
            report: SyncReport::default(),
        }
    }

    async fn try_upload(&self, item: &PlannedUpload) -> Result<u64, SyncError> {
        let name = item
            .file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| item.key.clone());
        let bar = self.progress.file_bar(&name, item.file.size);
        let mut sent = 0u64;
        let mut on_progress = |bytes: u64| {
            sent += bytes;
            bar.inc(bytes);
        };

        let result = self
            .store
            .upload(
                self.bucket,
                &item.key,
                &item.file.path,
                self.storage_class,
                &mut on_progress,
            )
            .await;
        bar.finish_and_clear();

        result.map_err(|e| SyncError::Upload {
            key: item.key.clone(),
            message: format!("{e:#}"),
        })?;
        Ok(sent)
    }

    /// Upload one file, recording success or failure
    pub async fn upload(&mut self, item: &PlannedUpload) {
        match self.try_upload(item).await {
            Ok(bytes) => {
                self.progress.update(bytes);
                self.report.bytes_uploaded += bytes;
                self.report.uploaded.push(item.key.clone());
                info!(
                    "Successfully uploaded {} ({}) to s3://{}/{}",
                    item.file.path.display(),
                    item.reason.as_str(),
                    self.bucket,
                    item.key
                );
            }
            Err(e) => {
                error!("Error uploading {}: {}", item.file.path.display(), e);
                self.report.failures.push(e);
            }
        }
    }

    /// Record a local file that cannot be uploaded because it has no key
    pub fn unmappable(&mut self, file: &LocalFile) {
        let e = SyncError::UnmappableName {
            path: file.path.clone(),
        };
        error!("Skipping file: {}", e);
        self.report.failures.push(e);
    }

    async fn try_delete(
        &self,
        object: &RemoteObject,
        now: DateTime<Utc>,
    ) -> Result<DeleteOutcome, SyncError> {
        let age_days = age_in_days(now, object.last_modified);
        if age_days < i64::from(self.min_age_days) {
            return Ok(DeleteOutcome::TooYoung { age_days });
        }

        self.store
            .delete(&object.bucket, &object.key)
            .await
            .map_err(|e| SyncError::Delete {
                key: object.key.clone(),
                message: format!("{e:#}"),
            })?;
        Ok(DeleteOutcome::Deleted)
    }

    /// Delete one object if it has passed the minimum age, recording the outcome
    pub async fn delete(&mut self, object: &RemoteObject, now: DateTime<Utc>) {
        match self.try_delete(object, now).await {
            Ok(DeleteOutcome::Deleted) => {
                self.report.deleted.push(object.key.clone());
                info!("Deleted s3://{}/{}", object.bucket, object.key);
            }
            Ok(DeleteOutcome::TooYoung { age_days }) => {
                self.report.skipped_too_young.push(object.key.clone());
                info!(
                    "Skipped deletion of {}; it is {} day(s) old, less than {} days",
                    object.key, age_days, self.min_age_days
                );
            }
            Err(e) => {
                error!("Error deleting {}: {}", object.key, e);
                self.report.failures.push(e);
            }
        }
    }

    pub fn finish(self) -> SyncReport {
        self.progress.finish();
        self.report
    }
}
