use chrono::{DateTime, Utc};
use tracing::info;

use crate::cli::SyncConfig;
use crate::error::Result;
use crate::keys::KeyMapper;
use crate::local::list_local_files;
use crate::plan::build_plan;
use crate::progress::ProgressTracker;
use crate::remote::{list_remote_objects, ObjectStore};
use crate::transfer::{SyncReport, TransferExecutor};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Runs one local-to-remote sync pass against an object store
pub struct Syncer<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    config: &'a SyncConfig,
    clock: Clock,
}

impl<'a, S: ObjectStore + ?Sized> Syncer<'a, S> {
    pub fn new(store: &'a S, config: &'a SyncConfig) -> Self {
        Self {
            store,
            config,
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the clock used for object ages
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// List both sides once, then upload, then delete
    ///
    /// Listing failures abort the run. Per-item failures are collected in
    /// the report and the run carries on.
    pub async fn run(&self) -> Result<SyncReport> {
        let remote = &self.config.remote;
        let mapper = KeyMapper::new(&self.config.local_path, &remote.prefix);

        let local_files = list_local_files(&self.config.local_path)?;
        info!("Found {} local files to process", local_files.len());

        let remote_objects = list_remote_objects(self.store, &remote.bucket, &remote.prefix).await?;
        info!("Found {} existing S3 objects", remote_objects.len());

        let plan = build_plan(&local_files, &remote_objects, &mapper);
        info!(
            "{} file(s) to upload ({} bytes), {} deletion candidate(s), {} unmappable name(s)",
            plan.uploads.len(),
            plan.upload_bytes(),
            plan.deletions.len(),
            plan.unmappable.len()
        );

        if plan.is_empty() {
            info!("Remote copy is already in sync");
        }

        let progress = ProgressTracker::new(plan.uploads.len(), self.config.show_progress);
        let mut executor = TransferExecutor::new(
            self.store,
            &remote.bucket,
            &self.config.storage_class,
            self.config.min_age_days,
            progress,
        );

        for file in &plan.unmappable {
            executor.unmappable(file);
        }
        for item in &plan.uploads {
            executor.upload(item).await;
        }
        for object in &plan.deletions {
            executor.delete(object, (self.clock)()).await;
        }

        let report = executor.finish();
        report.log_summary();
        Ok(report)
    }
}
