//! In-memory object store for exercising sync runs without a bucket.

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use aws_sdk_s3::types::StorageClass;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::remote::{ListPage, ObjectStore, ProgressFn, RemoteObject};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub last_modified: DateTime<Utc>,
    pub size: u64,
    pub storage_class: Option<StorageClass>,
}

pub struct MemoryStore {
    bucket: String,
    page_size: usize,
    progress_chunk: Option<u64>,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    clock: Mutex<Option<DateTime<Utc>>>,
    failing_keys: Mutex<HashSet<String>>,
    failing_page: Mutex<Option<usize>>,
    list_calls: AtomicUsize,
    uploads: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            page_size: 1000,
            progress_chunk: None,
            objects: Mutex::new(BTreeMap::new()),
            clock: Mutex::new(None),
            failing_keys: Mutex::new(HashSet::new()),
            failing_page: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Report upload progress in increments of at most `chunk` bytes
    pub fn with_progress_chunk(mut self, chunk: u64) -> Self {
        self.progress_chunk = Some(chunk.max(1));
        self
    }

    pub fn insert(&self, key: &str, last_modified: DateTime<Utc>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                last_modified,
                size: 0,
                storage_class: None,
            },
        );
    }

    /// Pin the timestamp stamped on uploaded objects
    pub fn set_clock(&self, now: DateTime<Utc>) {
        *self.clock.lock().unwrap() = Some(now);
    }

    /// Make uploads and deletes of `key` fail
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    /// Make the n-th (1-based) listing call fail
    pub fn fail_listing_on_page(&self, page: usize) {
        *self.failing_page.lock().unwrap() = Some(page);
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.lock().unwrap().unwrap_or_else(Utc::now)
    }

    fn check_key(&self, key: &str) -> anyhow::Result<()> {
        if self.failing_keys.lock().unwrap().contains(key) {
            bail!("injected failure for {key}");
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<String>,
    ) -> anyhow::Result<ListPage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.failing_page.lock().unwrap() == Some(call) {
            bail!("injected listing failure on page {call}");
        }
        if bucket != self.bucket {
            return Err(anyhow!("NoSuchBucket: {bucket}"));
        }

        let objects = self.objects.lock().unwrap();
        let mut matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| token.as_ref().map_or(true, |t| key.as_str() > t.as_str()));

        let page: Vec<RemoteObject> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(key, obj)| RemoteObject {
                bucket: bucket.to_string(),
                key: key.clone(),
                last_modified: obj.last_modified,
            })
            .collect();
        let is_truncated = matching.next().is_some();

        Ok(ListPage {
            next_token: if is_truncated {
                page.last().map(|o| o.key.clone())
            } else {
                None
            },
            objects: page,
            is_truncated,
        })
    }

    async fn upload(
        &self,
        _bucket: &str,
        key: &str,
        local_path: &Path,
        storage_class: &StorageClass,
        progress: ProgressFn<'_>,
    ) -> anyhow::Result<()> {
        self.check_key(key)?;
        let size = tokio::fs::metadata(local_path).await?.len();
        match self.progress_chunk {
            Some(chunk) => {
                let mut remaining = size;
                while remaining > 0 {
                    let step = remaining.min(chunk);
                    progress(step);
                    remaining -= step;
                }
            }
            None => progress(size),
        }

        let stored = StoredObject {
            last_modified: self.now(),
            size,
            storage_class: Some(storage_class.clone()),
        };
        self.objects.lock().unwrap().insert(key.to_string(), stored);
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete(&self, _bucket: &str, key: &str) -> anyhow::Result<()> {
        self.check_key(key)?;
        self.objects.lock().unwrap().remove(key);
        self.deletes.lock().unwrap().push(key.to_string());
        Ok(())
    }
}
