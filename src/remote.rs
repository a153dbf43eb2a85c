use async_trait::async_trait;
use aws_sdk_s3::types::StorageClass;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, SyncError};

/// An object seen in the bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub bucket: String,
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// One page of a prefix listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<RemoteObject>,
    /// Token to pass back for the next page, if the listing was truncated
    pub next_token: Option<String>,
    pub is_truncated: bool,
}

/// Byte-progress callback for uploads
pub type ProgressFn<'a> = &'a mut (dyn FnMut(u64) + Send);

/// The storage operations a sync run needs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a single listing page, continuing from `token` when given
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<String>,
    ) -> anyhow::Result<ListPage>;

    /// Upload a local file, reporting bytes sent as they go
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        storage_class: &StorageClass,
        progress: ProgressFn<'_>,
    ) -> anyhow::Result<()>;

    async fn delete(&self, bucket: &str, key: &str) -> anyhow::Result<()>;
}

/// List every object under a prefix, following continuation tokens
pub async fn list_remote_objects<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<RemoteObject>> {
    let mut result = Vec::new();
    let mut continuation_token = None;
    let mut pages = 0usize;

    loop {
        let page = store
            .list_page(bucket, prefix, continuation_token.take())
            .await
            .map_err(|e| SyncError::RemoteListing {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
                message: format!("{e:#}"),
            })?;
        pages += 1;
        result.extend(page.objects);

        if !page.is_truncated {
            break;
        }
        match page.next_token {
            Some(token) => continuation_token = Some(token),
            // A truncated page without a token would silently lose objects
            None => {
                return Err(SyncError::RemoteListing {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                    message: "truncated listing returned no continuation token".to_string(),
                })
            }
        }
    }

    debug!(
        "Listed {} objects from s3://{}/{} in {} page(s)",
        result.len(),
        bucket,
        prefix,
        pages
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use chrono::Duration;

    fn seeded(page_size: usize, count: usize) -> MemoryStore {
        let store = MemoryStore::new("archive").with_page_size(page_size);
        for i in 0..count {
            store.insert(&format!("nas/file-{i:02}.txt"), Utc::now() - Duration::days(1));
        }
        store
    }

    fn keys(objects: &[RemoteObject]) -> Vec<String> {
        objects.iter().map(|o| o.key.clone()).collect()
    }

    #[tokio::test]
    async fn test_paginated_listing_matches_single_page() {
        let paged = seeded(2, 6);
        let single = seeded(100, 6);

        let from_pages = list_remote_objects(&paged, "archive", "nas").await.unwrap();
        let from_single = list_remote_objects(&single, "archive", "nas").await.unwrap();

        assert_eq!(from_pages.len(), 6);
        assert_eq!(keys(&from_pages), keys(&from_single));
        assert_eq!(paged.list_calls(), 3);
        assert_eq!(single.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_partial_last_page() {
        let store = seeded(4, 10);
        let objects = list_remote_objects(&store, "archive", "nas").await.unwrap();
        assert_eq!(objects.len(), 10);
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_prefix_filters_listing() {
        let store = seeded(2, 3);
        store.insert("other/x.txt", Utc::now());
        let objects = list_remote_objects(&store, "archive", "nas").await.unwrap();
        assert_eq!(objects.len(), 3);
        assert!(objects.iter().all(|o| o.key.starts_with("nas/")));
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let store = seeded(2, 6);
        store.fail_listing_on_page(2);
        let err = list_remote_objects(&store, "archive", "nas").await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteListing { .. }));
    }
}
