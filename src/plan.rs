use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::keys::KeyMapper;
use crate::local::LocalFile;
use crate::remote::RemoteObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadReason {
    /// No object with this key exists yet
    New,
    /// The local file was modified after the object was written
    Newer,
}

impl UploadReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Newer => "modified",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedUpload {
    pub file: LocalFile,
    pub key: String,
    pub reason: UploadReason,
}

/// What a run intends to do, computed from one snapshot of both sides
///
/// Uploads need the file to be present locally and deletions need it to be
/// absent, so a key never lands in both lists.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub uploads: Vec<PlannedUpload>,
    /// Deletion candidates; the age gate is applied when executing
    pub deletions: Vec<RemoteObject>,
    /// Local files whose names cannot be expressed as a key
    pub unmappable: Vec<LocalFile>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.deletions.is_empty() && self.unmappable.is_empty()
    }

    pub fn upload_bytes(&self) -> u64 {
        self.uploads.iter().map(|u| u.file.size).sum()
    }
}

/// Decide which local files to upload and which remote objects may go
pub fn build_plan(local: &[LocalFile], remote: &[RemoteObject], mapper: &KeyMapper) -> SyncPlan {
    let remote_modified: HashMap<&str, DateTime<Utc>> = remote
        .iter()
        .map(|o| (o.key.as_str(), o.last_modified))
        .collect();

    let mut uploads = Vec::new();
    let mut unmappable = Vec::new();
    for file in local {
        let Some(key) = mapper.key_for_relative(&file.relative) else {
            unmappable.push(file.clone());
            continue;
        };
        let reason = match remote_modified.get(key.as_str()) {
            None => UploadReason::New,
            Some(remote_ts) if file.modified > *remote_ts => UploadReason::Newer,
            Some(_) => continue,
        };
        uploads.push(PlannedUpload {
            file: file.clone(),
            key,
            reason,
        });
    }

    let deletions = remote
        .iter()
        .filter(|object| match mapper.local_path_for(&object.key) {
            Some(path) => !path.exists(),
            None => {
                debug!("Ignoring {}: not under the sync prefix", object.key);
                false
            }
        })
        .cloned()
        .collect();

    SyncPlan {
        uploads,
        deletions,
        unmappable,
    }
}
