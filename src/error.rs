use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

/// Errors raised while enumerating or transferring during a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote location string is not of the form s3://bucket/prefix
    #[error("Invalid S3 location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    /// Storage class is not one the provider knows about
    #[error("Unknown storage class '{0}'")]
    InvalidStorageClass(String),

    /// Local sync root is missing or not a directory
    #[error("Local path is not a readable directory: {}", .path.display())]
    LocalPath { path: PathBuf },

    /// Walking the local tree failed part way
    #[error("Failed to list local files under {}: {source}", .path.display())]
    LocalListing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote listing could not be completed
    #[error("Failed to list s3://{bucket}/{prefix}: {message}")]
    RemoteListing {
        bucket: String,
        prefix: String,
        message: String,
    },

    /// A local file name has no object key (not valid UTF-8)
    #[error("Cannot map {} to an object key: name is not valid UTF-8", .path.display())]
    UnmappableName { path: PathBuf },

    /// A single upload failed
    #[error("Failed to upload {key}: {message}")]
    Upload { key: String, message: String },

    /// A single delete failed
    #[error("Failed to delete {key}: {message}")]
    Delete { key: String, message: String },
}

impl SyncError {
    /// Whether this error means no diff could be computed at all
    pub fn is_enumeration(&self) -> bool {
        matches!(
            self,
            Self::LocalPath { .. } | Self::LocalListing { .. } | Self::RemoteListing { .. }
        )
    }

    /// Process exit code for a run aborted by this error
    pub fn exit_code(&self) -> ExitCode {
        if self.is_enumeration() {
            ExitCode::from(EXIT_LISTING_FAILURE)
        } else {
            ExitCode::from(EXIT_SETUP_FAILURE)
        }
    }
}

pub const EXIT_SETUP_FAILURE: u8 = 1;
pub const EXIT_LISTING_FAILURE: u8 = 2;
pub const EXIT_TRANSFER_FAILURES: u8 = 3;

pub type Result<T> = std::result::Result<T, SyncError>;
