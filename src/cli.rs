use aws_sdk_s3::types::StorageClass;
use clap::Parser;
use std::path::PathBuf;

use crate::error::{Result, SyncError};

pub const DEFAULT_STORAGE_CLASS: &str = "DEEP_ARCHIVE";
pub const DEFAULT_MIN_AGE_DAYS: u32 = 180;

/// Command line arguments for the archive sync tool
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "s3-archive-sync",
    about = "Mirror a local directory into an S3 archive bucket, deleting remote objects only once they are old enough"
)]
pub struct Args {
    /// Local directory to sync from
    pub local_path: PathBuf,

    /// Destination location (s3://bucket/prefix)
    pub remote: String,

    /// Storage class for uploaded objects
    #[clap(long, default_value = DEFAULT_STORAGE_CLASS)]
    pub storage_class: String,

    /// Never delete remote objects younger than this many days
    #[clap(long, default_value_t = DEFAULT_MIN_AGE_DAYS)]
    pub min_age_days: u32,

    /// AWS region (falls back to the default provider chain)
    #[clap(short, long)]
    pub region: Option<String>,

    /// AWS shared config profile
    #[clap(long)]
    pub profile: Option<String>,

    /// Custom endpoint for S3-compatible stores
    #[clap(long)]
    pub endpoint_url: Option<String>,

    /// Append log output to this file instead of stderr
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// Do not draw upload progress bars
    #[clap(long)]
    pub no_progress: bool,
}

/// Where the remote copy lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub bucket: String,
    pub prefix: String,
}

/// Connection settings for the S3 client
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub local_path: PathBuf,
    pub remote: RemoteLocation,
    pub storage_class: StorageClass,
    pub min_age_days: u32,
    pub show_progress: bool,
    pub client: ClientConfig,
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    Args::parse()
}

/// Parse an S3 URL in the format s3://bucket/prefix
///
/// Trailing slashes are stripped from the prefix so that `s3://b/p/` and
/// `s3://b/p` name the same location.
pub fn parse_s3_url(url: &str) -> Result<RemoteLocation> {
    let invalid = |reason: &str| SyncError::InvalidLocation {
        location: url.to_string(),
        reason: reason.to_string(),
    };

    let path = url
        .strip_prefix("s3://")
        .ok_or_else(|| invalid("expected s3://bucket/prefix"))?;
    let (bucket, prefix) = path.split_once('/').unwrap_or((path, ""));

    if bucket.is_empty() {
        return Err(invalid("bucket name cannot be empty"));
    }

    Ok(RemoteLocation {
        bucket: bucket.to_string(),
        prefix: prefix.trim_end_matches('/').to_string(),
    })
}

/// Resolve a storage class name against the set the SDK knows
pub fn parse_storage_class(name: &str) -> Result<StorageClass> {
    let upper = name.trim().to_ascii_uppercase();
    if StorageClass::values().contains(&upper.as_str()) {
        Ok(StorageClass::from(upper.as_str()))
    } else {
        Err(SyncError::InvalidStorageClass(name.to_string()))
    }
}

/// Process command line arguments into a SyncConfig
pub fn process_sync_args(args: &Args) -> Result<SyncConfig> {
    if !args.local_path.is_dir() {
        return Err(SyncError::LocalPath {
            path: args.local_path.clone(),
        });
    }

    Ok(SyncConfig {
        local_path: args.local_path.clone(),
        remote: parse_s3_url(&args.remote)?,
        storage_class: parse_storage_class(&args.storage_class)?,
        min_age_days: args.min_age_days,
        show_progress: !args.no_progress,
        client: ClientConfig {
            region: args.region.clone(),
            profile: args.profile.clone(),
            endpoint_url: args.endpoint_url.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_url() {
        let loc = parse_s3_url("s3://archive/photos/2023").unwrap();
        assert_eq!(loc.bucket, "archive");
        assert_eq!(loc.prefix, "photos/2023");

        let loc = parse_s3_url("s3://archive/photos/").unwrap();
        assert_eq!(loc.prefix, "photos");

        let loc = parse_s3_url("s3://archive").unwrap();
        assert_eq!(loc.prefix, "");

        assert!(parse_s3_url("archive/photos").is_err());
        assert!(parse_s3_url("s3:///photos").is_err());
        assert!(parse_s3_url("gs://archive/photos").is_err());
    }

    #[test]
    fn test_parse_storage_class() {
        assert_eq!(
            parse_storage_class("DEEP_ARCHIVE").unwrap(),
            StorageClass::DeepArchive
        );
        assert_eq!(
            parse_storage_class("glacier_ir").unwrap(),
            StorageClass::GlacierIr
        );
        assert!(matches!(
            parse_storage_class("FROZEN"),
            Err(SyncError::InvalidStorageClass(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::parse_from([
            "s3-archive-sync",
            dir.path().to_str().unwrap(),
            "s3://archive/nas",
        ]);
        let config = process_sync_args(&args).unwrap();

        assert_eq!(config.min_age_days, 180);
        assert_eq!(config.storage_class, StorageClass::DeepArchive);
        assert_eq!(config.remote.prefix, "nas");
        assert!(config.show_progress);
    }

    #[test]
    fn test_missing_local_path_rejected() {
        let args = Args::parse_from(["s3-archive-sync", "/does/not/exist", "s3://archive/nas"]);
        assert!(matches!(
            process_sync_args(&args),
            Err(SyncError::LocalPath { .. })
        ));
    }
}
