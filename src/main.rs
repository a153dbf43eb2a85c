use std::process::ExitCode;
use tracing::{error, info};

mod cli;
mod error;
mod keys;
mod local;
mod logging;
mod plan;
mod progress;
mod remote;
mod s3;
mod sync;
#[cfg(test)]
mod testing;
mod transfer;

use error::EXIT_SETUP_FAILURE;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args = cli::parse_args();

    let _log_guard = match logging::init_logging(args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error setting up logging: {e:#}");
            return ExitCode::from(EXIT_SETUP_FAILURE);
        }
    };

    // Process arguments into a sync configuration
    let sync_config = match cli::process_sync_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Error processing arguments: {}", e);
            return e.exit_code();
        }
    };

    info!(
        "Starting sync of {} to s3://{}/{} (storage class {}, min age {} days)",
        sync_config.local_path.display(),
        sync_config.remote.bucket,
        sync_config.remote.prefix,
        sync_config.storage_class.as_str(),
        sync_config.min_age_days
    );

    let store = s3::S3Store::connect(&sync_config.client).await;

    match sync::Syncer::new(&store, &sync_config).run().await {
        Ok(report) => {
            if report.has_failures() {
                error!("Sync finished with {} failure(s)", report.failures.len());
            } else {
                info!("Sync completed successfully");
            }
            report.exit_code()
        }
        Err(e) => {
            error!("Error during sync: {}", e);
            e.exit_code()
        }
    }
}
