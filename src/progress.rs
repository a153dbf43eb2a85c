use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::info;

/// Tracks bytes moved over a whole run and hands out per-file bars
#[derive(Debug)]
pub struct ProgressTracker {
    enabled: bool,
    start_time: Instant,
    total_files: usize,
    processed_files: usize,
    processed_bytes: u64,
}

impl ProgressTracker {
    pub fn new(total_files: usize, enabled: bool) -> Self {
        Self {
            enabled,
            start_time: Instant::now(),
            total_files,
            processed_files: 0,
            processed_bytes: 0,
        }
    }

    /// A bar for one upload; hidden when progress output is disabled
    pub fn file_bar(&self, name: &str, size: u64) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(size);
        let style = ProgressStyle::with_template(
            "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        pb.set_style(style);
        pb.set_message(format!(
            "[{}/{}] {} ({})",
            self.processed_files + 1,
            self.total_files,
            name,
            format_bytes(size)
        ));
        pb
    }

    /// Count a finished upload
    pub fn update(&mut self, file_size: u64) {
        self.processed_bytes += file_size;
        self.processed_files += 1;
    }

    pub fn finish(&self) {
        if self.processed_files == 0 {
            return;
        }
        let total_time = self.start_time.elapsed().as_secs_f64();
        let speed = if total_time > 0.0 {
            self.processed_bytes as f64 / total_time
        } else {
            0.0
        };

        info!(
            "Transfer completed: {} in {} file(s), {:.1}s ({}/s)",
            format_bytes(self.processed_bytes),
            self.processed_files,
            total_time,
            format_bytes(speed as u64)
        );
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.1} TiB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GiB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MiB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KiB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
