use crate::backup::job::{run_backup, BackupResult};
use crate::config::AppConfig;
use chrono::{Duration, Local};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::select;
use tokio::time::sleep;
use tracing::{error, info, warn};

pub fn report(result: &BackupResult) {
    if result.success {
        info!(
            "Backup of {} uploaded as {}: {:.2} MB in {} sec",
            result.project,
            result.remote_id.as_deref().unwrap_or_default(),
            result.file_size.unwrap_or(0) as f64 / 1024.0 / 1024.0,
            result.duration_secs
        );
        for (stage, warning) in &result.warnings {
            warn!("[{}] {}", stage, warning);
        }
    } else {
        error!(
            "Backup of {} failed at {} stage: {}",
            result.project,
            result
                .failed_stage
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            result.error.as_deref().unwrap_or_default()
        );
    }
}

async fn wait_for_shutdown(shutdown: &AtomicUsize) {
    while shutdown.load(Ordering::Relaxed) == 0 {
        sleep(std::time::Duration::from_millis(100)).await;
    }
}

/// Runs a backup immediately and then once per interval until shutdown.
/// Runs never overlap; a run that outlasts the interval delays the next one.
pub async fn run_scheduler(config: Arc<AppConfig>, interval_secs: u64, shutdown: Arc<AtomicUsize>) {
    info!("Starting backup scheduler, interval: {} seconds", interval_secs);

    loop {
        if shutdown.load(Ordering::Relaxed) > 0 {
            info!("Scheduler shutdown requested");
            break;
        }

        let result = run_backup(&config).await;
        report(&result);

        let next_run = Local::now() + Duration::seconds(interval_secs as i64);
        info!("Next backup at {}", next_run.format("%Y-%m-%d %H:%M:%S"));

        select! {
            _ = sleep(std::time::Duration::from_secs(interval_secs)) => {}
            _ = wait_for_shutdown(&shutdown) => {
                info!("Scheduler shutdown requested during wait");
                break;
            }
        }
    }

    info!("Scheduler stopped");
}
