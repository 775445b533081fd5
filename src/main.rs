mod backup;
mod config;
mod dump;
mod error;
mod log;
mod remote;

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "drive-sql-backup")]
#[command(version)]
#[command(about = "Dumps a database and archives it to Google Drive")]
struct Args {
    /// Configuration file; defaults to ~/.drive_sql_backup/config.toml
    #[arg(short, long, env = "DRIVE_SQL_BACKUP_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single backup even when a schedule is configured
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    log::init();
    let args = Args::parse();

    info!("Drive SQL Backup starting...");

    let path = args.config.unwrap_or_else(config::config_path);
    let app_config = match config::load_from(&path) {
        Ok(c) => c,
        Err(e) => {
            error!("Unable to load configuration from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };

    let schedule = match (&app_config.schedule, args.once) {
        (Some(schedule), false) => schedule.clone(),
        _ => {
            let result = backup::run_backup(&app_config).await;
            backup::report(&result);
            if !result.success {
                std::process::exit(1);
            }
            return;
        }
    };

    let ctrl_c_count = Arc::new(AtomicUsize::new(0));
    let ctrl_c_count_clone = ctrl_c_count.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        let count = ctrl_c_count_clone.fetch_add(1, Ordering::SeqCst);

        if count == 0 {
            println!("\n\nShutdown signal received. Press Ctrl+C again to force exit...");
        } else {
            println!("\nForce exiting...");
            std::process::exit(130);
        }
    }) {
        error!("Error setting Ctrl-C handler: {}", e);
        std::process::exit(1);
    }

    info!("Scheduled backups: {}", schedule);
    backup::run_scheduler(Arc::new(app_config), schedule.as_seconds(), ctrl_c_count).await;
    info!("Application exited normally");
}
