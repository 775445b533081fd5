use super::command::{build_command, CommandExecutor};
use crate::backup::compression::ArchiveBuilder;
use crate::config::DumpConfig;
use crate::error::{BackupError, Result};
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone)]
pub struct DumpArtifact {
    pub path: PathBuf,
    pub created: NaiveDateTime,
    pub compressed: bool,
}

impl DumpArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Removes the dump file when dropped unless disarmed.
struct DumpFileGuard {
    path: PathBuf,
    armed: bool,
}

impl DumpFileGuard {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DumpFileGuard {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            debug!("Removing incomplete dump {}", self.path.display());
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Resolves `<folder>/<name-or-database>_<YYYYMMDD_HHMMSS>.sql`.
///
/// Relative folders are taken from `base_dir`; an empty folder means `base_dir` itself.
pub fn dump_path(config: &DumpConfig, base_dir: &Path, created: NaiveDateTime) -> Result<PathBuf> {
    let folder = if config.folder.as_os_str().is_empty() {
        base_dir.to_path_buf()
    } else if config.folder.is_absolute() {
        config.folder.clone()
    } else {
        base_dir.join(&config.folder)
    };

    if !folder.is_dir() {
        return Err(BackupError::Config(format!(
            "dump folder {} does not exist",
            folder.display()
        )));
    }

    let prefix = config
        .prefix()
        .ok_or_else(|| BackupError::Config("database or project name must not be empty".into()))?;

    Ok(folder.join(format!("{}_{}.sql", prefix, created.format(TIMESTAMP_FORMAT))))
}

pub struct DumpProducer {
    executor: Arc<dyn CommandExecutor>,
    archiver: ArchiveBuilder,
    base_dir: PathBuf,
}

impl DumpProducer {
    pub fn new(executor: Arc<dyn CommandExecutor>, archiver: ArchiveBuilder, base_dir: &Path) -> Self {
        Self {
            executor,
            archiver,
            base_dir: base_dir.to_path_buf(),
        }
    }

    pub async fn produce(&self, config: &DumpConfig) -> Result<DumpArtifact> {
        self.produce_at(config, Local::now().naive_local()).await
    }

    pub async fn produce_at(&self, config: &DumpConfig, created: NaiveDateTime) -> Result<DumpArtifact> {
        let dump = dump_path(config, &self.base_dir, created)?;
        let command = build_command(config, &dump)?;

        info!("Dumping database {} to {}", config.database, dump.display());
        let guard = DumpFileGuard::new(&dump);

        let executor = Arc::clone(&self.executor);
        let exit_code = tokio::task::spawn_blocking(move || executor.run(&command))
            .await
            .map_err(|e| BackupError::Command(format!("dump task failed: {}", e)))??;

        if exit_code != 0 {
            return Err(BackupError::Command(format!(
                "dump command exited with status {}",
                exit_code
            )));
        }

        let size = fs::metadata(&dump).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(BackupError::EmptyResult(format!(
                "{} is missing or empty after a successful exit",
                dump.display()
            )));
        }
        debug!("Dump written: {} bytes", size);

        if !config.compress {
            guard.disarm();
            return Ok(DumpArtifact {
                path: dump,
                created,
                compressed: false,
            });
        }

        let archive = self.archiver.compress(&dump)?;
        // the guard removes the uncompressed dump now that the archive exists
        drop(guard);
        info!("Dump archived to {}", archive.display());

        Ok(DumpArtifact {
            path: archive,
            created,
            compressed: true,
        })
    }
}
