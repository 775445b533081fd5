use crate::backup::compression::{calculate_sha256, ArchiveBuilder};
use crate::config::AppConfig;
use crate::dump::{CommandExecutor, DumpArtifact, DumpProducer, ShellExecutor};
use crate::error::{BackupError, Result};
use crate::remote::{
    DriveClient, RemotePathResolver, RemoteStore, ShareList, ShareReport, UploadEngine,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Dump,
    Compress,
    Resolve,
    Upload,
    Share,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Dump => "dump",
            Stage::Compress => "compress",
            Stage::Resolve => "resolve",
            Stage::Upload => "upload",
            Stage::Share => "share",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct BackupResult {

    pub project: String,

    pub success: bool,

    pub file_path: Option<PathBuf>,

    pub file_size: Option<u64>,

    pub remote_id: Option<String>,

    pub shares: ShareReport,

    pub duration_secs: u64,

    pub failed_stage: Option<Stage>,

    pub error: Option<String>,

    pub warnings: Vec<(Stage, String)>,
}

impl BackupResult {
    fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            success: false,
            file_path: None,
            file_size: None,
            remote_id: None,
            shares: ShareReport::default(),
            duration_secs: 0,
            failed_stage: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    fn fail(mut self, stage: Stage, err: BackupError, start: Instant) -> Self {
        error!("Backup of {} failed at {} stage: {}", self.project, stage, err);
        self.failed_stage = Some(stage);
        self.error = Some(err.to_string());
        self.duration_secs = start.elapsed().as_secs();
        self
    }
}

/// Stage a dump-side error belongs to.
fn dump_stage(err: &BackupError) -> Stage {
    match err {
        BackupError::Config(_) => Stage::Config,
        BackupError::Archive(_) => Stage::Compress,
        _ => Stage::Dump,
    }
}

fn describe(config: &AppConfig, artifact: &DumpArtifact, hash: Option<&str>) -> String {
    let mut description = format!(
        "Backup of database {} taken {}",
        config.dump.database,
        artifact.created.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(hash) = hash {
        description.push_str(&format!(", sha256 {}", hash));
    }
    description
}

/// Runs one backup with the shell executor and a Drive client built from `config`.
pub async fn run_backup(config: &AppConfig) -> BackupResult {
    let start = Instant::now();
    let project = config.dump.prefix().unwrap_or_default().to_string();

    let client = match DriveClient::connect(&config.drive).await {
        Ok(client) => client,
        Err(e) => return BackupResult::new(&project).fail(Stage::Config, e, start),
    };
    let executor: Arc<dyn CommandExecutor> = Arc::new(ShellExecutor::new());
    execute_backup(config, executor, ArchiveBuilder::new(), &client).await
}

/// Dump, compress, resolve the remote folder, upload and share.
pub async fn execute_backup(
    config: &AppConfig,
    executor: Arc<dyn CommandExecutor>,
    archiver: ArchiveBuilder,
    store: &dyn RemoteStore,
) -> BackupResult {
    let start = Instant::now();
    let project = config.dump.prefix().unwrap_or_default().to_string();
    let mut result = BackupResult::new(&project);

    if let Err(e) = crate::config::validate(config) {
        return result.fail(Stage::Config, e, start);
    }

    info!("Starting backup of {}", project);
    let producer = DumpProducer::new(executor, archiver, &config.base_dir);
    let artifact = match producer.produce(&config.dump).await {
        Ok(artifact) => artifact,
        Err(e) => {
            let stage = dump_stage(&e);
            return result.fail(stage, e, start);
        }
    };
    result.file_path = Some(artifact.path.clone());
    result.file_size = std::fs::metadata(&artifact.path).map(|m| m.len()).ok();

    let hash = calculate_sha256(&artifact.path).ok();
    let description = describe(config, &artifact, hash.as_deref());
    let shares = ShareList::new(&config.drive.share_to);

    let mut resolver = RemotePathResolver::new(store, shares.clone());
    let remote_path = config.drive.remote_path(&project);
    let folder = match resolve(&mut resolver, &remote_path).await {
        Ok(folder) => folder,
        Err(e) => return result.fail(Stage::Resolve, e, start),
    };
    for (who, why) in &resolver.share_report().failed {
        result
            .warnings
            .push((Stage::Share, format!("folder share with {} failed: {}", who, why)));
    }

    let engine = UploadEngine::new(store, shares)
        .with_chunk_size(config.drive.chunk_size)
        .with_resumable_threshold(config.drive.resumable_threshold);
    let outcome = match engine
        .upload(&artifact.path, &description, &folder, config.drive.upload_mode)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return result.fail(Stage::Upload, e, start),
    };

    for (who, why) in &outcome.shares.failed {
        result
            .warnings
            .push((Stage::Share, format!("file share with {} failed: {}", who, why)));
    }
    if !result.warnings.is_empty() {
        warn!(
            "Backup of {} finished with {} share warning(s)",
            project,
            result.warnings.len()
        );
    }

    result.duration_secs = start.elapsed().as_secs();
    info!(
        "Backup of {} completed: {} -> {} in {} sec, {:.2} MB",
        project,
        artifact.file_name(),
        outcome.object.id,
        result.duration_secs,
        result.file_size.unwrap_or(0) as f64 / 1024.0 / 1024.0
    );

    result.remote_id = Some(outcome.object.id);
    result.shares = outcome.shares;
    result.success = true;
    result
}

async fn resolve(
    resolver: &mut RemotePathResolver<'_>,
    remote_path: &str,
) -> Result<crate::remote::RemoteFolderRef> {
    let root = resolver.root().await?;
    resolver.resolve(remote_path, &root).await
}
