use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_COMMAND: &str =
    "mysqldump -u{user} -p{password} --single-transaction {database} > {dump}";
pub const DEFAULT_REMOTE_FOLDER: &str = "Database dumps/{name}";
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_RESUMABLE_THRESHOLD: u64 = 5 * 1024 * 1024;
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v2";
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v2";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    pub database: String,
    #[serde(default)]
    pub folder: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_command")]
    pub exec: String,
    #[serde(default = "default_true")]
    pub compress: bool,
}

impl DumpConfig {
    /// Project name when set, otherwise the database name.
    pub fn prefix(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| Some(self.database.as_str()).filter(|d| !d.trim().is_empty()))
    }
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            password: None,
            database: String::new(),
            folder: PathBuf::new(),
            name: None,
            exec: default_command(),
            compress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Direct,
    Resumable,
    Auto,
}

impl Default for UploadMode {
    fn default() -> Self {
        UploadMode::Auto
    }
}

impl std::fmt::Display for UploadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadMode::Direct => write!(f, "direct"),
            UploadMode::Resumable => write!(f, "resumable"),
            UploadMode::Auto => write!(f, "auto"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DriveCredentials {
    AccessToken(String),
    TokenFile(PathBuf),
    /// Service account JSON key; a token is minted once per run.
    ServiceAccount {
        key_file: PathBuf,
        #[serde(default = "default_scopes")]
        scopes: Vec<String>,
    },
}

pub fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/drive".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    pub credentials: DriveCredentials,
    #[serde(default)]
    pub share_to: Vec<String>,
    #[serde(default = "default_remote_folder")]
    pub folder: String,
    #[serde(default)]
    pub upload_mode: UploadMode,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_resumable_threshold")]
    pub resumable_threshold: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_upload_base")]
    pub upload_base: String,
}

impl DriveConfig {
    /// Logical remote path for a project, with `{name}` substituted.
    pub fn remote_path(&self, name: &str) -> String {
        self.folder.replace("{name}", name)
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            credentials: DriveCredentials::AccessToken(String::new()),
            share_to: Vec::new(),
            folder: default_remote_folder(),
            upload_mode: UploadMode::Auto,
            chunk_size: DEFAULT_CHUNK_SIZE,
            resumable_threshold: DEFAULT_RESUMABLE_THRESHOLD,
            api_base: default_api_base(),
            upload_base: default_upload_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Schedule {
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

impl Schedule {
    pub fn as_seconds(&self) -> u64 {
        match self {
            Schedule::Minutes(n) => *n as u64 * 60,
            Schedule::Hours(n) => *n as u64 * 3600,
            Schedule::Days(n) => *n as u64 * 86400,
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Minutes(n) => write!(f, "Every {} minute(s)", n),
            Schedule::Hours(n) => write!(f, "Every {} hour(s)", n),
            Schedule::Days(n) => write!(f, "Every {} day(s)", n),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub dump: DumpConfig,
    pub drive: DriveConfig,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    /// Base for relative dump folders; the config file's directory when loaded from disk.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dump: DumpConfig::default(),
            drive: DriveConfig::default(),
            schedule: None,
            base_dir: PathBuf::from("."),
        }
    }
}

fn default_command() -> String {
    DEFAULT_COMMAND.to_string()
}

fn default_true() -> bool {
    true
}

fn default_remote_folder() -> String {
    DEFAULT_REMOTE_FOLDER.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_resumable_threshold() -> u64 {
    DEFAULT_RESUMABLE_THRESHOLD
}

fn default_api_base() -> String {
    DRIVE_API_BASE.to_string()
}

fn default_upload_base() -> String {
    DRIVE_UPLOAD_BASE.to_string()
}
