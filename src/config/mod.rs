mod types;

pub use types::*;

use crate::error::{BackupError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resumable upload chunks other than the last must be a multiple of this.
pub const CHUNK_GRANULARITY: usize = 256 * 1024;

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".drive_sql_backup"))
        .unwrap_or_else(|| PathBuf::from(".drive_sql_backup"))
}
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}
pub fn load_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(BackupError::Config(format!(
            "config file not found at {}",
            path.display()
        )));
    }

    info!("Loading configuration from {:?}", path);
    let contents = fs::read_to_string(path)?;
    let mut config: AppConfig = toml::from_str(&contents)?;
    config.base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    debug!("Relative dump folders resolve against {:?}", config.base_dir);

    validate(&config)?;
    Ok(config)
}
pub fn save_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating config directory: {:?}", parent);
            fs::create_dir_all(parent)?;
        }
    }

    let contents = toml::to_string_pretty(config)?;

    fs::write(path, contents)?;
    info!("Configuration saved to {:?}", path);
    Ok(())
}

/// Checks the fields that do not depend on the local filesystem.
pub fn validate(config: &AppConfig) -> Result<()> {
    if config.dump.user.trim().is_empty() {
        return Err(BackupError::Config("database user must not be empty".into()));
    }
    if config.dump.database.trim().is_empty() {
        return Err(BackupError::Config("database name must not be empty".into()));
    }
    let chunk = config.drive.chunk_size;
    if chunk == 0 || chunk % CHUNK_GRANULARITY != 0 {
        return Err(BackupError::Config(format!(
            "chunk_size must be a positive multiple of {} bytes, got {}",
            CHUNK_GRANULARITY, chunk
        )));
    }
    if let Schedule::Minutes(0) | Schedule::Hours(0) | Schedule::Days(0) =
        config.schedule.as_ref().unwrap_or(&Schedule::Hours(1))
    {
        return Err(BackupError::Config("schedule interval must be positive".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> AppConfig {
        AppConfig {
            dump: DumpConfig {
                user: "root".to_string(),
                password: Some("secret".to_string()),
                database: "shop".to_string(),
                folder: PathBuf::from("dumps"),
                name: Some("shop-prod".to_string()),
                ..DumpConfig::default()
            },
            drive: DriveConfig {
                credentials: DriveCredentials::TokenFile(PathBuf::from("/etc/drive/token")),
                share_to: vec!["ops@example.com".to_string()],
                ..DriveConfig::default()
            },
            schedule: Some(Schedule::Hours(6)),
            base_dir: PathBuf::new(),
        }
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        save_to(&sample(), &path).unwrap();
        let loaded = load_from(&path).unwrap();

        assert_eq!(loaded.dump.database, "shop");
        assert_eq!(loaded.dump.name.as_deref(), Some("shop-prod"));
        assert_eq!(loaded.drive.share_to, vec!["ops@example.com"]);
        assert_eq!(
            loaded.drive.credentials,
            DriveCredentials::TokenFile(PathBuf::from("/etc/drive/token"))
        );
        assert_eq!(loaded.base_dir, dir.path());
        assert!(loaded.schedule.is_some());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[dump]
user = "root"
database = "shop"

[drive]
credentials = { access_token = "ya29.token" }
"#,
        )
        .unwrap();

        let loaded = load_from(&path).unwrap();
        assert!(loaded.dump.compress);
        assert_eq!(loaded.dump.exec, DEFAULT_COMMAND);
        assert_eq!(loaded.drive.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(loaded.drive.upload_mode, UploadMode::Auto);
        assert_eq!(loaded.drive.remote_path("shop"), "Database dumps/shop");
        assert!(loaded.schedule.is_none());
    }

    #[test]
    fn test_service_account_scopes_default_to_drive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[dump]
user = "root"
database = "shop"

[drive]
credentials = { service_account = { key_file = "/etc/drive/key.json" } }
"#,
        )
        .unwrap();

        let loaded = load_from(&path).unwrap();
        assert_eq!(
            loaded.drive.credentials,
            DriveCredentials::ServiceAccount {
                key_file: PathBuf::from("/etc/drive/key.json"),
                scopes: vec!["https://www.googleapis.com/auth/drive".to_string()],
            }
        );
    }

    #[test]
    fn test_rejects_bad_chunk_size() {
        let mut config = sample();
        config.drive.chunk_size = 1000;
        assert!(matches!(validate(&config), Err(BackupError::Config(_))));
    }

    #[test]
    fn test_rejects_empty_user() {
        let mut config = sample();
        config.dump.user = "  ".to_string();
        assert!(matches!(validate(&config), Err(BackupError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let err = load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, BackupError::Config(_)));
    }

    #[test]
    fn test_schedule_as_seconds() {
        assert_eq!(Schedule::Minutes(5).as_seconds(), 300);
        assert_eq!(Schedule::Hours(2).as_seconds(), 7200);
        assert_eq!(Schedule::Days(1).as_seconds(), 86400);
    }
}
