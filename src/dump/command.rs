use crate::config::DumpConfig;
use crate::error::{BackupError, Result};
use regex::{NoExpand, Regex};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Runs a fully substituted dump command and reports its exit code.
pub trait CommandExecutor: Send + Sync {
    fn run(&self, command: &str) -> Result<i32>;
}

pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for ShellExecutor {
    fn run(&self, command: &str) -> Result<i32> {
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .status()
            .map_err(|e| BackupError::Command(format!("failed to spawn {}: {}", self.shell, e)))?;

        status
            .code()
            .ok_or_else(|| BackupError::Command("dump command terminated by signal".to_string()))
    }
}

fn placeholder(name: &str) -> Result<Regex> {
    Regex::new(&format!(r"(?i)\{{{}\}}", name))
        .map_err(|e| BackupError::Config(format!("invalid placeholder pattern: {}", e)))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Substitutes `{user}`, `{password}`, `{database}` and `{dump}` into the
/// configured template. Without a password the whole token carrying
/// `{password}` is removed, together with a bare flag such as `-p` or
/// `--password` that takes it as a separate argument.
pub fn build_command(config: &DumpConfig, dump: &Path) -> Result<String> {
    let user = non_empty(Some(config.user.as_str()))
        .ok_or_else(|| BackupError::Config("database user must not be empty".into()))?;
    let database = non_empty(Some(config.database.as_str()))
        .ok_or_else(|| BackupError::Config("database name must not be empty".into()))?;

    let mut command = placeholder("user")?
        .replace_all(&config.exec, NoExpand(user))
        .into_owned();

    command = match non_empty(config.password.as_deref()) {
        Some(password) => placeholder("password")?
            .replace_all(&command, NoExpand(password))
            .into_owned(),
        None => {
            let flag = Regex::new(
                r"(?i)\s+(?:-{1,2}[a-z][\w-]*\s+\{password\}|\S*\{password\}\S*)",
            )
            .map_err(|e| BackupError::Config(format!("invalid flag pattern: {}", e)))?;
            let stripped = flag.replace_all(&command, "").into_owned();
            placeholder("password")?.replace_all(&stripped, "").into_owned()
        }
    };

    command = placeholder("database")?
        .replace_all(&command, NoExpand(database))
        .into_owned();

    let dump = dump.to_string_lossy();
    if !dump.is_empty() {
        command = placeholder("dump")?
            .replace_all(&command, NoExpand(dump.as_ref()))
            .into_owned();
    }

    debug!("Dump command built for database {}", database);
    Ok(command)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn config(password: Option<&str>) -> DumpConfig {
        DumpConfig {
            user: "root".to_string(),
            password: password.map(str::to_string),
            database: "shop".to_string(),
            ..DumpConfig::default()
        }
    }

    #[test]
    fn test_substitutes_all_placeholders() {
        let cmd = build_command(&config(Some("s3cret")), Path::new("/tmp/dumps/shop.sql")).unwrap();
        assert_eq!(
            cmd,
            "mysqldump -uroot -ps3cret --single-transaction shop > /tmp/dumps/shop.sql"
        );
    }

    #[test]
    fn test_missing_password_strips_flag() {
        let cmd = build_command(&config(None), Path::new("/tmp/d.sql")).unwrap();
        assert_eq!(cmd, "mysqldump -uroot --single-transaction shop > /tmp/d.sql");
        assert!(!cmd.contains("-p"));
        assert!(!cmd.contains("{password}"));
    }

    #[test]
    fn test_missing_password_strips_long_flag() {
        let mut cfg = config(None);
        cfg.exec = "mysqldump --user={user} --password={password} {database} > {dump}".to_string();
        let cmd = build_command(&cfg, Path::new("/tmp/d.sql")).unwrap();
        assert_eq!(cmd, "mysqldump --user=root shop > /tmp/d.sql");
    }

    #[test]
    fn test_missing_password_strips_separate_flag_value() {
        let mut cfg = config(None);
        cfg.exec = "mysqldump -u {user} -p {password} --single-transaction {database} > {dump}".to_string();
        let cmd = build_command(&cfg, Path::new("/tmp/d.sql")).unwrap();
        assert_eq!(cmd, "mysqldump -u root --single-transaction shop > /tmp/d.sql");
    }

    #[test]
    fn test_missing_password_keeps_preceding_flag() {
        let mut cfg = config(None);
        cfg.exec = "mysqldump --single-transaction '--password={password}' {database} > {dump}".to_string();
        let cmd = build_command(&cfg, Path::new("/tmp/d.sql")).unwrap();
        assert_eq!(cmd, "mysqldump --single-transaction shop > /tmp/d.sql");
    }

    #[test]
    fn test_empty_password_strips_flag() {
        let cmd = build_command(&config(Some("")), Path::new("/tmp/d.sql")).unwrap();
        assert!(!cmd.contains(" -p"));
    }

    #[test]
    fn test_placeholders_are_case_insensitive() {
        let mut cfg = config(None);
        cfg.exec = "pg_dump -U {USER} -P{Password} {Database} -f {DUMP}".to_string();
        let cmd = build_command(&cfg, Path::new("/tmp/d.sql")).unwrap();
        assert_eq!(cmd, "pg_dump -U root shop -f /tmp/d.sql");
    }

    #[test]
    fn test_dollar_in_password_is_literal() {
        let cmd = build_command(&config(Some("a$1b")), Path::new("/tmp/d.sql")).unwrap();
        assert!(cmd.contains("-pa$1b"));
    }

    #[test]
    fn test_empty_user_is_config_error() {
        let mut cfg = config(None);
        cfg.user.clear();
        let err = build_command(&cfg, Path::new("/tmp/d.sql")).unwrap_err();
        assert!(matches!(err, BackupError::Config(_)));
    }

    #[test]
    fn test_empty_database_is_config_error() {
        let mut cfg = config(None);
        cfg.database.clear();
        assert!(matches!(
            build_command(&cfg, Path::new("/tmp/d.sql")),
            Err(BackupError::Config(_))
        ));
    }
}
