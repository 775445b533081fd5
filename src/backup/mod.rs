pub mod compression;
pub mod job;
pub mod scheduler;

pub use compression::ArchiveBuilder;
pub use job::{execute_backup, run_backup, BackupResult, Stage};
pub use scheduler::{report, run_scheduler};
