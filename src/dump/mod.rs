pub(crate) mod command;
mod producer;

pub use command::{build_command, CommandExecutor, ShellExecutor};
pub use producer::{dump_path, DumpArtifact, DumpProducer};
