use crate::error::{BackupError, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

#[derive(Debug, Clone, PartialEq)]
pub enum ZipBackend {
    /// A `zip` executable found on `PATH`.
    Native(PathBuf),
    Library,
}

/// Produces single-entry zip archives, preferring the system `zip` binary.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    backend: ZipBackend,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        let backend = match which::which("zip") {
            Ok(path) => ZipBackend::Native(path),
            Err(_) => ZipBackend::Library,
        };
        debug!("Archive backend: {:?}", backend);
        Self { backend }
    }

    pub fn with_backend(backend: ZipBackend) -> Self {
        Self { backend }
    }

    /// Compresses `source` into a sibling `.zip` that replaces its extension.
    pub fn compress(&self, source: &Path) -> Result<PathBuf> {
        if !source.is_file() {
            return Err(BackupError::Archive(format!(
                "source {} is not a file",
                source.display()
            )));
        }
        let entry_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| BackupError::Archive(format!("no file name in {}", source.display())))?;
        let dest = archive_path_for(source);
        remove_stale(&dest)?;

        if let ZipBackend::Native(zip_bin) = &self.backend {
            match compress_native(zip_bin, source, &dest) {
                Ok(()) => return verify(&dest),
                Err(e) => {
                    warn!("Native zip failed, falling back to library: {}", e);
                    remove_stale(&dest)?;
                }
            }
        }

        compress_to_zip(source, &dest, &entry_name).map_err(as_archive_error)?;
        verify(&dest)
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn archive_path_for(source: &Path) -> PathBuf {
    source.with_extension("zip")
}

fn as_archive_error(err: BackupError) -> BackupError {
    match err {
        BackupError::Io(e) => BackupError::Archive(e.to_string()),
        other => other,
    }
}

fn remove_stale(dest: &Path) -> Result<()> {
    if dest.exists() {
        fs::remove_file(dest)
            .map_err(|e| BackupError::Archive(format!("cannot replace {}: {}", dest.display(), e)))?;
    }
    Ok(())
}

fn verify(dest: &Path) -> Result<PathBuf> {
    match fs::metadata(dest) {
        Ok(meta) if meta.len() > 0 => Ok(dest.to_path_buf()),
        Ok(_) => Err(BackupError::Archive(format!("{} is empty", dest.display()))),
        Err(e) => Err(BackupError::Archive(format!("{} was not created: {}", dest.display(), e))),
    }
}

fn compress_native(zip_bin: &Path, source: &Path, dest: &Path) -> Result<()> {
    info!("Compressing {} with {}", source.display(), zip_bin.display());
    // -j stores the bare file name, matching the library backend
    let status = Command::new(zip_bin)
        .arg("-j")
        .arg("-q")
        .arg(dest)
        .arg(source)
        .stdout(Stdio::null())
        .status()
        .map_err(|e| BackupError::Archive(e.to_string()))?;

    if !status.success() {
        return Err(BackupError::Archive(format!("zip exited with {}", status)));
    }
    Ok(())
}

pub fn compress_to_zip(source_path: &Path, dest_path: &Path, archive_filename: &str) -> Result<()> {
    info!("Compressing {} to {}", source_path.display(), dest_path.display());

    let dest_file = File::create(dest_path)?;
    let buffered_writer = BufWriter::new(dest_file);
    let mut zip = ZipWriter::new(buffered_writer);

    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(6));
    zip.start_file(archive_filename, options)?;
    let source_file = File::open(source_path)?;
    let mut reader = BufReader::new(source_file);
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        zip.write_all(&buffer[..bytes_read])?;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;

    let dest_size = fs::metadata(dest_path)?.len();
    debug!("Compression complete: {} bytes", dest_size);

    Ok(())
}

pub fn calculate_sha256(file_path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};

    let file = File::open(file_path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry_names(archive: &Path) -> Vec<String> {
        let file = File::open(archive).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_library_backend_replaces_extension() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("shop-prod_20240101_120000.sql");
        fs::write(&source, b"-- Test SQL content\nSELECT * FROM test;").unwrap();

        let archive = ArchiveBuilder::with_backend(ZipBackend::Library)
            .compress(&source)
            .unwrap();

        assert_eq!(archive, dir.path().join("shop-prod_20240101_120000.zip"));
        assert_eq!(entry_names(&archive), vec!["shop-prod_20240101_120000.sql"]);
    }

    #[test]
    fn test_broken_native_backend_falls_back() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("dump.sql");
        fs::write(&source, b"SELECT 1;").unwrap();

        let builder = ArchiveBuilder::with_backend(ZipBackend::Native(dir.path().join("no-such-zip")));
        let archive = builder.compress(&source).unwrap();

        assert_eq!(entry_names(&archive), vec!["dump.sql"]);
    }

    #[test]
    fn test_detected_backend_produces_archive() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("dump.sql");
        fs::write(&source, b"INSERT INTO t VALUES (1);").unwrap();

        let archive = ArchiveBuilder::new().compress(&source).unwrap();
        assert!(fs::metadata(&archive).unwrap().len() > 0);
        assert_eq!(entry_names(&archive), vec!["dump.sql"]);
    }

    #[test]
    fn test_missing_source_is_archive_error() {
        let dir = tempdir().unwrap();
        let err = ArchiveBuilder::with_backend(ZipBackend::Library)
            .compress(&dir.path().join("missing.sql"))
            .unwrap_err();
        assert!(matches!(err, BackupError::Archive(_)));
    }

    #[test]
    fn test_calculate_sha256() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");
        fs::write(&file_path, b"hello world").unwrap();

        let hash = calculate_sha256(&file_path).unwrap();
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
