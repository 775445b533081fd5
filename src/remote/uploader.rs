use super::model::{RemoteFolderRef, RemoteObject, RemoteObjectMeta, ShareList, ShareReport};
use super::share::apply_shares;
use super::store::{ChunkStatus, RemoteStore};
use crate::config::{UploadMode, DEFAULT_CHUNK_SIZE, DEFAULT_RESUMABLE_THRESHOLD};
use crate::error::{BackupError, Result};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub object: RemoteObject,
    pub shares: ShareReport,
    /// `Direct` or `Resumable`, never `Auto`.
    pub mode: UploadMode,
    pub chunks: usize,
}

pub struct UploadEngine<'a> {
    store: &'a dyn RemoteStore,
    shares: ShareList,
    chunk_size: usize,
    resumable_threshold: u64,
}

/// Guesses a mime type from magic bytes, then from the extension.
pub fn sniff_mime(path: &Path, head: &[u8]) -> String {
    if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
        return "application/zip".to_string();
    }
    if head.starts_with(&[0x1f, 0x8b]) {
        return "application/gzip".to_string();
    }
    if let Some(guess) = mime_guess::from_path(path).first() {
        return guess.essence_str().to_string();
    }
    if std::str::from_utf8(head).is_ok() {
        "text/plain".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

/// Reads until `buf` is full or the file ends.
async fn read_chunk(file: &mut File, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

impl<'a> UploadEngine<'a> {
    pub fn new(store: &'a dyn RemoteStore, shares: ShareList) -> Self {
        Self {
            store,
            shares,
            chunk_size: DEFAULT_CHUNK_SIZE,
            resumable_threshold: DEFAULT_RESUMABLE_THRESHOLD,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_resumable_threshold(mut self, threshold: u64) -> Self {
        self.resumable_threshold = threshold;
        self
    }

    pub async fn upload(
        &self,
        path: &Path,
        description: &str,
        parent: &RemoteFolderRef,
        mode: UploadMode,
    ) -> Result<UploadOutcome> {
        let size = tokio::fs::metadata(path).await?.len();
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| BackupError::Config(format!("no file name in {}", path.display())))?;

        let mut head = [0u8; 512];
        let head_len = read_chunk(&mut File::open(path).await?, &mut head).await?;
        let mime_type = sniff_mime(path, &head[..head_len]);
        let meta = RemoteObjectMeta::file(&title, &mime_type, description, parent);

        let mode = match mode {
            UploadMode::Auto if size > self.resumable_threshold => UploadMode::Resumable,
            UploadMode::Auto => UploadMode::Direct,
            explicit => explicit,
        };

        info!(
            "Uploading {} ({} bytes, {}) to {} via {} upload",
            title,
            size,
            mime_type,
            self.store.name(),
            mode
        );

        let (object, chunks) = match mode {
            UploadMode::Resumable => self.upload_resumable(path, &meta, size).await?,
            _ => (self.upload_direct(path, &meta).await?, 1),
        };

        info!("Uploaded {} as {}", title, object.id);
        let shares = apply_shares(self.store, &object.id, &self.shares).await;
        if !shares.is_complete() {
            warn!(
                "{} of {} share grants failed for {}",
                shares.failed.len(),
                self.shares.len(),
                object.id
            );
        }

        Ok(UploadOutcome {
            object,
            shares,
            mode,
            chunks,
        })
    }

    async fn upload_direct(&self, path: &Path, meta: &RemoteObjectMeta) -> Result<RemoteObject> {
        let content = tokio::fs::read(path).await?;
        let object = self.store.create_file(meta, content).await?;
        if object.id.is_empty() {
            return Err(BackupError::RemoteApi(format!(
                "store returned no id for {}",
                meta.title
            )));
        }
        Ok(object)
    }

    async fn upload_resumable(
        &self,
        path: &Path,
        meta: &RemoteObjectMeta,
        size: u64,
    ) -> Result<(RemoteObject, usize)> {
        let session = self.store.start_resumable(meta, size).await?;
        let mut file = File::open(path).await?;
        let mut buffer = vec![0u8; self.chunk_size];
        let mut offset: u64 = 0;
        let mut chunks = 0usize;

        loop {
            let read = read_chunk(&mut file, &mut buffer).await?;
            // a zero-byte file still sends one empty chunk to finalize
            if read == 0 && chunks > 0 {
                break;
            }
            let last = offset + read as u64 >= size;
            chunks += 1;
            debug!("Sending chunk {} ({} bytes at offset {})", chunks, read, offset);

            match self
                .store
                .upload_chunk(&session, offset, buffer[..read].to_vec())
                .await?
            {
                ChunkStatus::Continue => {
                    offset += read as u64;
                    if read == 0 {
                        break;
                    }
                }
                ChunkStatus::Complete(object) if last => return Ok((object, chunks)),
                ChunkStatus::Complete(_) => {
                    return Err(BackupError::RemoteApi(format!(
                        "upload of {} completed after {} of {} bytes",
                        meta.title,
                        offset + read as u64,
                        size
                    )));
                }
            }
        }

        Err(BackupError::RemoteApi(format!(
            "upload did not finalize: {} bytes sent in {} chunks without completion",
            offset, chunks
        )))
    }
}
