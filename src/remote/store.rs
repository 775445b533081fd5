use super::model::{RemoteFolderRef, RemoteObject, RemoteObjectMeta};
use crate::error::Result;
use async_trait::async_trait;

/// One page of a folder listing.
#[derive(Debug, Clone, Default)]
pub struct FolderPage {
    pub items: Vec<RemoteObject>,
    pub next_page_token: Option<String>,
}

/// An initiated resumable upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub uri: String,
    pub total_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    Continue,
    Complete(RemoteObject),
}

/// Capabilities the backup pipeline needs from a hierarchical object store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn root_folder_id(&self) -> Result<String>;
    /// Folders under `parent` titled `title`, one page at a time.
    async fn list_folders(
        &self,
        parent: &RemoteFolderRef,
        title: &str,
        page_token: Option<&str>,
    ) -> Result<FolderPage>;
    async fn create_folder(&self, meta: &RemoteObjectMeta) -> Result<RemoteObject>;
    async fn create_file(&self, meta: &RemoteObjectMeta, content: Vec<u8>) -> Result<RemoteObject>;
    async fn start_resumable(&self, meta: &RemoteObjectMeta, total_size: u64) -> Result<UploadSession>;
    /// Sends bytes `offset..offset + chunk.len()` of the session's file.
    async fn upload_chunk(&self, session: &UploadSession, offset: u64, chunk: Vec<u8>) -> Result<ChunkStatus>;
    async fn grant_read(&self, object_id: &str, identity: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}
