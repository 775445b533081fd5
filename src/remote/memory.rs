//! In-memory store used by the pipeline tests.

use super::model::{RemoteFolderRef, RemoteObject, RemoteObjectMeta};
use super::store::{ChunkStatus, FolderPage, RemoteStore, UploadSession};
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub const ROOT_ID: &str = "root";

#[derive(Debug, Default)]
pub struct MemoryState {
    pub objects: Vec<RemoteObject>,
    pub contents: HashMap<String, Vec<u8>>,
    pub sessions: HashMap<String, (RemoteObjectMeta, Vec<u8>)>,
    pub grants: Vec<(String, String)>,
    pub list_calls: usize,
    pub chunk_calls: usize,
    pub completions: usize,
    next_id: usize,
}

impl MemoryState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    fn insert(&mut self, meta: &RemoteObjectMeta, content: Vec<u8>) -> RemoteObject {
        let id = self.next_id("obj");
        let object = RemoteObject {
            id: id.clone(),
            title: meta.title.clone(),
            mime_type: meta.mime_type.clone(),
            parents: meta.parents.iter().map(|p| p.id.clone()).collect(),
        };
        self.objects.push(object.clone());
        self.contents.insert(id, content);
        object
    }
}

pub struct MemoryStore {
    pub state: Mutex<MemoryState>,
    pub page_size: usize,
    pub failing_grants: HashSet<String>,
    /// Never report completion for resumable sessions.
    pub never_finalize: bool,
    /// Report completion after the first chunk regardless of size.
    pub finalize_early: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            page_size: 2,
            failing_grants: HashSet::new(),
            never_finalize: false,
            finalize_early: false,
        }
    }

    pub fn failing_grants_for(identities: &[&str]) -> Self {
        Self {
            failing_grants: identities.iter().map(|s| s.to_string()).collect(),
            ..Self::new()
        }
    }

    pub fn root() -> RemoteFolderRef {
        RemoteFolderRef::root(ROOT_ID)
    }

    /// Adds an object directly, bypassing the store API.
    pub fn seed(&self, title: &str, mime_type: &str, parent: &str) -> String {
        let meta = RemoteObjectMeta {
            title: title.to_string(),
            mime_type: mime_type.to_string(),
            description: String::new(),
            parents: vec![super::model::ParentReference {
                id: parent.to_string(),
            }],
        };
        self.state.lock().unwrap().insert(&meta, Vec::new()).id
    }

    pub fn folders(&self) -> Vec<RemoteObject> {
        let state = self.state.lock().unwrap();
        state.objects.iter().filter(|o| o.is_folder()).cloned().collect()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn root_folder_id(&self) -> Result<String> {
        Ok(ROOT_ID.to_string())
    }

    async fn list_folders(
        &self,
        parent: &RemoteFolderRef,
        title: &str,
        page_token: Option<&str>,
    ) -> Result<FolderPage> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        // title matching is left to the caller, like a case-insensitive backend would
        let matching: Vec<RemoteObject> = state
            .objects
            .iter()
            .filter(|o| o.is_folder() && o.has_parent(parent.id()))
            .filter(|o| o.title.eq_ignore_ascii_case(title))
            .cloned()
            .collect();

        let start: usize = page_token.map(|t| t.parse().unwrap_or(0)).unwrap_or(0);
        let end = (start + self.page_size).min(matching.len());
        Ok(FolderPage {
            items: matching[start.min(end)..end].to_vec(),
            next_page_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn create_folder(&self, meta: &RemoteObjectMeta) -> Result<RemoteObject> {
        Ok(self.state.lock().unwrap().insert(meta, Vec::new()))
    }

    async fn create_file(&self, meta: &RemoteObjectMeta, content: Vec<u8>) -> Result<RemoteObject> {
        Ok(self.state.lock().unwrap().insert(meta, content))
    }

    async fn start_resumable(&self, meta: &RemoteObjectMeta, total_size: u64) -> Result<UploadSession> {
        let mut state = self.state.lock().unwrap();
        let uri = state.next_id("session");
        state.sessions.insert(uri.clone(), (meta.clone(), Vec::new()));
        Ok(UploadSession { uri, total_size })
    }

    async fn upload_chunk(&self, session: &UploadSession, offset: u64, chunk: Vec<u8>) -> Result<ChunkStatus> {
        let mut state = self.state.lock().unwrap();
        state.chunk_calls += 1;
        let (meta, received) = state
            .sessions
            .get_mut(&session.uri)
            .ok_or_else(|| BackupError::RemoteApi(format!("unknown session {}", session.uri)))?;
        if received.len() as u64 != offset {
            return Err(BackupError::RemoteApi(format!(
                "expected offset {}, got {}",
                received.len(),
                offset
            )));
        }
        received.extend_from_slice(&chunk);
        let done = received.len() as u64 >= session.total_size;
        let (meta, received) = (meta.clone(), received.clone());

        if self.never_finalize || !(done || self.finalize_early) {
            return Ok(ChunkStatus::Continue);
        }
        state.sessions.remove(&session.uri);
        state.completions += 1;
        Ok(ChunkStatus::Complete(state.insert(&meta, received)))
    }

    async fn grant_read(&self, object_id: &str, identity: &str) -> Result<()> {
        if self.failing_grants.contains(identity) {
            return Err(BackupError::RemoteApi(format!("cannot share with {}", identity)));
        }
        self.state
            .lock()
            .unwrap()
            .grants
            .push((object_id.to_string(), identity.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
