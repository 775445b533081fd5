use super::model::{RemoteFolderRef, RemoteObjectMeta, ShareList, ShareReport};
use super::share::apply_shares;
use super::store::RemoteStore;
use crate::error::Result;
use std::collections::HashMap;
use tracing::{debug, info};

/// Non-blank segments of a slash-delimited logical path.
pub fn path_segments(logical_path: &str) -> Vec<&str> {
    logical_path
        .split('/')
        .filter(|segment| !segment.trim().is_empty())
        .collect()
}

/// Turns logical paths into folder references, creating missing folders.
///
/// Lookups are memoised for the lifetime of the resolver only. Two resolvers
/// running against the same path at the same time can both create a folder.
pub struct RemotePathResolver<'a> {
    store: &'a dyn RemoteStore,
    shares: ShareList,
    memo: HashMap<(String, String), String>,
    share_report: ShareReport,
}

impl<'a> RemotePathResolver<'a> {
    pub fn new(store: &'a dyn RemoteStore, shares: ShareList) -> Self {
        Self {
            store,
            shares,
            memo: HashMap::new(),
            share_report: ShareReport::default(),
        }
    }

    pub async fn root(&self) -> Result<RemoteFolderRef> {
        Ok(RemoteFolderRef::root(self.store.root_folder_id().await?))
    }

    pub async fn resolve(&mut self, logical_path: &str, root: &RemoteFolderRef) -> Result<RemoteFolderRef> {
        let mut current = root.clone();
        for segment in path_segments(logical_path) {
            let id = match self.find_folder(segment, &current).await? {
                Some(id) => id,
                None => self.create_folder(segment, &current).await?,
            };
            current = RemoteFolderRef::child(id, &current);
        }
        debug!("Resolved '{}' to folder {}", logical_path, current.id());
        Ok(current)
    }

    /// Share failures collected while creating folders.
    pub fn share_report(&self) -> &ShareReport {
        &self.share_report
    }

    async fn find_folder(&mut self, title: &str, parent: &RemoteFolderRef) -> Result<Option<String>> {
        let key = (parent.id().to_string(), title.to_string());
        if let Some(id) = self.memo.get(&key) {
            return Ok(Some(id.clone()));
        }

        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .store
                .list_folders(parent, title, page_token.as_deref())
                .await?;

            let found = page
                .items
                .into_iter()
                .find(|o| o.is_folder() && o.title == title && o.has_parent(parent.id()));
            if let Some(folder) = found {
                debug!("Found folder '{}' ({})", title, folder.id);
                self.memo.insert(key, folder.id.clone());
                return Ok(Some(folder.id));
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(None),
            }
        }
    }

    async fn create_folder(&mut self, title: &str, parent: &RemoteFolderRef) -> Result<String> {
        info!("Creating folder '{}' under {}", title, parent.id());
        let folder = self
            .store
            .create_folder(&RemoteObjectMeta::folder(title, parent))
            .await?;

        let report = apply_shares(self.store, &folder.id, &self.shares).await;
        self.share_report.merge(report);

        self.memo
            .insert((parent.id().to_string(), title.to_string()), folder.id.clone());
        Ok(folder.id)
    }
}
