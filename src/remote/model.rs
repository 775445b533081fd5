use serde::{Deserialize, Serialize};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Handle to a remote folder. `parent` is `None` for the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteFolderRef {
    id: String,
    parent: Option<String>,
}

impl RemoteFolderRef {
    pub fn root(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
        }
    }

    pub fn child(id: impl Into<String>, parent: &RemoteFolderRef) -> Self {
        Self {
            id: id.into(),
            parent: Some(parent.id.clone()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentReference {
    pub id: String,
}

/// Object as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, deserialize_with = "parent_ids")]
    pub parents: Vec<String>,
}

impl RemoteObject {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn has_parent(&self, parent_id: &str) -> bool {
        self.parents.iter().any(|p| p == parent_id)
    }
}

fn parent_ids<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let refs: Vec<ParentReference> = Deserialize::deserialize(deserializer)?;
    Ok(refs.into_iter().map(|r| r.id).collect())
}

/// Metadata sent when creating a file or folder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObjectMeta {
    pub title: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<ParentReference>,
}

impl RemoteObjectMeta {
    pub fn file(title: &str, mime_type: &str, description: &str, parent: &RemoteFolderRef) -> Self {
        Self {
            title: title.to_string(),
            mime_type: mime_type.to_string(),
            description: description.to_string(),
            parents: vec![ParentReference {
                id: parent.id().to_string(),
            }],
        }
    }

    pub fn folder(title: &str, parent: &RemoteFolderRef) -> Self {
        Self::file(title, FOLDER_MIME_TYPE, "", parent)
    }
}

/// Recipients granted read access; duplicates and blanks are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareList(Vec<String>);

impl ShareList {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();
        for identity in identities {
            let identity = identity.as_ref().trim();
            if !identity.is_empty() && !list.iter().any(|i| i == identity) {
                list.push(identity.to_string());
            }
        }
        Self(list)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of applying a [`ShareList`]; failures are collected, not raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareReport {
    pub granted: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl ShareReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: ShareReport) {
        self.granted.extend(other.granted);
        self.failed.extend(other.failed);
    }
}
