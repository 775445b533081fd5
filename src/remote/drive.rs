use super::auth::{fetch_access_token, ServiceAccountKey};
use super::model::{RemoteFolderRef, RemoteObject, RemoteObjectMeta, FOLDER_MIME_TYPE};
use super::store::{ChunkStatus, FolderPage, RemoteStore, UploadSession};
use crate::config::{DriveConfig, DriveCredentials};
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

const PAGE_SIZE: u32 = 100;

/// Google Drive v2 REST client authenticated with a bearer token.
pub struct DriveClient {
    client: Client,
    token: String,
    api_base: String,
    upload_base: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct About {
    root_folder_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    items: Vec<RemoteObject>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct Permission<'a> {
    value: &'a str,
    #[serde(rename = "type")]
    permission_type: &'a str,
    role: &'a str,
}

impl DriveClient {
    /// Builds a client, exchanging service account credentials for a token when configured.
    pub async fn connect(config: &DriveConfig) -> Result<Self> {
        // 308 is Drive's "resume incomplete", not a redirect
        let client = Client::builder()
            .user_agent("Drive-SQL-Backup/1.0")
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let token = match &config.credentials {
            DriveCredentials::AccessToken(token) => token.trim().to_string(),
            DriveCredentials::TokenFile(path) => std::fs::read_to_string(path)
                .map_err(|e| {
                    BackupError::Config(format!("cannot read token file {}: {}", path.display(), e))
                })?
                .trim()
                .to_string(),
            DriveCredentials::ServiceAccount { key_file, scopes } => {
                let key = ServiceAccountKey::from_file(key_file)?;
                fetch_access_token(&client, &key, scopes).await?
            }
        };
        if token.is_empty() {
            return Err(BackupError::Config("Drive access token is empty".into()));
        }

        Ok(Self {
            client,
            token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn expect_success(response: Response, action: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(BackupError::RemoteApi(format!(
            "Failed to {}: {} - {}",
            action, status, text
        )))
    }

    async fn parse_object(response: Response) -> Result<RemoteObject> {
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Quotes a value for a Drive `q` expression.
pub fn quote_query_value(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

pub fn folder_query(parent: &RemoteFolderRef, title: &str) -> String {
    format!(
        "title = {} and {} in parents and mimeType = {} and trashed = false",
        quote_query_value(title),
        quote_query_value(parent.id()),
        quote_query_value(FOLDER_MIME_TYPE)
    )
}

/// `Content-Range` value for a chunk; an empty chunk finalizes a zero-byte file.
pub fn content_range(offset: u64, len: usize, total: u64) -> String {
    if len == 0 {
        format!("bytes */{}", total)
    } else {
        format!("bytes {}-{}/{}", offset, offset + len as u64 - 1, total)
    }
}

/// Bytes the server holds according to a 308 `Range` header such as `bytes=0-1048575`.
pub fn persisted_bytes(range: Option<&str>) -> Result<u64> {
    let range = match range {
        Some(range) => range.trim(),
        None => return Ok(0),
    };
    range
        .strip_prefix("bytes=")
        .and_then(|r| r.split_once('-'))
        .filter(|(start, _)| start.trim() == "0")
        .and_then(|(_, end)| end.trim().parse::<u64>().ok())
        .map(|end| end + 1)
        .ok_or_else(|| BackupError::RemoteApi(format!("malformed Range header: {}", range)))
}

/// Builds a `multipart/related` body: JSON metadata followed by the content.
pub fn multipart_related(meta_json: &str, mime_type: &str, content: &[u8]) -> (String, Vec<u8>) {
    let digest = Sha256::digest(content);
    let boundary = format!("drive_sql_backup_{}", hex::encode(&digest[..12]));

    let mut body = Vec::with_capacity(content.len() + meta_json.len() + 256);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {t}\r\n\r\n",
            b = boundary,
            m = meta_json,
            t = mime_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    (format!("multipart/related; boundary={}", boundary), body)
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn root_folder_id(&self) -> Result<String> {
        let url = format!("{}/about", self.api_base);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .query(&[("fields", "rootFolderId")])
            .send()
            .await?;

        let response = Self::expect_success(response, "fetch root folder").await?;
        let about: About = serde_json::from_str(&response.text().await?)?;
        debug!("Drive root folder: {}", about.root_folder_id);
        Ok(about.root_folder_id)
    }

    async fn list_folders(
        &self,
        parent: &RemoteFolderRef,
        title: &str,
        page_token: Option<&str>,
    ) -> Result<FolderPage> {
        let url = format!("{}/files", self.api_base);
        let mut query = vec![
            ("q", folder_query(parent, title)),
            ("maxResults", PAGE_SIZE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .query(&query)
            .send()
            .await?;

        let response = Self::expect_success(response, "list folders").await?;
        let list: FileList = serde_json::from_str(&response.text().await?)?;
        Ok(FolderPage {
            items: list.items,
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn create_folder(&self, meta: &RemoteObjectMeta) -> Result<RemoteObject> {
        let url = format!("{}/files", self.api_base);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(meta)
            .send()
            .await?;

        let response = Self::expect_success(response, "create folder").await?;
        let folder = Self::parse_object(response).await?;
        info!("Created Drive folder: {} ({})", folder.title, folder.id);
        Ok(folder)
    }

    async fn create_file(&self, meta: &RemoteObjectMeta, content: Vec<u8>) -> Result<RemoteObject> {
        let url = format!("{}/files", self.upload_base);
        let meta_json = serde_json::to_string(meta)?;
        let (content_type, body) = multipart_related(&meta_json, &meta.mime_type, &content);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header(CONTENT_TYPE, content_type)
            .query(&[("uploadType", "multipart")])
            .body(body)
            .send()
            .await?;

        let response = Self::expect_success(response, "upload file").await?;
        Self::parse_object(response).await
    }

    async fn start_resumable(&self, meta: &RemoteObjectMeta, total_size: u64) -> Result<UploadSession> {
        let url = format!("{}/files", self.upload_base);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("X-Upload-Content-Type", meta.mime_type.as_str())
            .header("X-Upload-Content-Length", total_size.to_string())
            .query(&[("uploadType", "resumable")])
            .json(meta)
            .send()
            .await?;

        let response = Self::expect_success(response, "start resumable upload").await?;
        let uri = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                BackupError::RemoteApi("resumable upload response has no session location".into())
            })?;

        debug!("Resumable session opened for {}", meta.title);
        Ok(UploadSession { uri, total_size })
    }

    async fn upload_chunk(&self, session: &UploadSession, offset: u64, chunk: Vec<u8>) -> Result<ChunkStatus> {
        let len = chunk.len() as u64;
        let range = content_range(offset, chunk.len(), session.total_size);
        let response = self
            .client
            .put(&session.uri)
            .header("Authorization", self.auth_header())
            .header(CONTENT_RANGE, range.as_str())
            .header(CONTENT_LENGTH, chunk.len().to_string())
            .body(chunk)
            .send()
            .await?;

        match response.status() {
            StatusCode::PERMANENT_REDIRECT => {
                let header = response.headers().get(RANGE).and_then(|v| v.to_str().ok());
                let persisted = persisted_bytes(header)?;
                if persisted != offset + len {
                    return Err(BackupError::RemoteApi(format!(
                        "server persisted {} bytes after chunk {}, expected {}",
                        persisted,
                        range,
                        offset + len
                    )));
                }
                Ok(ChunkStatus::Continue)
            }
            StatusCode::OK | StatusCode::CREATED => {
                Ok(ChunkStatus::Complete(Self::parse_object(response).await?))
            }
            _ => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                Err(BackupError::RemoteApi(format!(
                    "Failed to upload chunk {}: {} - {}",
                    range, status, text
                )))
            }
        }
    }

    async fn grant_read(&self, object_id: &str, identity: &str) -> Result<()> {
        let url = format!("{}/files/{}/permissions", self.api_base, object_id);
        let body = Permission {
            value: identity,
            permission_type: "user",
            role: "reader",
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .query(&[("sendNotificationEmails", "false")])
            .json(&body)
            .send()
            .await?;

        Self::expect_success(response, "grant read access").await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Google Drive"
    }
}
