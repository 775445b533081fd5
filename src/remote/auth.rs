use crate::error::{BackupError, Result};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Fields used from a Google service account JSON key.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BackupError::Config(format!("cannot read key file {}: {}", path.display(), e))
        })?;
        let key: Self = serde_json::from_str(&raw).map_err(|e| {
            BackupError::Config(format!("invalid key file {}: {}", path.display(), e))
        })?;
        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(BackupError::Config(format!(
                "key file {} has no client_email or private_key",
                path.display()
            )));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    token_type: String,
}

/// Signs the RS256 assertion exchanged for an access token.
pub fn sign_assertion(key: &ServiceAccountKey, scopes: &[String], issued_at: i64) -> Result<String> {
    let claims = AssertionClaims {
        iss: key.client_email.clone(),
        scope: scopes.join(" "),
        aud: key.token_uri.clone(),
        exp: issued_at + ASSERTION_LIFETIME_SECS,
        iat: issued_at,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| BackupError::Config(format!("invalid service account private key: {}", e)))?;

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| BackupError::Config(format!("JWT encoding error: {}", e)))
}

/// Exchanges a signed assertion for a bearer token at the key's `token_uri`.
pub async fn fetch_access_token(client: &Client, key: &ServiceAccountKey, scopes: &[String]) -> Result<String> {
    let assertion = sign_assertion(key, scopes, Utc::now().timestamp())?;
    debug!("Requesting access token for {}", key.client_email);

    let response = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(BackupError::RemoteApi(format!(
            "Failed to obtain access token: {} - {}",
            status, text
        )));
    }

    let token: TokenResponse = serde_json::from_str(&response.text().await?)?;
    if token.access_token.is_empty() {
        return Err(BackupError::RemoteApi("token endpoint returned an empty access token".into()));
    }
    info!(
        "Obtained {} token for {} (expires in {}s)",
        token.token_type, key.client_email, token.expires_in
    );
    Ok(token.access_token)
}
