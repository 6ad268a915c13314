//! Google service-account authentication (OAuth 2.0 JWT bearer grant).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, error};

use crate::error::{SyncError, SyncResult};
use crate::token::AccessToken;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a downloaded service-account key file that are needed to sign
/// token requests.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

impl ServiceAccountKey {
    pub fn load(path: &Path) -> SyncResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Auth(format!(
                "Failed to read service account key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> SyncResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| SyncError::Auth(format!("Invalid service account key: {e}")))
    }

    /// Build the signed RS256 assertion exchanged for an access token.
    pub fn assertion(&self, scope: &str, now: DateTime<Utc>) -> SyncResult<String> {
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: scope.to_string(),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| SyncError::Auth(format!("Invalid service account private key: {e}")))?;

        encode(&header, &claims, &key)
            .map_err(|e| SyncError::Auth(format!("Failed to sign service account assertion: {e}")))
    }

    pub async fn fetch_token(&self, client: &Client, scope: &str) -> SyncResult<AccessToken> {
        let assertion = self.assertion(scope, Utc::now())?;
        debug!("Requesting Drive token for {}", self.client_email);

        let response = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("Drive token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Auth(format!("Failed to read Drive token response: {e}")))?;

        if !status.is_success() {
            error!("Drive token request failed with status {}: {}", status, body);
            return Err(SyncError::Auth(format!(
                "Drive token request failed with status {status}"
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SyncError::Auth(format!("Failed to parse Drive token response: {e}")))?;

        token
            .access_token
            .filter(|token| !token.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| SyncError::Auth("Drive token response had no access_token".to_string()))
    }
}
