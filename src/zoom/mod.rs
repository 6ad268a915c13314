//! Zoom API client: server-to-server OAuth token, cloud recording listing and
//! streamed downloads of recording files.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::config::ZoomCredentials;
use crate::error::{SyncError, SyncResult};
use crate::sync::RecordingSource;
use crate::token::AccessToken;

/// Only recording files with this extension are copied.
pub const ELIGIBLE_EXTENSION: &str = "MP4";

/// Response of `GET /v2/users/me/recordings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingList {
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub meetings: Vec<MeetingRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingRecord {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub recording_files: Vec<RecordingFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingFile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub file_extension: String,
    #[serde(default)]
    pub download_url: String,
}

impl RecordingFile {
    pub fn is_eligible(&self) -> bool {
        self.file_extension == ELIGIBLE_EXTENSION
    }

    /// Local file name used while the recording is staged on disk.
    pub fn scratch_name(&self) -> String {
        format!("{}.mp4", self.id)
    }
}

impl MeetingRecord {
    pub fn eligible_files(&self) -> impl Iterator<Item = &RecordingFile> {
        self.recording_files.iter().filter(|file| file.is_eligible())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

pub struct ZoomClient {
    client: Client,
    base_url: String,
    credentials: ZoomCredentials,
}

impl ZoomClient {
    pub fn new(base_url: impl Into<String>, credentials: ZoomCredentials) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!("Initialized Zoom client with base URL: {}", base_url);

        Self {
            client: Client::new(),
            base_url,
            credentials,
        }
    }

    /// Request an account-credentials token. No retry.
    pub async fn fetch_token(&self) -> SyncResult<AccessToken> {
        let url = format!("{}/oauth/token", self.base_url);
        let basic = BASE64.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));

        let response = self
            .client
            .post(&url)
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", self.credentials.account_id.as_str()),
            ])
            .header("Authorization", format!("Basic {basic}"))
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("Zoom token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Auth(format!("Failed to read Zoom token response: {e}")))?;

        if !status.is_success() {
            error!("Zoom token request failed with status {}: {}", status, body);
            return Err(SyncError::Auth(format!(
                "Zoom token request failed with status {status}"
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SyncError::Auth(format!("Failed to parse Zoom token response: {e}")))?;

        match token.access_token {
            Some(token) if !token.is_empty() => {
                info!("Got zoom access token");
                Ok(AccessToken::new(token))
            }
            _ => Err(SyncError::Auth("Could not get access token".to_string())),
        }
    }

    pub async fn list_recordings(&self, token: &AccessToken) -> SyncResult<RecordingList> {
        let url = format!("{}/v2/users/me/recordings", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| SyncError::Remote(format!("Recording list request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Remote(format!("Failed to read recording list: {e}")))?;

        if !status.is_success() {
            error!("Recording list failed with status {}: {}", status, body);
            return Err(SyncError::Remote(format!(
                "Recording list failed with status {status}"
            )));
        }

        let list: RecordingList = serde_json::from_str(&body)
            .map_err(|e| SyncError::Remote(format!("Failed to parse recording list: {e}")))?;
        debug!(
            "Recording list: total_records={}, meetings={}",
            list.total_records,
            list.meetings.len()
        );
        Ok(list)
    }

    /// Stream `url` into `destination`, chunk by chunk. Returns bytes written.
    pub async fn download(
        &self,
        token: &AccessToken,
        url: &str,
        destination: &Path,
    ) -> SyncResult<u64> {
        let name = url_basename(url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| SyncError::Transfer(format!("Download request for [{name}] failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Transfer(format!(
                "Download of [{name}] failed with status {status}"
            )));
        }

        info!("Starting download file [{}]", name);
        let mut file = File::create(destination).await.map_err(|e| {
            SyncError::Transfer(format!("Failed to create {}: {e}", destination.display()))
        })?;

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| SyncError::Transfer(format!("Failed to read chunk of [{name}]: {e}")))?;
            file.write_all(&chunk).await.map_err(|e| {
                SyncError::Transfer(format!("Failed to write {}: {e}", destination.display()))
            })?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| {
            SyncError::Transfer(format!("Failed to flush {}: {e}", destination.display()))
        })?;

        info!("Finished download file [{}] ({} bytes)", name, written);
        Ok(written)
    }
}

#[async_trait]
impl RecordingSource for ZoomClient {
    async fn fetch_token(&self) -> SyncResult<AccessToken> {
        ZoomClient::fetch_token(self).await
    }

    async fn list_recordings(&self, token: &AccessToken) -> SyncResult<RecordingList> {
        ZoomClient::list_recordings(self, token).await
    }

    async fn download(
        &self,
        token: &AccessToken,
        file: &RecordingFile,
        destination: &Path,
    ) -> SyncResult<u64> {
        ZoomClient::download(self, token, &file.download_url, destination).await
    }
}

/// Last path segment of a URL, without query string.
fn url_basename(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').find(|segment| !segment.is_empty()).unwrap_or(path)
}
