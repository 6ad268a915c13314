//! Google Drive v3 client: folder creation and resumable uploads.

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

use crate::config::DriveConfig;
use crate::error::{SyncError, SyncResult};
use crate::sync::FolderStore;
use crate::token::AccessToken;

pub mod service_account;

pub use service_account::ServiceAccountKey;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const UPLOAD_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    parents: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

pub struct DriveClient {
    client: Client,
    config: DriveConfig,
    token: Option<AccessToken>,
}

impl DriveClient {
    /// Client that authenticates with the configured service account key.
    pub fn new(config: DriveConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            token: None,
        }
    }

    #[cfg(test)]
    fn with_token(config: DriveConfig, token: AccessToken) -> Self {
        Self {
            client: Client::new(),
            config,
            token: Some(token),
        }
    }

    pub async fn authenticate(&mut self) -> SyncResult<()> {
        let key = ServiceAccountKey::load(&self.config.key_file)?;
        let token = key.fetch_token(&self.client, &self.config.scope).await?;
        info!("Authenticated to Google Drive as {}", key.client_email);
        self.token = Some(token);
        Ok(())
    }

    fn token(&self) -> SyncResult<&AccessToken> {
        self.token
            .as_ref()
            .ok_or_else(|| SyncError::Storage("Drive client is not authenticated".to_string()))
    }

    /// Create a folder under `parent_id`. A new folder is created on every call,
    /// even when one with the same name already exists.
    pub async fn create_folder(&self, name: &str, parent_id: &str) -> SyncResult<String> {
        let url = format!("{}/files", self.config.api_url);
        let metadata = FileMetadata {
            name,
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: [parent_id],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("fields", "id")])
            .bearer_auth(self.token()?.secret())
            .json(&metadata)
            .send()
            .await
            .map_err(|e| SyncError::Storage(format!("Folder create request for {name} failed: {e}")))?;

        let folder: CreatedFile = read_created(response, name).await?;
        debug!("Created folder {} ({}) under {}", name, folder.id, parent_id);
        Ok(folder.id)
    }

    /// Upload a local file into `folder_id` through a resumable upload session.
    pub async fn upload_file(&self, path: &Path, folder_id: &str) -> SyncResult<String> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| SyncError::Storage(format!("Invalid upload path {}", path.display())))?;
        let token = self.token()?;

        let file = File::open(path)
            .await
            .map_err(|e| SyncError::Storage(format!("Failed to open {}: {e}", path.display())))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| SyncError::Storage(format!("Failed to stat {}: {e}", path.display())))?
            .len();

        let metadata = FileMetadata {
            name,
            mime_type: None,
            parents: [folder_id],
        };

        let response = self
            .client
            .post(format!("{}/files", self.config.upload_url))
            .query(&[("uploadType", "resumable"), ("fields", "id")])
            .bearer_auth(token.secret())
            .header("X-Upload-Content-Type", UPLOAD_MIME_TYPE)
            .header("X-Upload-Content-Length", size)
            .json(&metadata)
            .send()
            .await
            .map_err(|e| SyncError::Storage(format!("Upload session request for {name} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Upload session for {} failed with status {}: {}", name, status, body);
            return Err(SyncError::Storage(format!(
                "Upload session for {name} failed with status {status}"
            )));
        }

        let session_url = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                SyncError::Storage(format!("Upload session for {name} returned no Location"))
            })?;
        debug!("Upload session for {} opened ({} bytes)", name, size);

        let response = self
            .client
            .put(&session_url)
            .bearer_auth(token.secret())
            .header(CONTENT_TYPE, UPLOAD_MIME_TYPE)
            .header(CONTENT_LENGTH, size)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| SyncError::Storage(format!("Upload of {name} failed: {e}")))?;

        let uploaded: CreatedFile = read_created(response, name).await?;
        Ok(uploaded.id)
    }
}

async fn read_created(response: reqwest::Response, name: &str) -> SyncResult<CreatedFile> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SyncError::Storage(format!("Failed to read Drive response for {name}: {e}")))?;

    if !status.is_success() {
        error!("Drive request for {} failed with status {}: {}", name, status, body);
        return Err(SyncError::Storage(format!(
            "Drive request for {name} failed with status {status}"
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| SyncError::Storage(format!("Failed to parse Drive response for {name}: {e}")))
}

#[async_trait]
impl FolderStore for DriveClient {
    async fn authenticate(&mut self) -> SyncResult<()> {
        DriveClient::authenticate(self).await
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> SyncResult<String> {
        DriveClient::create_folder(self, name, parent_id).await
    }

    async fn upload_file(&self, path: &Path, folder_id: &str) -> SyncResult<String> {
        DriveClient::upload_file(self, path, folder_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn config_for(server_url: &str) -> DriveConfig {
        DriveConfig {
            api_url: format!("{server_url}/drive/v3"),
            upload_url: format!("{server_url}/upload/drive/v3"),
            ..DriveConfig::default()
        }
    }

    #[tokio::test]
    async fn test_create_folder() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/drive/v3/files")
            .match_query(Matcher::UrlEncoded("fields".into(), "id".into()))
            .match_header("authorization", "Bearer drive-token")
            .match_body(Matcher::Json(json!({
                "name": "2026-10-19",
                "mimeType": FOLDER_MIME_TYPE,
                "parents": ["root-id"]
            })))
            .with_status(200)
            .with_body(r#"{"id": "day-folder"}"#)
            .create_async()
            .await;

        let drive = DriveClient::with_token(
            config_for(&server.url()),
            AccessToken::new("drive-token"),
        );
        let id = drive.create_folder("2026-10-19", "root-id").await.unwrap();
        assert_eq!(id, "day-folder");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_folder_requires_token() {
        let drive = DriveClient::new(DriveConfig::default());
        assert!(matches!(
            drive.create_folder("x", "y").await,
            Err(SyncError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_resumable_upload() {
        let mut server = Server::new_async().await;
        let session_url = format!("{}/upload/session/abc", server.url());

        let start = server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("uploadType".into(), "resumable".into()),
                Matcher::UrlEncoded("fields".into(), "id".into()),
            ]))
            .match_header("x-upload-content-length", "5")
            .match_body(Matcher::Json(json!({
                "name": "r1.mp4",
                "parents": ["meeting-folder"]
            })))
            .with_status(200)
            .with_header("location", &session_url)
            .create_async()
            .await;

        let put = server
            .mock("PUT", "/upload/session/abc")
            .match_header("content-type", UPLOAD_MIME_TYPE)
            .match_body("video")
            .with_status(200)
            .with_body(r#"{"id": "uploaded-file"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r1.mp4");
        std::fs::write(&path, b"video").unwrap();

        let drive = DriveClient::with_token(
            config_for(&server.url()),
            AccessToken::new("drive-token"),
        );
        let id = drive.upload_file(&path, "meeting-folder").await.unwrap();
        assert_eq!(id, "uploaded-file");
        start.assert_async().await;
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_session_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error": {"message": "storageQuotaExceeded"}}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r1.mp4");
        std::fs::write(&path, b"video").unwrap();

        let drive = DriveClient::with_token(
            config_for(&server.url()),
            AccessToken::new("drive-token"),
        );
        assert!(matches!(
            drive.upload_file(&path, "meeting-folder").await,
            Err(SyncError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_with_key_file() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token": "drive-token"}"#)
            .create_async()
            .await;

        let mut key: serde_json::Value = serde_json::from_str(include_str!(
            "../../tests/fixtures/service-account-key.json"
        ))
        .unwrap();
        key["token_uri"] = json!(format!("{}/token", server.url()));

        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key.json");
        std::fs::write(&key_file, key.to_string()).unwrap();

        let mut drive = DriveClient::new(DriveConfig {
            key_file,
            ..config_for(&server.url())
        });
        drive.authenticate().await.unwrap();
        assert_eq!(drive.token().unwrap().secret(), "drive-token");
    }
}
