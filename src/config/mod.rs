use crate::error::{SyncError, SyncResult};
use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable names read on top of the config file.
pub mod env_vars {
    pub const ZOOM_CLIENT_ID: &str = "ZOOM_CLIENT_ID";
    pub const ZOOM_CLIENT_SECRET: &str = "ZOOM_CLIENT_SECRET";
    pub const ZOOM_ACCOUNT_ID: &str = "ZOOM_ACCOUNT_ID";
    pub const ZOOM_BASE_URL: &str = "ZOOM_BASE_URL";
    pub const PARENT_DIR_ID: &str = "PARENT_DIR_ID";
    pub const SERVICE_ACCOUNT_KEY: &str = "GOOGLE_SERVICE_ACCOUNT_KEY";
    pub const SCRATCH_DIR: &str = "RECORDING_SYNC_SCRATCH_DIR";
}

pub const DEFAULT_ZOOM_BASE_URL: &str = "https://zoom.us";
pub const DEFAULT_DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
pub const DEFAULT_DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";
pub const DEFAULT_KEY_FILE: &str = "service-account-key.json";
pub const DEFAULT_SCRATCH_DIR: &str = "tmp";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub zoom: ZoomConfig,
    pub drive: DriveConfig,
    pub transfer: TransferConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Folder that receives one dated folder per run.
    pub parent_dir_id: Option<String>,
    /// Service account key file (JSON) used to authenticate against Drive.
    pub key_file: PathBuf,
    pub scope: String,
    pub api_url: String,
    pub upload_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Local directory for scratch files. Created on demand.
    pub scratch_dir: PathBuf,
}

/// Account credentials for the Zoom server-to-server OAuth app.
#[derive(Clone)]
pub struct ZoomCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub account_id: String,
}

impl fmt::Debug for ZoomCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoomCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

impl fmt::Debug for ZoomConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoomConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("account_id", &self.account_id)
            .finish()
    }
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ZOOM_BASE_URL.to_string(),
            client_id: None,
            client_secret: None,
            account_id: None,
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            parent_dir_id: None,
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            scope: DEFAULT_DRIVE_SCOPE.to_string(),
            api_url: DEFAULT_DRIVE_API_URL.to_string(),
            upload_url: DEFAULT_DRIVE_UPLOAD_URL.to_string(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = global::config_file()?;
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!(
                        "No config file at {:?}, using defaults and environment",
                        default_path
                    );
                    Self::default()
                }
            }
        };

        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Override fields from variables returned by `lookup`. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get(env_vars::ZOOM_CLIENT_ID) {
            self.zoom.client_id = Some(value);
        }
        if let Some(value) = get(env_vars::ZOOM_CLIENT_SECRET) {
            self.zoom.client_secret = Some(value);
        }
        if let Some(value) = get(env_vars::ZOOM_ACCOUNT_ID) {
            self.zoom.account_id = Some(value);
        }
        if let Some(value) = get(env_vars::ZOOM_BASE_URL) {
            self.zoom.base_url = value;
        }
        if let Some(value) = get(env_vars::PARENT_DIR_ID) {
            self.drive.parent_dir_id = Some(value);
        }
        if let Some(value) = get(env_vars::SERVICE_ACCOUNT_KEY) {
            self.drive.key_file = PathBuf::from(value);
        }
        if let Some(value) = get(env_vars::SCRATCH_DIR) {
            self.transfer.scratch_dir = PathBuf::from(value);
        }
    }

    pub fn zoom_credentials(&self) -> SyncResult<ZoomCredentials> {
        Ok(ZoomCredentials {
            client_id: required(&self.zoom.client_id, env_vars::ZOOM_CLIENT_ID)?,
            client_secret: required(&self.zoom.client_secret, env_vars::ZOOM_CLIENT_SECRET)?,
            account_id: required(&self.zoom.account_id, env_vars::ZOOM_ACCOUNT_ID)?,
        })
    }

    pub fn parent_dir_id(&self) -> SyncResult<String> {
        required(&self.drive.parent_dir_id, env_vars::PARENT_DIR_ID)
    }
}

fn required(value: &Option<String>, name: &str) -> SyncResult<String> {
    value
        .clone()
        .ok_or_else(|| SyncError::Config(format!("{name} is not set")))
}
