//! One sync run: token, listing, day-root folder, then every eligible
//! recording file in listing order.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;
use crate::drive::DriveClient;
use crate::error::SyncResult;
use crate::token::AccessToken;
use crate::transfer::{transfer_recording, MeetingFolder, TransferOutcome};
use crate::zoom::{RecordingFile, RecordingList, ZoomClient};

/// Where recordings come from.
#[async_trait]
pub trait RecordingSource: Send + Sync {
    async fn fetch_token(&self) -> SyncResult<AccessToken>;

    async fn list_recordings(&self, token: &AccessToken) -> SyncResult<RecordingList>;

    async fn download(
        &self,
        token: &AccessToken,
        file: &RecordingFile,
        destination: &Path,
    ) -> SyncResult<u64>;
}

/// Where recordings go.
#[async_trait]
pub trait FolderStore: Send + Sync {
    async fn authenticate(&mut self) -> SyncResult<()>;

    async fn create_folder(&self, name: &str, parent_id: &str) -> SyncResult<String>;

    async fn upload_file(&self, path: &Path, folder_id: &str) -> SyncResult<String>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub total_records: u64,
    pub meetings: usize,
    pub eligible_files: usize,
    pub transferred: usize,
    pub failed: usize,
    pub folders_created: usize,
}

/// Value returned to whatever triggered the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl InvocationResponse {
    pub fn no_content() -> Self {
        Self { status_code: 204 }
    }
}

pub fn day_folder_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub struct SyncJob<S, D> {
    source: S,
    storage: D,
    parent_dir_id: String,
    scratch_dir: PathBuf,
    run_date: NaiveDate,
}

impl<S, D> SyncJob<S, D>
where
    S: RecordingSource,
    D: FolderStore,
{
    pub fn new(source: S, storage: D, parent_dir_id: impl Into<String>, scratch_dir: PathBuf) -> Self {
        Self {
            source,
            storage,
            parent_dir_id: parent_dir_id.into(),
            scratch_dir,
            run_date: Local::now().date_naive(),
        }
    }

    /// Name the day-root folder after `date` instead of today.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.run_date = date;
        self
    }

    pub async fn run(mut self) -> SyncResult<RunReport> {
        let token = self.source.fetch_token().await?;
        let recordings = self.source.list_recordings(&token).await?;

        let mut report = RunReport {
            total_records: recordings.total_records,
            ..RunReport::default()
        };

        if recordings.total_records == 0 {
            info!("Not found any meets.");
            return Ok(report);
        }
        info!("Found meets total {}.", recordings.total_records);

        self.storage.authenticate().await?;
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let day_name = day_folder_name(self.run_date);
        let day_root_id = self
            .storage
            .create_folder(&day_name, &self.parent_dir_id)
            .await?;
        report.folders_created += 1;
        info!("Made a today directory in Google Drive: {}", day_name);

        let meeting_count = recordings.meetings.len();
        for (index, meeting) in recordings.meetings.iter().enumerate() {
            report.meetings += 1;
            info!(
                "Now process is {} [{}/{}]",
                meeting.uuid,
                index + 1,
                meeting_count
            );

            let mut folder = MeetingFolder::new(&meeting.topic, &day_root_id);
            for file in meeting.eligible_files() {
                report.eligible_files += 1;
                info!("Find video file [{}]", file.id);

                let outcome = transfer_recording(
                    &self.source,
                    &self.storage,
                    &token,
                    &self.scratch_dir,
                    file,
                    &mut folder,
                )
                .await;

                match outcome {
                    TransferOutcome::Uploaded { file_id, bytes } => {
                        debug!("Uploaded {} as {} ({} bytes)", file.id, file_id, bytes);
                        report.transferred += 1;
                    }
                    TransferOutcome::Failed(_) => report.failed += 1,
                }
            }

            if folder.is_created() {
                report.folders_created += 1;
            }
        }

        info!(
            "Finished: {} transferred, {} failed",
            report.transferred, report.failed
        );
        Ok(report)
    }
}

/// Run once for an external trigger. The event payload is not inspected.
pub async fn handle_invocation(
    config: &Config,
    event: &serde_json::Value,
) -> anyhow::Result<InvocationResponse> {
    debug!("Invocation event: {}", event);

    let source = ZoomClient::new(config.zoom.base_url.clone(), config.zoom_credentials()?);
    let storage = DriveClient::new(config.drive.clone());
    let job = SyncJob::new(
        source,
        storage,
        config.parent_dir_id()?,
        config.transfer.scratch_dir.clone(),
    );

    job.run().await?;
    Ok(InvocationResponse::no_content())
}
