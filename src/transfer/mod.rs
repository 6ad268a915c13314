//! Per-file transfer: download to a scratch file, upload it into the meeting
//! folder, remove the scratch file.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::sync::{FolderStore, RecordingSource};
use crate::token::AccessToken;
use crate::zoom::RecordingFile;

/// Local staging file for one recording. Removed when dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed scratch file {:?}", self.path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove scratch file {:?}: {err}", self.path),
        }
    }
}

/// Destination folder for one meeting, created on first use.
///
/// Folders are never looked up on the remote side: each `MeetingFolder`
/// creates at most one new folder.
pub struct MeetingFolder<'a> {
    topic: &'a str,
    day_root_id: &'a str,
    id: Option<String>,
}

impl<'a> MeetingFolder<'a> {
    pub fn new(topic: &'a str, day_root_id: &'a str) -> Self {
        Self {
            topic,
            day_root_id,
            id: None,
        }
    }

    pub fn is_created(&self) -> bool {
        self.id.is_some()
    }

    async fn resolve<D>(&mut self, storage: &D) -> SyncResult<&str>
    where
        D: FolderStore + ?Sized,
    {
        let id = match self.id.take() {
            Some(id) => id,
            None => storage.create_folder(self.topic, self.day_root_id).await?,
        };
        Ok(self.id.insert(id).as_str())
    }
}

#[derive(Debug)]
pub enum TransferOutcome {
    Uploaded { file_id: String, bytes: u64 },
    Failed(SyncError),
}

/// Scratch file name for `file`, or `None` when its id is not a single plain
/// file name (empty, `..`, absolute, or containing a separator).
fn scratch_name_for(file: &RecordingFile) -> Option<String> {
    let id = Path::new(&file.id);
    if id.file_name() == Some(OsStr::new(&file.id)) {
        Some(file.scratch_name())
    } else {
        None
    }
}

/// Copy one recording file. Failures are logged and returned as
/// [`TransferOutcome::Failed`]; they never abort the caller.
pub async fn transfer_recording<S, D>(
    source: &S,
    storage: &D,
    token: &AccessToken,
    scratch_dir: &Path,
    file: &RecordingFile,
    folder: &mut MeetingFolder<'_>,
) -> TransferOutcome
where
    S: RecordingSource + ?Sized,
    D: FolderStore + ?Sized,
{
    let Some(name) = scratch_name_for(file) else {
        warn!("Skipping recording with unusable id [{}]", file.id);
        return TransferOutcome::Failed(SyncError::Transfer(format!(
            "Recording id {:?} is not a plain file name",
            file.id
        )));
    };
    let scratch = ScratchFile::new(scratch_dir, &name);

    match copy_through(source, storage, token, &scratch, file, folder).await {
        Ok((file_id, bytes)) => TransferOutcome::Uploaded { file_id, bytes },
        Err(err) => {
            match &err {
                SyncError::Storage(_) => {
                    error!("Failed upload to Google Drive [{}]: {}", name, err)
                }
                _ => error!("Exception [{}]: {}", name, err),
            }
            TransferOutcome::Failed(err)
        }
    }
}

async fn copy_through<S, D>(
    source: &S,
    storage: &D,
    token: &AccessToken,
    scratch: &ScratchFile,
    file: &RecordingFile,
    folder: &mut MeetingFolder<'_>,
) -> SyncResult<(String, u64)>
where
    S: RecordingSource + ?Sized,
    D: FolderStore + ?Sized,
{
    let bytes = source.download(token, file, scratch.path()).await?;

    let name = file.scratch_name();
    info!("Starting upload file {}", name);
    let folder_id = folder.resolve(storage).await?;
    let file_id = storage.upload_file(scratch.path(), folder_id).await?;
    info!("File upload to Google Drive completed [{}]", name);

    Ok((file_id, bytes))
}
