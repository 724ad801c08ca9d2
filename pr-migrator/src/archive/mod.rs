//! Append-only archive and failure logs.
//!
//! All writes go through one background task that owns the log files, so
//! concurrent workers never interleave lines. Callers hold a cheap, cloneable
//! [`ArchiveWriter`] handle and wait for each append to be flushed.
//!
//! Layout of the log directory (JSON Lines):
//!
//! ```text
//! logs/
//! ├── closed_prs.jsonl      every archived pull request
//! ├── merged_prs.jsonl
//! ├── declined_prs.jsonl
//! ├── superseded_prs.jsonl
//! └── failed_prs.jsonl      failed records
//! ```

mod entry;
mod error;
mod writer;

pub use entry::{ArchiveEntry, FailedRecord};
pub use error::ArchiveError;

use crate::classify::ArchiveTag;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::info;
use writer::{Command, WriterTask};

/// Combined log of every archived pull request.
pub const COMBINED_LOG: &str = "closed_prs.jsonl";

/// Log of failed records.
pub const FAILED_LOG: &str = "failed_prs.jsonl";

/// File name of the per-tag archive log.
#[must_use]
pub fn tag_log(tag: ArchiveTag) -> String {
    format!("{tag}_prs.jsonl")
}

/// Handle to the single archive writer task.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    commands: mpsc::Sender<Command>,
    directory: PathBuf,
}

impl ArchiveWriter {
    /// Creates the log directory, loads already archived ids, and starts the
    /// writer task.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// archive log cannot be read.
    pub async fn spawn(directory: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| ArchiveError::Io {
                path: directory.display().to_string(),
                source: e,
            })?;

        let mut logged = writer::LoggedIds::new();
        let names = ArchiveTag::all()
            .into_iter()
            .map(tag_log)
            .chain([COMBINED_LOG.to_string()]);
        for name in names {
            let ids = writer::load_archived_ids(&directory.join(&name)).await?;
            logged.insert(name, ids);
        }
        info!(
            path = %directory.display(),
            already_archived = logged.get(COMBINED_LOG).map_or(0, |ids| ids.len()),
            "Archive writer started"
        );

        let (commands, receiver) = mpsc::channel(64);
        tokio::spawn(WriterTask::new(directory.clone(), logged).run(receiver));

        Ok(Self {
            commands,
            directory,
        })
    }

    /// Appends `entry` to the log of `tag` and to the combined log.
    ///
    /// Returns `false` without writing when the pull request is already in
    /// the combined log. After a partial failure a retry only completes the
    /// logs still missing the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or the writer task is gone.
    pub async fn archive(
        &self,
        entry: ArchiveEntry,
        tag: ArchiveTag,
    ) -> Result<bool, ArchiveError> {
        self.request(|reply| Command::Archive {
            entry: Box::new(entry),
            tag,
            reply,
        })
        .await?
    }

    /// Appends a failed record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or the writer task is gone.
    pub async fn record_failure(&self, record: FailedRecord) -> Result<(), ArchiveError> {
        self.request(|reply| Command::Fail {
            record: Box::new(record),
            reply,
        })
        .await?
    }

    /// Returns true when the pull request is already in the combined log.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer task is gone.
    pub async fn is_archived(&self, pr_id: u64) -> Result<bool, ArchiveError> {
        self.request(|reply| Command::Contains { pr_id, reply }).await
    }

    /// Directory holding the logs.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ArchiveError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| ArchiveError::WriterClosed)?;
        response.await.map_err(|_| ArchiveError::WriterClosed)
    }
}
