//! The task that owns the log files.

use super::{tag_log, ArchiveEntry, ArchiveError, FailedRecord, COMBINED_LOG, FAILED_LOG};
use crate::classify::ArchiveTag;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Requests accepted by the writer task.
#[derive(Debug)]
pub(super) enum Command {
    Archive {
        entry: Box<ArchiveEntry>,
        tag: ArchiveTag,
        reply: oneshot::Sender<Result<bool, ArchiveError>>,
    },
    Fail {
        record: Box<FailedRecord>,
        reply: oneshot::Sender<Result<(), ArchiveError>>,
    },
    Contains {
        pr_id: u64,
        reply: oneshot::Sender<bool>,
    },
}

/// Ids already present in each archive log, keyed by file name.
pub(super) type LoggedIds = HashMap<String, HashSet<u64>>;

pub(super) struct WriterTask {
    directory: PathBuf,
    logged: LoggedIds,
    files: HashMap<String, File>,
}

impl WriterTask {
    pub(super) fn new(directory: PathBuf, logged: LoggedIds) -> Self {
        Self {
            directory,
            logged,
            files: HashMap::new(),
        }
    }

    fn is_logged(&self, name: &str, pr_id: u64) -> bool {
        self.logged
            .get(name)
            .is_some_and(|ids| ids.contains(&pr_id))
    }

    pub(super) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Archive { entry, tag, reply } => {
                    let _ = reply.send(self.archive(&entry, tag).await);
                }
                Command::Fail { record, reply } => {
                    let _ = reply.send(self.append_json(FAILED_LOG, &*record).await);
                }
                Command::Contains { pr_id, reply } => {
                    let _ = reply.send(self.is_logged(COMBINED_LOG, pr_id));
                }
            }
        }
        debug!("Archive writer stopped");
    }

    async fn archive(
        &mut self,
        entry: &ArchiveEntry,
        tag: ArchiveTag,
    ) -> Result<bool, ArchiveError> {
        let pr_id = entry.pull_request.id;
        if self.is_logged(COMBINED_LOG, pr_id) {
            debug!(pr_id, "Already archived");
            return Ok(false);
        }

        // Each file is idempotent on its own; a retry after a partial write
        // only appends where the id is still missing.
        for name in [tag_log(tag), COMBINED_LOG.to_string()] {
            if self.is_logged(&name, pr_id) {
                continue;
            }
            self.append_json(&name, entry).await?;
            self.logged.entry(name).or_default().insert(pr_id);
        }
        Ok(true)
    }

    async fn append_json<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
    ) -> Result<(), ArchiveError> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');

        let path = self.directory.join(name);
        let result = self.append_line(name, &path, &line).await;
        if result.is_err() {
            self.files.remove(name);
        }
        result.map_err(|e| ArchiveError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    async fn append_line(&mut self, name: &str, path: &Path, line: &str) -> std::io::Result<()> {
        if !self.files.contains_key(name) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            self.files.insert(name.to_string(), file);
        }

        let Some(file) = self.files.get_mut(name) else {
            return Err(std::io::Error::other("log file handle missing"));
        };
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

/// Reads the ids of every pull request in an existing archive log.
/// Malformed lines are skipped with a warning.
pub(super) async fn load_archived_ids(path: &Path) -> Result<HashSet<u64>, ArchiveError> {
    let io_error = |e: std::io::Error| ArchiveError::Io {
        path: path.display().to_string(),
        source: e,
    };

    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(io_error(e)),
    };

    let mut ids = HashSet::new();
    let mut lines = BufReader::new(file).lines();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await.map_err(io_error)? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let id = serde_json::from_str::<serde_json::Value>(&line)
            .ok()
            .and_then(|value| value.get("id").and_then(serde_json::Value::as_u64));

        match id {
            Some(id) => {
                ids.insert(id);
            }
            None => warn!(
                path = %path.display(),
                line = line_number,
                "Skipping malformed archive entry"
            ),
        }
    }

    Ok(ids)
}
