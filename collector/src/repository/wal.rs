//! Write-ahead log of update sets.
//!
//! Each update set becomes one JSON file under
//! `<root>/<cluster_id>/controller/`, named by its timestamp in a fixed-width
//! UTC format. A second set with an already-written timestamp gets a `-<seq>`
//! suffix; existing entries are never rewritten.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tally_common::types::update::{Update, UpdateSet};
use time::{
    OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, instrument, warn};

use super::{Repository, Updater};
use crate::{error::WalError, metrics};

const EVENT_NAME: &str = "controller";
const EXTENSION: &str = "json";

const STEM_FORMAT: &[BorrowedFormatItem<'_>] = format_description!(
    "[year][month][day]T[hour][minute][second][subsecond digits:9]Z"
);

#[derive(Serialize)]
struct EntryRef<'a> {
    updates: &'a [Update],
}

#[derive(Deserialize)]
struct Entry {
    updates: Vec<Update>,
}

/// File stem for the `seq`-th entry written at `timestamp`.
pub fn file_stem(timestamp: OffsetDateTime, seq: u32) -> Result<String, time::error::Format> {
    let stem = timestamp.to_offset(UtcOffset::UTC).format(STEM_FORMAT)?;
    Ok(match seq {
        0 => stem,
        seq => format!("{stem}-{seq}"),
    })
}

/// Timestamp and sequence number encoded in a WAL file stem.
pub fn parse_stem(stem: &str) -> Option<(OffsetDateTime, u32)> {
    let (timestamp, seq) = match stem.split_once('-') {
        Some((timestamp, seq)) if !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_digit()) => {
            (timestamp, seq.parse().ok()?)
        }
        Some(_) => return None,
        None => (stem, 0),
    };
    let timestamp = PrimitiveDateTime::parse(timestamp, STEM_FORMAT)
        .ok()?
        .assume_utc();
    Some((timestamp, seq))
}

#[derive(Debug)]
pub struct Wal {
    dir: PathBuf,
    repository: Arc<Repository>,
}

impl Wal {
    pub fn new(root: impl AsRef<Path>, cluster_id: &str, repository: Arc<Repository>) -> Self {
        Self {
            dir: root.as_ref().join(cluster_id).join(EVENT_NAME),
            repository,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    /// Apply `set` to the repository, then persist it. The repository is
    /// authoritative: a failed write is logged and otherwise ignored.
    pub async fn update(&self, set: &UpdateSet) {
        self.repository.update(set);
        if let Err(error) = self.write(set).await {
            error!(%error, timestamp = %set.timestamp, "failed to write WAL entry");
            metrics::record_wal_write_failure();
        }
    }

    async fn write(&self, set: &UpdateSet) -> Result<PathBuf, WalError> {
        let body = serde_json::to_vec(&EntryRef {
            updates: &set.updates,
        })
        .map_err(|e| WalError::json(&self.dir, e))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| WalError::io(&self.dir, e))?;
        let mut seq = 0;
        let (path, mut file) = loop {
            let stem = file_stem(set.timestamp, seq)
                .map_err(|e| WalError::io(&self.dir, io::Error::other(e)))?;
            let path = self.dir.join(format!("{stem}.{EXTENSION}"));
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    seq = seq.checked_add(1).ok_or_else(|| {
                        WalError::io(&path, io::Error::other("entry sequence exhausted"))
                    })?;
                }
                Err(e) => return Err(WalError::io(&path, e)),
            }
        };
        file.write_all(&body)
            .await
            .map_err(|e| WalError::io(&path, e))?;
        file.flush().await.map_err(|e| WalError::io(&path, e))?;
        debug!(path = %path.display(), seq, updates = set.len(), "wrote WAL entry");
        Ok(path)
    }

    /// Entries on disk, oldest first, in write order within one timestamp. A
    /// missing directory has no entries.
    async fn entries(&self) -> Result<Vec<(OffsetDateTime, PathBuf)>, WalError> {
        let mut read_dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WalError::io(&self.dir, e)),
        };
        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| WalError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()).and_then(parse_stem) {
                Some(key) => entries.push((key, path)),
                None => warn!(path = %path.display(), "ignoring WAL file with unparseable name"),
            }
        }
        entries.sort_unstable_by_key(|(key, _)| *key);
        Ok(entries
            .into_iter()
            .map(|((timestamp, _), path)| (timestamp, path))
            .collect())
    }

    async fn read(path: &Path) -> Result<Vec<Update>, WalError> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|e| WalError::io(path, e))?;
        let entry: Entry = serde_json::from_slice(&body).map_err(|e| WalError::json(path, e))?;
        Ok(entry.updates)
    }

    /// Replay every entry still inside some resolution's retention, in
    /// timestamp order. Unreadable entries are skipped. Returns the number of
    /// entries replayed.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn restore(&self) -> Result<usize, WalError> {
        let limit = self.repository.min_limit();
        let mut restored = 0;
        for (timestamp, path) in self.entries().await? {
            if timestamp < limit {
                continue;
            }
            match Self::read(&path).await {
                Ok(updates) => {
                    self.repository.update(&UpdateSet::new(timestamp, updates));
                    restored += 1;
                }
                Err(error) => warn!(%error, "skipping unreadable WAL entry"),
            }
        }
        info!(restored, %limit, "restored WAL");
        Ok(restored)
    }

    /// Remove entries older than every resolution's retention limit. Returns
    /// the number of files removed.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn clean(&self) -> Result<usize, WalError> {
        let limit = self.repository.min_limit();
        let mut removed = 0;
        for (_, path) in self
            .entries()
            .await?
            .into_iter()
            .take_while(|(timestamp, _)| *timestamp < limit)
        {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(error = %WalError::io(&path, e), "failed to remove WAL entry"),
            }
        }
        if removed > 0 {
            info!(removed, %limit, "cleaned WAL");
        }
        Ok(removed)
    }
}

#[async_trait]
impl Updater for Wal {
    async fn update(&self, set: UpdateSet) {
        Wal::update(self, &set).await;
    }
}
