//! Durable, append-only log of block accesses.
//!
//! The whole log is rewritten to disk on every logging call, through a
//! temporary file renamed over the old log so a crash mid-write leaves the
//! previous version intact. A log that cannot be read at startup is replaced
//! by an empty one.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::block::BlockId;

#[derive(Error, Debug)]
pub enum AccessLogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One block access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Seconds since the Unix epoch, shared by every event of one logging call.
    #[serde(rename = "ts")]
    pub timestamp: f64,

    pub block: BlockId,

    /// Query that touched the block. Older logs may not carry it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
}

pub struct AccessLogger {
    path: PathBuf,
    events: Mutex<Vec<AccessEvent>>,
}

impl AccessLogger {
    /// Open the log at `path`, loading existing events if they parse.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let events = if path.exists() {
            match Self::load(&path) {
                Ok(events) => {
                    debug!(path = %path.display(), events = events.len(), "Loaded access log");
                    events
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable access log, starting empty");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Self {
            path,
            events: Mutex::new(events),
        }
    }

    fn load(path: &Path) -> Result<Vec<AccessEvent>, AccessLogError> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event per block, all stamped with the current time, and
    /// rewrite the log file.
    ///
    /// The events stay in memory even when the write fails.
    pub fn log(&self, query_id: &str, blocks: &[BlockId]) -> Result<(), AccessLogError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        // The lock is held through the write so files land in append order.
        let mut events = self.events.lock();
        events.extend(blocks.iter().map(|&block| AccessEvent {
            timestamp,
            block,
            query_id: Some(query_id.to_string()),
        }));

        let data = serde_json::to_vec(&*events)?;
        self.replace_file(&data)?;
        Ok(())
    }

    fn replace_file(&self, data: &[u8]) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn get_all_events(&self) -> Vec<AccessEvent> {
        self.events.lock().clone()
    }

    pub fn get_last_n_events(&self, n: usize) -> Vec<AccessEvent> {
        let events = self.events.lock();
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Block ids of every event, in log order.
    pub fn block_sequence(&self) -> Vec<BlockId> {
        self.events.lock().iter().map(|e| e.block).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_shares_timestamp_and_persists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("access_log.json");

        let logger = AccessLogger::open(&path);
        logger.log("q1", &[3, 4, 5]).unwrap();

        let events = logger.get_all_events();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.timestamp == events[0].timestamp));
        assert!(events.iter().all(|e| e.query_id.as_deref() == Some("q1")));

        let reopened = AccessLogger::open(&path);
        assert_eq!(reopened.block_sequence(), vec![3, 4, 5]);
    }

    #[test]
    fn test_last_n_events() {
        let tmp = TempDir::new().unwrap();
        let logger = AccessLogger::open(tmp.path().join("log.json"));
        logger.log("q", &[1, 2]).unwrap();
        logger.log("q", &[3]).unwrap();

        let last: Vec<_> = logger.get_last_n_events(2).iter().map(|e| e.block).collect();
        assert_eq!(last, vec![2, 3]);
        assert_eq!(logger.get_last_n_events(10).len(), 3);
        assert!(logger.get_last_n_events(0).is_empty());
    }

    #[test]
    fn test_corrupt_log_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.json");
        std::fs::write(&path, b"{not json").unwrap();

        let logger = AccessLogger::open(&path);
        assert!(logger.is_empty());
    }

    #[test]
    fn test_loads_events_without_query_id() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.json");
        std::fs::write(&path, br#"[{"ts": 1.5, "block": 7}, {"ts": 1.5, "block": 8}]"#).unwrap();

        let logger = AccessLogger::open(&path);
        let events = logger.get_all_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].query_id, None);
        assert_eq!(logger.block_sequence(), vec![7, 8]);
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_replaces_file_instead_of_truncating() {
        use std::io::Read;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.json");
        let logger = AccessLogger::open(&path);
        logger.log("q", &[1, 2]).unwrap();

        // A handle on the old file keeps seeing the complete old contents.
        let mut old = std::fs::File::open(&path).unwrap();
        logger.log("q", &[3]).unwrap();
        let mut contents = String::new();
        old.read_to_string(&mut contents).unwrap();
        let old_events: Vec<AccessEvent> = serde_json::from_str(&contents).unwrap();
        assert_eq!(old_events.len(), 2);

        assert_eq!(AccessLogger::open(&path).block_sequence(), vec![1, 2, 3]);
        // No temporary files are left next to the log.
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_failure_keeps_events_in_memory() {
        let tmp = TempDir::new().unwrap();
        // A directory cannot be overwritten as a file.
        let logger = AccessLogger::open(tmp.path());
        assert!(logger.log("q", &[1]).is_err());
        assert_eq!(logger.len(), 1);
    }
}
