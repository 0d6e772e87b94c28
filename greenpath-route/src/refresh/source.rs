//! Snapshot sources for the background refresh loop.
//!
//! The raw ingestion of upstream provider data is an external concern;
//! the loop only needs something it can poll. `FileAqiSource` covers the
//! common deployment where the ingestion process drops a JSON document on
//! shared storage and this service picks it up on its refresh interval.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Deserialize;

use super::AqiSnapshot;

/// Something the refresh loop can poll for a new snapshot. `Ok(None)`
/// means nothing new is available; staleness of re-delivered snapshots is
/// the coordinator's concern, not the source's.
pub trait AqiSource: Send + Sync {
    fn poll(&self) -> anyhow::Result<Option<AqiSnapshot>>;
}

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    taken_at: DateTime<Utc>,
    values: FxHashMap<String, f32>,
}

/// Reads a snapshot document from a fixed path on every poll. A missing
/// file is "nothing new yet", not an error; anything else unreadable is.
#[derive(Debug)]
pub struct FileAqiSource {
    path: PathBuf,
}

impl FileAqiSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl AqiSource for FileAqiSource {
    fn poll(&self) -> anyhow::Result<Option<AqiSnapshot>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("cannot open {}", self.path.display()))
            }
        };
        let parsed: SnapshotFile = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("cannot parse {}", self.path.display()))?;
        Ok(Some(AqiSnapshot {
            taken_at: parsed.taken_at,
            values: parsed.values,
        }))
    }
}
