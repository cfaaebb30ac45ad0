use log::{debug, warn};
use snafu::{ResultExt, Snafu};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::AggregationResult;

#[derive(Debug, Snafu)]
pub enum LedgerError {
    #[snafu(display("Could not write the history file {}", path.display()))]
    WritingHistory {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Could not encode the history"))]
    EncodingHistory { source: serde_json::Error },
}

// Serializes every load-append-truncate-persist sequence of the process.
static LEDGER_LOCK: Mutex<()> = Mutex::new(());

/// The history as read from storage.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct LoadedHistory {
    pub entries: Vec<AggregationResult>,
    /// The file existed but could not be understood; it was treated as empty.
    pub corrupted: bool,
}

/// A short trailing log of aggregation results, oldest first, stored as a JSON array.
///
/// Entries are only ever appended at the end and dropped from the front.
#[derive(Debug)]
pub struct HistoryLedger {
    path: PathBuf,
    capacity: usize,
}

impl HistoryLedger {
    pub fn new(path: &Path, capacity: usize) -> HistoryLedger {
        HistoryLedger {
            path: path.to_path_buf(),
            capacity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the history. A missing or unreadable file is an empty history.
    pub fn load(&self) -> LoadedHistory {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("load: no history at {:?}", self.path);
                return LoadedHistory::default();
            }
            Err(e) => {
                warn!("load: could not read {:?}: {}", self.path, e);
                return LoadedHistory {
                    entries: Vec::new(),
                    corrupted: true,
                };
            }
        };
        match serde_json::from_str::<Vec<AggregationResult>>(&contents) {
            Ok(entries) => LoadedHistory {
                entries,
                corrupted: false,
            },
            Err(e) => {
                warn!("load: history {:?} is corrupted, starting over: {}", self.path, e);
                LoadedHistory {
                    entries: Vec::new(),
                    corrupted: true,
                }
            }
        }
    }

    fn save(&self, entries: &[AggregationResult]) -> Result<(), LedgerError> {
        let js = serde_json::to_string_pretty(entries).context(EncodingHistorySnafu {})?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, js).context(WritingHistorySnafu { path: tmp.clone() })?;
        fs::rename(&tmp, &self.path).context(WritingHistorySnafu {
            path: self.path.clone(),
        })?;
        Ok(())
    }

    /// Appends a result, keeps the last `capacity` entries, persists them and returns them.
    pub fn record(&self, result: AggregationResult) -> Result<Vec<AggregationResult>, LedgerError> {
        let _guard = LEDGER_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load().entries;
        entries.push(result);
        let excess = entries.len().saturating_sub(self.capacity);
        entries.drain(..excess);
        self.save(&entries)?;
        debug!("record: history now has {} entries", entries.len());
        Ok(entries)
    }
}
