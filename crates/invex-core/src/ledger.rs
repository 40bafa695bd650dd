//! Persisted usage ledger backing the rolling weekly quota.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::LedgerError;

/// Rolling usage window, in days.
const WINDOW_DAYS: i64 = 7;

/// Store of per-invoice processing timestamps.
///
/// The interface is injectable so the file-backed store can later be
/// swapped for an atomic-increment counter without touching the quota
/// gate. Counts are best-effort: this is a soft cap, not a security
/// boundary.
pub trait UsageStore {
    /// Number of invoices processed in the trailing 7-day window.
    fn weekly_count(&self) -> Result<usize, LedgerError>;

    /// Record `n` invoices as processed now. Must be called with the
    /// count of records actually kept, never the attempted image count.
    fn record_usage(&self, n: usize) -> Result<(), LedgerError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    timestamps: Vec<DateTime<Utc>>,
}

/// File-backed ledger: a single JSON document of ISO-8601 timestamps.
///
/// The file is re-read on every query so concurrent writers are picked
/// up at best effort. There is no locking; interleaved read-modify-write
/// cycles can lose updates. Documented and accepted for a soft quota.
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    /// Create a ledger at the given file path. Nothing is touched on
    /// disk until the first query or write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<LedgerFile, LedgerError> {
        if !self.path.exists() {
            return Ok(LedgerFile::default());
        }
        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| LedgerError::Corrupt(e.to_string()))
    }

    fn save(&self, ledger: &LedgerFile) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(ledger)
            .map_err(|e| LedgerError::Corrupt(e.to_string()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl UsageStore for FileLedger {
    fn weekly_count(&self) -> Result<usize, LedgerError> {
        let ledger = self.load()?;
        let cutoff = Utc::now() - Duration::days(WINDOW_DAYS);

        let retained: Vec<DateTime<Utc>> = ledger
            .timestamps
            .iter()
            .copied()
            .filter(|timestamp| *timestamp > cutoff)
            .collect();

        let pruned = ledger.timestamps.len() - retained.len();
        if pruned > 0 {
            debug!("pruning {} stale ledger entries", pruned);
            let count = retained.len();
            // The count in memory is already correct; a failed rewrite
            // just leaves the pruning for the next successful write.
            if let Err(e) = self.save(&LedgerFile { timestamps: retained }) {
                warn!("failed to rewrite pruned ledger: {}", e);
            }
            return Ok(count);
        }

        Ok(retained.len())
    }

    fn record_usage(&self, n: usize) -> Result<(), LedgerError> {
        let mut ledger = match self.load() {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("starting fresh ledger after load failure: {}", e);
                LedgerFile::default()
            }
        };

        let now = Utc::now();
        ledger.timestamps.extend(std::iter::repeat_n(now, n));
        self.save(&ledger)
    }
}
