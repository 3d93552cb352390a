//! JSON Lines store for deferred orders.
//!
//! - Each mutation appends the full record as one line and flushes
//! - Opening replays the log (last line per id wins) and rewrites it
//! - The log is rewritten again once it outgrows the live record set
//!
//! Rewrites go through a temp file and a rename, so a crash mid-rewrite
//! leaves the previous log intact. In-memory state only changes after its
//! line is on disk. A failed append leaves the writer dirty, and the next
//! append rewrites the log from memory before writing.

use crate::error::PersistenceResult;
use crate::record::{truncate_error, DeferredOrderRecord, DeferredStatus};
use chrono::Utc;
use dhan_core::Price;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Appended lines before a rewrite is considered.
pub const DEFAULT_COMPACT_THRESHOLD: usize = 1_000;

struct StoreInner {
    path: PathBuf,
    records: HashMap<String, DeferredOrderRecord>,
    writer: BufWriter<File>,
    lines_in_log: usize,
    compact_threshold: usize,
    /// Last append failed; the log tail may hold a partial line.
    dirty: bool,
    /// Appends to let through, then appends to fail.
    #[cfg(any(test, feature = "test-utils"))]
    injected_failures: (usize, usize),
}

/// Deferred order store. All access is serialized by one mutex.
pub struct DeferredStore {
    inner: Mutex<StoreInner>,
}

impl DeferredStore {
    /// Open (or create) the log at `path` and replay it.
    ///
    /// # Arguments
    /// * `path` - JSON Lines file
    /// * `compact_threshold` - Appended lines before a rewrite is considered
    pub fn open(path: impl AsRef<Path>, compact_threshold: usize) -> PersistenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let (records, replayed) = replay(&path)?;
        let writer = rewrite(&path, &records)?;
        info!(
            path = %path.display(),
            records = records.len(),
            lines = replayed,
            "Deferred store opened"
        );

        Ok(Self {
            inner: Mutex::new(StoreInner {
                lines_in_log: records.len(),
                path,
                records,
                writer,
                compact_threshold: compact_threshold.max(1),
                dirty: false,
                #[cfg(any(test, feature = "test-utils"))]
                injected_failures: (0, 0),
            }),
        })
    }

    pub fn insert(&self, record: DeferredOrderRecord) -> PersistenceResult<()> {
        let mut inner = self.inner.lock();
        inner.append(&record)?;
        debug!(id = %record.id, symbol = %record.symbol, "Deferred order stored");
        inner.records.insert(record.id.clone(), record);
        inner.maybe_compact();
        Ok(())
    }

    /// Pending records, oldest first.
    pub fn list_pending(&self) -> Vec<DeferredOrderRecord> {
        let inner = self.inner.lock();
        let mut pending: Vec<_> = inner
            .records
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending
    }

    pub fn get(&self, id: &str) -> Option<DeferredOrderRecord> {
        self.inner.lock().records.get(id).cloned()
    }

    /// Every record, newest first.
    pub fn list_all(&self) -> Vec<DeferredOrderRecord> {
        let inner = self.inner.lock();
        let mut all: Vec<_> = inner.records.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record the latest observed price of a pending order.
    ///
    /// # Returns
    /// `false` if the id is unknown or the record is already terminal.
    pub fn update_last_price(&self, id: &str, price: Price) -> PersistenceResult<bool> {
        self.mutate_pending(id, |record| record.last_price = Some(price))
    }

    /// Move a pending record to `placed`.
    pub fn mark_placed(&self, id: &str, order_id: &str) -> PersistenceResult<bool> {
        self.mutate_pending(id, |record| {
            record.status = DeferredStatus::Placed;
            record.order_id = Some(order_id.to_string());
            record.error = None;
        })
    }

    /// Move a pending record to `failed`, keeping a truncated message.
    pub fn mark_failed(&self, id: &str, error: &str) -> PersistenceResult<bool> {
        self.mutate_pending(id, |record| {
            record.status = DeferredStatus::Failed;
            record.error = Some(truncate_error(error));
        })
    }

    /// Drop every record.
    ///
    /// # Returns
    /// Number of records removed.
    pub fn clear(&self) -> PersistenceResult<usize> {
        let mut inner = self.inner.lock();
        let removed = inner.records.len();
        inner.records.clear();
        inner.compact()?;
        info!(removed, "Deferred store cleared");
        Ok(removed)
    }

    fn mutate_pending<F>(&self, id: &str, apply: F) -> PersistenceResult<bool>
    where
        F: FnOnce(&mut DeferredOrderRecord),
    {
        let mut inner = self.inner.lock();
        let Some(mut updated) = inner.records.get(id).filter(|r| r.is_pending()).cloned() else {
            return Ok(false);
        };
        apply(&mut updated);
        updated.updated_at = Utc::now();
        inner.append(&updated)?;
        inner.records.insert(updated.id.clone(), updated);
        inner.maybe_compact();
        Ok(true)
    }

    /// Let the next `skip` appends through, then fail `count` with an IO error.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn fail_appends(&self, skip: usize, count: usize) {
        self.inner.lock().injected_failures = (skip, count);
    }
}

impl StoreInner {
    fn append(&mut self, record: &DeferredOrderRecord) -> PersistenceResult<()> {
        let line = serde_json::to_string(record)?;
        if self.dirty {
            self.compact()?;
        }
        if let Err(e) = self.write_line(&line) {
            self.dirty = true;
            warn!(id = %record.id, error = %e, "Deferred log append failed");
            return Err(e.into());
        }
        self.lines_in_log += 1;
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        #[cfg(any(test, feature = "test-utils"))]
        match &mut self.injected_failures {
            (skip @ 1.., _) => *skip -= 1,
            (0, count @ 1..) => {
                *count -= 1;
                return Err(std::io::Error::other("injected append failure"));
            }
            _ => {}
        }
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }

    /// Rewrite once the log outgrows the live set. The appended line is
    /// already durable, so a failed rewrite is only logged.
    fn maybe_compact(&mut self) {
        let limit = self.compact_threshold.max(self.records.len() * 2);
        if self.lines_in_log >= limit {
            if let Err(e) = self.compact() {
                warn!(path = %self.path.display(), error = %e, "Deferred log compaction failed");
            }
        }
    }

    /// Rewrite the log from memory. Anything still buffered in the old
    /// writer is discarded with it.
    fn compact(&mut self) -> PersistenceResult<()> {
        let before = self.lines_in_log;
        self.writer = rewrite(&self.path, &self.records)?;
        self.lines_in_log = self.records.len();
        self.dirty = false;
        debug!(before, after = self.lines_in_log, "Deferred log compacted");
        Ok(())
    }
}

/// Read the log, keeping the last line per id. Corrupt lines are skipped.
fn replay(path: &Path) -> PersistenceResult<(HashMap<String, DeferredOrderRecord>, usize)> {
    let mut records = HashMap::new();
    if !path.exists() {
        return Ok((records, 0));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut lines = 0usize;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        lines += 1;
        match serde_json::from_str::<DeferredOrderRecord>(&line) {
            Ok(record) => {
                records.insert(record.id.clone(), record);
            }
            Err(e) => warn!(line = idx + 1, error = %e, "Skipping corrupt deferred record"),
        }
    }
    Ok((records, lines))
}

/// Write `records` to a temp file, move it over `path`, and reopen for append.
fn rewrite(
    path: &Path,
    records: &HashMap<String, DeferredOrderRecord>,
) -> PersistenceResult<BufWriter<File>> {
    let tmp_path = path.with_extension("jsonl.tmp");
    {
        let mut tmp = BufWriter::new(File::create(&tmp_path)?);
        let mut ordered: Vec<_> = records.values().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        for record in ordered {
            writeln!(tmp, "{}", serde_json::to_string(record)?)?;
        }
        tmp.flush()?;
        tmp.get_ref().sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}
