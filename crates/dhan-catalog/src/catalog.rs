//! Instrument catalog.
//!
//! Resolves symbols (optionally narrowed by strike/expiry/option type) to
//! `InstrumentDescriptor`s. Two modes:
//! - in-memory: the whole master is parsed once into an immutable
//!   `Snapshot` with symbol, security-id and derivative indexes
//! - streaming: nothing is kept up front; lookups scan the file in chunks
//!   and remember what they found in a bounded per-symbol cache
//!
//! Snapshots are swapped wholesale behind an `RwLock<Option<Arc<_>>>`, so
//! readers clone the `Arc` and never observe a half-built index.

use crate::config::{CatalogConfig, CatalogMode};
use crate::error::{CatalogError, CatalogResult};
use crate::master::MasterReader;
use crate::refresher::{master_age, MasterRefresher};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use dhan_core::{ContractFilter, ExchangeSegment, InstrumentDescriptor, OptionType, Venue};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Compound key for derivative lookups.
type ContractKey = (String, Decimal, NaiveDate, OptionType);

/// Load statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogStats {
    pub mode: CatalogMode,
    pub rows_indexed: usize,
    pub rows_skipped: usize,
    pub duplicate_ids: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Immutable index set built from one master file.
#[derive(Debug)]
struct Snapshot {
    /// Empty in streaming mode.
    table: Vec<InstrumentDescriptor>,
    by_symbol: HashMap<String, Vec<usize>>,
    by_security_id: HashMap<(ExchangeSegment, String), usize>,
    derivatives: HashMap<ContractKey, usize>,
    stats: CatalogStats,
}

impl Snapshot {
    fn empty(mode: CatalogMode) -> Self {
        Self {
            table: Vec::new(),
            by_symbol: HashMap::new(),
            by_security_id: HashMap::new(),
            derivatives: HashMap::new(),
            stats: CatalogStats {
                mode,
                rows_indexed: 0,
                rows_skipped: 0,
                duplicate_ids: 0,
                loaded_at: Utc::now(),
            },
        }
    }

    fn build(config: &CatalogConfig) -> CatalogResult<Self> {
        let mut snapshot = Self::empty(CatalogMode::InMemory);
        let mut reader = MasterReader::open(&config.master_path)?;

        for row in reader.rows() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed master record");
                    snapshot.stats.rows_skipped += 1;
                    continue;
                }
            };
            let inst = match row.to_descriptor() {
                Ok(inst) => inst,
                Err(reason) => {
                    debug!(?reason, symbol = %row.symbol_name, "Skipping master row");
                    snapshot.stats.rows_skipped += 1;
                    continue;
                }
            };
            snapshot.insert(inst);
        }

        snapshot.stats.rows_indexed = snapshot.table.len();
        Ok(snapshot)
    }

    fn insert(&mut self, inst: InstrumentDescriptor) {
        let id_key = (inst.segment, inst.security_id.clone());
        if self.by_security_id.contains_key(&id_key) {
            warn!(
                segment = %inst.segment,
                security_id = %inst.security_id,
                symbol = %inst.symbol,
                "Duplicate security id in master, keeping first"
            );
            self.stats.duplicate_ids += 1;
            self.stats.rows_skipped += 1;
            return;
        }

        let idx = self.table.len();
        self.by_security_id.insert(id_key, idx);
        self.by_symbol.entry(inst.symbol.clone()).or_default().push(idx);

        if let (Some(strike), Some(expiry), Some(option)) =
            (inst.strike, inst.expiry, inst.option_type)
        {
            let strike = strike.normalize();
            if let Some(underlying) = &inst.underlying {
                self.derivatives
                    .entry((underlying.clone(), strike, expiry, option))
                    .or_insert(idx);
            }
            self.derivatives
                .entry((inst.symbol.clone(), strike, expiry, option))
                .or_insert(idx);
        }

        self.table.push(inst);
    }

    fn first_for_symbol(&self, key: &str) -> Option<&InstrumentDescriptor> {
        self.by_symbol
            .get(key)
            .and_then(|idxs| idxs.first())
            .map(|&i| &self.table[i])
    }

    fn on_venue(&self, key: &str, venue: Venue) -> Option<&InstrumentDescriptor> {
        let idxs = self.by_symbol.get(key)?;
        idxs.iter()
            .map(|&i| &self.table[i])
            .find(|inst| inst.venue == venue)
            .or_else(|| idxs.first().map(|&i| &self.table[i]))
    }
}

struct CatalogInner {
    config: CatalogConfig,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    /// Streaming-mode cache: symbol key -> every row whose symbol or underlying matches.
    stream_cache: DashMap<String, Arc<Vec<InstrumentDescriptor>>>,
}

/// Shared instrument catalog. Cheap to clone.
#[derive(Clone)]
pub struct InstrumentCatalog {
    inner: Arc<CatalogInner>,
}

impl InstrumentCatalog {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            inner: Arc::new(CatalogInner {
                config,
                snapshot: RwLock::new(None),
                stream_cache: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.inner.config
    }

    pub fn mode(&self) -> CatalogMode {
        self.inner.config.mode
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.snapshot.read().is_some()
    }

    /// Stats of the current snapshot, if loaded.
    pub fn stats(&self) -> Option<CatalogStats> {
        self.snapshot().map(|s| s.stats.clone())
    }

    /// Whether the master is missing or older than `max_age`.
    pub fn is_stale(&self) -> bool {
        match master_age(&self.inner.config.master_path) {
            Some(age) => age > self.inner.config.max_age(),
            None => true,
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Refresh the master if stale (and allowed), then rebuild indexes.
    ///
    /// A failed refresh falls back to the existing file when there is one.
    pub async fn load(&self) -> CatalogResult<CatalogStats> {
        let config = &self.inner.config;
        if config.auto_refresh && self.is_stale() {
            let refresher = MasterRefresher::new(
                config.source_url.clone(),
                config.master_path.clone(),
                Duration::from_secs(config.download_timeout_secs),
            )?;
            if let Err(e) = refresher.refresh().await {
                if config.master_path.exists() {
                    warn!(error = %e, "Master refresh failed, loading stale file");
                } else {
                    return Err(e);
                }
            }
        }

        let catalog = self.clone();
        tokio::task::spawn_blocking(move || catalog.load_blocking())
            .await
            .map_err(|e| CatalogError::Task(e.to_string()))?
    }

    /// Rebuild indexes from the local file without any refresh.
    pub fn load_blocking(&self) -> CatalogResult<CatalogStats> {
        let config = &self.inner.config;
        if !config.master_path.exists() {
            return Err(CatalogError::MasterMissing(config.master_path.clone()));
        }

        let snapshot = match config.mode {
            CatalogMode::InMemory => Snapshot::build(config)?,
            CatalogMode::Streaming => Snapshot::empty(CatalogMode::Streaming),
        };
        let stats = snapshot.stats.clone();

        self.inner.stream_cache.clear();
        *self.inner.snapshot.write() = Some(Arc::new(snapshot));

        info!(
            mode = ?stats.mode,
            rows = stats.rows_indexed,
            skipped = stats.rows_skipped,
            duplicates = stats.duplicate_ids,
            path = %config.master_path.display(),
            "Instrument catalog loaded"
        );
        Ok(stats)
    }

    /// Load once. Concurrent first loads both build; the last swap wins.
    pub async fn ensure_loaded(&self) -> CatalogResult<()> {
        if self.is_loaded() {
            return Ok(());
        }
        self.load().await.map(|_| ())
    }

    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.read().clone()
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// First listing of `symbol` in file order.
    pub fn lookup_by_symbol(&self, symbol: &str) -> CatalogResult<Option<InstrumentDescriptor>> {
        let key = normalize_symbol(symbol);
        if key.is_empty() {
            return Ok(None);
        }
        match self.mode() {
            CatalogMode::InMemory => Ok(self
                .snapshot()
                .and_then(|s| s.first_for_symbol(&key).cloned())),
            CatalogMode::Streaming => Ok(self
                .stream_candidates(&key)?
                .iter()
                .find(|inst| inst.symbol == key)
                .cloned()),
        }
    }

    /// Listing of `symbol` on `venue`, else its first listing.
    pub fn lookup_on_exchange(
        &self,
        symbol: &str,
        venue: Venue,
    ) -> CatalogResult<Option<InstrumentDescriptor>> {
        let key = normalize_symbol(symbol);
        if key.is_empty() {
            return Ok(None);
        }
        match self.mode() {
            CatalogMode::InMemory => Ok(self.snapshot().and_then(|s| s.on_venue(&key, venue).cloned())),
            CatalogMode::Streaming => {
                let candidates = self.stream_candidates(&key)?;
                let listings: Vec<&InstrumentDescriptor> =
                    candidates.iter().filter(|inst| inst.symbol == key).collect();
                Ok(listings
                    .iter()
                    .find(|inst| inst.venue == venue)
                    .or(listings.first())
                    .map(|inst| (*inst).clone()))
            }
        }
    }

    /// Instrument with `security_id` on `segment`.
    pub fn lookup_security_id(
        &self,
        segment: ExchangeSegment,
        security_id: &str,
    ) -> CatalogResult<Option<InstrumentDescriptor>> {
        let id = security_id.trim();
        match self.mode() {
            CatalogMode::InMemory => Ok(self.snapshot().and_then(|s| {
                s.by_security_id
                    .get(&(segment, id.to_string()))
                    .map(|&i| s.table[i].clone())
            })),
            CatalogMode::Streaming => {
                self.scan_first(|inst| inst.segment == segment && inst.security_id == id)
            }
        }
    }

    /// Resolve a symbol narrowed by contract details.
    ///
    /// With all three disambiguators the compound index is tried first; then
    /// a linear filter over symbol-or-underlying matches applies whichever
    /// disambiguators are present. An empty filter is a plain symbol lookup.
    pub fn lookup_by_details(
        &self,
        symbol: &str,
        filter: &ContractFilter,
    ) -> CatalogResult<Option<InstrumentDescriptor>> {
        if filter.is_empty() {
            return self.lookup_by_symbol(symbol);
        }
        let key = normalize_symbol(symbol);
        if key.is_empty() {
            return Ok(None);
        }

        let matches = |inst: &InstrumentDescriptor| {
            inst.matches_symbol(&key)
                && inst.matches_contract(filter.strike, filter.expiry, filter.option_type)
        };

        match self.mode() {
            CatalogMode::InMemory => {
                let Some(snapshot) = self.snapshot() else {
                    return Ok(None);
                };
                if let (Some(strike), Some(expiry), Some(option)) =
                    (filter.strike, filter.expiry, filter.option_type)
                {
                    let compound = (key.clone(), strike.normalize(), expiry, option);
                    if let Some(&idx) = snapshot.derivatives.get(&compound) {
                        return Ok(Some(snapshot.table[idx].clone()));
                    }
                }
                if !snapshot.table.is_empty() {
                    return Ok(snapshot.table.iter().find(|inst| matches(inst)).cloned());
                }
                self.scan_first(matches)
            }
            CatalogMode::Streaming => Ok(self
                .stream_candidates(&key)?
                .iter()
                .find(|inst| matches(inst))
                .cloned()),
        }
    }

    /// Resolve either way, preferring `venue` for plain symbol lookups.
    ///
    /// Streaming lookups may scan the file, so this runs on the blocking pool.
    pub async fn resolve(
        &self,
        symbol: &str,
        filter: Option<ContractFilter>,
        venue: Venue,
    ) -> CatalogResult<Option<InstrumentDescriptor>> {
        let lookup = {
            let catalog = self.clone();
            let symbol = symbol.to_string();
            move || match filter.filter(|f| !f.is_empty()) {
                Some(f) => catalog.lookup_by_details(&symbol, &f),
                None => catalog.lookup_on_exchange(&symbol, venue),
            }
        };
        match self.mode() {
            CatalogMode::InMemory => lookup(),
            CatalogMode::Streaming => tokio::task::spawn_blocking(lookup)
                .await
                .map_err(|e| CatalogError::Task(e.to_string()))?,
        }
    }

    // =========================================================================
    // Streaming support
    // =========================================================================

    /// Warm the streaming cache for a whole batch in one pass over the file.
    ///
    /// Returns the number of symbols now cached. In-memory mode needs no
    /// warming and returns how many of the symbols are indexed.
    pub fn prefetch<S: AsRef<str>>(&self, symbols: &[S]) -> CatalogResult<usize> {
        let wanted: HashSet<String> = symbols
            .iter()
            .map(|s| normalize_symbol(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        if wanted.is_empty() {
            return Ok(0);
        }

        if self.mode() == CatalogMode::InMemory {
            let snapshot = self.snapshot();
            let known = wanted
                .iter()
                .filter(|k| {
                    snapshot
                        .as_ref()
                        .is_some_and(|s| s.by_symbol.contains_key(k.as_str()))
                })
                .count();
            return Ok(known);
        }

        let missing: HashSet<String> = wanted
            .iter()
            .filter(|k| !self.inner.stream_cache.contains_key(*k))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(self.inner.stream_cache.len());
        }

        let mut found: HashMap<String, Vec<InstrumentDescriptor>> =
            missing.iter().map(|k| (k.clone(), Vec::new())).collect();
        let config = &self.inner.config;
        let mut reader = MasterReader::open(&config.master_path)?;
        let scanned = reader.for_each_chunk(config.stream_chunk_rows, |chunk| {
            for row in chunk {
                let symbol_key = row.symbol_key();
                let underlying_key = row.underlying_key();
                let hits_symbol = missing.contains(&symbol_key);
                let hits_underlying = underlying_key
                    .as_ref()
                    .is_some_and(|u| u != &symbol_key && missing.contains(u));
                if !hits_symbol && !hits_underlying {
                    continue;
                }
                let Ok(inst) = row.to_descriptor() else {
                    continue;
                };
                if hits_symbol {
                    found.entry(symbol_key.clone()).or_default().push(inst.clone());
                }
                if let Some(u) = underlying_key.filter(|_| hits_underlying) {
                    found.entry(u).or_default().push(inst);
                }
            }
            true
        })?;

        self.cache_batch(found, &wanted);
        debug!(
            requested = missing.len(),
            scanned,
            cached = self.inner.stream_cache.len(),
            "Prefetched instruments"
        );
        Ok(self.inner.stream_cache.len())
    }

    /// Cached candidates for `key`, scanning the file on a miss.
    fn stream_candidates(&self, key: &str) -> CatalogResult<Arc<Vec<InstrumentDescriptor>>> {
        if let Some(hit) = self.inner.stream_cache.get(key) {
            return Ok(Arc::clone(hit.value()));
        }
        self.prefetch(&[key])?;
        Ok(self
            .inner
            .stream_cache
            .get(key)
            .map(|hit| Arc::clone(hit.value()))
            .unwrap_or_default())
    }

    /// Insert a prefetched batch. Over capacity, entries outside `batch`
    /// are evicted; the batch itself is never split.
    fn cache_batch(
        &self,
        found: HashMap<String, Vec<InstrumentDescriptor>>,
        batch: &HashSet<String>,
    ) {
        let cache = &self.inner.stream_cache;
        let capacity = self.inner.config.cache_capacity;
        if cache.len() + found.len() > capacity {
            let before = cache.len();
            cache.retain(|key, _| batch.contains(key));
            debug!(
                capacity,
                batch = batch.len(),
                evicted = before - cache.len(),
                "Streaming cache full, evicting outside current batch"
            );
        }
        for (key, list) in found {
            cache.insert(key, Arc::new(list));
        }
    }

    /// Scan the file for the first row satisfying `pred`.
    fn scan_first<F>(&self, pred: F) -> CatalogResult<Option<InstrumentDescriptor>>
    where
        F: Fn(&InstrumentDescriptor) -> bool,
    {
        let config = &self.inner.config;
        let mut reader = MasterReader::open(&config.master_path)?;
        let mut hit = None;
        reader.for_each_chunk(config.stream_chunk_rows, |chunk| {
            hit = chunk
                .iter()
                .filter_map(|row| row.to_descriptor().ok())
                .find(|inst| pred(inst));
            hit.is_none()
        })?;
        Ok(hit)
    }
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::fixtures::MASTER_CSV;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn catalog_with(mode: CatalogMode) -> (TempDir, InstrumentCatalog) {
        let dir = TempDir::new().unwrap();
        let master_path = dir.path().join("dhan_instruments.csv");
        std::fs::write(&master_path, MASTER_CSV).unwrap();
        let config = CatalogConfig {
            master_path,
            mode,
            stream_chunk_rows: 3,
            auto_refresh: false,
            ..Default::default()
        };
        (dir, InstrumentCatalog::new(config))
    }

    fn nifty_call_filter() -> ContractFilter {
        ContractFilter {
            strike: Some(dec!(24000)),
            expiry: NaiveDate::from_ymd_opt(2025, 1, 30),
            option_type: Some(OptionType::Call),
        }
    }

    #[test]
    fn test_load_counts_and_skips() {
        let (_dir, catalog) = catalog_with(CatalogMode::InMemory);
        let stats = catalog.load_blocking().unwrap();
        assert_eq!(stats.rows_indexed, 8);
        // Duplicate security id + unknown segment.
        assert_eq!(stats.rows_skipped, 2);
        assert_eq!(stats.duplicate_ids, 1);
        assert!(catalog.is_loaded());
    }

    #[test]
    fn test_lookup_by_symbol_is_idempotent() {
        let (_dir, catalog) = catalog_with(CatalogMode::InMemory);
        catalog.load_blocking().unwrap();

        let first = catalog.lookup_by_symbol(" hdfcbank ").unwrap().unwrap();
        let second = catalog.lookup_by_symbol("HDFCBANK").unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.security_id, "1333");
        assert!(catalog.lookup_by_symbol("UNKNOWN").unwrap().is_none());
        // Duplicate-id row was dropped entirely.
        assert!(catalog.lookup_by_symbol("HDFCDUP").unwrap().is_none());
    }

    #[test]
    fn test_lookup_on_exchange_prefers_venue() {
        let (_dir, catalog) = catalog_with(CatalogMode::InMemory);
        catalog.load_blocking().unwrap();

        let bse = catalog.lookup_on_exchange("HDFCBANK", Venue::Bse).unwrap().unwrap();
        assert_eq!(bse.security_id, "500180");
        let fallback = catalog.lookup_on_exchange("INFY", Venue::Bse).unwrap().unwrap();
        assert_eq!(fallback.venue, Venue::Nse);
    }

    #[test]
    fn test_lookup_security_id() {
        let (_dir, catalog) = catalog_with(CatalogMode::InMemory);
        catalog.load_blocking().unwrap();
        let inst = catalog
            .lookup_security_id(ExchangeSegment::NseFno, "49082")
            .unwrap()
            .unwrap();
        assert_eq!(inst.option_type, Some(OptionType::Put));
        assert!(catalog
            .lookup_security_id(ExchangeSegment::BseEq, "49082")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_lookup_by_details_compound_index() {
        let (_dir, catalog) = catalog_with(CatalogMode::InMemory);
        catalog.load_blocking().unwrap();

        let call = catalog
            .lookup_by_details("nifty", &nifty_call_filter())
            .unwrap()
            .unwrap();
        assert_eq!(call.security_id, "49081");

        let bsx = catalog
            .lookup_by_details(
                "BSXOPT",
                &ContractFilter {
                    strike: Some(dec!(80100)),
                    expiry: NaiveDate::from_ymd_opt(2025, 1, 30),
                    option_type: Some(OptionType::Call),
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(bsx.security_id, "1131");
    }

    #[test]
    fn test_lookup_by_details_partial_filter() {
        let (_dir, catalog) = catalog_with(CatalogMode::InMemory);
        catalog.load_blocking().unwrap();

        let put = catalog
            .lookup_by_details(
                "NIFTY",
                &ContractFilter {
                    option_type: Some(OptionType::Put),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(put.security_id, "49082");

        let none = catalog
            .lookup_by_details(
                "NIFTY",
                &ContractFilter {
                    strike: Some(dec!(99999)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_streaming_mode_matches_in_memory() {
        let (_dir, catalog) = catalog_with(CatalogMode::Streaming);
        let stats = catalog.load_blocking().unwrap();
        assert_eq!(stats.rows_indexed, 0);

        let hdfc = catalog.lookup_by_symbol("HDFCBANK").unwrap().unwrap();
        assert_eq!(hdfc.security_id, "1333");
        let bse = catalog.lookup_on_exchange("HDFCBANK", Venue::Bse).unwrap().unwrap();
        assert_eq!(bse.security_id, "500180");
        let call = catalog
            .lookup_by_details("NIFTY", &nifty_call_filter())
            .unwrap()
            .unwrap();
        assert_eq!(call.security_id, "49081");
        let by_id = catalog
            .lookup_security_id(ExchangeSegment::BseFno, "1130")
            .unwrap()
            .unwrap();
        assert_eq!(by_id.symbol, "BSXOPT");
    }

    #[test]
    fn test_prefetch_fills_cache_in_one_pass() {
        let (dir, catalog) = catalog_with(CatalogMode::Streaming);
        catalog.load_blocking().unwrap();

        let cached = catalog.prefetch(&["HDFCBANK", "NIFTY", "MISSING"]).unwrap();
        assert_eq!(cached, 3);

        // Cache answers even after the file disappears.
        std::fs::remove_file(dir.path().join("dhan_instruments.csv")).unwrap();
        assert!(catalog.lookup_by_symbol("HDFCBANK").unwrap().is_some());
        assert!(catalog
            .lookup_by_details("NIFTY", &nifty_call_filter())
            .unwrap()
            .is_some());
        assert!(catalog.lookup_by_symbol("MISSING").unwrap().is_none());
    }

    #[test]
    fn test_prefetch_batch_larger_than_capacity_stays_cached() {
        let dir = TempDir::new().unwrap();
        let master_path = dir.path().join("dhan_instruments.csv");
        std::fs::write(&master_path, MASTER_CSV).unwrap();
        let catalog = InstrumentCatalog::new(CatalogConfig {
            master_path: master_path.clone(),
            mode: CatalogMode::Streaming,
            stream_chunk_rows: 3,
            cache_capacity: 2,
            auto_refresh: false,
            ..Default::default()
        });
        catalog.load_blocking().unwrap();

        assert_eq!(catalog.prefetch(&["INFY"]).unwrap(), 1);
        assert_eq!(catalog.prefetch(&["HDFCBANK", "NIFTY", "BSXOPT"]).unwrap(), 3);

        // Every symbol of the batch answers without the file; older entries went.
        std::fs::remove_file(&master_path).unwrap();
        for symbol in ["HDFCBANK", "BSXOPT"] {
            assert!(catalog.lookup_by_symbol(symbol).unwrap().is_some(), "{symbol}");
        }
        assert!(catalog
            .lookup_by_details("NIFTY", &nifty_call_filter())
            .unwrap()
            .is_some());
        assert!(catalog.lookup_by_symbol("INFY").is_err());
    }

    #[test]
    fn test_prefetch_in_memory_counts_known() {
        let (_dir, catalog) = catalog_with(CatalogMode::InMemory);
        catalog.load_blocking().unwrap();
        assert_eq!(catalog.prefetch(&["INFY", "NOPE"]).unwrap(), 1);
    }

    #[test]
    fn test_load_missing_master() {
        let dir = TempDir::new().unwrap();
        let catalog = InstrumentCatalog::new(CatalogConfig {
            master_path: dir.path().join("absent.csv"),
            auto_refresh: false,
            ..Default::default()
        });
        assert!(matches!(
            catalog.load_blocking().unwrap_err(),
            CatalogError::MasterMissing(_)
        ));
        assert!(catalog.is_stale());
    }

    #[tokio::test]
    async fn test_ensure_loaded_is_lazy_and_idempotent() {
        let (_dir, catalog) = catalog_with(CatalogMode::InMemory);
        assert!(!catalog.is_loaded());
        catalog.ensure_loaded().await.unwrap();
        let first = catalog.stats().unwrap().loaded_at;
        catalog.ensure_loaded().await.unwrap();
        assert_eq!(catalog.stats().unwrap().loaded_at, first);
    }

    #[tokio::test]
    async fn test_resolve_uses_filter_or_venue() {
        let (_dir, catalog) = catalog_with(CatalogMode::Streaming);
        catalog.ensure_loaded().await.unwrap();

        let bse = catalog.resolve("HDFCBANK", None, Venue::Bse).await.unwrap().unwrap();
        assert_eq!(bse.security_id, "500180");
        let put = catalog
            .resolve(
                "NIFTY",
                Some(ContractFilter {
                    option_type: Some(OptionType::Put),
                    ..Default::default()
                }),
                Venue::Nse,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(put.security_id, "49082");
    }
}
