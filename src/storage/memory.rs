//! In-memory series store.
//!
//! Series are kept in a map ordered by label set, so every select returns
//! series sorted by labels. Deletions are recorded as tombstone intervals
//! that hide samples until [`TsdbAdmin::clean_tombstones`] drops them.

use crate::core::context::RequestContext;
use crate::model::labels::Labels;
use crate::model::matcher::{matches_all, Matcher};
use crate::model::value::Point;
use crate::provider::{
    Querier, Queryable, SelectHints, SeriesData, SeriesSet, StorageError, TsdbAdmin, Warnings,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// File written into a snapshot directory.
pub const SNAPSHOT_FILE: &str = "series.json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct SampleRecord {
    t: i64,
    v: f64,
}

#[derive(Debug, Clone, Default)]
struct SeriesEntry {
    samples: Vec<SampleRecord>,
    /// Deleted `[mint, maxt]` intervals.
    tombstones: Vec<(i64, i64)>,
}

impl SeriesEntry {
    fn is_deleted(&self, t: i64) -> bool {
        self.tombstones.iter().any(|(mint, maxt)| *mint <= t && t <= *maxt)
    }

    fn visible(&self, mint: i64, maxt: i64) -> Vec<Point> {
        self.samples
            .iter()
            .filter(|s| s.t >= mint && s.t <= maxt && !self.is_deleted(s.t))
            .map(|s| Point { t: s.t, v: s.v })
            .collect()
    }
}

/// Snapshot file contents.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotSeries {
    labels: Labels,
    samples: Vec<SampleRecord>,
}

type SeriesMap = BTreeMap<Labels, SeriesEntry>;

/// Thread-safe in-memory series store.
#[derive(Debug)]
pub struct MemoryStorage {
    dir: PathBuf,
    series: Arc<RwLock<SeriesMap>>,
    open_queriers: Arc<AtomicUsize>,
}

impl MemoryStorage {
    /// Create an empty store rooted at `dir`; the directory is not touched.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            series: Arc::new(RwLock::new(BTreeMap::new())),
            open_queriers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create the data directory and an empty store.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let storage = Self::new(dir);
        std::fs::create_dir_all(&storage.dir).map_err(|e| {
            StorageError::failed(format!(
                "failed to create storage directory {}: {}",
                storage.dir.display(),
                e
            ))
        })?;
        Ok(storage)
    }

    /// Add one sample; a sample at an existing timestamp replaces it.
    pub fn append(&self, labels: Labels, t: i64, v: f64) -> Result<(), StorageError> {
        if labels.is_empty() {
            return Err(StorageError::failed("empty label set"));
        }
        let mut series = self.series.write();
        let entry = series.entry(labels).or_default();
        match entry.samples.binary_search_by_key(&t, |s| s.t) {
            Ok(i) => entry.samples[i].v = v,
            Err(i) => entry.samples.insert(i, SampleRecord { t, v }),
        }
        Ok(())
    }

    /// Number of stored series, including fully deleted ones.
    pub fn series_count(&self) -> usize {
        self.series.read().len()
    }

    /// Queriers opened and not yet closed.
    pub fn open_queriers(&self) -> usize {
        self.open_queriers.load(Ordering::Acquire)
    }
}

impl Queryable for MemoryStorage {
    fn querier(
        &self,
        ctx: &RequestContext,
        mint: i64,
        maxt: i64,
    ) -> Result<Box<dyn Querier>, StorageError> {
        ctx.check()?;
        self.open_queriers.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MemoryQuerier {
            series: self.series.clone(),
            open_queriers: self.open_queriers.clone(),
            ctx: ctx.clone(),
            mint,
            maxt,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Read view over `[mint, maxt]`.
struct MemoryQuerier {
    series: Arc<RwLock<SeriesMap>>,
    open_queriers: Arc<AtomicUsize>,
    ctx: RequestContext,
    mint: i64,
    maxt: i64,
    closed: AtomicBool,
}

impl MemoryQuerier {
    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::failed("querier already closed"));
        }
        self.ctx.check()?;
        Ok(())
    }
}

impl Querier for MemoryQuerier {
    fn select(
        &self,
        hints: Option<&SelectHints>,
        matchers: &[Matcher],
    ) -> Result<(SeriesSet, Warnings), StorageError> {
        self.ensure_open()?;
        // Hints only narrow the range; they never widen it.
        let (mint, maxt) = match hints {
            Some(h) if h.start_ms != 0 || h.end_ms != 0 => {
                (self.mint.max(h.start_ms), self.maxt.min(h.end_ms))
            }
            _ => (self.mint, self.maxt),
        };

        let selected: Vec<Result<SeriesData, StorageError>> = self
            .series
            .read()
            .iter()
            .filter(|(labels, _)| matches_all(matchers, labels))
            .filter_map(|(labels, entry)| {
                let samples = entry.visible(mint, maxt);
                (!samples.is_empty()).then(|| {
                    Ok(SeriesData {
                        labels: labels.clone(),
                        samples,
                    })
                })
            })
            .collect();

        Ok((Box::new(selected.into_iter()), Vec::new()))
    }

    fn label_values(&self, name: &str) -> Result<(Vec<String>, Warnings), StorageError> {
        self.ensure_open()?;
        let values: BTreeSet<String> = self
            .series
            .read()
            .keys()
            .filter_map(|labels| labels.get(name).map(str::to_string))
            .collect();
        Ok((values.into_iter().collect(), Vec::new()))
    }

    fn label_names(&self) -> Result<(Vec<String>, Warnings), StorageError> {
        self.ensure_open()?;
        let names: BTreeSet<String> = self
            .series
            .read()
            .keys()
            .flat_map(|labels| labels.iter().map(|l| l.name.clone()))
            .collect();
        Ok((names.into_iter().collect(), Vec::new()))
    }

    fn close(&self) -> Result<(), StorageError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StorageError::failed("querier already closed"));
        }
        self.open_queriers.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }
}

impl TsdbAdmin for MemoryStorage {
    fn delete(&self, mint: i64, maxt: i64, matchers: &[Matcher]) -> Result<(), StorageError> {
        let mut series = self.series.write();
        for (_, entry) in series
            .iter_mut()
            .filter(|(labels, _)| matches_all(matchers, labels))
        {
            entry.tombstones.push((mint, maxt));
        }
        Ok(())
    }

    fn clean_tombstones(&self) -> Result<(), StorageError> {
        let mut series = self.series.write();
        for entry in series.values_mut() {
            let tombstones = std::mem::take(&mut entry.tombstones);
            entry
                .samples
                .retain(|s| !tombstones.iter().any(|(mint, maxt)| *mint <= s.t && s.t <= *maxt));
        }
        series.retain(|_, entry| !entry.samples.is_empty());
        Ok(())
    }

    fn snapshot(&self, dir: &Path, with_head: bool) -> Result<(), StorageError> {
        let records: Vec<SnapshotSeries> = if with_head {
            self.series
                .read()
                .iter()
                .map(|(labels, entry)| SnapshotSeries {
                    labels: labels.clone(),
                    samples: entry
                        .samples
                        .iter()
                        .copied()
                        .filter(|s| !entry.is_deleted(s.t))
                        .collect(),
                })
                .filter(|s| !s.samples.is_empty())
                .collect()
        } else {
            Vec::new()
        };

        let path = dir.join(SNAPSHOT_FILE);
        let file = std::fs::File::create(&path)
            .map_err(|e| StorageError::failed(format!("failed to create {}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &records)
            .map_err(|e| StorageError::failed(format!("failed to write snapshot: {}", e)))?;
        writer
            .flush()
            .map_err(|e| StorageError::failed(format!("failed to flush snapshot: {}", e)))?;
        Ok(())
    }

    fn dir(&self) -> PathBuf {
        self.dir.clone()
    }
}
