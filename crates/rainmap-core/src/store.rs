// Copyright 2025 Rainmap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Storm artifact store.
//!
//! The external analysis pipeline drops its output into timestamped
//! directories (`YYYYMMDD_HHMMSS`) containing `json/` and `maps/`
//! subdirectories. This store answers "latest directory" and "directory
//! for date" queries over that tree, caching answers for a TTL so every
//! request does not rescan the filesystem. The clock is injected to keep
//! expiry testable.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use log::debug;

/// Time source for cache expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Errors from artifact lookups.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The data directory has no artifact directories at all.
    #[error("no artifacts generated yet")]
    NoData,

    /// A specific artifact was not found.
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
struct CachedPath {
    path: Option<PathBuf>,
    fetched_at: SystemTime,
}

/// Cached view over the artifact directory tree.
pub struct ArtifactStore {
    data_dir: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    latest: Mutex<Option<CachedPath>>,
    by_date: Mutex<HashMap<String, CachedPath>>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("data_dir", &self.data_dir)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Parse a `YYYYMMDD_HHMMSS` directory name into a sortable number.
///
/// `"20251103_114143"` becomes `20251103114143`. Names without an
/// underscore or shorter than the full pattern yield `None` and sort last.
#[must_use]
pub fn parse_dir_timestamp(name: &str) -> Option<u64> {
    if !name.contains('_') || name.len() < 15 {
        return None;
    }
    name.replace('_', "").parse().ok()
}

impl ArtifactStore {
    /// Store over `data_dir` with the default 5 minute cache TTL.
    #[must_use]
    pub fn new(data_dir: PathBuf) -> Self {
        Self::with_clock(data_dir, Duration::from_secs(300), Arc::new(SystemClock))
    }

    /// Store with an explicit TTL and clock.
    #[must_use]
    pub fn with_clock(data_dir: PathBuf, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            data_dir,
            ttl,
            clock,
            latest: Mutex::new(None),
            by_date: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Drop all cached directory answers.
    pub fn invalidate(&self) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }
        if let Ok(mut by_date) = self.by_date.lock() {
            by_date.clear();
        }
    }

    fn is_fresh(&self, cached: &CachedPath) -> bool {
        self.clock
            .now()
            .duration_since(cached.fetched_at)
            .map(|age| age < self.ttl)
            .unwrap_or(false)
    }

    fn artifact_dirs(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.data_dir) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect()
    }

    fn dir_timestamp(path: &Path) -> u64 {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_dir_timestamp)
            .unwrap_or(0)
    }

    /// Most recent artifact directory, by the timestamp in its name.
    pub fn latest_dir(&self) -> Option<PathBuf> {
        if let Ok(cache) = self.latest.lock() {
            if let Some(cached) = cache.as_ref() {
                if self.is_fresh(cached) {
                    return cached.path.clone();
                }
            }
        }

        let latest = self
            .artifact_dirs()
            .into_iter()
            .max_by_key(|p| Self::dir_timestamp(p));
        debug!("Rescanned {:?}, latest: {:?}", self.data_dir, latest);

        if let Ok(mut cache) = self.latest.lock() {
            *cache = Some(CachedPath {
                path: latest.clone(),
                fetched_at: self.clock.now(),
            });
        }
        latest
    }

    /// Most recent artifact directory whose name contains `date`
    /// (`YYYYMMDD`).
    pub fn dir_for_date(&self, date: &str) -> Option<PathBuf> {
        if let Ok(cache) = self.by_date.lock() {
            if let Some(cached) = cache.get(date) {
                if self.is_fresh(cached) {
                    return cached.path.clone();
                }
            }
        }

        let found = self
            .artifact_dirs()
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.contains(date))
            })
            .max_by_key(|p| Self::dir_timestamp(p));

        if let Ok(mut cache) = self.by_date.lock() {
            cache.insert(
                date.to_string(),
                CachedPath {
                    path: found.clone(),
                    fetched_at: self.clock.now(),
                },
            );
        }
        found
    }

    /// Latest storm summary JSON (`json/storms_*.json`, newest file).
    pub fn latest_summary_json(&self) -> Result<PathBuf, StoreError> {
        let dir = self.latest_dir().ok_or(StoreError::NoData)?;
        let mut files = files_matching(&dir.join("json"), "storms_", ".json")?;
        files.sort();
        files
            .pop()
            .ok_or_else(|| StoreError::NotFound("storm summary".to_string()))
    }

    /// Per-storm JSON from the latest directory.
    ///
    /// Looks for `json/storm_{id}.json` first, then falls back to any JSON
    /// whose name contains the id.
    pub fn storm_json(&self, storm_id: &str) -> Result<PathBuf, StoreError> {
        let dir = self.latest_dir().ok_or(StoreError::NoData)?;
        storm_json_in(&dir, storm_id)
    }

    /// Per-storm JSON from the newest directory for a date, with the same
    /// exact-then-substring lookup as [`storm_json`](Self::storm_json).
    pub fn date_storm_json(&self, date: &str, storm_id: &str) -> Result<PathBuf, StoreError> {
        let dir = self
            .dir_for_date(date)
            .ok_or_else(|| StoreError::NotFound(format!("date {date}")))?;
        storm_json_in(&dir, storm_id)
    }

    /// All storm JSONs for a date, plus the directory they came from.
    pub fn date_jsons(&self, date: &str) -> Result<(PathBuf, Vec<PathBuf>), StoreError> {
        let dir = self
            .dir_for_date(date)
            .ok_or_else(|| StoreError::NotFound(format!("date {date}")))?;
        let mut files = files_matching(&dir.join("json"), "", ".json")?;
        if files.is_empty() {
            return Err(StoreError::NotFound(format!("JSON files for date {date}")));
        }
        files.sort();
        Ok((dir, files))
    }

    /// Latest rendered overview map (`maps/map_*.png`, newest file).
    pub fn latest_map_png(&self) -> Result<PathBuf, StoreError> {
        let dir = self.latest_dir().ok_or(StoreError::NoData)?;
        let mut files = files_matching(&dir.join("maps"), "map_", ".png")?;
        files.sort();
        files
            .pop()
            .ok_or_else(|| StoreError::NotFound("overview map".to_string()))
    }

    /// Per-storm map (`maps/{storm_id}.png`) from the latest directory.
    pub fn storm_map_png(&self, storm_id: &str) -> Result<PathBuf, StoreError> {
        let dir = self.latest_dir().ok_or(StoreError::NoData)?;
        let path = dir.join("maps").join(format!("{storm_id}.png"));
        if path.is_file() {
            Ok(path)
        } else {
            Err(StoreError::NotFound(format!("map for storm {storm_id}")))
        }
    }

    /// Every artifact directory for a date, sorted by parsed timestamp.
    ///
    /// Unlike the single-directory lookups this scans fresh on every call:
    /// it backs the map index endpoints, where a stale index would point
    /// clients at the wrong frame.
    #[must_use]
    pub fn dirs_for_date(&self, date: &str) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .artifact_dirs()
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.contains(date))
            })
            .collect();
        dirs.sort_by_key(|p| Self::dir_timestamp(p));
        dirs
    }

    /// All map PNGs for a date across every run of that day, in run order.
    ///
    /// With `storm_id` set, only maps whose filename contains the id;
    /// otherwise the general `map_*.png` overview frames. Within one run
    /// the files are in name order, so the whole sequence plays back
    /// chronologically.
    pub fn date_map_pngs(
        &self,
        date: &str,
        storm_id: Option<&str>,
    ) -> Result<Vec<PathBuf>, StoreError> {
        let dirs = self.dirs_for_date(date);
        if dirs.is_empty() {
            return Err(StoreError::NotFound(format!("date {date}")));
        }

        let mut maps = Vec::new();
        for dir in dirs {
            let mut files = match storm_id {
                Some(id) => {
                    let mut all = files_matching(&dir.join("maps"), "", ".png")?;
                    all.retain(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.contains(id))
                    });
                    all
                }
                None => files_matching(&dir.join("maps"), "map_", ".png")?,
            };
            files.sort();
            maps.extend(files);
        }

        if maps.is_empty() {
            let what = match storm_id {
                Some(id) => format!("maps for storm {id} on date {date}"),
                None => format!("maps for date {date}"),
            };
            return Err(StoreError::NotFound(what));
        }
        Ok(maps)
    }
}

/// Exact `storm_{id}.json` lookup with a substring fallback.
fn storm_json_in(dir: &Path, storm_id: &str) -> Result<PathBuf, StoreError> {
    let json_dir = dir.join("json");

    let exact = json_dir.join(format!("storm_{storm_id}.json"));
    if exact.is_file() {
        return Ok(exact);
    }

    let mut matches = files_matching(&json_dir, "", ".json")?;
    matches.retain(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains(storm_id))
    });
    matches.sort();
    matches
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::NotFound(format!("storm {storm_id}")))
}

/// Files in `dir` whose name starts with `prefix` and ends with `suffix`.
fn files_matching(dir: &Path, prefix: &str, suffix: &str) -> Result<Vec<PathBuf>, StoreError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut matches = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file() && name.starts_with(prefix) && name.ends_with(suffix) {
            matches.push(path);
        }
    }
    Ok(matches)
}
