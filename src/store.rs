//! Persistence of orbital element sets, keyed by NORAD catalog number.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, Error, Result};
use crate::tle::TleRecord;

/// A satellite's current best-known elements.
///
/// Name, both lines and `updated_at` are only ever replaced together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElementSet {
    pub norad_id: u32,
    pub name: String,
    pub line1: String,
    pub line2: String,
    pub updated_at: DateTime<Utc>,
}

impl OrbitalElementSet {
    pub fn from_record(record: TleRecord, updated_at: DateTime<Utc>) -> Self {
        Self {
            norad_id: record.norad_id,
            name: record.name,
            line1: record.line1,
            line2: record.line2,
            updated_at,
        }
    }

    /// `(name, line1, line2)` with the name trimmed.
    pub fn triple(&self) -> (String, String, String) {
        (self.name.trim().to_string(), self.line1.clone(), self.line2.clone())
    }
}

/// Keyed storage the freshness cache and catalog operations work against.
///
/// `upsert` must replace the whole row in one step: a concurrent reader sees
/// either the old set or the new one, never a mix.
pub trait ElementStore: Send + Sync {
    fn get(&self, norad_id: u32) -> Result<Option<OrbitalElementSet>>;

    fn upsert(&self, set: OrbitalElementSet) -> Result<()>;

    /// Upsert in iteration order, so the last duplicate wins. Returns the
    /// number of rows written (duplicates included).
    fn upsert_many(&self, sets: Vec<OrbitalElementSet>) -> Result<usize>;

    fn all(&self) -> Result<Vec<OrbitalElementSet>>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<u32, OrbitalElementSet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<u32, OrbitalElementSet>>> {
        self.rows
            .read()
            .map_err(|_| Error::Store("element table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<u32, OrbitalElementSet>>> {
        self.rows
            .write()
            .map_err(|_| Error::Store("element table lock poisoned".to_string()))
    }
}

impl ElementStore for MemoryStore {
    fn get(&self, norad_id: u32) -> Result<Option<OrbitalElementSet>> {
        Ok(self.read()?.get(&norad_id).cloned())
    }

    fn upsert(&self, set: OrbitalElementSet) -> Result<()> {
        self.write()?.insert(set.norad_id, set);
        Ok(())
    }

    fn upsert_many(&self, sets: Vec<OrbitalElementSet>) -> Result<usize> {
        let mut rows = self.write()?;
        let count = sets.len();
        for set in sets {
            rows.insert(set.norad_id, set);
        }
        Ok(count)
    }

    fn all(&self) -> Result<Vec<OrbitalElementSet>> {
        Ok(self.read()?.values().cloned().collect())
    }
}

/// Store backed by a JSON snapshot file, rewritten after every change.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash never leaves a half-written snapshot.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    rows: RwLock<HashMap<u32, OrbitalElementSet>>,
}

impl FileStore {
    /// Open the snapshot at `path`, starting empty if it does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let rows = if path.exists() {
            let file = File::open(&path).map_err(|e| io_err(&path, e))?;
            let sets: Vec<OrbitalElementSet> = serde_json::from_reader(BufReader::new(file))?;
            info!("[FileStore] loaded {} element sets from {:?}", sets.len(), path);
            sets.into_iter().map(|s| (s.norad_id, s)).collect()
        } else {
            debug!("[FileStore] no snapshot at {:?}, starting empty", path);
            HashMap::new()
        };
        Ok(Self {
            path,
            rows: RwLock::new(rows),
        })
    }

    fn persist(&self, rows: &HashMap<u32, OrbitalElementSet>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }
        let mut sorted: Vec<&OrbitalElementSet> = rows.values().collect();
        sorted.sort_by_key(|s| s.norad_id);

        let temp_path = self.path.with_extension("tmp");
        let mut file = BufWriter::new(File::create(&temp_path).map_err(|e| io_err(&temp_path, e))?);
        serde_json::to_writer_pretty(&mut file, &sorted)?;
        file.flush().map_err(|e| io_err(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| io_err(&self.path, e))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<u32, OrbitalElementSet>>> {
        self.rows
            .write()
            .map_err(|_| Error::Store("element table lock poisoned".to_string()))
    }
}

impl ElementStore for FileStore {
    fn get(&self, norad_id: u32) -> Result<Option<OrbitalElementSet>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| Error::Store("element table lock poisoned".to_string()))?;
        Ok(rows.get(&norad_id).cloned())
    }

    fn upsert(&self, set: OrbitalElementSet) -> Result<()> {
        let mut rows = self.write()?;
        let previous = rows.insert(set.norad_id, set.clone());
        if let Err(e) = self.persist(&rows) {
            // keep memory and disk in step
            match previous {
                Some(old) => rows.insert(old.norad_id, old),
                None => rows.remove(&set.norad_id),
            };
            return Err(e);
        }
        Ok(())
    }

    fn upsert_many(&self, sets: Vec<OrbitalElementSet>) -> Result<usize> {
        let mut rows = self.write()?;
        let snapshot = rows.clone();
        let count = sets.len();
        for set in sets {
            rows.insert(set.norad_id, set);
        }
        if let Err(e) = self.persist(&rows) {
            *rows = snapshot;
            return Err(e);
        }
        Ok(count)
    }

    fn all(&self) -> Result<Vec<OrbitalElementSet>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| Error::Store("element table lock poisoned".to_string()))?;
        Ok(rows.values().cloned().collect())
    }
}
