//! Decides when stored elements are too old and refreshes them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use crate::error::{Error, FetchFailure, Result};
use crate::source::CatalogSource;
use crate::store::{ElementStore, OrbitalElementSet};
use crate::tle::parse_catalog;

/// Owns the "current best elements for identifier X" decision.
///
/// Only this type writes `updated_at`. Calls for the same identifier are
/// serialised so that at most one remote fetch per identifier is in flight;
/// different identifiers never wait on each other.
pub struct FreshnessCache {
    store: Arc<dyn ElementStore>,
    source: Option<Arc<dyn CatalogSource>>,
    in_flight: Mutex<HashMap<u32, Arc<Mutex<()>>>>,
}

impl FreshnessCache {
    pub fn new(store: Arc<dyn ElementStore>, source: Arc<dyn CatalogSource>) -> Self {
        Self {
            store,
            source: Some(source),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// A cache that can only serve what is already stored.
    pub fn offline(store: Arc<dyn ElementStore>) -> Self {
        Self {
            store,
            source: None,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ElementStore> {
        &self.store
    }

    /// Current `(name, line1, line2)` for `norad_id`.
    ///
    /// Stored elements are returned untouched when `now - updated_at` is
    /// strictly below `max_age_hours`. Otherwise one fetch is made; on success
    /// the whole row is replaced with `updated_at = now`, on failure
    /// [`Error::NotFound`] is returned and the store is left alone.
    pub fn resolve(
        &self,
        norad_id: u32,
        max_age_hours: i64,
        now: DateTime<Utc>,
    ) -> Result<(String, String, String)> {
        let slot = self.slot(norad_id)?;
        let result = slot
            .lock()
            .map_err(|_| Error::Store(format!("refresh lock for NORAD {} poisoned", norad_id)))
            .and_then(|_guard| self.resolve_locked(norad_id, max_age_hours, now));
        self.release(norad_id, &slot);
        result
    }

    fn resolve_locked(
        &self,
        norad_id: u32,
        max_age_hours: i64,
        now: DateTime<Utc>,
    ) -> Result<(String, String, String)> {
        let stored = self.store.get(norad_id)?;
        if let Some(set) = &stored {
            let age = now - set.updated_at;
            if is_fresh(age, max_age_hours) {
                debug!(
                    "[resolve] NORAD {} fresh ({} min old, limit {} h)",
                    norad_id,
                    age.num_minutes(),
                    max_age_hours
                );
                return Ok(set.triple());
            }
            debug!("[resolve] NORAD {} stale ({} h old)", norad_id, age.num_hours());
        } else {
            debug!("[resolve] NORAD {} not stored", norad_id);
        }

        let refreshed = self.fetch(norad_id, now)?;
        let triple = refreshed.triple();
        self.store.upsert(refreshed)?;
        info!(
            "[resolve] NORAD {} {} from catalog",
            norad_id,
            if stored.is_some() { "refreshed" } else { "created" }
        );
        Ok(triple)
    }

    fn fetch(&self, norad_id: u32, now: DateTime<Utc>) -> Result<OrbitalElementSet> {
        let not_found = |cause: FetchFailure| {
            warn!("[resolve] NORAD {}: {}", norad_id, cause);
            Error::NotFound { norad_id, cause }
        };

        let source = self
            .source
            .as_ref()
            .ok_or_else(|| not_found(FetchFailure::Unavailable))?;
        let text = source.fetch_by_id(norad_id).map_err(not_found)?;

        parse_catalog(&text)
            .into_iter()
            .find(|r| r.norad_id == norad_id)
            .map(|r| OrbitalElementSet::from_record(r, now))
            .ok_or_else(|| not_found(FetchFailure::NoMatchingRecord))
    }

    fn slot(&self, norad_id: u32) -> Result<Arc<Mutex<()>>> {
        let mut slots = self
            .in_flight
            .lock()
            .map_err(|_| Error::Store("refresh lock table poisoned".to_string()))?;
        Ok(slots.entry(norad_id).or_default().clone())
    }

    /// Drop the lock slot once nobody but the table and `slot` holds it.
    fn release(&self, norad_id: u32, slot: &Arc<Mutex<()>>) {
        if let Ok(mut slots) = self.in_flight.lock() {
            if Arc::strong_count(slot) == 2 {
                slots.remove(&norad_id);
            }
        }
    }

    #[cfg(test)]
    fn slots_held(&self) -> usize {
        self.in_flight.lock().map(|slots| slots.len()).unwrap_or(0)
    }
}

/// Strict: an age exactly equal to the limit is stale. A limit too large for
/// [`Duration`] never expires.
pub fn is_fresh(age: Duration, max_age_hours: i64) -> bool {
    match Duration::try_hours(max_age_hours) {
        Some(limit) => age < limit,
        None => true,
    }
}
