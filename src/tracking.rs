//! Current position of a satellite: fresh elements, SGP4, ground projection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::catalog::catalog_label;
use crate::config::TrackerConfig;
use crate::error::{Error, FetchFailure, Result};
use crate::freshness::FreshnessCache;
use crate::frames::to_geodetic;
use crate::propagation::{Propagator, Sgp4};
use crate::source::{CatalogSource, CelestrakSource};
use crate::store::{ElementStore, FileStore, MemoryStore};

// ---------- Output model ----------
/// Where a satellite is at one instant. Recomputed on every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSample {
    pub norad_id: u32,
    pub name: String,
    #[serde(rename = "lat")]
    pub latitude_deg: f64,
    #[serde(rename = "lon")]
    pub longitude_deg: f64,
    pub alt_km: f64,
    /// Magnitude of the inertial-frame velocity; no Earth-rotation correction.
    #[serde(rename = "vel_kms")]
    pub speed_km_s: f64,
    #[serde(rename = "timestamp")]
    pub computed_at: DateTime<Utc>,
}

/// Everything a detail view needs, even when the position cannot be computed.
#[derive(Debug, Clone, Serialize)]
pub struct SatelliteDetail {
    pub norad_id: u32,
    pub name: String,
    pub label: String,
    /// True when the refresh failed and stored elements were used as-is.
    pub stale_elements: bool,
    pub position: Option<PositionSample>,
    pub error: Option<String>,
}

/// Compute a position from element lines at `at`. Pure; no store or network.
pub fn position_from_elements(
    propagator: &dyn Propagator,
    norad_id: u32,
    name: &str,
    line1: &str,
    line2: &str,
    at: DateTime<Utc>,
) -> Result<PositionSample> {
    let state = propagator.propagate(line1, line2, at)?;
    let ground = to_geodetic(state.position, at);
    Ok(PositionSample {
        norad_id,
        name: name.trim().to_string(),
        latitude_deg: ground.latitude_deg,
        longitude_deg: ground.longitude_deg,
        alt_km: ground.altitude_km,
        speed_km_s: state.speed(),
        computed_at: at,
    })
}

/// The position pipeline: freshness cache, then propagator, then frames.
pub struct Tracker {
    cache: FreshnessCache,
    propagator: Arc<dyn Propagator>,
}

impl Tracker {
    /// A tracker using SGP4 and the given store and catalog source.
    pub fn new(
        config: &TrackerConfig,
        store: Arc<dyn ElementStore>,
        source: Arc<dyn CatalogSource>,
    ) -> Self {
        crate::init_logger(config.log_filter());
        info!("[Tracker] ready (default max age {} h)", config.max_age_hours);
        Self::from_parts(FreshnessCache::new(store, source), Arc::new(Sgp4))
    }

    /// Store and CelesTrak source as configured: a [`FileStore`] when
    /// `store_path` is set, in-memory otherwise.
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn ElementStore> = match &config.store_path {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        let source = Arc::new(CelestrakSource::new(config)?);
        Ok(Self::new(config, store, source))
    }

    pub fn from_parts(cache: FreshnessCache, propagator: Arc<dyn Propagator>) -> Self {
        Self { cache, propagator }
    }

    /// `(name, line1, line2)` for `norad_id`, refreshed if older than the limit.
    pub fn resolve(
        &self,
        norad_id: u32,
        max_age_hours: i64,
        now: DateTime<Utc>,
    ) -> Result<(String, String, String)> {
        self.cache.resolve(norad_id, max_age_hours, now)
    }

    /// Position of one satellite at `now`. `NotFound` and `Propagation`
    /// errors come back exactly as the lower layers produced them.
    pub fn current_position(
        &self,
        norad_id: u32,
        max_age_hours: i64,
        now: DateTime<Utc>,
    ) -> Result<PositionSample> {
        let (name, line1, line2) = self.cache.resolve(norad_id, max_age_hours, now)?;
        position_from_elements(self.propagator.as_ref(), norad_id, &name, &line1, &line2, now)
    }

    /// Positions for many satellites. Identifiers that are unknown or fail to
    /// propagate are left out; a store failure aborts the whole batch.
    pub fn current_positions(
        &self,
        norad_ids: &[u32],
        max_age_hours: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<PositionSample>> {
        let mut samples = Vec::with_capacity(norad_ids.len());
        for &norad_id in norad_ids {
            match self.current_position(norad_id, max_age_hours, now) {
                Ok(sample) => samples.push(sample),
                Err(e) if e.is_skippable() => {
                    warn!("[current_positions] skipping NORAD {}: {}", norad_id, e);
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            "[current_positions] {} of {} positions computed",
            samples.len(),
            norad_ids.len()
        );
        Ok(samples)
    }

    /// Detail view for a stored satellite.
    ///
    /// A failed refresh falls back to the stored elements, and a failed
    /// propagation is reported in `error` rather than failing the call. The
    /// satellite must already be stored.
    pub fn satellite_detail(
        &self,
        norad_id: u32,
        max_age_hours: i64,
        now: DateTime<Utc>,
    ) -> Result<SatelliteDetail> {
        let stored = self
            .cache
            .store()
            .get(norad_id)?
            .ok_or(Error::NotFound {
                norad_id,
                cause: FetchFailure::Unavailable,
            })?;

        let ((name, line1, line2), stale_elements) =
            match self.cache.resolve(norad_id, max_age_hours, now) {
                Ok(triple) => (triple, false),
                Err(e @ Error::NotFound { .. }) => {
                    warn!("[satellite_detail] using stored elements for NORAD {}: {}", norad_id, e);
                    (stored.triple(), true)
                }
                Err(e) => return Err(e),
            };

        let (position, error) =
            match position_from_elements(self.propagator.as_ref(), norad_id, &name, &line1, &line2, now) {
                Ok(sample) => (Some(sample), None),
                Err(e) => (None, Some(e.to_string())),
            };

        Ok(SatelliteDetail {
            norad_id,
            label: catalog_label(&name, norad_id),
            name,
            stale_elements,
            position,
            error,
        })
    }
}
