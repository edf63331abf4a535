//! Satellite position tracking from two-line element sets.
//!
//! Elements are kept fresh per catalog number by [`FreshnessCache`], advanced
//! to the requested instant with SGP4 and projected onto the ground through a
//! sidereal-time rotation. [`Tracker`] ties the pieces together.

use std::sync::Once;

pub mod catalog;
pub mod config;
pub mod error;
pub mod ffi;
pub mod frames;
pub mod freshness;
pub mod propagation;
pub mod source;
pub mod store;
pub mod tle;
pub mod tracking;

pub use catalog::{catalog_label, import_catalog, list_catalog_entries, refresh_tracked, search_catalog};
pub use config::TrackerConfig;
pub use error::{Error, FetchFailure, Result};
pub use frames::{gmst_from_jd, julian_date, to_geodetic, Geodetic};
pub use freshness::FreshnessCache;
pub use propagation::{propagate, Propagator, Sgp4, StateVector};
pub use source::{CatalogSource, CelestrakSource};
pub use store::{ElementStore, FileStore, MemoryStore, OrbitalElementSet};
pub use tle::{parse_catalog, to_catalog_text, TleRecord};
pub use tracking::{PositionSample, SatelliteDetail, Tracker};

static INIT_LOGGER: Once = Once::new();

/// Install `env_logger` once per process. `RUST_LOG` wins over `level`.
pub fn init_logger(level: log::LevelFilter) {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .try_init();
    });
}
