//! Tracker configuration: defaults, JSON file, `ORBTRACK_*` overrides.

use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, Error, Result};

pub const DEFAULT_MAX_AGE_HOURS: i64 = 48;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;
/// Upper bound for `max_age_hours`: one century.
pub const MAX_AGE_HOURS_LIMIT: i64 = 24 * 365 * 100;
pub const CELESTRAK_BY_ID: &str =
    "https://celestrak.org/NORAD/elements/gp.php?CATNR={norad_id}&FORMAT=TLE";
pub const CELESTRAK_ACTIVE: &str =
    "https://celestrak.org/NORAD/elements/gp.php?GROUP=active&FORMAT=TLE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Stored elements younger than this are used without a refetch.
    pub max_age_hours: i64,
    pub http_timeout_secs: u64,
    /// Per-satellite URL; `{norad_id}` is replaced with the catalog number.
    pub catalog_url_template: String,
    /// Bulk import URL.
    pub group_url: String,
    /// JSON snapshot for [`crate::store::FileStore`]; in-memory when unset.
    pub store_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            catalog_url_template: CELESTRAK_BY_ID.to_string(),
            group_url: CELESTRAK_ACTIVE.to_string(),
            store_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl TrackerConfig {
    /// Read a JSON config file; missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `ORBTRACK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Split out of [`Self::from_env`]
    /// so it can be driven without touching the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ORBTRACK_MAX_AGE_HOURS") {
            self.max_age_hours = v
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("ORBTRACK_MAX_AGE_HOURS: not an integer: {v:?}")))?;
        }
        if let Some(v) = lookup("ORBTRACK_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = v
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("ORBTRACK_HTTP_TIMEOUT_SECS: not an integer: {v:?}")))?;
        }
        if let Some(v) = lookup("ORBTRACK_CATALOG_URL") {
            self.catalog_url_template = v;
        }
        if let Some(v) = lookup("ORBTRACK_GROUP_URL") {
            self.group_url = v;
        }
        if let Some(v) = lookup("ORBTRACK_STORE_PATH") {
            self.store_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("ORBTRACK_LOG") {
            self.log_level = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_AGE_HOURS_LIMIT).contains(&self.max_age_hours) {
            return Err(Error::Config(format!(
                "max_age_hours must be within 1..={}, got {}",
                MAX_AGE_HOURS_LIMIT, self.max_age_hours
            )));
        }
        if !(1..=120).contains(&self.http_timeout_secs) {
            return Err(Error::Config(format!(
                "http_timeout_secs must be within 1..=120, got {}",
                self.http_timeout_secs
            )));
        }
        if !self.catalog_url_template.contains("{norad_id}") {
            return Err(Error::Config(
                "catalog_url_template must contain {norad_id}".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
