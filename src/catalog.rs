//! Catalog-level operations: labels, listing, search, bulk import and refresh.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::freshness::FreshnessCache;
use crate::source::CatalogSource;
use crate::store::{ElementStore, OrbitalElementSet};
use crate::tle::parse_catalog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub norad_id: u32,
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub checked: usize,
    pub failed: usize,
}

/// Display label: the trimmed name, or `NORAD <id>` when there is none.
pub fn catalog_label(name: &str, norad_id: u32) -> String {
    let clean = name.trim();
    if clean.is_empty() {
        format!("NORAD {norad_id}")
    } else {
        clean.to_string()
    }
}

/// Every stored satellite, sorted case-insensitively by label.
pub fn list_catalog_entries(store: &dyn ElementStore) -> Result<Vec<CatalogEntry>> {
    let mut entries: Vec<CatalogEntry> = store
        .all()?
        .into_iter()
        .map(|set| {
            let name = set.name.trim().to_string();
            CatalogEntry {
                norad_id: set.norad_id,
                label: catalog_label(&name, set.norad_id),
                name,
            }
        })
        .collect();
    entries.sort_by(|a, b| {
        a.label
            .to_lowercase()
            .cmp(&b.label.to_lowercase())
            .then(a.norad_id.cmp(&b.norad_id))
    });
    Ok(entries)
}

/// Best stored match for a free-text query.
///
/// An all-digit query is tried as a catalog number first, then names are
/// matched case-insensitively: exact match, else the alphabetically first
/// name containing the query.
pub fn search_catalog(store: &dyn ElementStore, query: &str) -> Result<Option<OrbitalElementSet>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(None);
    }

    if query.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(norad_id) = query.parse::<u32>() {
            if let Some(set) = store.get(norad_id)? {
                return Ok(Some(set));
            }
        }
    }

    let needle = query.to_lowercase();
    let mut sets = store.all()?;
    sets.sort_by(|a, b| a.name.cmp(&b.name).then(a.norad_id.cmp(&b.norad_id)));

    if let Some(pos) = sets.iter().position(|s| s.name.trim().to_lowercase() == needle) {
        return Ok(Some(sets.swap_remove(pos)));
    }
    Ok(sets
        .into_iter()
        .find(|s| s.name.to_lowercase().contains(&needle)))
}

/// Download the bulk group and upsert every record, stamped with `now`.
/// Returns the number of records written, duplicates included.
pub fn import_catalog(
    source: &dyn CatalogSource,
    store: &dyn ElementStore,
    now: DateTime<Utc>,
) -> Result<usize> {
    let text = source.fetch_group().map_err(Error::CatalogUnavailable)?;
    let sets: Vec<OrbitalElementSet> = parse_catalog(&text)
        .into_iter()
        .map(|r| OrbitalElementSet::from_record(r, now))
        .collect();
    let count = store.upsert_many(sets)?;
    info!("[import_catalog] upserted {} TLE records", count);
    Ok(count)
}

/// Bring every listed satellite up to date, skipping the ones that fail.
pub fn refresh_tracked(
    cache: &FreshnessCache,
    norad_ids: &[u32],
    max_age_hours: i64,
    now: DateTime<Utc>,
) -> RefreshReport {
    let mut report = RefreshReport::default();
    for &norad_id in norad_ids {
        report.checked += 1;
        if let Err(e) = cache.resolve(norad_id, max_age_hours, now) {
            warn!("[refresh_tracked] NORAD {}: {}", norad_id, e);
            report.failed += 1;
        }
    }
    info!(
        "[refresh_tracked] checked {} satellites, {} failed",
        report.checked, report.failed
    );
    report
}
