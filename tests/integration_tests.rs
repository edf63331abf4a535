use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;

// Import from the orbtrack library
use orbtrack::ffi::{free_json, orbtrack_position_json};
use orbtrack::{
    import_catalog, parse_catalog, refresh_tracked, CatalogSource, ElementStore, Error,
    FetchFailure, FileStore, FreshnessCache, MemoryStore, OrbitalElementSet, Propagator, Sgp4,
    StateVector, Tracker, TrackerConfig,
};

const ISS_1: &str = "1 25544U 98067A   25278.49802050  .00011384  00000+0  20935-3 0  9990";
const ISS_2: &str = "2 25544  51.6327 120.3420 0000884 206.2421 153.8523 15.49697304532279";

/// Catalog source answering from a fixed table, counting requests.
#[derive(Default)]
struct TableSource {
    by_id: Mutex<BTreeMap<u32, String>>,
    group: Option<String>,
    calls: AtomicUsize,
}

impl TableSource {
    fn with(entries: &[(u32, &str, &str, &str)]) -> Arc<Self> {
        let source = TableSource::default();
        {
            let mut table = source.by_id.lock().unwrap();
            for (id, name, l1, l2) in entries {
                table.insert(*id, format!("{name}\n{l1}\n{l2}\n"));
            }
        }
        Arc::new(source)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CatalogSource for TableSource {
    fn fetch_by_id(&self, norad_id: u32) -> Result<String, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.by_id
            .lock()
            .unwrap()
            .get(&norad_id)
            .cloned()
            .ok_or(FetchFailure::Status(404))
    }

    fn fetch_group(&self) -> Result<String, FetchFailure> {
        self.group.clone().ok_or(FetchFailure::EmptyBody)
    }
}

fn epoch_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 5, 12, 0, 0).unwrap()
}

fn iss_set(updated_at: DateTime<Utc>) -> OrbitalElementSet {
    OrbitalElementSet {
        norad_id: 25544,
        name: "ISS (ZARYA)".to_string(),
        line1: ISS_1.to_string(),
        line2: ISS_2.to_string(),
        updated_at,
    }
}

#[test]
fn catalog_with_one_group_yields_iss() {
    let text = format!("ISS (ZARYA)\n{ISS_1}\n{ISS_2}\n");
    let records = parse_catalog(&text);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].norad_id, 25544);
}

#[test]
fn stale_record_is_refetched_and_replaced_whole() {
    let now = epoch_noon();
    let store = Arc::new(MemoryStore::new());
    store
        .upsert(OrbitalElementSet {
            norad_id: 25544,
            name: "OLD NAME".to_string(),
            line1: "old line 1".to_string(),
            line2: "old line 2".to_string(),
            updated_at: now - Duration::hours(72),
        })
        .unwrap();
    let source = TableSource::with(&[(25544, "ISS (ZARYA)", ISS_1, ISS_2)]);
    let cache = FreshnessCache::new(store.clone(), source.clone());

    let triple = cache.resolve(25544, 48, now).unwrap();
    assert_eq!(triple, ("ISS (ZARYA)".to_string(), ISS_1.to_string(), ISS_2.to_string()));
    assert_eq!(source.calls(), 1);
    assert_eq!(store.get(25544).unwrap().unwrap(), iss_set(now));
}

#[test]
fn repeated_resolve_inside_window_fetches_once() {
    let now = epoch_noon();
    let source = TableSource::with(&[(25544, "ISS (ZARYA)", ISS_1, ISS_2)]);
    let cache = FreshnessCache::new(Arc::new(MemoryStore::new()), source.clone());

    cache.resolve(25544, 48, now).unwrap();
    cache.resolve(25544, 48, now + Duration::hours(47)).unwrap();
    assert_eq!(source.calls(), 1);

    cache.resolve(25544, 48, now + Duration::hours(48)).unwrap();
    assert_eq!(source.calls(), 2);
}

#[test]
fn concurrent_resolves_share_one_fetch() {
    let now = epoch_noon();
    let source = TableSource::with(&[(25544, "ISS (ZARYA)", ISS_1, ISS_2)]);
    let cache = Arc::new(FreshnessCache::new(Arc::new(MemoryStore::new()), source.clone()));

    std::thread::scope(|s| {
        for _ in 0..8 {
            let cache = cache.clone();
            s.spawn(move || cache.resolve(25544, 48, now).unwrap());
        }
    });
    assert_eq!(source.calls(), 1);
}

#[test]
fn iss_position_is_plausible() {
    let now = epoch_noon();
    let store = Arc::new(MemoryStore::new());
    store.upsert(iss_set(now)).unwrap();
    let tracker = Tracker::from_parts(FreshnessCache::offline(store), Arc::new(Sgp4));

    let sample = tracker.current_position(25544, 48, now).unwrap();
    assert_eq!(sample.name, "ISS (ZARYA)");
    assert!(sample.latitude_deg.abs() <= 52.0, "lat {}", sample.latitude_deg);
    assert!((-180.0..=180.0).contains(&sample.longitude_deg));
    assert!((370.0..450.0).contains(&sample.alt_km), "alt {}", sample.alt_km);
    assert!((7.5..7.8).contains(&sample.speed_km_s), "speed {}", sample.speed_km_s);
}

#[test]
fn position_is_deterministic_for_injected_time() {
    let now = epoch_noon() + Duration::minutes(37);
    let store = Arc::new(MemoryStore::new());
    store.upsert(iss_set(epoch_noon())).unwrap();
    let tracker = Tracker::from_parts(FreshnessCache::offline(store), Arc::new(Sgp4));

    let first = tracker.current_position(25544, 48, now).unwrap();
    let second = tracker.current_position(25544, 48, now).unwrap();
    assert_eq!(first, second);
}

struct DivergingElements;

impl Propagator for DivergingElements {
    fn propagate(&self, _: &str, _: &str, _: DateTime<Utc>) -> orbtrack::Result<StateVector> {
        Err(Error::Propagation { code: 1, message: "eccentricity out of range".to_string() })
    }
}

#[test]
fn propagation_error_yields_no_position() {
    let now = epoch_noon();
    let store = Arc::new(MemoryStore::new());
    store.upsert(iss_set(now)).unwrap();
    let tracker = Tracker::from_parts(FreshnessCache::offline(store), Arc::new(DivergingElements));

    match tracker.current_position(25544, 48, now) {
        Err(Error::Propagation { code, .. }) => assert_eq!(code, 1),
        other => panic!("expected propagation error, got {other:?}"),
    }
    assert!(tracker.current_positions(&[25544], 48, now).unwrap().is_empty());
}

#[test]
fn batch_skips_unknown_identifier() {
    let now = epoch_noon();
    let iss_b_1 = ISS_1.replacen("25544", "25545", 1);
    let iss_b_2 = ISS_2.replacen("25544", "25545", 1);

    let store = Arc::new(MemoryStore::new());
    store.upsert(iss_set(now)).unwrap();
    let source = TableSource::with(&[(25545, "SAT B", iss_b_1.as_str(), iss_b_2.as_str())]);

    let tracker = Tracker::from_parts(FreshnessCache::new(store, source), Arc::new(Fixed));
    let samples = tracker.current_positions(&[25544, 99999, 25545], 48, now).unwrap();
    let ids: Vec<u32> = samples.iter().map(|s| s.norad_id).collect();
    assert_eq!(ids, vec![25544, 25545]);

    assert!(matches!(
        tracker.current_position(99999, 48, now),
        Err(Error::NotFound { norad_id: 99999, .. })
    ));
}

/// Checksum-agnostic propagator for tests that rewrite element lines.
struct Fixed;

impl Propagator for Fixed {
    fn propagate(&self, _: &str, _: &str, _: DateTime<Utc>) -> orbtrack::Result<StateVector> {
        Ok(StateVector { position: [6778.0, 0.0, 0.0], velocity: [0.0, 7.67, 0.0] })
    }
}

#[test]
fn import_then_refresh_tracked() {
    let now = epoch_noon();
    let group = format!(
        "ISS (ZARYA)\n{ISS_1}\n{ISS_2}\nBROKEN\nnot a line\nnor this\nISS (DUP)\n{ISS_1}\n{ISS_2}\n"
    );
    let source = Arc::new(TableSource { group: Some(group), ..TableSource::default() });
    let store = Arc::new(MemoryStore::new());

    let count = import_catalog(source.as_ref(), store.as_ref(), now).unwrap();
    assert_eq!(count, 2);
    assert_eq!(store.get(25544).unwrap().unwrap().name, "ISS (DUP)");

    let cache = FreshnessCache::new(store, source.clone());
    let report = refresh_tracked(&cache, &[25544, 12345], 48, now + Duration::hours(1));
    assert_eq!(report.checked, 2);
    assert_eq!(report.failed, 1);
}

#[test]
fn import_reports_unavailable_group() {
    let source = TableSource::default();
    let err = import_catalog(&source, &MemoryStore::new(), epoch_noon()).unwrap_err();
    assert!(matches!(err, Error::CatalogUnavailable(FetchFailure::EmptyBody)));
}

#[test]
fn file_backed_tracker_keeps_refreshed_elements() {
    let dir = std::env::temp_dir().join(format!("orbtrack-it-{}", std::process::id()));
    let path = dir.join("elements.json");
    let _ = std::fs::remove_dir_all(&dir);
    let now = epoch_noon();

    {
        let store = Arc::new(FileStore::open(&path).unwrap());
        let source = TableSource::with(&[(25544, "ISS (ZARYA)", ISS_1, ISS_2)]);
        let tracker = Tracker::new(&TrackerConfig::default(), store, source);
        tracker.current_position(25544, 48, now).unwrap();
    }

    let reopened = FileStore::open(&path).unwrap();
    assert_eq!(reopened.get(25544).unwrap().unwrap(), iss_set(now));
    let _ = std::fs::remove_dir_all(&dir);
}

#[derive(Debug, Deserialize)]
struct SchemaFixture {
    #[serde(rename = "version")]
    _version: u32,
    #[serde(rename = "description")]
    _description: String,
    keys: Vec<String>,
    field_types: BTreeMap<String, ExpectedType>,
    required_non_empty: Vec<String>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ExpectedType {
    String,
    Number,
}

#[test]
fn ffi_position_matches_schema_fixture() {
    // Load golden schema describing the JSON shape handed to native callers.
    let fixture: SchemaFixture = serde_json::from_str(include_str!("fixtures/position_schema.json"))
        .expect("fixture JSON should parse");

    let tle1 = CString::new(ISS_1).unwrap();
    let tle2 = CString::new(ISS_2).unwrap();
    let json_ptr = orbtrack_position_json(tle1.as_ptr(), tle2.as_ptr(), epoch_noon().timestamp());
    assert!(!json_ptr.is_null(), "FFI should not return null");

    let json_str = unsafe { CStr::from_ptr(json_ptr).to_string_lossy().into_owned() };
    let value: serde_json::Value = serde_json::from_str(&json_str)
        .unwrap_or_else(|err| panic!("Expected valid JSON, got error: {err}\nPayload: {json_str}"));
    let obj = value.as_object().expect("position must be a JSON object");

    let actual_keys: BTreeSet<_> = obj.keys().cloned().collect();
    let expected_keys: BTreeSet<_> = fixture.keys.iter().cloned().collect();
    assert_eq!(actual_keys, expected_keys, "Position JSON keys diverged from golden schema");

    for (field, expected_type) in &fixture.field_types {
        let value = &obj[field];
        match expected_type {
            ExpectedType::String => {
                let s = value
                    .as_str()
                    .unwrap_or_else(|| panic!("Field '{field}' should be a string"));
                if fixture.required_non_empty.iter().any(|f| f == field) {
                    assert!(!s.trim().is_empty(), "Field '{field}' should not be empty");
                }
            }
            ExpectedType::Number => {
                value
                    .as_f64()
                    .unwrap_or_else(|| panic!("Field '{field}' should be a number, got {value}"));
            }
        }
    }
    assert_eq!(obj["norad_id"], 25544);

    free_json(json_ptr);
}

#[test]
fn ffi_reports_bad_elements_as_error_object() {
    let tle1 = CString::new("garbage").unwrap();
    let tle2 = CString::new("more garbage").unwrap();
    let json_ptr = orbtrack_position_json(tle1.as_ptr(), tle2.as_ptr(), epoch_noon().timestamp());

    let json_str = unsafe { CStr::from_ptr(json_ptr).to_string_lossy().into_owned() };
    let value: serde_json::Value = serde_json::from_str(&json_str).unwrap();
    assert!(value["error"].as_str().is_some(), "{json_str}");
    assert!(value["code"].is_null());

    free_json(json_ptr);
}
