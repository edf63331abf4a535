//! C ABI for native callers. Every returned string must go back through
//! [`free_json`].

use std::ffi::{c_char, CStr, CString};

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde_json::json;

use crate::error::Error;
use crate::propagation::Sgp4;
use crate::tle::catalog_number;
use crate::tracking::position_from_elements;

#[no_mangle]
pub extern "C" fn free_json(ptr: *mut c_char) {
    if ptr.is_null() { return; }
    unsafe { let _ = CString::from_raw(ptr); }
}

/// Position of the satellite described by `tle1`/`tle2` at `unix_seconds`, as
/// a JSON object. Failures come back as `{"error": ..., "code": ...}` where
/// `code` is the SGP4 status, or null when SGP4 never ran.
#[no_mangle]
pub extern "C" fn orbtrack_position_json(
    tle1: *const c_char,
    tle2: *const c_char,
    unix_seconds: i64,
) -> *mut c_char {
    crate::init_logger(log::LevelFilter::Info);
    info!("[orbtrack_position_json] Starting computation");

    if tle1.is_null() || tle2.is_null() {
        error!("[orbtrack_position_json] null TLE pointer");
        return into_c_json(json!({ "error": "null TLE line", "code": null }).to_string());
    }

    // Read C strings safely
    let tle1 = unsafe { CStr::from_ptr(tle1) }.to_string_lossy().into_owned();
    let tle2 = unsafe { CStr::from_ptr(tle2) }.to_string_lossy().into_owned();
    debug!("  tle1: {}", tle1);
    debug!("  tle2: {}", tle2);
    debug!("  unix_seconds: {}", unix_seconds);

    let Some(at) = DateTime::<Utc>::from_timestamp(unix_seconds, 0) else {
        error!("[orbtrack_position_json] timestamp {} out of range", unix_seconds);
        return into_c_json(json!({ "error": "timestamp out of range", "code": null }).to_string());
    };

    let norad_id = catalog_number(&tle1).unwrap_or(0);
    let body = match position_from_elements(&Sgp4, norad_id, "", &tle1, &tle2, at) {
        Ok(sample) => serde_json::to_string(&sample)
            .unwrap_or_else(|e| json!({ "error": e.to_string(), "code": null }).to_string()),
        Err(e) => {
            error!("[orbtrack_position_json] {}", e);
            let code = match &e {
                Error::Propagation { code, .. } => Some(*code),
                _ => None,
            };
            json!({ "error": e.to_string(), "code": code }).to_string()
        }
    };
    into_c_json(body)
}

fn into_c_json(body: String) -> *mut c_char {
    CString::new(body).unwrap_or_default().into_raw()
}
