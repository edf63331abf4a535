//! Inertial (TEME) to Earth-fixed to geodetic conversion.
//!
//! A single rotation by Greenwich mean sidereal time takes TEME to ECEF. UT1 is
//! taken equal to UTC and polar motion, precession and nutation are ignored,
//! which keeps ground positions within a few hundred metres.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------- Constants ----------
#[cfg(not(feature = "wgs72"))]
pub const EARTH_RADIUS_KM: f64 = 6378.137;                 // WGS-84 equatorial
#[cfg(not(feature = "wgs72"))]
pub const EARTH_FLATTENING: f64 = 1.0 / 298.257_223_563;   // WGS-84

#[cfg(feature = "wgs72")]
pub const EARTH_RADIUS_KM: f64 = 6378.135;                 // WGS-72 equatorial
#[cfg(feature = "wgs72")]
pub const EARTH_FLATTENING: f64 = 1.0 / 298.26;            // WGS-72

const J2000_JD: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const SECONDS_PER_DAY: f64 = 86_400.0;
const GEODETIC_ITERATIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geodetic {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

/// Julian date of a UTC instant.
pub fn julian_date(t: DateTime<Utc>) -> f64 {
    let seconds = t.timestamp() as f64 + t.timestamp_subsec_nanos() as f64 / 1.0e9;
    UNIX_EPOCH_JD + seconds / SECONDS_PER_DAY
}

/// Greenwich mean sidereal time in radians, in `[0, 2π)`.
pub fn gmst_from_jd(jd: f64) -> f64 {
    let d = jd - J2000_JD;
    let t = d / 36525.0;
    let gmst = 280.46061837 + 360.98564736629 * d + 0.000387933 * t * t - t * t * t / 38710000.0;
    unwind_deg(gmst).to_radians()
}

fn unwind_deg(mut x: f64) -> f64 {
    x %= 360.0;
    if x < 0.0 { x += 360.0; }
    x
}

/// Rotate an inertial vector about Z by `-theta` into the Earth-fixed frame.
pub fn teme_to_ecef(r: [f64; 3], theta: f64) -> [f64; 3] {
    let (ct, st) = (theta.cos(), theta.sin());
    [
         ct * r[0] + st * r[1],
        -st * r[0] + ct * r[1],
         r[2],
    ]
}

/// Earth-fixed Cartesian metres to geodetic coordinates on the reference
/// ellipsoid, by fixed-point iteration on latitude.
pub fn ecef_to_geodetic(ecef_m: [f64; 3]) -> Geodetic {
    let a = EARTH_RADIUS_KM * 1000.0;
    let f = EARTH_FLATTENING;
    let e2 = f * (2.0 - f);
    let [x, y, z] = ecef_m;

    let lon = y.atan2(x);
    let p = (x * x + y * y).sqrt();

    let mut lat = z.atan2(p * (1.0 - e2));
    for _ in 0..GEODETIC_ITERATIONS {
        let sin_lat = lat.sin();
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        lat = (z + e2 * n * sin_lat).atan2(p);
    }

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let height_m = if cos_lat.abs() > 1e-10 {
        p / cos_lat - n
    } else {
        z.abs() / sin_lat.abs() - n * (1.0 - e2)
    };

    Geodetic {
        latitude_deg: lat.to_degrees(),
        longitude_deg: lon.to_degrees(),
        altitude_km: height_m / 1000.0,
    }
}

/// Ground position under an inertial position (km) at `at`.
pub fn to_geodetic(position_km: [f64; 3], at: DateTime<Utc>) -> Geodetic {
    let theta = gmst_from_jd(julian_date(at));
    let [x, y, z] = teme_to_ecef(position_km, theta);
    ecef_to_geodetic([x * 1000.0, y * 1000.0, z * 1000.0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn julian_date_of_j2000() {
        let t = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((julian_date(t) - 2451545.0).abs() < 1e-9);
    }

    #[test]
    fn gmst_at_j2000_epoch() {
        let gmst = gmst_from_jd(2451545.0);
        assert!((gmst - 280.46061837_f64.to_radians()).abs() < 1e-6, "{gmst}");
    }

    #[test]
    fn gmst_matches_meeus_example() {
        // Meeus, Astronomical Algorithms, example 12.a: 1987-04-10 0h UT
        let gmst = gmst_from_jd(2446895.5).to_degrees();
        assert!((gmst - 197.693195).abs() < 1e-5, "{gmst}");
    }

    #[test]
    fn gmst_is_wrapped() {
        for jd in [2400000.5, 2451545.0, 2460000.25, 2470000.75] {
            let g = gmst_from_jd(jd);
            assert!((0.0..std::f64::consts::TAU).contains(&g));
        }
    }

    #[test]
    fn rotation_by_zero_is_identity_and_keeps_z() {
        assert_eq!(teme_to_ecef([1.0, 2.0, 3.0], 0.0), [1.0, 2.0, 3.0]);
        let r = teme_to_ecef([1.0, 0.0, 5.0], std::f64::consts::FRAC_PI_2);
        assert!(r[0].abs() < 1e-12);
        assert!((r[1] + 1.0).abs() < 1e-12);
        assert_eq!(r[2], 5.0);
    }

    #[test]
    fn equator_surface_point() {
        let g = ecef_to_geodetic([EARTH_RADIUS_KM * 1000.0, 0.0, 0.0]);
        assert!(g.latitude_deg.abs() < 1e-9);
        assert!(g.longitude_deg.abs() < 1e-9);
        assert!(g.altitude_km.abs() < 1e-6);
    }

    /// Inverse of `ecef_to_geodetic`, in kilometres.
    fn surface_normal_point(lat_deg: f64, lon_deg: f64, alt_km: f64) -> [f64; 3] {
        let e2 = EARTH_FLATTENING * (2.0 - EARTH_FLATTENING);
        let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
        let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();
        let prime_vertical = EARTH_RADIUS_KM / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let horizontal = (prime_vertical + alt_km) * cos_lat;
        [
            horizontal * cos_lon,
            horizontal * sin_lon,
            (prime_vertical * (1.0 - e2) + alt_km) * sin_lat,
        ]
    }

    #[test]
    fn orbital_point_recovers_latitude_and_height() {
        let [x, y, z] = surface_normal_point(45.0, -120.0, 400.0);
        let g = ecef_to_geodetic([x * 1000.0, y * 1000.0, z * 1000.0]);
        assert!((g.latitude_deg - 45.0).abs() < 1e-7);
        assert!((g.longitude_deg + 120.0).abs() < 1e-9);
        assert!((g.altitude_km - 400.0).abs() < 1e-6);
    }

    #[test]
    fn geodetic_longitude_follows_sidereal_rotation() {
        let at = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        // an inertial vector along x sits at longitude -GMST on the ground
        let g = to_geodetic([7000.0, 0.0, 0.0], at);
        let expected = 360.0 - 280.46061837;
        assert!((g.longitude_deg - expected).abs() < 1e-4, "{}", g.longitude_deg);
        assert!(g.latitude_deg.abs() < 1e-9);
        assert!((g.altitude_km - (7000.0 - EARTH_RADIUS_KM)).abs() < 1e-6);
    }
}
