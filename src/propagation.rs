//! SGP4 propagation of two-line elements to an arbitrary instant.

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

// SGP4 v2.3
use sgp4::{Constants, Elements};

use crate::error::{Error, Result};

/// Status codes as numbered by the reference SGP4 implementation.
pub const SGP4_ECCENTRICITY: i32 = 1;
pub const SGP4_MEAN_MOTION: i32 = 2;
pub const SGP4_PERTURBED_ECCENTRICITY: i32 = 3;
pub const SGP4_SEMI_LATUS_RECTUM: i32 = 4;
/// Failures the reference numbering has no slot for.
pub const SGP4_UNCLASSIFIED: i32 = -1;

/// Position (km) and velocity (km/s) in the TEME inertial frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StateVector {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

impl StateVector {
    pub fn speed(&self) -> f64 {
        let [vx, vy, vz] = self.velocity;
        (vx * vx + vy * vy + vz * vz).sqrt()
    }
}

/// Anything that can turn element lines and a time into a state vector.
pub trait Propagator: Send + Sync {
    fn propagate(&self, line1: &str, line2: &str, at: DateTime<Utc>) -> Result<StateVector>;
}

/// The SGP4 model from the `sgp4` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sgp4;

impl Propagator for Sgp4 {
    fn propagate(&self, line1: &str, line2: &str, at: DateTime<Utc>) -> Result<StateVector> {
        propagate(line1, line2, at)
    }
}

/// Advance the elements to `at`.
///
/// Any SGP4 failure comes back as [`Error::Propagation`] with its numeric
/// code; lines that cannot be decoded give [`Error::InvalidElements`].
pub fn propagate(line1: &str, line2: &str, at: DateTime<Utc>) -> Result<StateVector> {
    let elements = Elements::from_tle(None, line1.as_bytes(), line2.as_bytes())
        .map_err(|e| Error::InvalidElements(e.to_string()))?;
    let constants = Constants::from_elements(&elements).map_err(|e| Error::Propagation {
        code: SGP4_MEAN_MOTION,
        message: e.to_string(),
    })?;

    let minutes = elements
        .datetime_to_minutes_since_epoch(&at.naive_utc())
        .map_err(|e| Error::Propagation {
            code: SGP4_UNCLASSIFIED,
            message: format!("{:?}", e),
        })?;
    debug!(
        "[propagate] NORAD {} at {} ({:.1} min from epoch)",
        elements.norad_id, at, minutes.0
    );
    let prediction = constants.propagate(minutes).map_err(propagation_error)?;

    Ok(StateVector {
        position: prediction.position,
        velocity: prediction.velocity,
    })
}

fn propagation_error(err: sgp4::Error) -> Error {
    let code = match &err {
        sgp4::Error::OutOfRangeEccentricity { .. } => SGP4_ECCENTRICITY,
        sgp4::Error::OutOfRangePerturbedEccentricity { .. } => SGP4_PERTURBED_ECCENTRICITY,
        sgp4::Error::NegativeSemiLatusRectum { .. } => SGP4_SEMI_LATUS_RECTUM,
        #[allow(unreachable_patterns)]
        _ => SGP4_UNCLASSIFIED,
    };
    Error::Propagation {
        code,
        message: format!("{:?}", err),
    }
}
