//! The ARGO float observation record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One measurement reported by a float at a given time and depth.
///
/// Rows are immutable once inserted; `(float_id, timestamp, pressure)`
/// is the unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatObservation {
    /// WMO platform number of the float.
    pub float_id: i32,
    /// Surfacing/measurement time (UTC).
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Pressure in decibar, a proxy for depth.
    pub pressure: f64,
    pub temperature: Option<f64>,
    pub salinity: Option<f64>,
    pub dissolved_oxygen: Option<f64>,
    pub chlorophyll: Option<f64>,
}

impl FloatObservation {
    pub fn key(&self) -> ObservationKey {
        ObservationKey::new(self.float_id, self.timestamp, self.pressure)
    }

    /// True when the row carries at least one of the two core sensors.
    pub fn has_core_sensors(&self) -> bool {
        self.temperature.is_some() || self.salinity.is_some()
    }
}

/// Hashable form of the unique key `(float_id, timestamp, pressure)`.
///
/// Pressure is quantized to millibar-scale (1e-3 dbar) so the float
/// can participate in Eq/Hash for in-memory dedup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservationKey {
    pub float_id: i32,
    pub timestamp: DateTime<Utc>,
    pressure_millidbar: i64,
}

impl ObservationKey {
    pub fn new(float_id: i32, timestamp: DateTime<Utc>, pressure: f64) -> Self {
        Self {
            float_id,
            timestamp,
            pressure_millidbar: (pressure * 1000.0).round() as i64,
        }
    }

    pub fn pressure(&self) -> f64 {
        self.pressure_millidbar as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs(float_id: i32, pressure: f64) -> FloatObservation {
        FloatObservation {
            float_id,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap(),
            latitude: 12.5,
            longitude: 88.0,
            pressure,
            temperature: Some(28.4),
            salinity: Some(34.9),
            dissolved_oxygen: None,
            chlorophyll: None,
        }
    }

    #[test]
    fn test_key_equality_quantizes_pressure() {
        let a = obs(2902115, 10.0001);
        let b = obs(2902115, 10.0004);
        let c = obs(2902115, 10.5);

        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_key_distinguishes_floats() {
        assert_ne!(obs(2902115, 10.0).key(), obs(2902116, 10.0).key());
    }

    #[test]
    fn test_has_core_sensors() {
        let mut o = obs(2902115, 10.0);
        assert!(o.has_core_sensors());
        o.temperature = None;
        assert!(o.has_core_sensors());
        o.salinity = None;
        assert!(!o.has_core_sensors());
    }
}
