//! Great-circle distance and travel plausibility.

use crate::models::GeoFix;

/// Mean Earth radius used for all distance calculations.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Travel faster than this between two fixes is treated as spoofed.
pub const MAX_PLAUSIBLE_SPEED_KMH: f64 = 100.0;

/// Fixes closer together in time than this are bursts and never judged.
pub const MIN_ELAPSED_SECS: f64 = 60.0;

/// Haversine distance in meters between two `(latitude, longitude)` points
/// given in degrees.
pub fn haversine_distance(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Movement between two consecutive location fixes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Travel {
    pub distance_meters: f64,
    pub elapsed_secs: f64,
    /// Zero when no time elapsed.
    pub speed_kmh: f64,
}

impl Travel {
    pub fn between(previous: &GeoFix, current: &GeoFix) -> Self {
        let distance_meters = haversine_distance(
            (previous.latitude, previous.longitude),
            (current.latitude, current.longitude),
        );
        let elapsed_secs =
            (current.recorded_at - previous.recorded_at).num_milliseconds() as f64 / 1000.0;
        let speed_kmh = if elapsed_secs > 0.0 {
            (distance_meters / 1000.0) / (elapsed_secs / 3600.0)
        } else {
            0.0
        };
        Self {
            distance_meters,
            elapsed_secs,
            speed_kmh,
        }
    }

    /// True iff the fixes are more than a minute apart and the implied
    /// speed exceeds the plausible maximum.
    pub fn is_implausible(&self) -> bool {
        self.elapsed_secs > MIN_ELAPSED_SECS && self.speed_kmh > MAX_PLAUSIBLE_SPEED_KMH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    const KATHMANDU: (f64, f64) = (27.7172, 85.3240);
    const POKHARA: (f64, f64) = (28.2096, 83.9856);

    fn fix(point: (f64, f64), secs_ago: i64) -> GeoFix {
        GeoFix {
            latitude: point.0,
            longitude: point.1,
            recorded_at: Utc::now() - Duration::seconds(secs_ago),
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        let d = haversine_distance(KATHMANDU, POKHARA);
        // Roughly 141 km apart.
        assert!((d - 141_000.0).abs() < 2_000.0, "distance was {}", d);
    }

    #[test]
    fn test_haversine_zero() {
        assert_eq!(haversine_distance(KATHMANDU, KATHMANDU), 0.0);
    }

    #[test]
    fn test_implausible_when_fast_and_slow_enough_apart() {
        // ~141 km in 10 minutes.
        let travel = Travel::between(&fix(KATHMANDU, 600), &fix(POKHARA, 0));
        assert!(travel.speed_kmh > 100.0);
        assert!(travel.is_implausible());
    }

    #[test]
    fn test_burst_updates_never_flag() {
        // ~141 km in 30 seconds is absurd but inside the burst window.
        let travel = Travel::between(&fix(KATHMANDU, 30), &fix(POKHARA, 0));
        assert!(travel.speed_kmh > 100.0);
        assert!(!travel.is_implausible());
    }

    #[test]
    fn test_plausible_speed() {
        // ~141 km in 3 hours is under 50 km/h.
        let travel = Travel::between(&fix(KATHMANDU, 3 * 3600), &fix(POKHARA, 0));
        assert!(travel.speed_kmh < 100.0);
        assert!(!travel.is_implausible());
    }

    #[test]
    fn test_non_positive_elapsed() {
        let now = Utc::now();
        let a = GeoFix { latitude: KATHMANDU.0, longitude: KATHMANDU.1, recorded_at: now };
        let b = GeoFix { latitude: POKHARA.0, longitude: POKHARA.1, recorded_at: now - Duration::seconds(120) };
        let travel = Travel::between(&a, &b);
        assert_eq!(travel.speed_kmh, 0.0);
        assert!(!travel.is_implausible());
    }
}
