//! Live position merge: reconciles driver GPS reports with the simulated
//! fleet.
//!
//! Driver clients publish `{lat, lng, heading, active, lastUpdated}` under
//! their vehicle id in a shared key-value feed; this module consumes the full
//! mapping each time it changes. An active, fresh report makes its vehicle
//! live: its coordinate is taken verbatim, never blended with simulated
//! state. Everything else (absent key, `active: false`, missing fields, or a
//! report older than the staleness window) demotes the vehicle back to
//! simulated motion, resuming from the polyline point nearest its last known
//! coordinate so there is no teleport.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use geo::Point;
use serde::Deserialize;
use tracing::{debug, warn};

use bahan_transit::bearing_deg;

use crate::fleet::{FleetSnapshot, Motion, Vehicle};
use crate::geometry::GeometryStore;

/// One entry of the live feed, deserialized leniently: a payload missing
/// required fields is still a valid `LiveReport`, it just never counts as
/// active.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LiveReport {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub active: bool,
    /// Epoch milliseconds, as published by the driver client.
    #[serde(rename = "lastUpdated")]
    pub last_updated: Option<i64>,
}

impl LiveReport {
    pub fn position(&self) -> Option<Point> {
        Some(Point::new(self.lng?, self.lat?))
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.last_updated?).single()
    }

    /// Active, complete, and younger than the staleness window.
    fn is_authoritative(&self, now: DateTime<Utc>, staleness: chrono::Duration) -> bool {
        if !self.active || self.position().is_none() {
            return false;
        }
        match self.timestamp() {
            Some(ts) => now.signed_duration_since(ts) <= staleness,
            None => false,
        }
    }
}

/// Apply one full feed mapping to the fleet.
///
/// Pure: derives a new snapshot. This is the only code that flips a vehicle's
/// [`Motion`] variant, which is what enforces the single-writer rule: the
/// simulator never touches live vehicles, and the feed never writes through
/// any other path.
pub fn merge(
    snapshot: &FleetSnapshot,
    feed: &HashMap<String, LiveReport>,
    geometry: &GeometryStore,
    now: DateTime<Utc>,
    staleness: chrono::Duration,
) -> FleetSnapshot {
    let mut next = Vec::with_capacity(snapshot.len());
    for vehicle in snapshot.vehicles() {
        let report = feed.get(vehicle.id.as_str());
        let updated = match (report, vehicle.is_live()) {
            (Some(r), _) if r.is_authoritative(now, staleness) => promote(vehicle, r),
            (r, true) => demote(vehicle, r, geometry, now, staleness),
            (_, false) => vehicle.clone(),
        };
        next.push(updated);
    }
    FleetSnapshot::new(next)
}

fn promote(vehicle: &Vehicle, report: &LiveReport) -> Vehicle {
    let mut v = vehicle.clone();
    // The guard above established position and timestamp exist.
    let position = report.position().unwrap_or(v.position);
    let last_updated = report.timestamp().unwrap_or_else(Utc::now);

    v.heading = match report.heading {
        Some(h) => h.rem_euclid(360.0),
        // Feed omitted heading: derive it from the movement itself.
        None if position != v.position => bearing_deg(v.position, position),
        None => v.heading,
    };
    if !vehicle.is_live() {
        debug!(vehicle = %v.id, "vehicle went live");
    }
    v.position = position;
    v.motion = Motion::Live { last_updated };
    v
}

/// Age out live vehicles whose last report is older than the staleness
/// window, without waiting for another feed batch.
///
/// [`merge`] can only demote when the feed delivers; if a driver client
/// crashes and the feed goes silent, this pass, run from the simulator tick,
/// is what keeps the vehicle from staying frozen at its last coordinate.
pub fn expire(
    snapshot: &FleetSnapshot,
    geometry: &GeometryStore,
    now: DateTime<Utc>,
    staleness: chrono::Duration,
) -> FleetSnapshot {
    let mut next = Vec::with_capacity(snapshot.len());
    for vehicle in snapshot.vehicles() {
        let expired = match vehicle.motion {
            Motion::Live { last_updated } => now.signed_duration_since(last_updated) > staleness,
            Motion::Simulated { .. } => false,
        };
        next.push(if expired {
            warn!(vehicle = %vehicle.id, "live report went stale, reverting to simulated motion");
            resume_simulated(vehicle, geometry)
        } else {
            vehicle.clone()
        });
    }
    FleetSnapshot::new(next)
}

fn demote(
    vehicle: &Vehicle,
    report: Option<&LiveReport>,
    geometry: &GeometryStore,
    now: DateTime<Utc>,
    staleness: chrono::Duration,
) -> Vehicle {
    let stale = report
        .filter(|r| r.active)
        .and_then(LiveReport::timestamp)
        .map(|ts| now.signed_duration_since(ts) > staleness)
        .unwrap_or(false);
    if stale {
        warn!(vehicle = %vehicle.id, "live report went stale, reverting to simulated motion");
    } else {
        debug!(vehicle = %vehicle.id, "live feed ended, reverting to simulated motion");
    }
    resume_simulated(vehicle, geometry)
}

/// Back to simulated motion from the polyline point nearest the last live
/// coordinate. With geometry still missing the index stays unknown-at-zero
/// and the simulator no-ops until it can re-seed.
fn resume_simulated(vehicle: &Vehicle, geometry: &GeometryStore) -> Vehicle {
    let mut v = vehicle.clone();
    let resume_index = geometry
        .polyline(&v.route)
        .and_then(|p| p.nearest_index(v.position))
        .unwrap_or(0);
    v.motion = Motion::Simulated {
        path_index: resume_index,
        travel: v.assigned_direction,
    };
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use bahan_transit::{fixtures, Direction, Polyline, RouteIdentifier, VehicleIdentifier};

    use crate::config::EngineConfig;
    use crate::fleet::{seed_route, spawn_fleet, tick};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn staleness() -> chrono::Duration {
        chrono::Duration::seconds(24)
    }

    fn report(lat: f64, lng: f64, at: DateTime<Utc>) -> LiveReport {
        LiveReport {
            lat: Some(lat),
            lng: Some(lng),
            heading: None,
            active: true,
            last_updated: Some(at.timestamp_millis()),
        }
    }

    fn ring_polyline(n: usize) -> Polyline {
        Polyline::new(
            (0..n)
                .map(|i| Point::new(85.28 + i as f64 * 0.0005, 27.70))
                .collect(),
        )
    }

    fn setup() -> (FleetSnapshot, GeometryStore) {
        let graph = fixtures::kathmandu().unwrap();
        let cfg = EngineConfig::default();
        let geometry = GeometryStore::from_polylines([(
            RouteIdentifier::new("R1"),
            ring_polyline(100),
        )]);
        let fleet = seed_route(
            &spawn_fleet(&graph, &cfg),
            &RouteIdentifier::new("R1"),
            geometry.polyline(&RouteIdentifier::new("R1")).unwrap(),
        );
        (fleet, geometry)
    }

    #[test]
    fn test_active_report_takes_exact_coordinate() {
        let (fleet, geometry) = setup();
        let feed = HashMap::from([("R1-B0".to_string(), report(27.7050, 85.3001, now()))]);

        let merged = merge(&fleet, &feed, &geometry, now(), staleness());
        let v = merged.get(&VehicleIdentifier::new("R1-B0")).unwrap();
        assert!(v.is_live());
        // Verbatim, no blending with the simulated position.
        assert_eq!(v.position, Point::new(85.3001, 27.7050));
        // Untouched neighbor stays simulated.
        assert!(!merged.get(&VehicleIdentifier::new("R1-B1")).unwrap().is_live());
    }

    #[test]
    fn test_feed_heading_preferred_derived_otherwise() {
        let (fleet, geometry) = setup();
        let mut with_heading = report(27.7050, 85.3001, now());
        with_heading.heading = Some(123.0);
        let feed = HashMap::from([("R1-B0".to_string(), with_heading)]);
        let merged = merge(&fleet, &feed, &geometry, now(), staleness());
        assert_eq!(
            merged.get(&VehicleIdentifier::new("R1-B0")).unwrap().heading,
            123.0
        );

        // Second update without heading, further east: derived bearing ~90.
        let feed2 = HashMap::from([("R1-B0".to_string(), report(27.7050, 85.3101, now()))]);
        let merged2 = merge(&merged, &feed2, &geometry, now(), staleness());
        let h = merged2.get(&VehicleIdentifier::new("R1-B0")).unwrap().heading;
        assert!((h - 90.0).abs() < 1.0, "derived heading {h}");
    }

    #[test]
    fn test_vanished_report_resumes_from_nearest_point() {
        let (fleet, geometry) = setup();
        // Drive R1-B0 live to a point closest to polyline index 40.
        let live_at = geometry
            .polyline(&RouteIdentifier::new("R1"))
            .unwrap()
            .point(40)
            .unwrap();
        let feed = HashMap::from([(
            "R1-B0".to_string(),
            report(live_at.y(), live_at.x(), now()),
        )]);
        let merged = merge(&fleet, &feed, &geometry, now(), staleness());

        // Feed goes quiet: next merge demotes, resuming at index 40.
        let merged = merge(&merged, &HashMap::new(), &geometry, now(), staleness());
        let v = merged.get(&VehicleIdentifier::new("R1-B0")).unwrap();
        assert!(!v.is_live());
        assert_eq!(v.path_index(), Some(40));
        assert_eq!(v.position, live_at);

        // And the next tick moves on from there, no discontinuous jump.
        let cfg = EngineConfig::default();
        let after = tick(&merged, &geometry, &cfg);
        assert_eq!(
            after.get(&VehicleIdentifier::new("R1-B0")).unwrap().path_index(),
            Some(40 + cfg.step_per_tick)
        );
    }

    #[test]
    fn test_stale_active_report_expires() {
        let (fleet, geometry) = setup();
        let fresh = HashMap::from([("R1-B0".to_string(), report(27.7050, 85.3001, now()))]);
        let merged = merge(&fleet, &fresh, &geometry, now(), staleness());
        assert!(merged.get(&VehicleIdentifier::new("R1-B0")).unwrap().is_live());

        // Same report, 30s later: older than the 24s window, still active.
        let later = now() + chrono::Duration::seconds(30);
        let stale = HashMap::from([("R1-B0".to_string(), report(27.7050, 85.3001, now()))]);
        let expired = merge(&merged, &stale, &geometry, later, staleness());
        assert!(!expired.get(&VehicleIdentifier::new("R1-B0")).unwrap().is_live());
    }

    #[test]
    fn test_silent_feed_expires_stale_live_vehicle() {
        let (fleet, geometry) = setup();
        let r1 = RouteIdentifier::new("R1");
        let live_at = geometry.polyline(&r1).unwrap().point(40).unwrap();

        // Last report is an hour old and the publisher has gone quiet: no
        // feed batch will ever arrive to demote it.
        let mut gone = fleet.get(&VehicleIdentifier::new("R1-B0")).unwrap().clone();
        gone.motion = Motion::Live {
            last_updated: now() - chrono::Duration::hours(1),
        };
        gone.position = live_at;
        let mut fresh = fleet.get(&VehicleIdentifier::new("R1-B1")).unwrap().clone();
        fresh.motion = Motion::Live { last_updated: now() };
        let fleet = fleet.with_vehicle(gone).with_vehicle(fresh);

        let expired = expire(&fleet, &geometry, now(), staleness());
        let v = expired.get(&VehicleIdentifier::new("R1-B0")).unwrap();
        assert!(!v.is_live());
        assert_eq!(v.path_index(), Some(40));
        // A live vehicle inside the window is left alone.
        assert!(expired.get(&VehicleIdentifier::new("R1-B1")).unwrap().is_live());

        // And the simulator moves the demoted vehicle again.
        let cfg = EngineConfig::default();
        let after = tick(&expired, &geometry, &cfg);
        assert_eq!(
            after.get(&VehicleIdentifier::new("R1-B0")).unwrap().path_index(),
            Some(40 + cfg.step_per_tick)
        );
    }

    #[test]
    fn test_malformed_entry_is_inactive() {
        let (fleet, geometry) = setup();

        // Straight from the wire, missing coordinates entirely.
        let broken: LiveReport =
            serde_json::from_str(r#"{ "active": true, "lastUpdated": 1714564800000 }"#).unwrap();
        let feed = HashMap::from([("R1-B0".to_string(), broken)]);

        let merged = merge(&fleet, &feed, &geometry, now(), staleness());
        assert!(!merged.get(&VehicleIdentifier::new("R1-B0")).unwrap().is_live());
    }

    #[test]
    fn test_inactive_flag_demotes() {
        let (fleet, geometry) = setup();
        let feed = HashMap::from([("R1-B0".to_string(), report(27.7050, 85.3001, now()))]);
        let merged = merge(&fleet, &feed, &geometry, now(), staleness());

        let mut stopped = report(27.7050, 85.3001, now());
        stopped.active = false;
        let feed2 = HashMap::from([("R1-B0".to_string(), stopped)]);
        let merged2 = merge(&merged, &feed2, &geometry, now(), staleness());
        let v = merged2.get(&VehicleIdentifier::new("R1-B0")).unwrap();
        assert!(!v.is_live());
        assert_eq!(v.assigned_direction, Direction::Clockwise);
    }
}
