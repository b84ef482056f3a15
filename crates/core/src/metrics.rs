//! Per-tick fleet health counters.
//!
//! Aggregated from a snapshot and logged by the engine loop; nothing here
//! feeds back into behavior.

use chrono::{DateTime, Utc};

use bahan_transit::{RouteGraph, RouteIdentifier};

use crate::fleet::{FleetSnapshot, Motion};
use crate::geometry::GeometryStore;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FleetMetrics {
    pub total_vehicles: usize,
    /// Vehicles currently driven by a GPS feed.
    pub live_vehicles: usize,
    /// Live vehicles whose last report is older than the staleness window;
    /// the engine demotes them on its next tick.
    pub stale_live_vehicles: usize,
    /// Routes still without usable geometry, whose vehicles sit frozen.
    pub untracked_routes: Vec<RouteIdentifier>,
    /// Fraction of vehicles on a tracked route, `[0.0, 1.0]`.
    pub tracked_fraction: f64,
}

impl FleetMetrics {
    pub fn aggregate(
        snapshot: &FleetSnapshot,
        geometry: &GeometryStore,
        graph: &RouteGraph,
        now: DateTime<Utc>,
        staleness: chrono::Duration,
    ) -> Self {
        let total_vehicles = snapshot.len();
        let mut live_vehicles = 0;
        let mut stale_live_vehicles = 0;
        let mut tracked = 0;

        for vehicle in snapshot.vehicles() {
            if let Motion::Live { last_updated } = vehicle.motion {
                live_vehicles += 1;
                if now.signed_duration_since(last_updated) > staleness {
                    stale_live_vehicles += 1;
                }
            }
            if geometry.is_tracked(&vehicle.route) {
                tracked += 1;
            }
        }

        let tracked_fraction = if total_vehicles == 0 {
            0.0
        } else {
            tracked as f64 / total_vehicles as f64
        };

        Self {
            total_vehicles,
            live_vehicles,
            stale_live_vehicles,
            untracked_routes: geometry.missing_routes(graph),
            tracked_fraction,
        }
    }
}
