//! The vehicle fleet and its simulated motion.
//!
//! A vehicle is either simulated (the engine advances it along its route's
//! polyline every tick) or live (a driver's GPS reports drive it; see
//! [`crate::live`]). The two are a tagged variant, not a flag: a vehicle's
//! motion state decides exactly one writer, so the simulator and the live
//! merge can never both move the same vehicle in one update.
//!
//! [`tick`] is pure: it derives a complete new snapshot from the previous
//! one, which is what lets the state owner publish atomically.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use geo::Point;

use bahan_transit::{
    bearing_deg, BoundaryEvent, Direction, Polyline, RouteGraph, RouteIdentifier,
    VehicleIdentifier,
};

use crate::config::EngineConfig;
use crate::geometry::GeometryStore;

// ============================================================================
// Vehicle
// ============================================================================

/// Who currently moves this vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Motion {
    /// The simulator owns it: a polyline offset plus the sign of the current
    /// pass. On linear routes `travel` flips at the termini (pendulum); it is
    /// deliberately separate from [`Vehicle::assigned_direction`] so a bounce
    /// never changes which leg searches the vehicle matches.
    Simulated {
        path_index: usize,
        travel: Direction,
    },
    /// A driver's GPS feed owns it.
    Live { last_updated: DateTime<Utc> },
}

#[derive(Clone, Debug)]
pub struct Vehicle {
    pub id: VehicleIdentifier,
    pub route: RouteIdentifier,
    /// Service direction the unit is assigned to run. Immutable; the journey
    /// planner and ranking engine filter on this.
    pub assigned_direction: Direction,
    /// Whether the owning route loops. Denormalized from the route graph so
    /// per-tick index math needs no graph lookup.
    pub circular: bool,
    pub motion: Motion,
    pub position: Point,
    /// Compass degrees `[0, 360)`.
    pub heading: f64,
}

impl Vehicle {
    pub fn is_live(&self) -> bool {
        matches!(self.motion, Motion::Live { .. })
    }

    /// Current polyline offset, if the simulator knows one.
    pub fn path_index(&self) -> Option<usize> {
        match self.motion {
            Motion::Simulated { path_index, .. } => Some(path_index),
            Motion::Live { .. } => None,
        }
    }

    /// Polyline offset for ranking math: the simulated index, or the live
    /// position projected onto the route's polyline.
    pub fn projected_index(&self, polyline: &Polyline) -> Option<usize> {
        match self.motion {
            Motion::Simulated { path_index, .. } => Some(path_index.min(polyline.len().saturating_sub(1))),
            Motion::Live { .. } => polyline.nearest_index(self.position),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// One consistent view of the whole fleet.
///
/// Ordered by vehicle id so iteration (and therefore ranking ties and the
/// evenly-spread seeding below) is deterministic.
#[derive(Clone, Debug, Default)]
pub struct FleetSnapshot {
    vehicles: BTreeMap<VehicleIdentifier, Vehicle>,
}

impl FleetSnapshot {
    pub fn new(vehicles: impl IntoIterator<Item = Vehicle>) -> Self {
        Self {
            vehicles: vehicles.into_iter().map(|v| (v.id.clone(), v)).collect(),
        }
    }

    pub fn get(&self, id: &VehicleIdentifier) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn on_route<'a>(
        &'a self,
        route: &'a RouteIdentifier,
    ) -> impl Iterator<Item = &'a Vehicle> + 'a {
        self.vehicles.values().filter(move |v| &v.route == route)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    fn map_vehicles(&self, mut f: impl FnMut(&mut Vehicle)) -> Self {
        let mut next = self.clone();
        next.vehicles.values_mut().for_each(&mut f);
        next
    }

    pub(crate) fn with_vehicle(&self, vehicle: Vehicle) -> Self {
        let mut next = self.clone();
        next.vehicles.insert(vehicle.id.clone(), vehicle);
        next
    }
}

// ============================================================================
// Template & seeding
// ============================================================================

/// Create the fixed fleet: `per_route` units per route, alternating assigned
/// directions, parked at their route's first station until geometry arrives.
pub fn spawn_fleet(graph: &RouteGraph, cfg: &EngineConfig) -> FleetSnapshot {
    let mut vehicles = Vec::new();
    for route in graph.routes() {
        let origin = route
            .first_station()
            .and_then(|id| graph.station(id))
            .map(|s| s.location)
            .unwrap_or_else(|| Point::new(0.0, 0.0));

        for ordinal in 0..cfg.vehicles_per_route {
            let assigned = if ordinal % 2 == 0 {
                Direction::Clockwise
            } else {
                Direction::Anticlockwise
            };
            vehicles.push(Vehicle {
                id: VehicleIdentifier::for_unit(&route.id, ordinal),
                route: route.id.clone(),
                assigned_direction: assigned,
                circular: route.is_circular,
                motion: Motion::Simulated {
                    path_index: 0,
                    travel: assigned,
                },
                position: origin,
                heading: 0.0,
            });
        }
    }
    FleetSnapshot::new(vehicles)
}

/// Spread a route's simulated vehicles evenly over a freshly resolved
/// polyline. Live vehicles are left alone, their position is authoritative.
pub fn seed_route(
    snapshot: &FleetSnapshot,
    route: &RouteIdentifier,
    polyline: &Arc<Polyline>,
) -> FleetSnapshot {
    if polyline.is_empty() {
        return snapshot.clone();
    }
    let unit_count = snapshot
        .on_route(route)
        .filter(|v| !v.is_live())
        .count()
        .max(1);

    let mut ordinal = 0usize;
    snapshot.map_vehicles(|v| {
        if &v.route != route {
            return;
        }
        if let Motion::Simulated { travel, .. } = v.motion {
            let path_index = ordinal * polyline.len() / unit_count;
            ordinal += 1;
            if let Some(p) = polyline.point(path_index) {
                v.position = p;
            }
            v.motion = Motion::Simulated { path_index, travel };
        }
    })
}

// ============================================================================
// Tick
// ============================================================================

/// Advance every simulated vehicle one tick.
///
/// Circular routes wrap; linear routes clamp at the termini and flip the
/// travel sign (pendulum). Vehicles whose route has no usable geometry are
/// skipped in place; they resume the moment geometry becomes available.
/// Live vehicles are untouched: the feed is their only writer.
pub fn tick(snapshot: &FleetSnapshot, geometry: &GeometryStore, cfg: &EngineConfig) -> FleetSnapshot {
    snapshot.map_vehicles(|v| {
        let Motion::Simulated { path_index, travel } = v.motion else {
            return;
        };
        let Some(polyline) = geometry.polyline(&v.route) else {
            return;
        };

        let (next_index, event) = polyline.advance(path_index, cfg.step_per_tick, travel, v.circular);
        let next_travel = match event {
            BoundaryEvent::ReachedEnd => Direction::Anticlockwise,
            BoundaryEvent::ReachedStart => Direction::Clockwise,
            BoundaryEvent::None => travel,
        };

        if let Some(next_pos) = polyline.point(next_index) {
            if next_pos != v.position {
                v.heading = bearing_deg(v.position, next_pos);
            }
            v.position = next_pos;
        }
        v.motion = Motion::Simulated {
            path_index: next_index,
            travel: next_travel,
        };
    })
}
