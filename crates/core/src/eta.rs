//! Nearest-vehicle ranking and ETA estimation.
//!
//! Everything works in polyline steps: the rider's station is projected onto
//! each candidate's route polyline, a direction-aware step count from vehicle
//! to station is computed, and the survivors are ranked ascending. Kilometers
//! and minutes are derived from steps via the [`EtaConfig`] calibration
//! constants at the very end; steps are the ground truth.

use geo::Point;

use bahan_transit::{Direction, RouteGraph, RouteIdentifier, StationIdentifier, VehicleIdentifier};

use crate::config::EtaConfig;
use crate::fleet::{FleetSnapshot, Vehicle};
use crate::geometry::GeometryStore;
use crate::planner::{self, JourneyPlan};

/// One leg of a journey: a route plus the resolved travel direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leg {
    pub route: RouteIdentifier,
    pub direction: Direction,
}

impl Leg {
    /// The boarding leg of a plan: the direct route itself, or the first
    /// route of a transfer up to the transfer station.
    pub fn boarding(
        graph: &RouteGraph,
        plan: &JourneyPlan,
        start: &StationIdentifier,
        end: &StationIdentifier,
    ) -> Option<Self> {
        let (route_id, leg_end) = match plan {
            JourneyPlan::Direct { route } => (route, end),
            JourneyPlan::Transfer {
                first,
                transfer_station,
                ..
            } => (first, transfer_station),
        };
        let route = graph.route(route_id)?;
        let direction = planner::leg_direction(&route, start, leg_end)?;
        Some(Self {
            route: route_id.clone(),
            direction,
        })
    }
}

/// A vehicle that can still reach the rider, with its step-distance and the
/// display numbers derived from it.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub vehicle: VehicleIdentifier,
    pub steps: usize,
    pub distance_km: f64,
    pub eta_minutes: f64,
}

/// Rank the vehicles of `leg`'s route by step-distance to `start`, nearest
/// first.
///
/// Vehicles are dropped when they run the other assigned direction, their
/// route has no usable geometry, the station cannot be projected, they have
/// already passed the station (linear unreachable), or the step count
/// exceeds the configured fraction of the polyline; beyond that it is
/// wrap-around noise, not a bus worth waiting for.
pub fn rank(
    snapshot: &FleetSnapshot,
    geometry: &GeometryStore,
    graph: &RouteGraph,
    leg: &Leg,
    start: &StationIdentifier,
    cfg: &EtaConfig,
) -> Vec<Candidate> {
    let Some(station) = graph.station(start) else {
        return Vec::new();
    };
    let Some(polyline) = geometry.polyline(&leg.route) else {
        return Vec::new();
    };
    let Some(user_idx) = geometry.station_index(&station, &leg.route, leg.direction) else {
        return Vec::new();
    };
    let cutoff = (polyline.len() as f64 * cfg.reachable_fraction) as usize;

    let mut candidates: Vec<Candidate> = snapshot
        .on_route(&leg.route)
        .filter(|v| v.assigned_direction == leg.direction)
        .filter_map(|v| {
            let vehicle_idx = v.projected_index(polyline)?;
            let steps =
                polyline.steps_between(vehicle_idx, user_idx, leg.direction, v.circular)?;
            (steps <= cutoff).then(|| Candidate {
                vehicle: v.id.clone(),
                steps,
                distance_km: steps as f64 * cfg.km_per_step,
                eta_minutes: steps as f64 * cfg.minutes_per_step,
            })
        })
        .collect();

    // Ascending by steps; id as tie-break keeps the order stable.
    candidates.sort_by(|a, b| a.steps.cmp(&b.steps).then(a.vehicle.cmp(&b.vehicle)));
    candidates
}

/// Estimated wait at the transfer station, minutes.
///
/// Second-leg best candidate's time to the transfer station, minus the first
/// leg's own travel time to it, floored at the configured minimum: a rider
/// is never promised a zero-minute interchange.
pub fn transfer_wait_minutes(
    snapshot: &FleetSnapshot,
    geometry: &GeometryStore,
    graph: &RouteGraph,
    plan: &JourneyPlan,
    start: &StationIdentifier,
    end: &StationIdentifier,
    cfg: &EtaConfig,
) -> Option<f64> {
    let JourneyPlan::Transfer {
        first,
        second,
        transfer_station,
    } = plan
    else {
        return None;
    };

    // First leg: rider's travel time from start to the hub.
    let first_route = graph.route(first)?;
    let direction = planner::leg_direction(&first_route, start, transfer_station)?;
    let polyline = geometry.polyline(first)?;
    let boarding = graph.station(start)?;
    let hub = graph.station(transfer_station)?;
    let from = geometry.station_index(&boarding, first, direction)?;
    let to = geometry.station_index(&hub, first, direction)?;
    let travel_steps = polyline.steps_between(from, to, direction, first_route.is_circular)?;
    let first_leg_minutes = travel_steps as f64 * cfg.minutes_per_step;

    // Second leg: nearest oncoming vehicle's time to the hub.
    let second_route = graph.route(second)?;
    let second_leg = Leg {
        route: second.clone(),
        direction: planner::leg_direction(&second_route, transfer_station, end)?,
    };
    let oncoming = rank(snapshot, geometry, graph, &second_leg, transfer_station, cfg);
    let best = oncoming.first()?;

    Some((best.eta_minutes - first_leg_minutes).max(cfg.min_transfer_wait_min))
}

/// The road slice between a vehicle and a station, for the map's tether line.
///
/// Walks the polyline from the vehicle toward the station in the leg
/// direction; empty when the vehicle cannot reach it. The final point is
/// snapped to the station's exact platform so the line never overshoots by a
/// few meters of polyline resolution.
pub fn tether(
    vehicle: &Vehicle,
    geometry: &GeometryStore,
    graph: &RouteGraph,
    station_id: &StationIdentifier,
    direction: Direction,
    cfg: &EtaConfig,
) -> Vec<Point> {
    let Some(station) = graph.station(station_id) else {
        return Vec::new();
    };
    let Some(polyline) = geometry.polyline(&vehicle.route) else {
        return Vec::new();
    };
    let platform = station.platform(direction);
    let (Some(vehicle_idx), Some(user_idx)) = (
        vehicle.projected_index(polyline),
        polyline.nearest_index(platform),
    ) else {
        return Vec::new();
    };
    let Some(steps) = polyline.steps_between(vehicle_idx, user_idx, direction, vehicle.circular)
    else {
        return Vec::new();
    };
    if steps as f64 > polyline.len() as f64 * cfg.reachable_fraction {
        return Vec::new();
    }

    let mut points = polyline.walk(vehicle_idx, steps, direction, vehicle.circular);
    if let Some(last) = points.last_mut() {
        *last = platform;
    }
    points
}
