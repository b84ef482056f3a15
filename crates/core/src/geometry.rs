//! Geometry resolver: turns a route's station list into a road-following
//! polyline and maps stations onto polyline indices.
//!
//! The provider is any OSRM-compatible `route` service. One fetch per route
//! at startup, paced to respect the public instance's rate limit; a failed
//! route is logged and skipped, never blocking the rest of the fleet, and can
//! be retried later.

use std::collections::HashMap;
use std::sync::Arc;

use geo::Point;
use serde::Deserialize;

use bahan_transit::{Direction, Polyline, Route, RouteGraph, RouteIdentifier, Station};

use crate::config::GeometryConfig;
use crate::error::{EngineError, Result};

// ============================================================================
// Provider client
// ============================================================================

/// Minimal typed view of the OSRM `route` response; everything else in the
/// payload is ignored.
#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// `(lng, lat)` pairs, GeoJSON order.
    coordinates: Vec<[f64; 2]>,
}

#[derive(Clone)]
pub struct OsrmClient {
    http: reqwest::Client,
    base_url: String,
}

impl OsrmClient {
    pub fn new(cfg: &GeometryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the road path visiting `route`'s stations in order, boarding
    /// side chosen by `direction` where carriageways are split.
    pub async fn fetch(
        &self,
        graph: &RouteGraph,
        route: &Route,
        direction: Direction,
    ) -> Result<Polyline> {
        let waypoints = waypoint_path(graph, route, direction);
        let url = format!(
            "{}/route/v1/driving/{}?overview=full&geometries=geojson",
            self.base_url, waypoints
        );

        let unavailable = |source| EngineError::GeometryUnavailable {
            route: route.id.clone(),
            source,
        };

        let response: OsrmResponse = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;

        let coords = response
            .routes
            .into_iter()
            .next()
            .map(|r| r.geometry.coordinates)
            .unwrap_or_default();

        // A road path shorter than its own station list cannot be aligned
        // with the route; treat it the same as no path at all.
        if coords.len() < route.stations.len() {
            return Err(EngineError::MalformedGeometry {
                route: route.id.clone(),
            });
        }

        Ok(Polyline::new(
            coords.into_iter().map(|c| Point::new(c[0], c[1])).collect(),
        ))
    }
}

fn waypoint_path(graph: &RouteGraph, route: &Route, direction: Direction) -> String {
    route
        .stations
        .iter()
        .filter_map(|id| graph.station(id))
        .map(|s| {
            let p = s.platform(direction);
            format!("{},{}", p.x(), p.y())
        })
        .collect::<Vec<_>>()
        .join(";")
}

// ============================================================================
// Store
// ============================================================================

/// Per-route polylines plus the station→index projection built on them.
///
/// A route absent from the store is un-trackable: the simulator no-ops its
/// vehicles and the ranking engine excludes them.
#[derive(Clone, Default)]
pub struct GeometryStore {
    polylines: HashMap<RouteIdentifier, Arc<Polyline>>,
}

impl GeometryStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a store from already-resolved polylines (tests, replays).
    pub fn from_polylines(
        polylines: impl IntoIterator<Item = (RouteIdentifier, Polyline)>,
    ) -> Self {
        Self {
            polylines: polylines
                .into_iter()
                .map(|(id, p)| (id, Arc::new(p)))
                .collect(),
        }
    }

    pub fn insert(&mut self, route: RouteIdentifier, polyline: Polyline) {
        self.polylines.insert(route, Arc::new(polyline));
    }

    pub fn polyline(&self, route: &RouteIdentifier) -> Option<&Arc<Polyline>> {
        self.polylines.get(route).filter(|p| !p.is_empty())
    }

    pub fn is_tracked(&self, route: &RouteIdentifier) -> bool {
        self.polyline(route).is_some()
    }

    /// Routes of `graph` still lacking usable geometry.
    pub fn missing_routes(&self, graph: &RouteGraph) -> Vec<RouteIdentifier> {
        graph
            .routes()
            .iter()
            .filter(|r| !self.is_tracked(&r.id))
            .map(|r| r.id.clone())
            .collect()
    }

    /// Project `station`'s boarding platform for `direction` onto the
    /// route's polyline. `None` means "unknown index": missing geometry or an
    /// empty polyline, which callers treat as unreachable rather than an
    /// error.
    pub fn station_index(
        &self,
        station: &Station,
        route: &RouteIdentifier,
        direction: Direction,
    ) -> Option<usize> {
        self.polyline(route)?.nearest_index(station.platform(direction))
    }
}
