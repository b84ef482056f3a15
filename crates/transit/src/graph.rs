//! Read-only route graph: station and route lookups.
//!
//! Built once at process start and shared by reference everywhere else.
//! Cheap to clone since all data sits behind `Arc`s.

use std::collections::HashMap;
use std::sync::Arc;

use crate::identifiers::{RouteIdentifier, StationIdentifier};
use crate::models::{Result, Route, Station, TransitError};

#[derive(Clone, Debug)]
pub struct RouteGraph {
    stations: Vec<Arc<Station>>,
    routes: Vec<Arc<Route>>,

    station_map: HashMap<StationIdentifier, Arc<Station>>,
    route_map: HashMap<RouteIdentifier, Arc<Route>>,
}

impl RouteGraph {
    /// Build the graph, validating referential integrity up front: every
    /// station id a route names must exist, every route needs at least two
    /// entries, and a circular route must close its loop (first id == last
    /// id). Failing here beats panicking later in index math.
    pub fn new(stations: Vec<Station>, routes: Vec<Route>) -> Result<Self> {
        let stations: Vec<Arc<Station>> = stations.into_iter().map(Arc::new).collect();
        let routes: Vec<Arc<Route>> = routes.into_iter().map(Arc::new).collect();

        let station_map: HashMap<_, _> = stations
            .iter()
            .map(|s| (s.id.clone(), s.clone()))
            .collect();

        for route in &routes {
            if route.stations.len() < 2 {
                return Err(TransitError::InvalidRoute {
                    route: route.id.clone(),
                    reason: "fewer than two stations".into(),
                });
            }
            if route.is_circular && route.first_station() != route.last_station() {
                return Err(TransitError::InvalidRoute {
                    route: route.id.clone(),
                    reason: "circular route does not close its loop".into(),
                });
            }
            for id in &route.stations {
                if !station_map.contains_key(id) {
                    return Err(TransitError::StationNotFound(id.clone()));
                }
            }
        }

        let route_map: HashMap<_, _> = routes
            .iter()
            .map(|r| (r.id.clone(), r.clone()))
            .collect();

        Ok(Self {
            stations,
            routes,
            station_map,
            route_map,
        })
    }

    pub fn station(&self, id: &StationIdentifier) -> Option<Arc<Station>> {
        self.station_map.get(id).cloned()
    }

    pub fn route(&self, id: &RouteIdentifier) -> Option<Arc<Route>> {
        self.route_map.get(id).cloned()
    }

    pub fn stations(&self) -> &[Arc<Station>] {
        &self.stations
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Routes whose station sequence includes `station`, in graph order.
    ///
    /// Graph order is the declaration order of the routes, which the journey
    /// planner's scan order depends on.
    pub fn routes_through(&self, station: &StationIdentifier) -> Vec<Arc<Route>> {
        self.routes
            .iter()
            .filter(|r| r.contains(station))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    fn station(id: &str) -> Station {
        Station::new(id, id, Point::new(85.3, 27.7))
    }

    fn ids(names: &[&str]) -> Vec<StationIdentifier> {
        names.iter().map(StationIdentifier::new).collect()
    }

    #[test]
    fn test_lookups_and_routes_through() {
        let graph = RouteGraph::new(
            vec![station("a"), station("b"), station("c"), station("d")],
            vec![
                Route::new("R1", "Loop", ids(&["a", "b", "c", "a"]), true, "#fff"),
                Route::new("R2", "Line", ids(&["c", "d"]), false, "#000"),
            ],
        )
        .unwrap();

        assert!(graph.station(&StationIdentifier::new("b")).is_some());
        assert!(graph.route(&RouteIdentifier::new("R2")).is_some());
        assert!(graph.route(&RouteIdentifier::new("R9")).is_none());

        let through_c = graph.routes_through(&StationIdentifier::new("c"));
        assert_eq!(through_c.len(), 2);
        assert_eq!(through_c[0].id, RouteIdentifier::new("R1"));

        assert_eq!(graph.routes_through(&StationIdentifier::new("d")).len(), 1);
    }

    #[test]
    fn test_rejects_unknown_station() {
        let err = RouteGraph::new(
            vec![station("a")],
            vec![Route::new("R1", "Bad", ids(&["a", "ghost"]), false, "#fff")],
        )
        .unwrap_err();
        assert!(matches!(err, TransitError::StationNotFound(_)));
    }

    #[test]
    fn test_rejects_open_circular_route() {
        let err = RouteGraph::new(
            vec![station("a"), station("b"), station("c")],
            vec![Route::new("R1", "Open", ids(&["a", "b", "c"]), true, "#fff")],
        )
        .unwrap_err();
        assert!(matches!(err, TransitError::InvalidRoute { .. }));
    }
}
