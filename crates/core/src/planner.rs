//! Journey planning over the route graph.
//!
//! Pure functions of reference data: the same start/end pair always yields
//! the same plan. Either a single route covers both stations (DIRECT) or two
//! routes sharing a station are stitched together at that station (TRANSFER).
//! Anything needing more than one transfer is out of scope and reported as
//! "no route found" (`None`).

use itertools::Itertools;

use bahan_transit::{
    distance_km, Direction, Route, RouteGraph, RouteIdentifier, StationIdentifier,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JourneyPlan {
    Direct {
        route: RouteIdentifier,
    },
    Transfer {
        first: RouteIdentifier,
        second: RouteIdentifier,
        transfer_station: StationIdentifier,
    },
}

/// Plan a journey from `start` to `end`.
///
/// Scan order is fixed and documented: the first route (graph order)
/// containing both stations wins outright; otherwise routes through `start`
/// are paired with routes through `end`, and the first shared station (in
/// the first route's station order) becomes the transfer point. If two
/// routes share several stations this does NOT pick the fastest interchange;
/// a known limitation kept for predictability.
pub fn plan(
    graph: &RouteGraph,
    start: &StationIdentifier,
    end: &StationIdentifier,
) -> Option<JourneyPlan> {
    if let Some(direct) = graph
        .routes()
        .iter()
        .find(|r| r.contains(start) && r.contains(end))
    {
        return Some(JourneyPlan::Direct {
            route: direct.id.clone(),
        });
    }

    graph
        .routes_through(start)
        .iter()
        .cartesian_product(graph.routes_through(end).iter())
        .find_map(|(first, second)| {
            let hub = first.stations.iter().find(|s| second.contains(s))?;
            Some(JourneyPlan::Transfer {
                first: first.id.clone(),
                second: second.id.clone(),
                transfer_station: hub.clone(),
            })
        })
}

/// Travel direction along `route` for the leg `start → end`.
///
/// Linear: forward iff the end lies further along the station list. Circular:
/// whichever way round visits fewer stations, ties resolved clockwise.
pub fn leg_direction(
    route: &Route,
    start: &StationIdentifier,
    end: &StationIdentifier,
) -> Option<Direction> {
    let start_idx = route.index_of(start)?;
    let end_idx = route.index_of(end)?;

    if !route.is_circular {
        return Some(if end_idx > start_idx {
            Direction::Clockwise
        } else {
            Direction::Anticlockwise
        });
    }

    // The closing entry duplicates the first station; modular arithmetic
    // works over the unique stations only.
    let n = route.stations.len() - 1;
    let cw_stops = (end_idx + n - start_idx) % n;
    let acw_stops = (start_idx + n - end_idx) % n;
    Some(if cw_stops <= acw_stops {
        Direction::Clockwise
    } else {
        Direction::Anticlockwise
    })
}

/// The ordered station ids a rider passes on the leg `start → end`,
/// inclusive of both ends.
///
/// On a circular route the traversal with the shorter great-circle length
/// wins (stop count alone misleads when stations bunch up on one side).
pub fn leg_stations(
    graph: &RouteGraph,
    route: &Route,
    start: &StationIdentifier,
    end: &StationIdentifier,
) -> Vec<StationIdentifier> {
    let (Some(start_idx), Some(end_idx)) = (route.index_of(start), route.index_of(end)) else {
        return Vec::new();
    };

    if !route.is_circular {
        return if start_idx <= end_idx {
            route.stations[start_idx..=end_idx].to_vec()
        } else {
            let mut reversed = route.stations[end_idx..=start_idx].to_vec();
            reversed.reverse();
            reversed
        };
    }

    let walk = |direction: Direction| {
        // Skip the duplicated closing station when stepping around the loop.
        let n = route.stations.len() - 1;
        let mut path = vec![route.stations[start_idx].clone()];
        let mut km = 0.0;
        let mut current = start_idx;
        while current != end_idx {
            let next = (current as i64 + direction.signum()).rem_euclid(n as i64) as usize;
            if let (Some(a), Some(b)) = (
                graph.station(&route.stations[current]),
                graph.station(&route.stations[next]),
            ) {
                km += distance_km(a.location, b.location);
            }
            path.push(route.stations[next].clone());
            current = next;
        }
        (path, km)
    };

    let (cw_path, cw_km) = walk(Direction::Clockwise);
    let (acw_path, acw_km) = walk(Direction::Anticlockwise);
    if cw_km <= acw_km {
        cw_path
    } else {
        acw_path
    }
}
