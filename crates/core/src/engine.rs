//! The single state-owner task.
//!
//! Every mutation of engine state (the simulator tick, a live-feed batch,
//! a route's geometry resolving, the rider editing their search) arrives at
//! one task, which applies it and publishes a complete immutable
//! [`EngineState`] over a watch channel. Consumers never observe a
//! half-applied update, and none of the producers ever touch shared state
//! directly.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use geo::Point;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use bahan_transit::{
    Direction, Polyline, RouteGraph, RouteIdentifier, StationIdentifier, VehicleIdentifier,
};

use crate::config::EngineConfig;
use crate::eta::{self, Candidate, Leg};
use crate::fleet::{self, FleetSnapshot};
use crate::geometry::{GeometryStore, OsrmClient};
use crate::live::{self, LiveReport};
use crate::metrics::FleetMetrics;
use crate::planner::{self, JourneyPlan};
use crate::selection::Selection;

// ============================================================================
// Commands & published state
// ============================================================================

/// Everything the outside world may ask of the engine.
#[derive(Debug)]
pub enum Command {
    /// A fresh batch of driver GPS reports, keyed by vehicle id string.
    LiveFeed(HashMap<String, LiveReport>),
    /// A route's road polyline became available.
    GeometryLoaded(RouteIdentifier, Polyline),
    /// Re-fetch one route's geometry (after a startup failure).
    RetryGeometry(RouteIdentifier),
    /// Rider searched a journey.
    Search {
        start: StationIdentifier,
        end: StationIdentifier,
    },
    /// Rider pinned a specific vehicle.
    Pin(VehicleIdentifier),
    /// Rider closed the tracked-vehicle card.
    Dismiss,
    /// Rider cleared the search.
    ClearSearch,
}

/// The rider-facing view of the active search, derived fresh on every
/// publish.
#[derive(Clone, Debug, Default)]
pub struct SearchState {
    pub plan: Option<JourneyPlan>,
    pub leg: Option<Leg>,
    /// Ordered stops of the boarding leg, start through the alighting
    /// station, for the map's station markers.
    pub stations: Vec<StationIdentifier>,
    /// Reachable vehicles for the boarding leg, nearest first.
    pub candidates: Vec<Candidate>,
    /// Estimated interchange wait, transfer plans only.
    pub transfer_wait_min: Option<f64>,
    pub selection: Selection,
    /// Road slice from the selected vehicle to the boarding station.
    pub tether: Vec<Point>,
}

/// One consistent, immutable view of the whole engine.
#[derive(Clone, Debug, Default)]
pub struct EngineState {
    pub fleet: FleetSnapshot,
    pub search: Option<SearchState>,
}

// ============================================================================
// Tracker
// ============================================================================

pub struct Tracker {
    graph: Arc<RouteGraph>,
    cfg: EngineConfig,
    geometry: GeometryStore,
    fleet: FleetSnapshot,
    query: Option<(StationIdentifier, StationIdentifier)>,
    selection: Selection,
    /// Only present when the engine was spawned with an HTTP client; retry
    /// tasks upgrade this to feed results back into the command stream.
    self_tx: mpsc::WeakSender<Command>,
    client: Option<Arc<OsrmClient>>,
    tx: watch::Sender<Arc<EngineState>>,
}

/// Cheap-to-clone handle: command sender plus published-state receiver. The
/// engine task exits once every handle (and in-flight loader task) is gone.
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<Arc<EngineState>>,
}

impl Tracker {
    /// Spawn the full engine: state owner plus a background loader that
    /// fetches each route's geometry in turn, paced to respect the provider's
    /// rate limit.
    pub fn spawn(graph: Arc<RouteGraph>, cfg: EngineConfig) -> TrackerHandle {
        let client = Arc::new(OsrmClient::new(&cfg.geometry));
        let gap = cfg.geometry.request_gap();
        let handle = Self::start(graph.clone(), cfg, GeometryStore::empty(), Some(client.clone()));

        let loader_tx = handle.commands.clone();
        tokio::spawn(async move {
            for (i, route) in graph.routes().iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(gap).await;
                }
                match client.fetch(&graph, route, Direction::Clockwise).await {
                    Ok(polyline) => {
                        debug!(route = %route.id, points = polyline.len(), "geometry resolved");
                        if loader_tx
                            .send(Command::GeometryLoaded(route.id.clone(), polyline))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(route = %route.id, error = %err, "geometry fetch failed, route untracked");
                    }
                }
            }
        });

        handle
    }

    /// Spawn the state owner around an already-resolved geometry store. No
    /// HTTP is involved; retry commands become no-ops.
    pub fn with_geometry(
        graph: Arc<RouteGraph>,
        cfg: EngineConfig,
        geometry: GeometryStore,
    ) -> TrackerHandle {
        Self::start(graph, cfg, geometry, None)
    }

    fn start(
        graph: Arc<RouteGraph>,
        cfg: EngineConfig,
        geometry: GeometryStore,
        client: Option<Arc<OsrmClient>>,
    ) -> TrackerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(Arc::new(EngineState::default()));

        let mut fleet = fleet::spawn_fleet(&graph, &cfg);
        for route in graph.routes() {
            if let Some(polyline) = geometry.polyline(&route.id) {
                fleet = fleet::seed_route(&fleet, &route.id, polyline);
            }
        }

        let tracker = Tracker {
            graph,
            cfg,
            geometry,
            fleet,
            query: None,
            selection: Selection::default(),
            self_tx: cmd_tx.downgrade(),
            client,
            tx: state_tx,
        };
        tokio::spawn(tracker.run(cmd_rx));

        TrackerHandle {
            commands: cmd_tx,
            state: state_rx,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let period = self.cfg.tick_interval();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        self.publish(false);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Age out live vehicles first: a silent feed must not
                    // leave its vehicle frozen at the last coordinate.
                    self.fleet = live::expire(
                        &self.fleet,
                        &self.geometry,
                        Utc::now(),
                        self.cfg.live_staleness(),
                    );
                    self.fleet = fleet::tick(&self.fleet, &self.geometry, &self.cfg);
                    let metrics = FleetMetrics::aggregate(
                        &self.fleet,
                        &self.geometry,
                        &self.graph,
                        Utc::now(),
                        self.cfg.live_staleness(),
                    );
                    debug!(
                        live = metrics.live_vehicles,
                        stale = metrics.stale_live_vehicles,
                        untracked = metrics.untracked_routes.len(),
                        "tick"
                    );
                    self.publish(false);
                }
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.apply(cmd);
                }
            }
        }
    }

    fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::LiveFeed(feed) => {
                self.fleet = live::merge(
                    &self.fleet,
                    &feed,
                    &self.geometry,
                    Utc::now(),
                    self.cfg.live_staleness(),
                );
                self.publish(false);
            }
            Command::GeometryLoaded(route, polyline) => {
                self.geometry.insert(route.clone(), polyline);
                if let Some(polyline) = self.geometry.polyline(&route).cloned() {
                    self.fleet = fleet::seed_route(&self.fleet, &route, &polyline);
                }
                self.publish(false);
            }
            Command::RetryGeometry(route_id) => self.retry_geometry(route_id),
            Command::Search { start, end } => {
                self.query = Some((start, end));
                self.publish(true);
            }
            Command::Pin(vehicle) => {
                self.selection.pin(vehicle);
                self.publish(false);
            }
            Command::Dismiss => {
                self.selection.dismiss();
                self.publish(false);
            }
            Command::ClearSearch => {
                self.query = None;
                self.selection.clear();
                self.publish(false);
            }
        }
    }

    fn retry_geometry(&self, route_id: RouteIdentifier) {
        let (Some(client), Some(tx)) = (self.client.clone(), self.self_tx.upgrade()) else {
            return;
        };
        let Some(route) = self.graph.route(&route_id) else {
            warn!(route = %route_id, "retry for unknown route ignored");
            return;
        };
        let graph = self.graph.clone();
        tokio::spawn(async move {
            match client.fetch(&graph, &route, Direction::Clockwise).await {
                Ok(polyline) => {
                    let _ = tx.send(Command::GeometryLoaded(route_id, polyline)).await;
                }
                Err(err) => warn!(route = %route_id, error = %err, "geometry retry failed"),
            }
        });
    }

    /// Derive the rider-facing search view and push a complete state.
    ///
    /// `fresh_search` decides how the selection reacts to the new ranking: a
    /// new search always re-selects, a routine update only refreshes an auto
    /// selection.
    fn publish(&mut self, fresh_search: bool) {
        let search = self.query.clone().map(|(start, end)| {
            let plan = planner::plan(&self.graph, &start, &end);
            let leg = plan
                .as_ref()
                .and_then(|p| Leg::boarding(&self.graph, p, &start, &end));
            let stations = match &plan {
                Some(JourneyPlan::Direct { route }) => self
                    .graph
                    .route(route)
                    .map(|r| planner::leg_stations(&self.graph, &r, &start, &end))
                    .unwrap_or_default(),
                Some(JourneyPlan::Transfer {
                    first,
                    transfer_station,
                    ..
                }) => self
                    .graph
                    .route(first)
                    .map(|r| planner::leg_stations(&self.graph, &r, &start, transfer_station))
                    .unwrap_or_default(),
                None => Vec::new(),
            };
            let candidates = leg
                .as_ref()
                .map(|l| {
                    eta::rank(
                        &self.fleet,
                        &self.geometry,
                        &self.graph,
                        l,
                        &start,
                        &self.cfg.eta,
                    )
                })
                .unwrap_or_default();

            let nearest = candidates.first().map(|c| &c.vehicle);
            if fresh_search {
                self.selection.on_search(nearest);
            } else {
                self.selection.on_rerank(nearest);
            }

            let transfer_wait_min = plan.as_ref().and_then(|p| {
                eta::transfer_wait_minutes(
                    &self.fleet,
                    &self.geometry,
                    &self.graph,
                    p,
                    &start,
                    &end,
                    &self.cfg.eta,
                )
            });
            let tether = match (self.selection.vehicle().and_then(|id| self.fleet.get(id)), &leg)
            {
                (Some(vehicle), Some(leg)) => eta::tether(
                    vehicle,
                    &self.geometry,
                    &self.graph,
                    &start,
                    leg.direction,
                    &self.cfg.eta,
                ),
                _ => Vec::new(),
            };

            SearchState {
                plan,
                leg,
                stations,
                candidates,
                transfer_wait_min,
                selection: self.selection.clone(),
                tether,
            }
        });

        let state = EngineState {
            fleet: self.fleet.clone(),
            search,
        };
        // Send only fails when every receiver is gone; the loop will notice
        // the closed command channel and exit on its own.
        let _ = self.tx.send(Arc::new(state));
    }
}

// ============================================================================
// Handle
// ============================================================================

impl TrackerHandle {
    /// The most recently published state.
    pub fn state(&self) -> Arc<EngineState> {
        self.state.borrow().clone()
    }

    /// Wait for the next published state. Returns `false` once the engine
    /// task has shut down.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    pub async fn send(&self, cmd: Command) -> bool {
        self.commands.send(cmd).await.is_ok()
    }

    pub async fn live_feed(&self, feed: HashMap<String, LiveReport>) -> bool {
        self.send(Command::LiveFeed(feed)).await
    }

    pub async fn search(&self, start: StationIdentifier, end: StationIdentifier) -> bool {
        self.send(Command::Search { start, end }).await
    }

    pub async fn pin(&self, vehicle: VehicleIdentifier) -> bool {
        self.send(Command::Pin(vehicle)).await
    }

    pub async fn dismiss(&self) -> bool {
        self.send(Command::Dismiss).await
    }

    pub async fn clear_search(&self) -> bool {
        self.send(Command::ClearSearch).await
    }

    pub async fn retry_geometry(&self, route: RouteIdentifier) -> bool {
        self.send(Command::RetryGeometry(route)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use bahan_transit::fixtures;

    use crate::fleet::Vehicle;

    fn sid(s: &str) -> StationIdentifier {
        StationIdentifier::new(s)
    }

    fn vid(s: &str) -> VehicleIdentifier {
        VehicleIdentifier::new(s)
    }

    /// 400-point R1 ring whose index 15 is Kalanki's clockwise platform, as
    /// published geometry.
    fn ring_geometry(graph: &RouteGraph) -> GeometryStore {
        let kalanki_cw = graph
            .station(&sid("kalanki"))
            .unwrap()
            .platform(Direction::Clockwise);
        let points: Vec<Point> = (0..400)
            .map(|i| {
                if i == 15 {
                    kalanki_cw
                } else {
                    Point::new(85.30 + i as f64 * 0.0002, 27.75)
                }
            })
            .collect();
        GeometryStore::from_polylines([(RouteIdentifier::new("R1"), Polyline::new(points))])
    }

    fn path_index(state: &EngineState, id: &str) -> Option<usize> {
        state.fleet.get(&vid(id)).and_then(Vehicle::path_index)
    }

    async fn one_tick(cfg: &EngineConfig) {
        tokio::time::sleep(cfg.tick_interval() + Duration::from_millis(100)).await;
    }

    /// Await published states until `pred` holds. Publishes are asynchronous
    /// to command sends, so tests wait on the condition they care about
    /// rather than counting updates.
    async fn wait_for(
        handle: &mut TrackerHandle,
        pred: impl Fn(&EngineState) -> bool,
    ) -> Arc<EngineState> {
        loop {
            let state = handle.state();
            if pred(&state) {
                return state;
            }
            assert!(handle.changed().await, "engine task exited");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_advances_and_publishes() {
        let graph = Arc::new(fixtures::kathmandu().unwrap());
        let cfg = EngineConfig::default();
        let handle = Tracker::with_geometry(graph.clone(), cfg.clone(), ring_geometry(&graph));

        one_tick(&cfg).await;
        let state = handle.state();
        // Seeded evenly at 0 and 200, one tick of 3 steps each; B1 runs
        // anticlockwise so its index walks backward.
        assert_eq!(path_index(&state, "R1-B0"), Some(3));
        assert_eq!(path_index(&state, "R1-B1"), Some(197));
        // R2 has no geometry yet; its vehicles stay parked.
        assert_eq!(path_index(&state, "R2-B0"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_geometry_arrival_seeds_route() {
        let graph = Arc::new(fixtures::kathmandu().unwrap());
        let cfg = EngineConfig::default();
        let mut handle =
            Tracker::with_geometry(graph.clone(), cfg.clone(), GeometryStore::empty());

        one_tick(&cfg).await;
        assert_eq!(path_index(&handle.state(), "R3-B0"), Some(0));

        let polyline = Polyline::new(
            (0..100)
                .map(|i| Point::new(85.33 + i as f64 * 0.0003, 27.68))
                .collect(),
        );
        assert!(
            handle
                .send(Command::GeometryLoaded(RouteIdentifier::new("R3"), polyline))
                .await
        );
        let state = wait_for(&mut handle, |s| path_index(s, "R3-B1") == Some(50)).await;
        assert_eq!(path_index(&state, "R3-B0"), Some(0));

        // And the route moves from the next tick on.
        one_tick(&cfg).await;
        assert_eq!(path_index(&handle.state(), "R3-B0"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_selects_and_dismissal_is_sticky() {
        let graph = Arc::new(fixtures::kathmandu().unwrap());
        let cfg = EngineConfig::default();
        let mut handle = Tracker::with_geometry(graph.clone(), cfg.clone(), ring_geometry(&graph));

        assert!(handle.search(sid("kalanki"), sid("chabahil")).await);
        let state = wait_for(&mut handle, |s| s.search.is_some()).await;
        let search = state.search.clone().unwrap();
        assert!(matches!(
            search.plan,
            Some(JourneyPlan::Direct { ref route }) if route == &RouteIdentifier::new("R1")
        ));
        assert!(!search.candidates.is_empty());
        assert_eq!(search.stations.first(), Some(&sid("kalanki")));
        assert_eq!(search.stations.last(), Some(&sid("chabahil")));
        assert!(matches!(search.selection, Selection::AutoSelected(_)));
        assert!(!search.tether.is_empty());

        assert!(handle.dismiss().await);
        wait_for(&mut handle, |s| {
            matches!(
                s.search,
                Some(ref search) if search.selection == Selection::ManuallyDismissed
            )
        })
        .await;

        // Ticks keep flowing; the dismissal holds and the tether is gone.
        for _ in 0..2 {
            one_tick(&cfg).await;
            let search = handle.state().search.clone().unwrap();
            assert_eq!(search.selection, Selection::ManuallyDismissed);
            assert!(search.tether.is_empty());
        }

        // A fresh search breaks through.
        assert!(handle.search(sid("kalanki"), sid("chabahil")).await);
        let state = wait_for(&mut handle, |s| {
            matches!(
                s.search,
                Some(ref search) if matches!(search.selection, Selection::AutoSelected(_))
            )
        })
        .await;
        assert!(state.search.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pin_survives_reranks() {
        let graph = Arc::new(fixtures::kathmandu().unwrap());
        let cfg = EngineConfig::default();
        let mut handle = Tracker::with_geometry(graph.clone(), cfg.clone(), ring_geometry(&graph));

        assert!(handle.search(sid("kalanki"), sid("chabahil")).await);
        wait_for(&mut handle, |s| s.search.is_some()).await;

        assert!(handle.pin(vid("R1-B1")).await);
        wait_for(&mut handle, |s| {
            matches!(
                s.search,
                Some(ref search) if search.selection == Selection::ManuallyPinned(vid("R1-B1"))
            )
        })
        .await;

        // The selection ignores later re-rankings.
        one_tick(&cfg).await;
        assert_eq!(
            handle.state().search.clone().unwrap().selection,
            Selection::ManuallyPinned(vid("R1-B1"))
        );

        assert!(handle.clear_search().await);
        wait_for(&mut handle, |s| s.search.is_none()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_feed_promotes_vehicle() {
        let graph = Arc::new(fixtures::kathmandu().unwrap());
        let cfg = EngineConfig::default();
        let mut handle = Tracker::with_geometry(graph.clone(), cfg.clone(), ring_geometry(&graph));

        let mut feed = HashMap::new();
        feed.insert(
            "R1-B0".to_string(),
            LiveReport {
                lat: Some(27.76),
                lng: Some(85.31),
                heading: Some(42.0),
                active: true,
                last_updated: Some(Utc::now().timestamp_millis()),
            },
        );
        assert!(handle.live_feed(feed).await);
        let state = wait_for(&mut handle, |s| {
            s.fleet.get(&vid("R1-B0")).is_some_and(Vehicle::is_live)
        })
        .await;
        let v = state.fleet.get(&vid("R1-B0")).unwrap();
        assert_eq!(v.position, Point::new(85.31, 27.76));

        // The simulator leaves it alone on the next tick.
        one_tick(&cfg).await;
        assert!(handle.state().fleet.get(&vid("R1-B0")).unwrap().is_live());
    }
}
