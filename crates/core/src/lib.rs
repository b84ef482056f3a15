//! # bahan-core
//!
//! The live engine behind the Bahan passenger map: resolves every route of
//! the static graph to a road-following polyline, advances simulated vehicles
//! along it on a fixed tick, reconciles simulated motion with driver GPS
//! reports, plans direct and single-transfer journeys, and ranks the nearest
//! useful vehicle for a rider's leg.
//!
//! The crate is an in-process library. Its only external collaborators are
//! an OSRM-compatible geometry provider (HTTP/JSON) and a pushed key-value
//! live-position feed; both are consumed at the boundary, never owned.
//!
//! State flows one way: producers (simulator tick, live-feed batch, geometry
//! load) are serialized through a single state-owner task ([`engine::Tracker`])
//! that derives a complete new snapshot per update and publishes it over a
//! watch channel. Everything downstream of a snapshot (planning, ranking,
//! metrics) is pure.

pub mod config;
pub mod engine;
pub mod error;
pub mod eta;
pub mod fleet;
pub mod geometry;
pub mod live;
pub mod metrics;
pub mod planner;
pub mod selection;

pub mod prelude {
    pub use crate::config::{EngineConfig, EtaConfig, GeometryConfig};
    pub use crate::engine::{Command, EngineState, SearchState, Tracker, TrackerHandle};
    pub use crate::error::{EngineError, Result};
    pub use crate::eta::{Candidate, Leg};
    pub use crate::fleet::{FleetSnapshot, Motion, Vehicle};
    pub use crate::geometry::{GeometryStore, OsrmClient};
    pub use crate::live::LiveReport;
    pub use crate::metrics::FleetMetrics;
    pub use crate::planner::JourneyPlan;
    pub use crate::selection::Selection;
}

pub use prelude::*;
