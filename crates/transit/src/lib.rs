//! # bahan-transit
//!
//! Static reference data for the Bahan bus network: stations, routes, and
//! road-geometry polylines, plus the coordinate math shared by everything
//! that needs physical distance or heading.
//!
//! All of this is immutable after load. Live state (vehicle positions,
//! journey plans, rankings) lives in the `bahan-core` crate and treats this
//! crate as its read-only route graph.
//!
//! ## Example
//!
//! ```
//! use bahan_transit::prelude::*;
//!
//! let graph = bahan_transit::fixtures::kathmandu().unwrap();
//!
//! let ring = graph.route(&RouteIdentifier::new("R1")).unwrap();
//! assert!(ring.is_circular);
//!
//! // Every station named by a route resolves.
//! let kalanki = graph.station(&StationIdentifier::new("kalanki")).unwrap();
//! assert_eq!(kalanki.name.as_ref(), "Kalanki");
//! ```

pub mod geo;
pub mod graph;
pub mod identifiers;
pub mod models;
pub mod polyline;

pub mod fixtures;

// Re-exports for convenience
pub mod prelude {
    pub use crate::geo::{bearing_deg, distance_km};
    pub use crate::graph::RouteGraph;
    pub use crate::identifiers::{RouteIdentifier, StationIdentifier, VehicleIdentifier};
    pub use crate::models::{Carriageways, Direction, Result, Route, Station, TransitError};
    pub use crate::polyline::{BoundaryEvent, Polyline};
}

pub use prelude::*;
