//! Core data models for the route graph.
//!
//! Everything here is immutable reference data: stations and routes are
//! loaded once at process start and never mutated. Vehicles live in
//! `bahan-core` and only refer back to these by identifier.

use std::sync::Arc;

use geo::Point;

use crate::identifiers::*;

// ============================================================================
// Direction
// ============================================================================

/// Traversal order along a route's station list.
///
/// `Clockwise` follows the list forward; `Anticlockwise` walks it backward.
/// On linear routes the same pair reads as forward/backward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Clockwise,
    Anticlockwise,
}

impl Direction {
    /// Signed step multiplier for index arithmetic: `+1` or `-1`.
    pub fn signum(self) -> i64 {
        match self {
            Self::Clockwise => 1,
            Self::Anticlockwise => -1,
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Self::Clockwise => Self::Anticlockwise,
            Self::Anticlockwise => Self::Clockwise,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clockwise => write!(f, "clockwise"),
            Self::Anticlockwise => write!(f, "anticlockwise"),
        }
    }
}

// ============================================================================
// Stations
// ============================================================================

/// Per-direction boarding coordinates for a road with physically separate
/// carriageways.
#[derive(Clone, Copy, Debug)]
pub struct Carriageways {
    pub cw: Point,
    pub acw: Point,
}

/// A named boarding location.
#[derive(Clone, Debug)]
pub struct Station {
    pub id: StationIdentifier,
    pub name: Arc<str>,
    /// Coordinate used when no carriageway variant applies.
    pub location: Point,
    /// Directional variants, present where the carriageways are separated.
    pub carriageways: Option<Carriageways>,
}

impl Station {
    pub fn new(id: impl Into<StationIdentifier>, name: &str, location: Point) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location,
            carriageways: None,
        }
    }

    pub fn with_carriageways(mut self, cw: Point, acw: Point) -> Self {
        self.carriageways = Some(Carriageways { cw, acw });
        self
    }

    /// Boarding coordinate for travel in `direction`.
    ///
    /// Falls back to the primary coordinate when no carriageway variants
    /// exist, so the result is always usable for projection.
    pub fn platform(&self, direction: Direction) -> Point {
        match (&self.carriageways, direction) {
            (Some(c), Direction::Clockwise) => c.cw,
            (Some(c), Direction::Anticlockwise) => c.acw,
            (None, _) => self.location,
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

/// An ordered station sequence a fleet of vehicles runs along.
///
/// A circular route closes its loop: the first and last station id are the
/// same and vehicles wrap. On a linear route the first and last entries are
/// the termini and vehicles bounce. A station id may repeat only for the
/// linear there-and-back pattern.
#[derive(Clone, Debug)]
pub struct Route {
    pub id: RouteIdentifier,
    pub name: Arc<str>,
    pub stations: Vec<StationIdentifier>,
    pub is_circular: bool,
    /// Display color for the map layer (hex RGB).
    pub color: Arc<str>,
}

impl Route {
    pub fn new(
        id: impl Into<RouteIdentifier>,
        name: &str,
        stations: Vec<StationIdentifier>,
        is_circular: bool,
        color: &str,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stations,
            is_circular,
            color: color.into(),
        }
    }

    pub fn contains(&self, station: &StationIdentifier) -> bool {
        self.stations.contains(station)
    }

    /// Index of the first occurrence of `station` in the sequence.
    pub fn index_of(&self, station: &StationIdentifier) -> Option<usize> {
        self.stations.iter().position(|s| s == station)
    }

    pub fn first_station(&self) -> Option<&StationIdentifier> {
        self.stations.first()
    }

    pub fn last_station(&self) -> Option<&StationIdentifier> {
        self.stations.last()
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("station not found: {0}")]
    StationNotFound(StationIdentifier),

    #[error("invalid route {route}: {reason}")]
    InvalidRoute {
        route: RouteIdentifier,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, TransitError>;
