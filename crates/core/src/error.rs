//! Engine error taxonomy.
//!
//! Nothing here is fatal to the process: a failing route degrades to
//! "un-trackable" and a failing vehicle to "not shown". Callers handle these
//! locally and the fleet keeps moving.

use bahan_transit::{RouteIdentifier, TransitError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The geometry provider failed or timed out for one route. The route's
    /// vehicles stay frozen and excluded from ranking until a retry succeeds.
    #[error("geometry unavailable for route {route}")]
    GeometryUnavailable {
        route: RouteIdentifier,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered, but with nothing usable as a road path.
    #[error("geometry provider returned no usable path for route {route}")]
    MalformedGeometry { route: RouteIdentifier },

    #[error(transparent)]
    Transit(#[from] TransitError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
