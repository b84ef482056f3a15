//! Engine configuration.
//!
//! Everything tunable is gathered here, including the step→km and
//! step→minutes conversion factors the ETA engine uses. Those are empirical
//! calibration constants for OSRM's point spacing on Kathmandu roads, not
//! physical law, which is exactly why they are configuration and not code.

use std::time::Duration;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulator tick period, milliseconds.
    pub tick_interval_ms: u64,
    /// Polyline points a simulated vehicle covers per tick (constant speed).
    pub step_per_tick: usize,
    /// Vehicles spawned per route from the fleet template.
    pub vehicles_per_route: usize,
    /// Age past which an `active` live report is no longer trusted and the
    /// vehicle reverts to simulated motion.
    pub live_staleness_ms: u64,

    pub geometry: GeometryConfig,
    pub eta: EtaConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 8_000,
            step_per_tick: 3,
            vehicles_per_route: 2,
            // Three missed ticks and a live vehicle is presumed gone.
            live_staleness_ms: 24_000,
            geometry: GeometryConfig::default(),
            eta: EtaConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn live_staleness(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.live_staleness_ms as i64)
    }
}

/// Settings for the external road-geometry provider.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// OSRM-compatible endpoint.
    pub base_url: String,
    /// Pause between per-route requests at startup; the public OSRM instance
    /// rate-limits aggressively.
    pub request_gap_ms: u64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".into(),
            request_gap_ms: 500,
        }
    }
}

impl GeometryConfig {
    pub fn request_gap(&self) -> Duration {
        Duration::from_millis(self.request_gap_ms)
    }
}

/// Calibration constants for turning step-distances into displayable numbers.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EtaConfig {
    /// Kilometers of road per polyline step.
    pub km_per_step: f64,
    /// Minutes of travel per polyline step.
    pub minutes_per_step: f64,
    /// Candidates further than this fraction of the whole polyline are
    /// treated as wrap-around noise and discarded.
    pub reachable_fraction: f64,
    /// A transfer wait is never reported below this, minutes.
    pub min_transfer_wait_min: f64,
}

impl Default for EtaConfig {
    fn default() -> Self {
        Self {
            km_per_step: 0.035,
            minutes_per_step: 0.1,
            reachable_fraction: 0.6,
            min_transfer_wait_min: 2.0,
        }
    }
}
