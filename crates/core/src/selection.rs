//! Rider-facing selected-vehicle state machine.
//!
//! The engine auto-selects the nearest candidate when a search runs; the
//! rider can pin a specific vehicle instead, or dismiss tracking entirely.
//! Dismissal is sticky: fleet ticks keep arriving, but nothing short of a new
//! explicit search may repopulate the selection.

use bahan_transit::VehicleIdentifier;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    NoSelection,
    /// The engine picked the nearest ranked candidate.
    AutoSelected(VehicleIdentifier),
    /// The rider chose this vehicle; ranking changes do not move it.
    ManuallyPinned(VehicleIdentifier),
    /// The rider closed tracking; stays closed until the next search.
    ManuallyDismissed,
}

impl Selection {
    /// A new explicit search: clears any dismissal and auto-selects the
    /// nearest candidate, if there is one.
    pub fn on_search(&mut self, nearest: Option<&VehicleIdentifier>) {
        *self = match nearest {
            Some(id) => Self::AutoSelected(id.clone()),
            None => Self::NoSelection,
        };
    }

    /// A fleet tick re-ranked the candidates. Only an auto selection
    /// follows the ranking; pins and dismissals hold their ground.
    pub fn on_rerank(&mut self, nearest: Option<&VehicleIdentifier>) {
        if let Self::AutoSelected(_) = self {
            *self = match nearest {
                Some(id) => Self::AutoSelected(id.clone()),
                None => Self::NoSelection,
            };
        }
    }

    pub fn pin(&mut self, vehicle: VehicleIdentifier) {
        *self = Self::ManuallyPinned(vehicle);
    }

    pub fn dismiss(&mut self) {
        *self = Self::ManuallyDismissed;
    }

    /// Rider cleared the start/end stations; the whole search is gone.
    pub fn clear(&mut self) {
        *self = Self::NoSelection;
    }

    pub fn vehicle(&self) -> Option<&VehicleIdentifier> {
        match self {
            Self::AutoSelected(id) | Self::ManuallyPinned(id) => Some(id),
            Self::NoSelection | Self::ManuallyDismissed => None,
        }
    }
}
