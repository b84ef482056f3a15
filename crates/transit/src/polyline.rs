//! Road-geometry polylines and the index arithmetic on them.
//!
//! A [`Polyline`] is the detailed, road-following coordinate sequence a route
//! resolves to. Vehicle positions, station projections, and step-distances
//! are all expressed as indices into it, so the wrap/clamp rules for circular
//! versus linear routes live here in one place.

use geo::Point;

use crate::models::Direction;

/// What happened at a linear route's end during an [`Polyline::advance`].
///
/// A boundary event on a linear route means the vehicle's travel sign must
/// flip (pendulum motion). Circular routes wrap silently and never report one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryEvent {
    None,
    /// Clamped at the last index; the vehicle now runs anticlockwise.
    ReachedEnd,
    /// Clamped at index 0; the vehicle now runs clockwise.
    ReachedStart,
}

/// Ordered road-following coordinate sequence for one route.
#[derive(Clone, Debug, Default)]
pub struct Polyline {
    points: Vec<Point>,
}

impl Polyline {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    /// Index of the polyline point closest to `target`.
    ///
    /// Linear scan minimizing squared lat/lng-plane distance: geodesic
    /// accuracy is irrelevant at snapping scale, and at a few hundred points
    /// per route a scan beats maintaining a spatial index. Ties break toward
    /// the lowest index. `None` only for an empty polyline, which callers
    /// treat as "unknown position".
    pub fn nearest_index(&self, target: Point) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, p) in self.points.iter().enumerate() {
            let dx = p.x() - target.x();
            let dy = p.y() - target.y();
            let d2 = dx * dx + dy * dy;
            if best.map_or(true, |(_, bd)| d2 < bd) {
                best = Some((idx, d2));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Direction-aware step count from `from` to `to`.
    ///
    /// Circular polylines wrap modulo length, so every target is reachable.
    /// On a linear polyline a target behind the direction of travel is
    /// unreachable this pass and yields `None`, the vehicle has already gone
    /// by.
    pub fn steps_between(
        &self,
        from: usize,
        to: usize,
        direction: Direction,
        circular: bool,
    ) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let n = self.len();
        if circular {
            match direction {
                Direction::Clockwise => Some((to + n - from) % n),
                Direction::Anticlockwise => Some((from + n - to) % n),
            }
        } else {
            match direction {
                Direction::Clockwise => to.checked_sub(from),
                Direction::Anticlockwise => from.checked_sub(to),
            }
        }
    }

    /// Move `step` points from `index` in the sign of `travel`.
    ///
    /// Circular: wraps, never reports a boundary. Linear: clamps into
    /// `[0, len-1]` and reports which end was hit so the caller can flip the
    /// travel sign.
    pub fn advance(
        &self,
        index: usize,
        step: usize,
        travel: Direction,
        circular: bool,
    ) -> (usize, BoundaryEvent) {
        if self.is_empty() {
            return (index, BoundaryEvent::None);
        }
        let n = self.len() as i64;
        let raw = index as i64 + step as i64 * travel.signum();

        if circular {
            return (raw.rem_euclid(n) as usize, BoundaryEvent::None);
        }

        if raw >= n - 1 {
            ((n - 1) as usize, BoundaryEvent::ReachedEnd)
        } else if raw <= 0 {
            (0, BoundaryEvent::ReachedStart)
        } else {
            (raw as usize, BoundaryEvent::None)
        }
    }

    /// The `steps + 1` points walked from `from` in `direction`, wrapping if
    /// `circular`. Used to draw the tether between a vehicle and a station.
    pub fn walk(
        &self,
        from: usize,
        steps: usize,
        direction: Direction,
        circular: bool,
    ) -> Vec<Point> {
        if self.is_empty() {
            return Vec::new();
        }
        let n = self.len() as i64;
        (0..=steps as i64)
            .filter_map(|i| {
                let raw = from as i64 + i * direction.signum();
                let idx = if circular {
                    raw.rem_euclid(n)
                } else if (0..n).contains(&raw) {
                    raw
                } else {
                    return None;
                };
                self.point(idx as usize)
            })
            .collect()
    }
}

impl From<Vec<Point>> for Polyline {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Polyline {
        // Evenly spaced points along a parallel; index == position.
        Polyline::new(
            (0..n)
                .map(|i| Point::new(85.0 + i as f64 * 0.001, 27.7))
                .collect(),
        )
    }

    #[test]
    fn test_nearest_index_basic() {
        let p = line(10);
        assert_eq!(p.nearest_index(Point::new(85.0042, 27.7001)), Some(4));
        // Outside either end snaps to the closest terminus.
        assert_eq!(p.nearest_index(Point::new(84.0, 27.7)), Some(0));
        assert_eq!(p.nearest_index(Point::new(86.0, 27.7)), Some(9));
    }

    #[test]
    fn test_nearest_index_tie_breaks_low() {
        // Two identical points: the first scanned wins.
        let p = Polyline::new(vec![
            Point::new(85.0, 27.7),
            Point::new(85.5, 27.7),
            Point::new(85.0, 27.7),
        ]);
        assert_eq!(p.nearest_index(Point::new(85.0, 27.7)), Some(0));
    }

    #[test]
    fn test_nearest_index_empty_is_unknown() {
        let p = Polyline::default();
        assert_eq!(p.nearest_index(Point::new(85.0, 27.7)), None);
    }

    #[test]
    fn test_steps_between_circular() {
        let p = line(400);
        // Typical ranking case: vehicle at 0, station at 15.
        assert_eq!(
            p.steps_between(0, 15, Direction::Clockwise, true),
            Some(15)
        );
        // Anticlockwise goes the long way round.
        assert_eq!(
            p.steps_between(0, 15, Direction::Anticlockwise, true),
            Some(385)
        );
        // Wrap across the seam.
        assert_eq!(
            p.steps_between(390, 10, Direction::Clockwise, true),
            Some(20)
        );
    }

    #[test]
    fn test_steps_between_linear_unreachable() {
        let p = line(500);
        // Vehicle at 300 heading forward, station behind it at 100.
        assert_eq!(p.steps_between(300, 100, Direction::Clockwise, false), None);
        assert_eq!(
            p.steps_between(300, 100, Direction::Anticlockwise, false),
            Some(200)
        );
        assert_eq!(
            p.steps_between(100, 300, Direction::Clockwise, false),
            Some(200)
        );
    }

    #[test]
    fn test_advance_circular_wraps() {
        let p = line(100);
        assert_eq!(
            p.advance(98, 5, Direction::Clockwise, true),
            (3, BoundaryEvent::None)
        );
        assert_eq!(
            p.advance(2, 5, Direction::Anticlockwise, true),
            (97, BoundaryEvent::None)
        );
        // Never leaves [0, len).
        for start in [0usize, 37, 99] {
            let (idx, _) = p.advance(start, 13, Direction::Clockwise, true);
            assert!(idx < 100);
        }
    }

    #[test]
    fn test_advance_linear_clamps_and_reports() {
        let p = line(100);
        assert_eq!(
            p.advance(97, 5, Direction::Clockwise, false),
            (99, BoundaryEvent::ReachedEnd)
        );
        assert_eq!(
            p.advance(3, 5, Direction::Anticlockwise, false),
            (0, BoundaryEvent::ReachedStart)
        );
        // Exact landing on an interior index reports nothing.
        assert_eq!(
            p.advance(50, 5, Direction::Clockwise, false),
            (55, BoundaryEvent::None)
        );
    }

    #[test]
    fn test_walk_wraps_and_truncates() {
        let p = line(10);
        let wrapped = p.walk(8, 3, Direction::Clockwise, true);
        assert_eq!(wrapped.len(), 4);
        assert_eq!(wrapped[0], p.point(8).unwrap());
        assert_eq!(wrapped[3], p.point(1).unwrap());

        // Linear walk stops at the terminus instead of wrapping.
        let clipped = p.walk(8, 3, Direction::Clockwise, false);
        assert_eq!(clipped.len(), 2);
        assert_eq!(clipped[1], p.point(9).unwrap());
    }
}
