//! Great-circle helpers over `[lon, lat]` paths.

use geo::{Bearing, Destination, Distance, Haversine, Point};

use crate::model::Position;

fn point(position: &Position) -> Point<f64> {
    Point::new(position[0], position[1])
}

/// Total haversine length of a polyline in meters.
pub fn path_length(path: &[Position]) -> f64 {
    path.windows(2)
        .map(|pair| Haversine::distance(point(&pair[0]), point(&pair[1])))
        .sum()
}

/// Point `distance` meters along `path`, clamped to its end points.
///
/// Returns `None` only for an empty path.
pub fn along(path: &[Position], distance: f64) -> Option<Position> {
    let first = *path.first()?;
    if distance <= 0.0 {
        return Some(first);
    }
    let mut travelled = 0.0;
    for pair in path.windows(2) {
        let (from, to) = (point(&pair[0]), point(&pair[1]));
        let segment = Haversine::distance(from, to);
        if travelled + segment >= distance {
            let remaining = distance - travelled;
            if remaining <= 0.0 {
                return Some(pair[0]);
            }
            let bearing = Haversine::bearing(from, to);
            let reached = Haversine::destination(from, bearing, remaining);
            return Some([reached.x(), reached.y()]);
        }
        travelled += segment;
    }
    path.last().copied()
}
