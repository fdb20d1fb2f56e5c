use crate::types::{Point, WindingOrder};

/// Twice the signed area of the ring, closed back to its first point.
///
/// Positive means clockwise in image coordinates (y pointing down).
pub fn shoelace_sum(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }

    ring.iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(p, q)| p[0] * q[1] - q[0] * p[1])
        .sum()
}

pub fn classify(ring: &[Point]) -> WindingOrder {
    let sum = shoelace_sum(ring);
    if sum > 0.0 {
        WindingOrder::Clockwise
    } else if sum < 0.0 {
        WindingOrder::CounterClockwise
    } else {
        WindingOrder::Degenerate
    }
}

/// Unsigned enclosed area.
pub fn contour_area(ring: &[Point]) -> f64 {
    shoelace_sum(ring).abs() / 2.0
}

/// Copy of `ring` with the requested orientation. Degenerate rings are copied as is.
pub fn oriented(ring: &[Point], wanted: WindingOrder) -> Vec<Point> {
    let current = classify(ring);
    let mut out = ring.to_vec();
    if current != WindingOrder::Degenerate && current != wanted {
        out.reverse();
    }
    out
}
