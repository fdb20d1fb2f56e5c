//! Polygon construction, simple-polygon validity and zero-width repair.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BooleanOps, Contains, Intersects};
use geo_types::{Coord, Geometry, Line, LineString, MultiPolygon, Polygon};

use crate::{
    algorithms::coordinates::CoordinateTransform,
    traits::GeometryRepair,
    types::{ring_to_linestring, LabeledPolygon, Point, RingGroup},
};

/// Build a polygon from rings in source space, converting each ring to output space.
pub fn build_polygon(shell: &[Point], holes: &[Vec<Point>], transform: &CoordinateTransform) -> Polygon<f64> {
    Polygon::new(
        ring_to_linestring(&transform.apply(shell)),
        holes
            .iter()
            .map(|hole| ring_to_linestring(&transform.apply(hole)))
            .collect(),
    )
}

/// Self-union through `BooleanOps`, the zero-distance buffer of the polygon
#[derive(Debug, Clone, Default)]
pub struct ZeroBufferRepair;

impl GeometryRepair for ZeroBufferRepair {
    fn repair(&self, polygon: &Polygon<f64>) -> Option<Geometry<f64>> {
        let unioned = polygon.union(polygon);
        let mut parts: Vec<Polygon<f64>> = unioned
            .0
            .into_iter()
            .filter(|part| part.unsigned_area() > 0.0)
            .collect();

        match parts.len() {
            0 => None,
            1 => parts.pop().map(Geometry::Polygon),
            _ => Some(Geometry::MultiPolygon(MultiPolygon::new(parts))),
        }
    }
}

/// Validate the assembled polygon and repair it once if needed.
///
/// The repaired geometry replaces the original only when it passes the
/// validity check; otherwise the original is returned flagged invalid.
pub fn finalize(
    group: &RingGroup,
    transform: &CoordinateTransform,
    repair: Option<&dyn GeometryRepair>,
) -> LabeledPolygon {
    let polygon = build_polygon(&group.shell, &group.holes, transform);

    if is_valid_polygon(&polygon) {
        return LabeledPolygon {
            label: group.label.clone(),
            geometry: Geometry::Polygon(polygon),
            valid: true,
            repaired: false,
        };
    }

    if let Some(repaired) = repair.and_then(|repair| repair.repair(&polygon)) {
        if is_valid(&repaired) {
            tracing::debug!("Repaired invalid '{}' polygon", group.label);
            return LabeledPolygon {
                label: group.label.clone(),
                geometry: repaired,
                valid: true,
                repaired: true,
            };
        }
    }

    tracing::warn!(
        "Emitting invalid '{}' polygon with {} shell points and {} holes",
        group.label,
        group.shell.len(),
        group.holes.len()
    );
    LabeledPolygon {
        label: group.label.clone(),
        geometry: Geometry::Polygon(polygon),
        valid: false,
        repaired: false,
    }
}

/// Validity of a polygon or multipolygon; other geometry kinds are never valid here.
pub fn is_valid(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Polygon(polygon) => is_valid_polygon(polygon),
        Geometry::MultiPolygon(multi) => !multi.0.is_empty() && multi.0.iter().all(is_valid_polygon),
        _ => false,
    }
}

/// Simple-polygon check: sound rings, no crossings, holes inside the shell and
/// not inside each other. Rings may touch at single points.
pub fn is_valid_polygon(polygon: &Polygon<f64>) -> bool {
    let rings: Vec<&LineString<f64>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .collect();

    if !rings.iter().all(|ring| ring_is_simple(ring)) {
        return false;
    }

    for (i, a) in rings.iter().enumerate() {
        for b in &rings[i + 1..] {
            if rings_cross(a, b) {
                return false;
            }
        }
    }

    let shell = Polygon::new(polygon.exterior().clone(), vec![]);
    let hole_polygons: Vec<Polygon<f64>> = polygon
        .interiors()
        .iter()
        .map(|ring| Polygon::new(ring.clone(), vec![]))
        .collect();

    for (i, hole) in polygon.interiors().iter().enumerate() {
        if !hole.coords().all(|c| shell.intersects(c)) || hole.coords().all(|c| !shell.contains(c)) {
            return false;
        }
        for (j, other) in hole_polygons.iter().enumerate() {
            if i != j && hole.coords().any(|c| other.contains(c)) {
                return false;
            }
        }
    }

    true
}

fn segments(ring: &LineString<f64>) -> Vec<Line<f64>> {
    ring.lines().filter(|line| line.start != line.end).collect()
}

fn ring_is_simple(ring: &LineString<f64>) -> bool {
    if ring.0.len() < 4 || !ring.is_closed() {
        return false;
    }
    if !ring.coords().all(|c| c.x.is_finite() && c.y.is_finite()) {
        return false;
    }

    let mut distinct: Vec<Coord<f64>> = Vec::new();
    for c in ring.coords() {
        if !distinct.contains(c) {
            distinct.push(*c);
            if distinct.len() >= 3 {
                break;
            }
        }
    }
    if distinct.len() < 3 {
        return false;
    }
    if Polygon::new(ring.clone(), vec![]).unsigned_area() == 0.0 {
        return false;
    }

    let lines = segments(ring);
    let n = lines.len();
    for i in 0..n {
        for j in i + 1..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            let Some(hit) = line_intersection(lines[i], lines[j]) else {
                continue;
            };
            match hit {
                LineIntersection::Collinear { intersection } if intersection.start != intersection.end => {
                    return false;
                }
                _ if adjacent => {}
                _ => return false,
            }
        }
    }

    true
}

/// Whether two rings cross or share a stretch of boundary.
fn rings_cross(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    let a_lines = segments(a);
    let b_lines = segments(b);

    a_lines.iter().any(|la| {
        b_lines.iter().any(|lb| match line_intersection(*la, *lb) {
            Some(LineIntersection::SinglePoint { is_proper, .. }) => is_proper,
            Some(LineIntersection::Collinear { intersection }) => intersection.start != intersection.end,
            None => false,
        })
    })
}
