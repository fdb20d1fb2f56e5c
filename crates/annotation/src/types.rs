use geo_types::{Coord, Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use wkt::ToWkt;

/// A 2-D point `[x, y]`.
pub type Point = [f64; 2];

/// A closed ring. The closing point is implicit and is not repeated.
pub type Ring = Vec<Point>;

/// Rotational direction of a ring, judged by the sign of its shoelace sum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize,
    Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WindingOrder {
    Clockwise,
    CounterClockwise,
    Degenerate,
}

impl WindingOrder {
    /// `+1` for clockwise, `-1` for counter-clockwise, `0` for degenerate.
    pub fn sign(self) -> i8 {
        match self {
            Self::Clockwise => 1,
            Self::CounterClockwise => -1,
            Self::Degenerate => 0,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Self::Clockwise => Self::CounterClockwise,
            Self::CounterClockwise => Self::Clockwise,
            Self::Degenerate => Self::Degenerate,
        }
    }
}

/// Which side of a region a traced border lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BorderKind {
    /// Boundary between a foreground region and the background around it
    Outer,
    /// Boundary of a background hole inside a foreground region
    Hole,
}

/// A contour found by raster tracing, with its place in the nesting tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedContour {
    pub points: Ring,
    pub border: BorderKind,
    /// Index of the directly enclosing contour, if any
    pub parent: Option<usize>,
}

/// One shell with its holes, still in the coordinate space it was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingGroup {
    /// Class label the shape belongs to
    pub label: String,
    /// The exterior boundary (counter-clockwise)
    pub shell: Ring,
    /// Interior boundaries (clockwise), in discovery order
    pub holes: Vec<Ring>,
}

impl RingGroup {
    pub fn new(label: impl Into<String>, shell: Ring, holes: Vec<Ring>) -> Self {
        Self {
            label: label.into(),
            shell,
            holes,
        }
    }
}

pub(crate) fn ring_to_linestring(ring: &[Point]) -> LineString<f64> {
    LineString::new(ring.iter().map(|&[x, y]| Coord { x, y }).collect())
}

/// A finished polygon in output space together with its class label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledPolygon {
    pub label: String,
    /// `Polygon`, or `MultiPolygon` when repair split the shape
    pub geometry: Geometry<f64>,
    /// Result of the validity check on `geometry`
    pub valid: bool,
    /// Whether `geometry` is the output of a repair rather than the assembled rings
    pub repaired: bool,
}

impl LabeledPolygon {
    /// Well-known text of the geometry, e.g. `POLYGON((...),(...))`
    pub fn to_wkt(&self) -> String {
        self.geometry.wkt_string()
    }

    pub fn area(&self) -> f64 {
        use geo::Area;
        self.geometry.unsigned_area()
    }

    pub fn hole_count(&self) -> usize {
        match &self.geometry {
            Geometry::Polygon(polygon) => polygon.interiors().len(),
            Geometry::MultiPolygon(multi) => multi.0.iter().map(|p| p.interiors().len()).sum(),
            _ => 0,
        }
    }

    /// The polygon, if the geometry was not split by repair
    pub fn as_polygon(&self) -> Option<&Polygon<f64>> {
        match &self.geometry {
            Geometry::Polygon(polygon) => Some(polygon),
            _ => None,
        }
    }
}

/// Why a shape was left out of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RejectReason {
    /// No counter-clockwise ring survived classification
    NoShell,
    /// More counter-clockwise rings than the winding policy accepts
    MultipleShells { count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeDiagnostic {
    pub label: String,
    /// Position of the shape in its source document
    pub index: usize,
    pub reason: RejectReason,
}

/// Everything one conversion call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionOutput {
    pub polygons: Vec<LabeledPolygon>,
    pub diagnostics: Vec<ShapeDiagnostic>,
}

impl ConversionOutput {
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    /// `(wkt, label)` pairs in emission order
    pub fn to_wkt_list(&self) -> Vec<(String, String)> {
        self.polygons
            .iter()
            .map(|polygon| (polygon.to_wkt(), polygon.label.clone()))
            .collect()
    }

    pub(crate) fn extend(&mut self, other: ConversionOutput) {
        self.polygons.extend(other.polygons);
        self.diagnostics.extend(other.diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_hole() -> Polygon<f64> {
        Polygon::new(
            ring_to_linestring(&[[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0]]),
            vec![ring_to_linestring(&[[2.0, 2.0], [4.0, 2.0], [4.0, 4.0], [2.0, 4.0]])],
        )
    }

    #[test]
    fn labeled_polygon_wkt_lists_shell_then_holes() {
        let polygon = LabeledPolygon {
            label: "Pattern3".to_string(),
            geometry: Geometry::Polygon(square_with_hole()),
            valid: true,
            repaired: false,
        };

        let wkt = polygon.to_wkt();
        assert!(wkt.starts_with("POLYGON(("));
        assert_eq!(wkt.matches('(').count(), 3);
        assert_eq!(polygon.hole_count(), 1);
        assert!((polygon.area() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn winding_sign_and_reverse() {
        assert_eq!(WindingOrder::Clockwise.sign(), 1);
        assert_eq!(WindingOrder::CounterClockwise.sign(), -1);
        assert_eq!(WindingOrder::Degenerate.sign(), 0);
        assert_eq!(WindingOrder::Clockwise.reversed(), WindingOrder::CounterClockwise);
        assert_eq!(WindingOrder::Degenerate.to_string(), "degenerate");
    }
}
