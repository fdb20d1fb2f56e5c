use geo_types::{Coord, LineString};
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};

use crate::{
    config::ChainApproximation,
    error::Result,
    traits::ContourTracer,
    types::{BorderKind, Point, Ring, TracedContour},
};

/// Suzuki-Abe border following via `imageproc::contours::find_contours`.
///
/// Returns every outer and hole border with the full nesting tree, in
/// raster scan order.
#[derive(Debug, Clone, Default)]
pub struct ImageprocContourTracer {
    pub approximation: ChainApproximation,
}

impl ImageprocContourTracer {
    pub fn new(approximation: ChainApproximation) -> Self {
        Self { approximation }
    }
}

impl ContourTracer for ImageprocContourTracer {
    fn trace(&self, mask: &GrayImage) -> Result<Vec<TracedContour>> {
        let contours = find_contours::<i32>(mask);

        let result = contours
            .into_iter()
            .map(|contour| {
                let points: Ring = contour
                    .points
                    .iter()
                    .map(|p| [p.x as f64, p.y as f64])
                    .collect();

                TracedContour {
                    points: approximate(&points, self.approximation),
                    border: match contour.border_type {
                        BorderType::Outer => BorderKind::Outer,
                        BorderType::Hole => BorderKind::Hole,
                    },
                    parent: contour.parent,
                }
            })
            .collect();

        Ok(result)
    }
}

/// Reduce the points of a traced ring.
pub fn approximate(ring: &[Point], approximation: ChainApproximation) -> Ring {
    match approximation {
        ChainApproximation::None => ring.to_vec(),
        ChainApproximation::Simple => compress_runs(ring),
        ChainApproximation::DouglasPeucker { epsilon } => {
            let compressed = compress_runs(ring);
            let simplified = douglas_peucker(&compressed, epsilon);
            if simplified.len() >= 3 {
                simplified
            } else {
                compressed
            }
        }
    }
}

/// Drop repeated points and the interior points of straight runs.
/// Reversals (spikes of one-pixel-wide features) are kept.
fn compress_runs(ring: &[Point]) -> Ring {
    let n = ring.len();
    if n < 3 {
        return ring.to_vec();
    }

    let mut out: Ring = Vec::with_capacity(n);
    for i in 0..n {
        let prev = ring[(i + n - 1) % n];
        let cur = ring[i];
        let next = ring[(i + 1) % n];

        if cur == prev {
            continue;
        }

        let (ax, ay) = (cur[0] - prev[0], cur[1] - prev[1]);
        let (bx, by) = (next[0] - cur[0], next[1] - cur[1]);
        let cross = ax * by - ay * bx;
        let dot = ax * bx + ay * by;
        if cross == 0.0 && dot > 0.0 {
            continue;
        }

        out.push(cur);
    }

    if out.len() < 3 {
        return ring.to_vec();
    }
    out
}

fn douglas_peucker(ring: &[Point], epsilon: f64) -> Ring {
    use geo::Simplify;

    let mut coords: Vec<Coord<f64>> = ring.iter().map(|&[x, y]| Coord { x, y }).collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }

    let simplified = LineString::new(coords).simplify(&epsilon);
    let mut out: Ring = simplified.coords().map(|c| [c.x, c.y]).collect();
    // drop the closing point again
    if out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled_rect(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Luma([255u8]));
            }
        }
        img
    }

    #[test]
    fn rectangle_traces_to_four_corners() {
        let img = filled_rect(30, 30, 5, 8, 10, 6);
        let contours = ImageprocContourTracer::default().trace(&img).unwrap();

        assert_eq!(contours.len(), 1);
        let contour = &contours[0];
        assert_eq!(contour.border, BorderKind::Outer);
        assert_eq!(contour.parent, None);
        assert_eq!(contour.points.len(), 4);
        for corner in [[5.0, 8.0], [14.0, 8.0], [14.0, 13.0], [5.0, 13.0]] {
            assert!(contour.points.contains(&corner), "missing corner {corner:?}");
        }
    }

    #[test]
    fn hole_border_points_to_its_outer_border() {
        let mut img = filled_rect(40, 40, 5, 5, 20, 20);
        for y in 10..15 {
            for x in 10..15 {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }

        let contours = ImageprocContourTracer::default().trace(&img).unwrap();
        assert_eq!(contours.len(), 2);

        let outer = contours.iter().position(|c| c.border == BorderKind::Outer).unwrap();
        let hole = contours.iter().find(|c| c.border == BorderKind::Hole).unwrap();
        assert_eq!(hole.parent, Some(outer));
    }

    #[test]
    fn no_approximation_keeps_every_border_pixel() {
        let img = filled_rect(20, 20, 2, 2, 5, 5);
        let tracer = ImageprocContourTracer::new(ChainApproximation::None);
        let contours = tracer.trace(&img).unwrap();
        // a 5x5 block has 16 border pixels
        assert_eq!(contours[0].points.len(), 16);
    }

    #[test]
    fn compress_runs_keeps_spikes() {
        // out-and-back spike from (2,0) to (2,-2)
        let ring = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [2.0, -1.0], [2.0, -2.0], [2.0, -1.0], [2.0, 0.0], [3.0, 0.0], [3.0, 3.0], [0.0, 3.0]];
        let compressed = compress_runs(&ring);
        assert!(compressed.contains(&[2.0, -2.0]));
        assert!(!compressed.contains(&[1.0, 0.0]));
        assert!(!compressed.contains(&[2.0, -1.0]));
    }

    #[test]
    fn douglas_peucker_cuts_corners_but_keeps_a_ring() {
        let ring: Ring = (0..32)
            .map(|i| {
                let t = i as f64 / 32.0 * std::f64::consts::TAU;
                [50.0 + 20.0 * t.cos(), 50.0 + 20.0 * t.sin()]
            })
            .collect();

        let coarse = approximate(&ring, ChainApproximation::DouglasPeucker { epsilon: 2.0 });
        assert!(coarse.len() < ring.len());
        assert!(coarse.len() >= 3);

        let tiny = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        assert_eq!(approximate(&tiny, ChainApproximation::DouglasPeucker { epsilon: 10.0 }), tiny);
    }
}
