use crate::{
    algorithms::winding::{classify, contour_area, oriented},
    config::{HoleAttachment, WindingPolicy},
    types::{BorderKind, RejectReason, Ring, RingGroup, TracedContour, WindingOrder},
};

/// Reduce a tracing tree to one level: `None` for shells, `Some(root)` for holes.
pub fn attach_holes(contours: &[TracedContour], attachment: HoleAttachment) -> Vec<Option<usize>> {
    contours
        .iter()
        .map(|contour| match attachment {
            HoleAttachment::ImmediateParent => match contour.border {
                BorderKind::Outer => None,
                BorderKind::Hole => enclosing_outer(contours, contour.parent),
            },
            HoleAttachment::NearestRoot => {
                let mut root = contour.parent?;
                // parent indices always point at earlier contours, so this terminates
                while let Some(parent) = contours.get(root).and_then(|c| c.parent) {
                    root = parent;
                }
                Some(root)
            }
        })
        .collect()
}

fn enclosing_outer(contours: &[TracedContour], mut parent: Option<usize>) -> Option<usize> {
    while let Some(index) = parent {
        let contour = contours.get(index)?;
        if contour.border == BorderKind::Outer {
            return Some(index);
        }
        parent = contour.parent;
    }
    None
}

/// Groups traced contours into shells and holes using the tracing hierarchy
#[derive(Debug, Clone, Default)]
pub struct HierarchyAssembler {
    pub min_area: f64,
    pub attachment: HoleAttachment,
}

impl HierarchyAssembler {
    pub fn new(min_area: f64, attachment: HoleAttachment) -> Self {
        Self { min_area, attachment }
    }

    /// One group per surviving root contour, holes in discovery order.
    pub fn assemble(&self, label: &str, contours: &[TracedContour]) -> Vec<RingGroup> {
        let roots = attach_holes(contours, self.attachment);

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); contours.len()];
        for (index, root) in roots.iter().enumerate() {
            if let Some(root) = root {
                children[*root].push(index);
            }
        }

        contours
            .iter()
            .enumerate()
            .filter(|(index, contour)| roots[*index].is_none() && self.keeps(&contour.points))
            .map(|(index, contour)| {
                let holes = children[index]
                    .iter()
                    .map(|&child| &contours[child].points)
                    .filter(|points| self.keeps(points))
                    .map(|points| oriented(points, WindingOrder::Clockwise))
                    .collect();

                RingGroup::new(
                    label,
                    oriented(&contour.points, WindingOrder::CounterClockwise),
                    holes,
                )
            })
            .collect()
    }

    fn keeps(&self, ring: &[[f64; 2]]) -> bool {
        contour_area(ring) > self.min_area
    }
}

/// Groups an already-traced ring list of one shape by winding order
#[derive(Debug, Clone, Default)]
pub struct WindingAssembler {
    pub policy: WindingPolicy,
    /// Holes must enclose more than this area
    pub min_area: f64,
}

impl WindingAssembler {
    pub fn new(policy: WindingPolicy, min_area: f64) -> Self {
        Self { policy, min_area }
    }

    pub fn assemble(&self, label: &str, rings: &[Ring]) -> Result<RingGroup, RejectReason> {
        let classified: Vec<(&Ring, WindingOrder)> = rings
            .iter()
            .map(|ring| (ring, classify(ring)))
            .filter(|(ring, winding)| {
                if *winding == WindingOrder::Degenerate {
                    tracing::debug!("Dropping degenerate ring of {} points in '{}'", ring.len(), label);
                    false
                } else {
                    true
                }
            })
            .collect();

        let shell_count = classified
            .iter()
            .filter(|(_, winding)| *winding == WindingOrder::CounterClockwise)
            .count();

        match (self.policy, shell_count) {
            (_, 0) => return Err(RejectReason::NoShell),
            (WindingPolicy::Strict, 1) | (WindingPolicy::Lenient, _) => {}
            (WindingPolicy::Strict, count) => return Err(RejectReason::MultipleShells { count }),
        }

        let shell_position = classified
            .iter()
            .position(|(_, winding)| *winding == WindingOrder::CounterClockwise)
            .ok_or(RejectReason::NoShell)?;

        let holes = classified
            .iter()
            .enumerate()
            .filter(|(position, (ring, _))| *position != shell_position && contour_area(ring) > self.min_area)
            .map(|(_, (ring, _))| oriented(ring, WindingOrder::Clockwise))
            .collect();

        Ok(RingGroup::new(label, classified[shell_position].0.clone(), holes))
    }
}
