//! Expansion reflow: opening a gap below one row for an inline detail view.
//!
//! Only the row-to-screen mapping changes. Lanes, colors and segments are
//! shared with the source snapshot, and every stroke is derived from the
//! segments plus the current [`Expansion`], so collapsing is exact.

use super::error::LayoutError;
use super::snapshot::{
    Expansion, FixedEnd, LanePoint, LayoutSnapshot, ScreenPoint, Segment, Stroke, Vertex,
};

fn shift_for(row: usize, expansion: Option<Expansion>) -> f32 {
    match expansion {
        Some(e) if row > e.row => e.extra_height,
        _ => 0.0,
    }
}

fn at(point: LanePoint, shift: f32) -> ScreenPoint {
    ScreenPoint {
        lane: point.lane,
        row: point.row,
        shift,
    }
}

fn stroke_points(segment: &Segment, expansion: Option<Expansion>) -> Vec<ScreenPoint> {
    let (from, to) = (segment.from, segment.to);
    match expansion {
        Some(e) if segment.straddles(e.row) && !segment.is_vertical() => {
            let h = e.extra_height;
            match segment.fixed_end {
                // Bend stays on the start, the end lane drops through the gap
                FixedEnd::Start => vec![at(from, 0.0), at(to, 0.0), at(to, h)],
                // Start lane drops through the gap, bend stays on the end
                FixedEnd::End => vec![at(from, 0.0), at(from, h), at(to, h)],
            }
        }
        _ => vec![
            at(from, shift_for(from.row, expansion)),
            at(to, shift_for(to.row, expansion)),
        ],
    }
}

/// Screen-space strokes for `segments` under `expansion`.
pub(crate) fn strokes(segments: &[Segment], expansion: Option<Expansion>) -> Vec<Stroke> {
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| Stroke {
            segment: i,
            color: segment.color,
            committed: segment.committed,
            points: stroke_points(segment, expansion),
        })
        .collect()
}

/// Derive a snapshot with `extra_height` of space opened below `expanded_row`.
///
/// `None` collapses back to the plain mapping. Only the expansion passed in
/// counts; whatever `snapshot` was expanded at before is ignored.
pub fn reflow(
    snapshot: &LayoutSnapshot,
    expanded_row: Option<usize>,
    extra_height: f32,
) -> Result<LayoutSnapshot, LayoutError> {
    let expansion = match expanded_row {
        None => None,
        Some(row) if row >= snapshot.row_count => {
            return Err(LayoutError::RowOutOfRange {
                row,
                row_count: snapshot.row_count,
            });
        }
        Some(_) if !extra_height.is_finite() || extra_height < 0.0 => {
            return Err(LayoutError::InvalidExtraHeight(extra_height));
        }
        Some(row) => Some(Expansion { row, extra_height }),
    };

    tracing::trace!(?expansion, "reflowing layout snapshot");
    Ok(LayoutSnapshot {
        strokes: strokes(&snapshot.segments, expansion).into(),
        expansion,
        ..snapshot.clone()
    })
}

impl LayoutSnapshot {
    pub fn reflow(
        &self,
        expanded_row: Option<usize>,
        extra_height: f32,
    ) -> Result<Self, LayoutError> {
        reflow(self, expanded_row, extra_height)
    }

    /// Vertical offset applied to `row` by the current expansion
    pub fn row_shift(&self, row: usize) -> f32 {
        shift_for(row, self.expansion)
    }

    pub fn vertex_point(&self, vertex: &Vertex) -> ScreenPoint {
        at(vertex.point(), self.row_shift(vertex.row))
    }

    /// Total height of the graph including the expansion gap
    pub fn content_height(&self, row_height: f32) -> f32 {
        self.row_count as f32 * row_height + self.expansion.map_or(0.0, |e| e.extra_height)
    }

    /// Row under the offset `y`, measured from the top of row 0. The gap
    /// below an expanded row belongs to that row.
    pub fn row_at_offset(&self, y: f32, row_height: f32) -> Option<usize> {
        if y < 0.0 || row_height <= 0.0 {
            return None;
        }
        let y = match self.expansion {
            Some(e) => {
                let gap_top = (e.row + 1) as f32 * row_height;
                if y < gap_top {
                    y
                } else if y < gap_top + e.extra_height {
                    return Some(e.row);
                } else {
                    y - e.extra_height
                }
            }
            None => y,
        };
        let row = (y / row_height) as usize;
        (row < self.row_count).then_some(row)
    }

    /// Map a point in graph space back to the vertex drawn there.
    pub fn hit_test(&self, x: f32, y: f32, lane_width: f32, row_height: f32) -> Option<&Vertex> {
        if x < 0.0 || lane_width <= 0.0 {
            return None;
        }
        let row = self.row_at_offset(y, row_height)?;
        let lane = (x / lane_width) as usize;
        self.vertex_at(lane, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::{LayoutOptions, build};
    use crate::graph::commit::Commit;

    fn merge_graph() -> LayoutSnapshot {
        let commits = vec![
            Commit::new("m", ["a", "b"], 0),
            Commit::new("a", ["c"], 1),
            Commit::new("b", ["c"], 2),
            Commit::new("c", ["d"], 3),
            Commit::new("d", Vec::<&str>::new(), 4),
        ];
        build(&commits, LayoutOptions::default()).unwrap().0
    }

    #[test]
    fn test_identity_without_expansion() {
        let snapshot = merge_graph();
        let same = snapshot.reflow(None, 300.0).unwrap();
        assert_eq!(same.strokes(), snapshot.strokes());
        assert!(same.strokes().iter().flat_map(|s| &s.points).all(|p| p.shift == 0.0));
        assert_eq!(same.expansion(), None);
    }

    #[test]
    fn test_rows_below_expansion_shift() {
        let snapshot = merge_graph().reflow(Some(1), 100.0).unwrap();
        assert_eq!(snapshot.row_shift(0), 0.0);
        assert_eq!(snapshot.row_shift(1), 0.0);
        assert_eq!(snapshot.row_shift(2), 100.0);
        let c = snapshot.row(3).unwrap();
        assert_eq!(snapshot.vertex_point(c).shift, 100.0);
        assert_eq!(snapshot.content_height(10.0), 150.0);
    }

    #[test]
    fn test_vertical_segment_stretches() {
        let snapshot = merge_graph().reflow(Some(0), 50.0).unwrap();
        // m -> a runs straight down lane 0 across the gap
        let stroke = &snapshot.strokes()[0];
        let segment = &snapshot.segments()[stroke.segment];
        assert!(segment.is_vertical());
        assert_eq!(stroke.points.len(), 2);
        assert_eq!(stroke.points[0].shift, 0.0);
        assert_eq!(stroke.points[1].shift, 50.0);
    }

    #[test]
    fn test_fork_keeps_bend_at_start() {
        let base = merge_graph();
        let fork = base
            .segments()
            .iter()
            .position(|s| s.fixed_end == FixedEnd::Start && !s.is_vertical())
            .unwrap();

        let snapshot = base.reflow(Some(0), 40.0).unwrap();
        let points = &snapshot.strokes()[fork].points;
        assert_eq!(points.len(), 3);
        assert_eq!((points[0].lane, points[0].row, points[0].shift), (0, 0, 0.0));
        assert_eq!((points[1].lane, points[1].row, points[1].shift), (1, 1, 0.0));
        assert_eq!((points[2].lane, points[2].row, points[2].shift), (1, 1, 40.0));
    }

    #[test]
    fn test_merge_in_keeps_bend_at_end() {
        let base = merge_graph();
        let merge_in = base
            .segments()
            .iter()
            .position(|s| s.fixed_end == FixedEnd::End)
            .unwrap();
        assert_eq!(base.segments()[merge_in].from.row, 2);

        let snapshot = base.reflow(Some(2), 40.0).unwrap();
        let points = &snapshot.strokes()[merge_in].points;
        assert_eq!(points.len(), 3);
        assert_eq!((points[0].lane, points[0].row, points[0].shift), (1, 2, 0.0));
        assert_eq!((points[1].lane, points[1].row, points[1].shift), (1, 2, 40.0));
        assert_eq!((points[2].lane, points[2].row, points[2].shift), (0, 3, 40.0));
    }

    #[test]
    fn test_collapse_restores_original() {
        let base = merge_graph();
        let expanded = base.reflow(Some(2), 75.0).unwrap();
        assert_ne!(expanded.strokes(), base.strokes());
        let collapsed = expanded.reflow(None, 0.0).unwrap();
        assert_eq!(collapsed.strokes(), base.strokes());

        // Moving the expansion does not accumulate shifts
        let moved = expanded.reflow(Some(0), 75.0).unwrap();
        assert_eq!(moved.strokes(), base.reflow(Some(0), 75.0).unwrap().strokes());
    }

    #[test]
    fn test_out_of_range_row_fails() {
        let base = merge_graph();
        assert_eq!(
            base.reflow(Some(5), 10.0).unwrap_err(),
            LayoutError::RowOutOfRange { row: 5, row_count: 5 }
        );
        assert!(matches!(
            base.reflow(Some(1), f32::NAN).unwrap_err(),
            LayoutError::InvalidExtraHeight(_)
        ));
    }

    #[test]
    fn test_row_at_offset_skips_gap() {
        let snapshot = merge_graph().reflow(Some(1), 100.0).unwrap();
        assert_eq!(snapshot.row_at_offset(5.0, 10.0), Some(0));
        assert_eq!(snapshot.row_at_offset(15.0, 10.0), Some(1));
        assert_eq!(snapshot.row_at_offset(60.0, 10.0), Some(1));
        assert_eq!(snapshot.row_at_offset(125.0, 10.0), Some(2));
        assert_eq!(snapshot.row_at_offset(149.0, 10.0), Some(4));
        assert_eq!(snapshot.row_at_offset(151.0, 10.0), None);

        let hit = snapshot.hit_test(15.0, 125.0, 12.0, 10.0).unwrap();
        assert_eq!(hit.commit.as_str(), "b");
        assert!(snapshot.hit_test(2.0, 125.0, 12.0, 10.0).is_none());
    }
}
