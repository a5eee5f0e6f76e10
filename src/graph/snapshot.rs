//! Immutable layout output handed to renderers.
//!
//! Positions are lane/row indices plus a vertical `shift` coming from the
//! expansion reflow. Renderers pick their own lane spacing and row height.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::commit::CommitId;

pub type TraceId = usize;

/// Rendering hint passed through unchanged
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Rounded,
    Angular,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct LanePoint {
    pub lane: usize,
    pub row: usize,
}

impl LanePoint {
    pub const fn new(lane: usize, row: usize) -> Self {
        Self { lane, row }
    }
}

/// Which endpoint of a segment stays anchored when rows below an expansion move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FixedEnd {
    Start,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentKind {
    /// Runs down a single lane
    Straight,
    /// Leaves a merge commit into the lane of one of its other parents
    Fork,
    /// Bends out of a closing trace into the lane of the commit it reached
    MergeIn,
    /// Runs to the bottom of the loaded history towards a parent not loaded yet
    Dangling,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Segment {
    pub trace: TraceId,
    pub from: LanePoint,
    pub to: LanePoint,
    pub color: usize,
    pub committed: bool,
    pub fixed_end: FixedEnd,
    pub kind: SegmentKind,
    /// Commit whose parent link this segment draws
    pub child: CommitId,
    pub parent: CommitId,
}

impl Segment {
    pub fn is_vertical(&self) -> bool {
        self.from.lane == self.to.lane
    }

    /// True when the segment crosses from `row` or above into the rows below it.
    pub fn straddles(&self, row: usize) -> bool {
        self.from.row <= row && self.to.row > row
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Vertex {
    pub commit: CommitId,
    pub lane: usize,
    pub row: usize,
    pub trace: TraceId,
    pub color: usize,
    pub merge: bool,
    pub working_changes: bool,
}

impl Vertex {
    pub fn point(&self) -> LanePoint {
        LanePoint::new(self.lane, self.row)
    }
}

/// Where a trace started. Reloads use it to give a trace its previous color back.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum TraceOrigin {
    /// Opened at a commit nothing above was waiting for (a branch head)
    Head { commit: CommitId },
    /// Opened at a merge for one of its non-first parents
    Fork { merge: CommitId, parent: CommitId },
    /// The uncommitted-changes line; never carried across passes
    WorkingChanges,
}

/// One continuously colored line of descent.
///
/// `active_from..=active_to` are the rows during which the trace sits in its
/// own lane. A trace that forks and merges back on the very next row never
/// settles in its lane, leaving `active_to < active_from`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trace {
    pub id: TraceId,
    pub origin: TraceOrigin,
    pub lane: usize,
    pub color: usize,
    pub active_from: usize,
    pub active_to: usize,
    pub unresolved_end: bool,
}

impl Trace {
    pub fn is_working_changes(&self) -> bool {
        self.origin == TraceOrigin::WorkingChanges
    }

    pub fn is_active_at(&self, row: usize) -> bool {
        self.active_from <= row && row <= self.active_to
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Expansion {
    pub row: usize,
    pub extra_height: f32,
}

/// A point after reflow: y = `row * row_height + shift`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScreenPoint {
    pub lane: usize,
    pub row: usize,
    pub shift: f32,
}

impl ScreenPoint {
    pub fn y(&self, row_height: f32) -> f32 {
        self.row as f32 * row_height + self.shift
    }
}

/// Renderer-ready polyline for one segment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Stroke {
    /// Index into [`LayoutSnapshot::segments`]
    pub segment: usize,
    pub color: usize,
    pub committed: bool,
    pub points: Vec<ScreenPoint>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LayoutSnapshot {
    pub(crate) vertices: Arc<[Vertex]>,
    pub(crate) segments: Arc<[Segment]>,
    pub(crate) traces: Arc<[Trace]>,
    #[serde(skip)]
    pub(crate) index: Arc<HashMap<CommitId, usize>>,
    pub(crate) lane_count: usize,
    pub(crate) row_count: usize,
    pub(crate) palette_size: usize,
    pub(crate) line_style: LineStyle,
    pub(crate) expansion: Option<Expansion>,
    pub(crate) strokes: Arc<[Stroke]>,
}

impl LayoutSnapshot {
    pub fn empty(palette_size: usize, line_style: LineStyle) -> Self {
        Self {
            vertices: Vec::new().into(),
            segments: Vec::new().into(),
            traces: Vec::new().into(),
            index: Arc::default(),
            lane_count: 0,
            row_count: 0,
            palette_size,
            line_style,
            expansion: None,
            strokes: Vec::new().into(),
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Number of lanes the renderer must reserve
    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn palette_size(&self) -> usize {
        self.palette_size
    }

    pub fn line_style(&self) -> LineStyle {
        self.line_style
    }

    pub fn expansion(&self) -> Option<Expansion> {
        self.expansion
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Vertex of the commit displayed at `row`
    pub fn row(&self, row: usize) -> Option<&Vertex> {
        self.vertices.get(row)
    }

    pub fn vertex_for(&self, id: &CommitId) -> Option<&Vertex> {
        self.index.get(id).and_then(|&i| self.vertices.get(i))
    }

    /// Hit test: the vertex sitting exactly at `(lane, row)`.
    pub fn vertex_at(&self, lane: usize, row: usize) -> Option<&Vertex> {
        self.row(row).filter(|v| v.lane == lane)
    }

    pub fn trace(&self, id: TraceId) -> Option<&Trace> {
        self.traces.iter().find(|t| t.id == id)
    }

    /// Traces sitting in their lane at `row`, ordered by lane.
    pub fn open_traces_at(&self, row: usize) -> Vec<&Trace> {
        let mut open: Vec<&Trace> = self.traces.iter().filter(|t| t.is_active_at(row)).collect();
        open.sort_by_key(|t| t.lane);
        open
    }

    /// Width of the graph column in lane units; never zero so renderers can divide by it.
    pub fn graph_width(&self) -> usize {
        self.lane_count.max(1)
    }

    /// Segments drawing the link from `child` to `parent`, in path order.
    pub fn link(&self, child: &CommitId, parent: &CommitId) -> Vec<&Segment> {
        let mut path: Vec<&Segment> = self
            .segments
            .iter()
            .filter(|s| &s.child == child && &s.parent == parent)
            .collect();
        path.sort_by_key(|s| (s.from.row, s.to.row));
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(from: (usize, usize), to: (usize, usize)) -> Segment {
        Segment {
            trace: 0,
            from: LanePoint::new(from.0, from.1),
            to: LanePoint::new(to.0, to.1),
            color: 0,
            committed: true,
            fixed_end: FixedEnd::Start,
            kind: SegmentKind::Straight,
            child: "a".into(),
            parent: "b".into(),
        }
    }

    #[test]
    fn test_segment_straddles() {
        let s = segment((0, 2), (0, 5));
        assert!(!s.straddles(1));
        assert!(s.straddles(2));
        assert!(s.straddles(4));
        assert!(!s.straddles(5));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = LayoutSnapshot::empty(12, LineStyle::Angular);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.graph_width(), 1);
        assert!(snapshot.row(0).is_none());
        assert!(snapshot.vertex_for(&"a".into()).is_none());
    }

    #[test]
    fn test_trace_activity_range() {
        let trace = Trace {
            id: 0,
            origin: TraceOrigin::Fork {
                merge: "m".into(),
                parent: "p".into(),
            },
            lane: 0,
            color: 0,
            active_from: 3,
            active_to: 2,
            unresolved_end: false,
        };
        assert!(!trace.is_active_at(2));
        assert!(!trace.is_active_at(3));
    }
}
