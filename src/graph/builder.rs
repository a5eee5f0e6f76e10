//! Single top-to-bottom pass that places commits and draws their parent links.
//!
//! Each row only looks at the commits above it, so laying out a longer list
//! never changes what was decided for the rows it shares with a shorter one.
//! That is what lets [`extend`] resume a paused pass from its [`TraceTable`]
//! instead of starting over.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::commit::{Commit, CommitId};
use super::error::LayoutError;
use super::lanes::LaneAllocator;
use super::reflow;
use super::snapshot::{
    FixedEnd, LanePoint, LayoutSnapshot, LineStyle, Segment, SegmentKind, Trace, TraceId,
    TraceOrigin, Vertex,
};

/// Default number of distinct lane colors
pub const DEFAULT_PALETTE_SIZE: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutOptions {
    pub palette_size: usize,
    pub line_style: LineStyle,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            palette_size: DEFAULT_PALETTE_SIZE,
            line_style: LineStyle::default(),
        }
    }
}

/// A trace still waiting for the parent it points at
#[derive(Clone, Debug)]
struct OpenTrace {
    id: TraceId,
    origin: TraceOrigin,
    /// `None` for a fork that has not settled into a lane yet
    lane: Option<usize>,
    color: usize,
    /// Parent hash this trace continues to
    expecting: CommitId,
    /// Commit whose link to `expecting` the trace is drawing
    child: CommitId,
    /// `expecting` is the first parent of `child`
    first_parent: bool,
    last: LanePoint,
    /// Opened at a merge and still sitting on the merge vertex
    fork_pending: bool,
    active_from: usize,
}

impl OpenTrace {
    fn is_working_changes(&self) -> bool {
        self.origin == TraceOrigin::WorkingChanges
    }

    /// Lane the trace is drawn in. An unsettled fork only exists on its
    /// merge vertex.
    fn lane(&self) -> usize {
        self.lane.unwrap_or(self.last.lane)
    }

    fn finish(self, active_to: usize, unresolved_end: bool) -> Trace {
        Trace {
            id: self.id,
            lane: self.lane(),
            origin: self.origin,
            color: self.color,
            active_from: self.active_from,
            active_to,
            unresolved_end,
        }
    }
}

/// A layout pass paused after its last row.
///
/// Returned next to every snapshot and handed back to [`extend`] when older
/// commits are appended. Nothing else holds layout state between passes.
#[derive(Clone, Debug)]
pub struct TraceTable {
    options: LayoutOptions,
    allocator: LaneAllocator,
    open: Vec<OpenTrace>,
    closed: Vec<Trace>,
    vertices: Vec<Vertex>,
    segments: Vec<Segment>,
    index: HashMap<CommitId, usize>,
    color_hints: HashMap<TraceOrigin, usize>,
    next_trace: TraceId,
}

impl TraceTable {
    fn new(options: LayoutOptions, color_hints: HashMap<TraceOrigin, usize>) -> Self {
        Self {
            options,
            allocator: LaneAllocator::new(options.palette_size),
            open: Vec::new(),
            closed: Vec::new(),
            vertices: Vec::new(),
            segments: Vec::new(),
            index: HashMap::new(),
            color_hints,
            next_trace: 0,
        }
    }

    /// Rows laid out so far
    fn row_count(&self) -> usize {
        self.vertices.len()
    }

    /// Traces still waiting for a parent below the loaded rows
    pub fn open_trace_count(&self) -> usize {
        self.open.len()
    }

    /// Parent hashes the next page of history is expected to contain.
    pub fn pending_parents(&self) -> Vec<&CommitId> {
        let mut seen = HashSet::new();
        self.open
            .iter()
            .map(|t| &t.expecting)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    fn validate(&self, commits: &[Commit]) -> Result<(), LayoutError> {
        if self.options.palette_size == 0 {
            return Err(LayoutError::InvalidPaletteSize);
        }

        let first_row = self.row_count();
        let mut batch = HashSet::new();
        for (offset, commit) in commits.iter().enumerate() {
            let expected = first_row + offset;
            if commit.row != expected {
                return Err(LayoutError::NonSequentialRow {
                    id: commit.id.clone(),
                    expected,
                    found: commit.row,
                });
            }
            if commit.working_changes && commit.row != 0 {
                return Err(LayoutError::MisplacedWorkingChanges {
                    id: commit.id.clone(),
                    row: commit.row,
                });
            }
            if self.index.contains_key(&commit.id) || !batch.insert(&commit.id) {
                return Err(LayoutError::DuplicateCommit(commit.id.clone()));
            }
        }
        Ok(())
    }

    fn open_trace(&mut self, commit: &Commit, preceding_lane: Option<usize>) -> OpenTrace {
        let origin = if commit.working_changes {
            TraceOrigin::WorkingChanges
        } else {
            TraceOrigin::Head {
                commit: commit.id.clone(),
            }
        };
        let id = self.next_id();
        let hint = self.color_hints.get(&origin).copied();
        let (lane, color) = self.allocator.open(id, preceding_lane, hint);
        let point = LanePoint::new(lane, commit.row);
        OpenTrace {
            id,
            origin,
            lane: Some(lane),
            color,
            expecting: commit.id.clone(),
            child: commit.id.clone(),
            first_parent: true,
            last: point,
            fork_pending: false,
            active_from: commit.row,
        }
    }

    /// Open the trace for a non-first parent of `merge`. Its color is fixed
    /// now; its lane only once the next row is known, since a fork whose
    /// parent is that very row and loses it never occupies a lane.
    fn open_fork(&mut self, merge: &Commit, parent: &CommitId, merge_lane: usize) -> OpenTrace {
        let origin = TraceOrigin::Fork {
            merge: merge.id.clone(),
            parent: parent.clone(),
        };
        let id = self.next_id();
        let color = self.allocator.claim_color(self.color_hints.get(&origin).copied());
        OpenTrace {
            id,
            origin,
            lane: None,
            color,
            expecting: parent.clone(),
            child: merge.id.clone(),
            first_parent: false,
            last: LanePoint::new(merge_lane, merge.row),
            fork_pending: true,
            active_from: merge.row + 1,
        }
    }

    fn next_id(&mut self) -> TraceId {
        let id = self.next_trace;
        self.next_trace += 1;
        id
    }

    /// Lay out one commit. `validate` must have accepted it.
    fn place(&mut self, commit: &Commit) {
        let row = commit.row;

        let (mut arriving, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.open)
            .into_iter()
            .partition(|t| t.expecting == commit.id);
        self.open = waiting;

        // First-parent links win over merge links, then the leftmost lane,
        // with unsettled forks last. The working-changes line always yields.
        let winner = arriving
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_working_changes())
            .min_by_key(|(_, t)| (!t.first_parent, t.lane.unwrap_or(usize::MAX)))
            .map(|(i, _)| i);
        let mut winner = winner.map(|i| arriving.remove(i));

        for trace in &arriving {
            self.allocator.close(trace.id, trace.lane, trace.color);
        }

        // Forks from the row above take their lanes once the lines ending
        // here have let go of theirs
        let mut unsettled: Vec<&mut OpenTrace> = self
            .open
            .iter_mut()
            .chain(winner.as_mut())
            .filter(|t| t.lane.is_none())
            .collect();
        unsettled.sort_by_key(|t| t.id);
        for trace in unsettled {
            trace.lane = Some(self.allocator.claim_lane(trace.id, Some(trace.last.lane)));
        }

        let mut trace = match winner {
            Some(trace) => {
                self.allocator.continue_trace(trace.id, trace.lane());
                route(&mut self.segments, &trace, LanePoint::new(trace.lane(), row), false);
                trace
            }
            None => self.open_trace(commit, arriving.first().map(OpenTrace::lane)),
        };

        let point = LanePoint::new(trace.lane(), row);
        for other in arriving {
            route(&mut self.segments, &other, point, false);
            self.closed.push(other.finish(row.saturating_sub(1), false));
        }

        self.index.insert(commit.id.clone(), self.vertices.len());
        self.vertices.push(Vertex {
            commit: commit.id.clone(),
            lane: point.lane,
            row,
            trace: trace.id,
            color: trace.color,
            merge: commit.is_merge(),
            working_changes: commit.working_changes,
        });

        let Some((first, rest)) = commit.parent_ids.split_first() else {
            self.allocator.close(trace.id, trace.lane, trace.color);
            self.closed.push(trace.finish(row, false));
            return;
        };

        trace.expecting = first.clone();
        trace.child = commit.id.clone();
        trace.first_parent = true;
        trace.last = point;
        trace.fork_pending = false;
        self.open.push(trace);

        for parent in rest {
            let fork = self.open_fork(commit, parent, point.lane);
            self.open.push(fork);
        }
    }

    /// Close off the paused pass into an immutable snapshot. Traces still
    /// waiting run down to the load boundary and are marked unresolved.
    ///
    /// Forks opened on the last row settle on a scratch allocator, as if no
    /// line ended on the next row; the real lane is picked once it loads.
    fn snapshot(&self) -> LayoutSnapshot {
        let row_count = self.row_count();
        let mut segments = self.segments.clone();
        let mut traces = self.closed.clone();
        let mut allocator = self.allocator.clone();

        for trace in &self.open {
            let mut trace = trace.clone();
            if trace.lane.is_none() {
                trace.lane = Some(allocator.claim_lane(trace.id, Some(trace.last.lane)));
            }
            let end = LanePoint::new(trace.lane(), row_count);
            route(&mut segments, &trace, end, true);
            traces.push(trace.finish(row_count, true));
        }
        traces.sort_by_key(|t| t.id);

        let strokes = reflow::strokes(&segments, None);
        LayoutSnapshot {
            vertices: self.vertices.clone().into(),
            segments: segments.into(),
            traces: traces.into(),
            index: Arc::new(self.index.clone()),
            lane_count: allocator.lane_count(),
            row_count,
            palette_size: self.options.palette_size,
            line_style: self.options.line_style,
            expansion: None,
            strokes: strokes.into(),
        }
    }
}

/// Draw `trace` from its last point to `target`.
///
/// Bends always span exactly one row: a fork leaves the merge vertex and
/// settles into its own lane on the next row; a merge-in runs down its own
/// lane and bends into the target lane on the row above the target.
fn route(segments: &mut Vec<Segment>, trace: &OpenTrace, target: LanePoint, dangling: bool) {
    let mut push = |from: LanePoint, to: LanePoint, kind: SegmentKind, fixed_end: FixedEnd| {
        segments.push(Segment {
            trace: trace.id,
            from,
            to,
            color: trace.color,
            committed: !trace.is_working_changes(),
            fixed_end,
            kind,
            child: trace.child.clone(),
            parent: trace.expecting.clone(),
        });
    };

    let mut from = trace.last;
    if trace.fork_pending {
        let settled = LanePoint::new(trace.lane(), from.row + 1);
        if target.row <= settled.row {
            push(from, target, SegmentKind::Fork, FixedEnd::Start);
            return;
        }
        push(from, settled, SegmentKind::Fork, FixedEnd::Start);
        from = settled;
    }

    if target.lane == from.lane {
        if target.row > from.row {
            let kind = if dangling {
                SegmentKind::Dangling
            } else {
                SegmentKind::Straight
            };
            push(from, target, kind, FixedEnd::Start);
        }
        return;
    }

    let knee = LanePoint::new(from.lane, target.row - 1);
    if knee.row > from.row {
        push(from, knee, SegmentKind::Straight, FixedEnd::Start);
        from = knee;
    }
    push(from, target, SegmentKind::MergeIn, FixedEnd::End);
}

fn finish_pass(table: &TraceTable) -> LayoutSnapshot {
    let snapshot = table.snapshot();
    tracing::debug!(
        rows = snapshot.row_count(),
        lanes = snapshot.lane_count(),
        traces = snapshot.traces().len(),
        lanes_held = table.allocator.occupied(),
        unresolved = table.open_trace_count(),
        "layout pass complete"
    );
    snapshot
}

/// Lay out `commits` from scratch.
pub fn build(
    commits: &[Commit],
    options: LayoutOptions,
) -> Result<(LayoutSnapshot, TraceTable), LayoutError> {
    build_with_color_hints(commits, options, HashMap::new())
}

/// Lay out `commits` from scratch, giving traces that also existed in
/// `previous` their old color back whenever it is free. The working-changes
/// line never inherits anything.
pub fn build_with_hints(
    commits: &[Commit],
    options: LayoutOptions,
    previous: &LayoutSnapshot,
) -> Result<(LayoutSnapshot, TraceTable), LayoutError> {
    let hints = previous
        .traces()
        .iter()
        .filter(|t| !t.is_working_changes())
        .filter(|t| t.color < options.palette_size)
        .map(|t| (t.origin.clone(), t.color))
        .collect();
    build_with_color_hints(commits, options, hints)
}

fn build_with_color_hints(
    commits: &[Commit],
    options: LayoutOptions,
    hints: HashMap<TraceOrigin, usize>,
) -> Result<(LayoutSnapshot, TraceTable), LayoutError> {
    let mut table = TraceTable::new(options, hints);
    table.validate(commits)?;
    for commit in commits {
        table.place(commit);
    }
    Ok((finish_pass(&table), table))
}

/// Resume a paused pass with older commits appended below it.
///
/// The result is the snapshot a full rebuild of the concatenated list would
/// produce. Every appended commit is validated before any row is placed;
/// the table is consumed either way, so callers that want to retry after an
/// error keep a clone.
pub fn extend(
    mut table: TraceTable,
    appended: &[Commit],
) -> Result<(LayoutSnapshot, TraceTable), LayoutError> {
    table.validate(appended)?;
    for commit in appended {
        table.place(commit);
    }
    Ok((finish_pass(&table), table))
}
