//! Commit DAG layout engine.
//!
//! Turns an ordered commit list into lanes, colors and line segments
//! ([`build`]), grows that layout as older history loads ([`extend`]), and
//! stretches it around an expanded row ([`reflow`]).

pub mod builder;
pub mod commit;
pub mod error;
pub mod lanes;
pub mod reflow;
pub mod snapshot;

pub use builder::{DEFAULT_PALETTE_SIZE, LayoutOptions, TraceTable, build, build_with_hints, extend};
pub use commit::{Commit, CommitId, CommitOrdering, WORKING_CHANGES_ID};
pub use error::LayoutError;
pub use lanes::LaneAllocator;
pub use reflow::reflow;
pub use snapshot::{
    Expansion, FixedEnd, LanePoint, LayoutSnapshot, LineStyle, ScreenPoint, Segment, SegmentKind,
    Stroke, Trace, TraceId, TraceOrigin, Vertex,
};
