//! Lane layout for commit history graphs.
//!
//! [`graph`] holds the layout engine, [`session`] sequences history loads
//! and row expansion around it, and [`git`] feeds it from a repository.

pub mod config;
pub mod git;
pub mod graph;
pub mod session;
pub mod telemetry;

pub use config::LayoutConfig;
pub use graph::{
    Commit, CommitId, LayoutError, LayoutOptions, LayoutSnapshot, TraceTable, build, extend,
    reflow,
};
pub use session::{Applied, GraphEvent, GraphSession};
