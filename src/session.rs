//! Event handling around the layout engine.
//!
//! History loads can overlap, so every history event carries a request id
//! assigned by the caller. Results are installed last-write-wins: a layout
//! computed for an older request than the one on screen is dropped.

use crate::graph::{self, Commit, LayoutError, LayoutOptions, LayoutSnapshot, TraceTable};

/// Events the graph view reacts to
#[derive(Clone, Debug)]
pub enum GraphEvent {
    /// Older commits loaded below the current ones
    CommitsAppended(Vec<Commit>),
    /// The whole history was reloaded
    CommitsReset(Vec<Commit>),
    ExpandRow(usize),
    Collapse,
}

/// What a prepared layout was computed from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Basis {
    /// A full reload, valid whatever is installed
    Reset,
    /// Rows appended to the history installed by this request
    Append { on: Option<u64> },
}

/// A layout computed off to the side, waiting to be installed.
#[derive(Debug)]
pub struct PreparedLayout {
    request_id: u64,
    basis: Basis,
    base: LayoutSnapshot,
    table: TraceTable,
}

impl PreparedLayout {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn snapshot(&self) -> &LayoutSnapshot {
        &self.base
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Installed,
    /// A newer request was already installed; the result was dropped
    Stale,
}

/// Current layout state for one graph view.
pub struct GraphSession {
    options: LayoutOptions,
    extra_height: f32,
    /// Snapshot without any expansion
    base: LayoutSnapshot,
    /// What the renderer draws
    current: LayoutSnapshot,
    table: Option<TraceTable>,
    expanded: Option<usize>,
    installed_request: Option<u64>,
}

impl GraphSession {
    pub fn new(options: LayoutOptions, extra_height: f32) -> Self {
        let empty = LayoutSnapshot::empty(options.palette_size, options.line_style);
        Self {
            options,
            extra_height,
            base: empty.clone(),
            current: empty,
            table: None,
            expanded: None,
            installed_request: None,
        }
    }

    pub fn snapshot(&self) -> &LayoutSnapshot {
        &self.current
    }

    pub fn expanded_row(&self) -> Option<usize> {
        self.expanded
    }

    pub fn installed_request(&self) -> Option<u64> {
        self.installed_request
    }

    fn is_stale(&self, request_id: u64) -> bool {
        self.installed_request.is_some_and(|installed| request_id <= installed)
    }

    /// Compute the layout for a history event without touching the session.
    ///
    /// Returns `Ok(None)` when the request is already stale. Expand and
    /// collapse are not history events and are rejected here; use
    /// [`GraphSession::apply`] for them.
    pub fn prepare(
        &self,
        request_id: u64,
        event: &GraphEvent,
    ) -> Result<Option<PreparedLayout>, LayoutError> {
        if self.is_stale(request_id) {
            tracing::debug!(request_id, "skipping stale history request");
            return Ok(None);
        }

        let ((base, table), basis) = match event {
            GraphEvent::CommitsReset(commits) => (
                graph::build_with_hints(commits, self.options, &self.base)?,
                Basis::Reset,
            ),
            GraphEvent::CommitsAppended(commits) => {
                let layout = match &self.table {
                    Some(table) => graph::extend(table.clone(), commits)?,
                    None => graph::build(commits, self.options)?,
                };
                (layout, Basis::Append { on: self.installed_request })
            }
            GraphEvent::ExpandRow(_) | GraphEvent::Collapse => return Ok(None),
        };
        Ok(Some(PreparedLayout {
            request_id,
            basis,
            base,
            table,
        }))
    }

    /// Install a prepared layout unless a newer one is already on screen,
    /// or, for an append, unless the history it grew from was replaced
    /// since it was prepared.
    ///
    /// An expansion survives the reload while its row still exists.
    pub fn install(&mut self, prepared: PreparedLayout) -> Applied {
        if self.is_stale(prepared.request_id) {
            tracing::debug!(request_id = prepared.request_id, "dropping stale layout");
            return Applied::Stale;
        }
        if let Basis::Append { on } = prepared.basis
            && on != self.installed_request
        {
            tracing::debug!(
                request_id = prepared.request_id,
                built_on = ?on,
                installed = ?self.installed_request,
                "dropping append built on replaced history"
            );
            return Applied::Stale;
        }

        self.installed_request = Some(prepared.request_id);
        self.base = prepared.base;
        self.table = Some(prepared.table);
        if self.expanded.is_some_and(|row| row >= self.base.row_count()) {
            self.expanded = None;
        }
        self.current = self.reflowed(self.expanded).unwrap_or_else(|_| self.base.clone());
        Applied::Installed
    }

    /// Handle one event synchronously.
    ///
    /// History events go through [`prepare`](Self::prepare) and
    /// [`install`](Self::install). Expand and collapse only reflow the
    /// current snapshot and ignore `request_id`.
    pub fn apply(&mut self, request_id: u64, event: GraphEvent) -> Result<Applied, LayoutError> {
        match event {
            GraphEvent::ExpandRow(row) => {
                self.current = self.reflowed(Some(row))?;
                self.expanded = Some(row);
                Ok(Applied::Installed)
            }
            GraphEvent::Collapse => {
                self.current = self.reflowed(None)?;
                self.expanded = None;
                Ok(Applied::Installed)
            }
            history => match self.prepare(request_id, &history)? {
                Some(prepared) => Ok(self.install(prepared)),
                None => Ok(Applied::Stale),
            },
        }
    }

    fn reflowed(&self, row: Option<usize>) -> Result<LayoutSnapshot, LayoutError> {
        graph::reflow(&self.base, row, self.extra_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(id: &str, parents: &[&str], row: usize) -> Commit {
        Commit::new(id, parents.iter().copied(), row)
    }

    fn session() -> GraphSession {
        GraphSession::new(LayoutOptions::default(), 100.0)
    }

    #[test]
    fn test_layouts_cross_threads() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<PreparedLayout>();
        assert_sync::<LayoutSnapshot>();
    }

    #[test]
    fn test_reset_then_append() {
        let mut session = session();
        let first = vec![commit("a", &["b"], 0), commit("b", &["c"], 1)];
        assert_eq!(
            session.apply(1, GraphEvent::CommitsReset(first)).unwrap(),
            Applied::Installed
        );
        assert_eq!(session.snapshot().row_count(), 2);
        assert!(session.snapshot().traces()[0].unresolved_end);

        let more = vec![commit("c", &[], 2)];
        session.apply(2, GraphEvent::CommitsAppended(more)).unwrap();
        assert_eq!(session.snapshot().row_count(), 3);
        assert!(!session.snapshot().traces()[0].unresolved_end);
    }

    #[test]
    fn test_stale_request_dropped() {
        let mut session = session();
        let older = session
            .prepare(1, &GraphEvent::CommitsReset(vec![commit("old", &[], 0)]))
            .unwrap()
            .unwrap();
        let newer = session
            .prepare(2, &GraphEvent::CommitsReset(vec![commit("new", &[], 0)]))
            .unwrap()
            .unwrap();

        assert_eq!(session.install(newer), Applied::Installed);
        assert_eq!(session.install(older), Applied::Stale);
        assert_eq!(session.snapshot().row(0).unwrap().commit.as_str(), "new");

        let replay = GraphEvent::CommitsReset(vec![commit("again", &[], 0)]);
        assert_eq!(session.apply(2, replay).unwrap(), Applied::Stale);
        assert_eq!(session.installed_request(), Some(2));
    }

    #[test]
    fn test_append_on_replaced_history_dropped() {
        let mut session = session();
        session
            .apply(1, GraphEvent::CommitsReset(vec![commit("old0", &["old1"], 0)]))
            .unwrap();

        let reset = session
            .prepare(2, &GraphEvent::CommitsReset(vec![commit("new0", &["new1"], 0)]))
            .unwrap()
            .unwrap();
        let append = session
            .prepare(3, &GraphEvent::CommitsAppended(vec![commit("new1", &[], 1)]))
            .unwrap()
            .unwrap();

        assert_eq!(session.install(reset), Applied::Installed);
        assert_eq!(session.install(append), Applied::Stale);
        assert_eq!(session.installed_request(), Some(2));
        let rows: Vec<&str> = session
            .snapshot()
            .vertices()
            .iter()
            .map(|v| v.commit.as_str())
            .collect();
        assert_eq!(rows, vec!["new0"]);

        // Prepared against the new history, the same rows go in
        let append = session
            .prepare(4, &GraphEvent::CommitsAppended(vec![commit("new1", &[], 1)]))
            .unwrap()
            .unwrap();
        assert_eq!(session.install(append), Applied::Installed);
        assert_eq!(session.snapshot().row_count(), 2);
        assert!(session.snapshot().traces().iter().all(|t| !t.unresolved_end));
    }

    #[test]
    fn test_expand_and_collapse() {
        let mut session = session();
        let commits = vec![commit("a", &["b"], 0), commit("b", &[], 1)];
        session.apply(1, GraphEvent::CommitsReset(commits)).unwrap();

        session.apply(0, GraphEvent::ExpandRow(0)).unwrap();
        assert_eq!(session.expanded_row(), Some(0));
        assert_eq!(session.snapshot().row_shift(1), 100.0);

        let err = session.apply(0, GraphEvent::ExpandRow(7)).unwrap_err();
        assert!(matches!(err, LayoutError::RowOutOfRange { row: 7, .. }));
        assert_eq!(session.expanded_row(), Some(0));

        session.apply(0, GraphEvent::Collapse).unwrap();
        assert_eq!(session.expanded_row(), None);
        assert_eq!(session.snapshot().row_shift(1), 0.0);
    }

    #[test]
    fn test_expansion_survives_append() {
        let mut session = session();
        let commits = vec![commit("a", &["b"], 0), commit("b", &["c"], 1)];
        session.apply(1, GraphEvent::CommitsReset(commits)).unwrap();
        session.apply(0, GraphEvent::ExpandRow(1)).unwrap();

        session
            .apply(2, GraphEvent::CommitsAppended(vec![commit("c", &[], 2)]))
            .unwrap();
        assert_eq!(session.expanded_row(), Some(1));
        assert_eq!(session.snapshot().row_shift(2), 100.0);
    }

    #[test]
    fn test_reset_drops_out_of_range_expansion() {
        let mut session = session();
        let commits = vec![commit("a", &["b"], 0), commit("b", &[], 1)];
        session.apply(1, GraphEvent::CommitsReset(commits)).unwrap();
        session.apply(0, GraphEvent::ExpandRow(1)).unwrap();

        session
            .apply(2, GraphEvent::CommitsReset(vec![commit("z", &[], 0)]))
            .unwrap();
        assert_eq!(session.expanded_row(), None);
        assert!(session.snapshot().expansion().is_none());
    }
}
