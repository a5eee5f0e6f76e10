use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable identifier of a commit (the full hex hash).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(Arc<str>);

impl CommitId {
    pub fn new(hash: impl AsRef<str>) -> Self {
        Self(Arc::from(hash.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First seven characters, the way `git log --oneline` abbreviates.
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(7).map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitId {
    fn from(hash: &str) -> Self {
        Self::new(hash)
    }
}

impl From<String> for CommitId {
    fn from(hash: String) -> Self {
        Self(Arc::from(hash))
    }
}

impl From<git2::Oid> for CommitId {
    fn from(oid: git2::Oid) -> Self {
        Self::from(oid.to_string())
    }
}

/// Order the history provider applied to the commit list.
///
/// The engine never reorders; this only travels alongside the list so the
/// provider and the caller agree on what was requested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitOrdering {
    #[default]
    Date,
    AuthorDate,
    Topological,
}

impl CommitOrdering {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "date" => Some(Self::Date),
            "author-date" => Some(Self::AuthorDate),
            "topo" | "topological" => Some(Self::Topological),
            _ => None,
        }
    }
}

/// One node of the loaded history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub parent_ids: Vec<CommitId>,
    /// Position in display order, 0 at the top
    pub row: usize,
    /// Branch and tag names pointing at this commit
    #[serde(default)]
    pub refs: Vec<String>,
    /// Synthetic commit standing for uncommitted changes
    #[serde(default)]
    pub working_changes: bool,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub summary: String,
}

/// Hash used for the working-changes pseudo commit.
pub const WORKING_CHANGES_ID: &str = "*";

impl Commit {
    pub fn new(
        id: impl Into<CommitId>,
        parent_ids: impl IntoIterator<Item = impl Into<CommitId>>,
        row: usize,
    ) -> Self {
        Self {
            id: id.into(),
            parent_ids: parent_ids.into_iter().map(Into::into).collect(),
            row,
            refs: Vec::new(),
            working_changes: false,
            author: String::new(),
            time: 0,
            summary: String::new(),
        }
    }

    /// The pseudo commit sitting on top of `head` while the worktree is dirty.
    pub fn working_changes(head: Option<CommitId>) -> Self {
        let mut commit = Self::new(WORKING_CHANGES_ID, head, 0);
        commit.working_changes = true;
        commit.summary = "Uncommitted Changes".to_string();
        commit
    }

    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }

    pub fn first_parent(&self) -> Option<&CommitId> {
        self.parent_ids.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        let id = CommitId::new("0123456789abcdef");
        assert_eq!(id.short(), "0123456");
        assert_eq!(CommitId::new("abc").short(), "abc");
    }

    #[test]
    fn test_working_changes_commit() {
        let wc = Commit::working_changes(Some("abc".into()));
        assert!(wc.working_changes);
        assert_eq!(wc.row, 0);
        assert_eq!(wc.first_parent(), Some(&CommitId::new("abc")));
        assert!(!wc.is_merge());
    }

    #[test]
    fn test_ordering_parse() {
        assert_eq!(CommitOrdering::parse("topo"), Some(CommitOrdering::Topological));
        assert_eq!(CommitOrdering::parse("author-date"), Some(CommitOrdering::AuthorDate));
        assert_eq!(CommitOrdering::parse("alphabetical"), None);
    }
}
