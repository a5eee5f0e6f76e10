use anyhow::{Context, Result};
use git2::{Oid, Repository, Sort, StatusOptions};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::path::Path;

use crate::graph::{Commit, CommitId, CommitOrdering};

/// Which slice of history to load
#[derive(Clone, Copy, Debug)]
pub struct HistoryRequest {
    pub max_commits: usize,
    /// Commits already loaded by earlier pages
    pub skip: usize,
    /// Display row of the first commit in the page
    pub first_row: usize,
    pub ordering: CommitOrdering,
    /// Put a pseudo commit for uncommitted changes on top of the first page
    pub include_working_changes: bool,
}

impl Default for HistoryRequest {
    fn default() -> Self {
        Self {
            max_commits: 300,
            skip: 0,
            first_row: 0,
            ordering: CommitOrdering::default(),
            include_working_changes: true,
        }
    }
}

impl HistoryRequest {
    /// The request for the page following `page`.
    pub fn next_page(&self, page: &[Commit]) -> Self {
        let loaded = page.iter().filter(|c| !c.working_changes).count();
        Self {
            skip: self.skip + loaded,
            first_row: self.first_row + page.len(),
            include_working_changes: false,
            ..*self
        }
    }
}

/// Read-only repository access feeding the layout engine
pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Open a repository at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(path.as_ref())
            .with_context(|| format!("Failed to open repository at {:?}", path.as_ref()))?;
        Ok(Self { repo })
    }

    /// Get the repository's working directory
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// Get the repository name (basename of workdir or bare repo path)
    pub fn repo_name(&self) -> String {
        self.repo
            .workdir()
            .or_else(|| self.repo.path().parent())
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }

    /// Get the head commit OID, `None` on an unborn branch
    pub fn head_oid(&self) -> Option<Oid> {
        self.repo.head().ok().and_then(|head| head.target())
    }

    /// True when the worktree or index differs from HEAD
    pub fn has_working_changes(&self) -> Result<bool> {
        if self.repo.is_bare() {
            return Ok(false);
        }
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(false);
        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .context("Failed to get status")?;
        Ok(!statuses.is_empty())
    }

    /// Branch and tag names keyed by the commit they point at
    fn ref_labels(&self) -> Result<HashMap<Oid, Vec<String>>> {
        let mut labels: HashMap<Oid, Vec<String>> = HashMap::new();
        for reference in self.repo.references().context("Failed to list references")? {
            let Ok(reference) = reference else { continue };
            if !(reference.is_branch() || reference.is_remote() || reference.is_tag()) {
                continue;
            }
            let Some(name) = reference.shorthand().map(str::to_string) else {
                continue;
            };
            // Annotated tags point at a tag object; peel to the commit
            let Ok(commit) = reference.peel_to_commit() else {
                continue;
            };
            labels.entry(commit.id()).or_default().push(name);
        }
        Ok(labels)
    }

    /// Order `walked` like `git log --author-date-order`: children before
    /// parents, newest author time first among commits that are ready.
    ///
    /// libgit2 only sorts by committer time, so the whole walk is ordered
    /// here and pages are sliced from the result.
    fn author_date_order(&self, walked: &[Oid]) -> Result<Vec<Oid>> {
        let position: HashMap<Oid, usize> =
            walked.iter().enumerate().map(|(i, &oid)| (oid, i)).collect();
        let mut author_time = Vec::with_capacity(walked.len());
        let mut parents: Vec<Vec<usize>> = Vec::with_capacity(walked.len());
        let mut pending_children = vec![0usize; walked.len()];
        for &oid in walked {
            let commit = self.repo.find_commit(oid)?;
            author_time.push(commit.author().when().seconds());
            let ids: Vec<usize> = commit
                .parent_ids()
                .filter_map(|parent| position.get(&parent).copied())
                .collect();
            for &parent in &ids {
                pending_children[parent] += 1;
            }
            parents.push(ids);
        }

        // Ties fall back to walk order
        let key = |i: usize| (author_time[i], Reverse(i));
        let mut ready: BinaryHeap<_> = (0..walked.len())
            .filter(|&i| pending_children[i] == 0)
            .map(key)
            .collect();
        let mut order = Vec::with_capacity(walked.len());
        while let Some((_, Reverse(i))) = ready.pop() {
            order.push(walked[i]);
            for &parent in &parents[i] {
                pending_children[parent] -= 1;
                if pending_children[parent] == 0 {
                    ready.push(key(parent));
                }
            }
        }
        Ok(order)
    }

    /// Load one page of history, rows numbered from where the previous page stopped.
    pub fn load(&self, request: &HistoryRequest) -> Result<Vec<Commit>> {
        let mut revwalk = self.repo.revwalk().context("Failed to create revwalk")?;

        // Include all branches, plus HEAD in case it is detached
        for branch in self.repo.branches(None)? {
            if let Ok((branch, _)) = branch
                && let Some(oid) = branch.get().resolve().ok().and_then(|r| r.target())
            {
                revwalk.push(oid).context("Failed to push branch to revwalk")?;
            }
        }
        if let Some(head) = self.head_oid() {
            revwalk.push(head).context("Failed to push HEAD to revwalk")?;
        }

        let order: Vec<Oid> = if request.ordering == CommitOrdering::AuthorDate {
            revwalk.set_sorting(Sort::TOPOLOGICAL)?;
            let walked: Vec<Oid> = revwalk
                .collect::<Result<_, _>>()
                .context("Failed to walk history")?;
            self.author_date_order(&walked)?
                .into_iter()
                .skip(request.skip)
                .take(request.max_commits)
                .collect()
        } else {
            let sorting = match request.ordering {
                CommitOrdering::Topological => Sort::TOPOLOGICAL | Sort::TIME,
                _ => Sort::TIME,
            };
            revwalk.set_sorting(sorting)?;
            revwalk
                .skip(request.skip)
                .take(request.max_commits)
                .collect::<Result<_, _>>()
                .context("Failed to walk history")?
        };

        let labels = self.ref_labels()?;
        let working_changes = request.include_working_changes
            && request.first_row == 0
            && self.has_working_changes()?;

        let mut commits = Vec::with_capacity(request.max_commits + 1);
        if working_changes {
            commits.push(Commit::working_changes(self.head_oid().map(CommitId::from)));
        }

        for oid in order {
            let commit = self.repo.find_commit(oid)?;
            let author = commit.author();
            commits.push(Commit {
                id: oid.into(),
                parent_ids: commit.parent_ids().map(CommitId::from).collect(),
                row: 0,
                refs: labels.get(&oid).cloned().unwrap_or_default(),
                working_changes: false,
                author: author.name().unwrap_or("Unknown").to_string(),
                time: if request.ordering == CommitOrdering::AuthorDate {
                    author.when().seconds()
                } else {
                    commit.time().seconds()
                },
                summary: commit.summary().unwrap_or("").to_string(),
            });
        }

        for (i, commit) in commits.iter_mut().enumerate() {
            commit.row = request.first_row + i;
        }

        tracing::debug!(
            repo = %self.repo_name(),
            loaded = commits.len(),
            skip = request.skip,
            ordering = ?request.ordering,
            "loaded history page"
        );
        Ok(commits)
    }
}
