use anyhow::{Context, Result, bail};
use std::path::PathBuf;

use whisper_graph::LayoutConfig;
use whisper_graph::git::{GitRepo, HistoryRequest};
use whisper_graph::graph::{self, Commit, CommitOrdering, LayoutSnapshot};
use whisper_graph::telemetry;

/// Command-line arguments
#[derive(Default)]
struct CliArgs {
    /// Repository path to open
    repo: Option<PathBuf>,
    /// Maximum number of commits to load
    max: Option<usize>,
    ordering: Option<CommitOrdering>,
    /// Row to open an expansion gap below
    expand: Option<usize>,
    /// Layout config file overriding the default location
    config: Option<PathBuf>,
    /// Print the snapshot as JSON instead of the text summary
    json: bool,
}

fn parse_args() -> Result<CliArgs> {
    let mut args = CliArgs::default();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--repo" => {
                args.repo = iter.next().map(PathBuf::from);
            }
            "--max" => {
                let value = iter.next().context("--max needs a value")?;
                args.max = Some(value.parse().with_context(|| format!("Invalid --max {value:?}"))?);
            }
            "--order" => {
                let value = iter.next().context("--order needs a value")?;
                args.ordering = Some(
                    CommitOrdering::parse(&value)
                        .with_context(|| format!("Unknown ordering {value:?}"))?,
                );
            }
            "--expand" => {
                let value = iter.next().context("--expand needs a value")?;
                args.expand =
                    Some(value.parse().with_context(|| format!("Invalid --expand {value:?}"))?);
            }
            "--config" => {
                args.config = iter.next().map(PathBuf::from);
            }
            "--json" => {
                args.json = true;
            }
            other if !other.starts_with('-') => {
                // Positional arg = repo path
                args.repo = Some(PathBuf::from(other));
            }
            other => bail!("Unknown argument {other:?}"),
        }
    }

    Ok(args)
}

fn main() -> Result<()> {
    telemetry::init();
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => LayoutConfig::load_from(path)?,
        None => LayoutConfig::load(),
    };

    let repo_path = args.repo.clone().unwrap_or_else(|| PathBuf::from("."));
    let repo = GitRepo::open(&repo_path)?;

    let mut request = HistoryRequest::default();
    if let Some(max) = args.max {
        request.max_commits = max;
    }
    if let Some(ordering) = args.ordering {
        request.ordering = ordering;
    }

    let commits = repo.load(&request)?;
    let (snapshot, table) = graph::build(&commits, config.layout_options())
        .with_context(|| format!("Failed to lay out history of {}", repo.repo_name()))?;
    let snapshot = match args.expand {
        Some(row) => snapshot.reflow(Some(row), config.expansion_height)?,
        None => snapshot,
    };

    tracing::info!(
        repo = %repo.repo_name(),
        rows = snapshot.row_count(),
        lanes = snapshot.lane_count(),
        "layout ready"
    );

    if args.json {
        let out = serde_json::to_string_pretty(&snapshot).context("Failed to serialize layout")?;
        println!("{out}");
    } else if snapshot.is_empty() {
        println!("No commits");
    } else {
        print_rows(&snapshot, &commits);
        let pending = table.pending_parents().len();
        if pending > 0 {
            println!("{pending} parent commit(s) not loaded, raise --max to see them");
        }
    }
    Ok(())
}

/// One line per row: lane columns, then the commit.
fn print_rows(snapshot: &LayoutSnapshot, commits: &[Commit]) {
    for commit in commits {
        let Some(vertex) = snapshot.vertex_for(&commit.id) else {
            continue;
        };
        let open = snapshot.open_traces_at(commit.row);
        let lanes: String = (0..snapshot.graph_width())
            .map(|lane| {
                if lane == vertex.lane {
                    if vertex.working_changes {
                        '*'
                    } else if vertex.merge {
                        'M'
                    } else {
                        'o'
                    }
                } else if open.iter().any(|trace| trace.lane == lane) {
                    '|'
                } else {
                    ' '
                }
            })
            .collect();
        let refs = if commit.refs.is_empty() {
            String::new()
        } else {
            format!(" ({})", commit.refs.join(", "))
        };
        let label = if commit.working_changes {
            "Uncommitted changes".to_string()
        } else {
            format!("{} {}", commit.id.short(), commit.summary)
        };
        println!("{lanes}  {label}{refs}");
        if snapshot.expansion().is_some_and(|e| e.row == commit.row) {
            println!("{:width$}  ...", "", width = snapshot.graph_width());
        }
    }
}
