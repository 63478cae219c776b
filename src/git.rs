//! External git process boundary.
//!
//! Everything the status engine knows about a repository's real state comes
//! through [`VcsClient`]. The production implementation, [`GitCli`], shells
//! out to `git` with explicit `--git-dir`/`--work-tree` arguments so the
//! same client serves both top-level checkouts and submodules (whose
//! metadata lives under the parent's `modules/` directory). The engine and
//! formatter are tested against fake implementations of the trait instead.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use wait_timeout::ChildExt;

/// Upper bound on any single git invocation. A hung git process (dead NFS
/// mount, stuck credential helper during `remote update`) must not stall the
/// whole scan.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One record of `git status --short` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Index (staging area) state column.
    pub index: char,
    /// Working tree state column.
    pub worktree: char,
    pub path: String,
}

#[derive(Debug)]
pub enum GitError {
    /// git could not be spawned or waited on.
    Io {
        command: String,
        source: std::io::Error,
    },
    /// git exited with a non-zero status.
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    /// git did not finish within the configured timeout.
    TimedOut { command: String, timeout: Duration },
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::Io { command, source } => {
                write!(f, "failed to run `{command}`: {source}")
            }
            GitError::CommandFailed {
                command,
                code,
                stderr,
            } => {
                match code {
                    Some(code) => write!(f, "`{command}` exited with status {code}")?,
                    None => write!(f, "`{command}` was terminated by a signal")?,
                }
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            GitError::TimedOut { command, timeout } => {
                write!(f, "`{command}` did not finish within {timeout:?}")
            }
        }
    }
}

impl std::error::Error for GitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Interface to the version-control tool.
///
/// `work_tree` is the checkout root and `git_dir` the metadata store; they
/// differ for submodules. Missing refs are the expected "absent" state and
/// are reported in-band (`None`, count 0), never as an error.
pub trait VcsClient {
    /// Short-status records for the working tree, submodules excluded.
    fn status(&self, work_tree: &Path, git_dir: &Path) -> Result<Vec<StatusEntry>, GitError>;

    /// Number of stash entries; 0 when the stash ref does not exist.
    fn stash_count(&self, work_tree: &Path, git_dir: &Path) -> Result<usize, GitError>;

    /// Fetch updated remote refs (`git remote update`).
    fn update_remotes(&self, work_tree: &Path, git_dir: &Path) -> Result<(), GitError>;

    /// Resolve a ref to a commit hash, or `None` if it does not exist.
    fn rev_parse(
        &self,
        work_tree: &Path,
        git_dir: &Path,
        refname: &str,
    ) -> Result<Option<String>, GitError>;

    /// Most recent common ancestor of two refs, or `None` if they share none.
    fn merge_base(
        &self,
        work_tree: &Path,
        git_dir: &Path,
        ref_a: &str,
        ref_b: &str,
    ) -> Result<Option<String>, GitError>;

    /// Local branch names in git's ref-name sort order.
    fn local_branches(&self, work_tree: &Path, git_dir: &Path) -> Result<Vec<String>, GitError>;

    /// Remote-tracking branch names (`remote/branch`) in git's ref-name sort
    /// order. This ordering is what breaks ties when several remotes carry a
    /// same-named branch.
    fn remote_branches(&self, work_tree: &Path, git_dir: &Path) -> Result<Vec<String>, GitError>;
}

/// [`VcsClient`] backed by the real `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run git and return its stdout. Non-zero exit is an error.
    fn run(&self, work_tree: &Path, git_dir: &Path, args: &[&str]) -> Result<String, GitError> {
        let (status, stdout, stderr) = self.run_raw(work_tree, git_dir, args)?;
        if !status_success(status) {
            return Err(GitError::CommandFailed {
                command: render_command(work_tree, git_dir, args),
                code: status,
                stderr,
            });
        }
        Ok(stdout)
    }

    /// Run git where exit status 1 means "not found" rather than failure
    /// (`rev-parse --verify --quiet`, `merge-base`).
    fn run_optional(
        &self,
        work_tree: &Path,
        git_dir: &Path,
        args: &[&str],
    ) -> Result<Option<String>, GitError> {
        let (status, stdout, stderr) = self.run_raw(work_tree, git_dir, args)?;
        match status {
            Some(0) => Ok(Some(stdout)),
            Some(1) => Ok(None),
            code => Err(GitError::CommandFailed {
                command: render_command(work_tree, git_dir, args),
                code,
                stderr,
            }),
        }
    }

    fn run_raw(
        &self,
        work_tree: &Path,
        git_dir: &Path,
        args: &[&str],
    ) -> Result<(Option<i32>, String, String), GitError> {
        let command = render_command(work_tree, git_dir, args);
        log::debug!("running {command}");

        let mut child = Command::new("git")
            .arg(format!("--git-dir={}", git_dir.display()))
            .arg(format!("--work-tree={}", work_tree.display()))
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| GitError::Io {
                command: command.clone(),
                source,
            })?;

        // Drain both pipes off-thread so a chatty git cannot deadlock
        // against a full pipe buffer while we wait on it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = child.wait_timeout(self.timeout).map_err(|source| GitError::Io {
            command: command.clone(),
            source,
        })?;

        let Some(status) = status else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(GitError::TimedOut {
                command,
                timeout: self.timeout,
            });
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        Ok((status.code(), stdout, stderr))
    }
}

impl VcsClient for GitCli {
    fn status(&self, work_tree: &Path, git_dir: &Path) -> Result<Vec<StatusEntry>, GitError> {
        let stdout = self.run(
            work_tree,
            git_dir,
            &["status", "--short", "--ignore-submodules"],
        )?;
        Ok(parse_status(&stdout))
    }

    fn stash_count(&self, work_tree: &Path, git_dir: &Path) -> Result<usize, GitError> {
        // `stash list` prints one line per entry and exits 0 with empty
        // output when the stash ref does not exist.
        let stdout = self.run(work_tree, git_dir, &["stash", "list"])?;
        Ok(stdout.lines().filter(|line| !line.trim().is_empty()).count())
    }

    fn update_remotes(&self, work_tree: &Path, git_dir: &Path) -> Result<(), GitError> {
        self.run(work_tree, git_dir, &["remote", "update"])?;
        Ok(())
    }

    fn rev_parse(
        &self,
        work_tree: &Path,
        git_dir: &Path,
        refname: &str,
    ) -> Result<Option<String>, GitError> {
        let stdout = self.run_optional(
            work_tree,
            git_dir,
            &["rev-parse", "--verify", "--quiet", refname],
        )?;
        Ok(stdout.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
    }

    fn merge_base(
        &self,
        work_tree: &Path,
        git_dir: &Path,
        ref_a: &str,
        ref_b: &str,
    ) -> Result<Option<String>, GitError> {
        let stdout = self.run_optional(work_tree, git_dir, &["merge-base", ref_a, ref_b])?;
        Ok(stdout.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
    }

    fn local_branches(&self, work_tree: &Path, git_dir: &Path) -> Result<Vec<String>, GitError> {
        let stdout = self.run(
            work_tree,
            git_dir,
            &["for-each-ref", "--format=%(refname)", "refs/heads"],
        )?;
        Ok(parse_ref_names(&stdout, "refs/heads/"))
    }

    fn remote_branches(&self, work_tree: &Path, git_dir: &Path) -> Result<Vec<String>, GitError> {
        let stdout = self.run(
            work_tree,
            git_dir,
            &["for-each-ref", "--format=%(refname)", "refs/remotes"],
        )?;
        // origin/HEAD is a symbolic alias for the remote's default branch,
        // not a branch of its own.
        Ok(parse_ref_names(&stdout, "refs/remotes/")
            .into_iter()
            .filter(|name| !name.ends_with("/HEAD"))
            .collect())
    }
}

fn status_success(status: Option<i32>) -> bool {
    status == Some(0)
}

fn render_command(work_tree: &Path, git_dir: &Path, args: &[&str]) -> String {
    format!(
        "git --git-dir={} --work-tree={} {}",
        git_dir.display(),
        work_tree.display(),
        args.join(" ")
    )
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

/// Parse `git status --short` output into structured records.
///
/// Each line is `XY <path>` where X is the index column and Y the working
/// tree column. Lines too short to carry both columns are ignored.
pub fn parse_status(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    for line in output.lines() {
        let mut chars = line.chars();
        let (Some(index), Some(worktree)) = (chars.next(), chars.next()) else {
            continue;
        };
        let rest = chars.as_str();
        let path = rest.strip_prefix(' ').unwrap_or(rest).to_string();
        entries.push(StatusEntry {
            index,
            worktree,
            path,
        });
    }
    entries
}

/// Extract ref names from `for-each-ref --format=%(refname)` output,
/// stripping `prefix` from each line.
pub fn parse_ref_names(output: &str, prefix: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix(prefix))
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .collect()
}
