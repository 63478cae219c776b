//! Repository model and status engine.
//!
//! A [`Repository`] is one checkout: a work tree, a metadata directory, and
//! (once computed) a [`RepoInfo`] describing what needs attention. Submodules
//! are child `Repository` values owned by their parent, built from the
//! `.gitmodules` manifest with their metadata under the parent's `modules/`
//! directory. Computation is lazy and memoized: [`Repository::refresh`] runs
//! the checks enabled in [`RepoFlags`] exactly once per instance.

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::git::{GitError, VcsClient};

/// Which checks run and how results render. Constructed once from the CLI
/// and shared down the submodule tree; children never override it.
#[derive(Debug, Clone, Default)]
pub struct RepoFlags {
    pub submodules: bool,
    pub bugs: bool,
    pub color: bool,
    pub stash: bool,
    pub remotes: bool,
    pub verbose: bool,
}

/// How a local branch relates to its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStatus {
    UpToDate,
    Behind,
    Ahead,
    Diverged,
    NoRemote,
}

impl BranchStatus {
    /// Clean statuses do not set the repository's `has_changes` flag.
    pub fn is_clean(self) -> bool {
        matches!(self, BranchStatus::UpToDate | BranchStatus::NoRemote)
    }

    /// Ranking used to pick the status a repository displays when its
    /// branches disagree.
    pub fn severity(self) -> u8 {
        match self {
            BranchStatus::UpToDate => 0,
            BranchStatus::NoRemote => 1,
            BranchStatus::Ahead => 2,
            BranchStatus::Behind => 3,
            BranchStatus::Diverged => 4,
        }
    }
}

/// Computation state of a lazily derived field. `Failed` is distinct from
/// `Computed` so a repository whose checks errored is never mistaken for a
/// clean one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    #[default]
    Uncomputed,
    Computed,
    Failed,
}

/// The computed, renderable state of one repository.
#[derive(Debug, Clone, Default)]
pub struct RepoInfo {
    pub staged: bool,
    pub unstaged: bool,
    pub untracked: bool,
    pub bugs_file: bool,
    pub stash_entries: usize,
    /// Per-branch upstream relationship, in branch enumeration order.
    pub branches: IndexMap<String, BranchStatus>,
    /// True iff any field above is non-clean or any descendant submodule
    /// has changes.
    pub has_changes: bool,
}

impl RepoInfo {
    /// The highest-severity branch status, or `None` when the repository
    /// has no local branches (zero commits).
    pub fn worst_branch_status(&self) -> Option<BranchStatus> {
        self.branches
            .values()
            .copied()
            .max_by_key(|status| status.severity())
    }
}

/// One `{name, path}` record from a `.gitmodules` manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    pub name: String,
    pub path: String,
}

/// Parse `.gitmodules` content into module records.
///
/// Scans for `[`-prefixed headers carrying the module name in quotes, then
/// for a `path` key among the following indented lines; the first
/// non-indented line ends a module's block. Malformed input truncates
/// parsing rather than failing: headers without a quoted name or without a
/// path are dropped, and running out of input mid-block is end-of-records.
pub fn parse_gitmodules(input: &str) -> Vec<ModuleEntry> {
    let mut entries = Vec::new();
    let mut lines = input.lines().peekable();

    while let Some(line) = lines.next() {
        if !line.starts_with('[') {
            continue;
        }
        let Some(name) = quoted_module_name(line) else {
            continue;
        };

        let mut path = None;
        while let Some(next) = lines.peek() {
            if !next.starts_with(' ') && !next.starts_with('\t') {
                break;
            }
            let Some(body) = lines.next() else {
                break;
            };
            if let Some(value) = key_value(body, "path") {
                path = Some(value.to_string());
                break;
            }
        }

        if let Some(path) = path.filter(|path| !path.is_empty()) {
            entries.push(ModuleEntry { name, path });
        }
    }

    entries
}

fn quoted_module_name(line: &str) -> Option<String> {
    line.split('"')
        .nth(1)
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
}

fn key_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.trim_start().strip_prefix(key)?;
    let value = rest.trim_start().strip_prefix('=')?;
    Some(value.trim())
}

/// One checkout, plus its submodule tree once computed.
#[derive(Debug)]
pub struct Repository {
    pub work_tree: PathBuf,
    pub git_dir: PathBuf,
    pub flags: Arc<RepoFlags>,
    pub info: RepoInfo,
    pub submodules: Vec<Repository>,
    working_tree: Freshness,
    submodules_state: Freshness,
}

impl Repository {
    /// A top-level repository, metadata at `work_tree/.git`.
    pub fn new(work_tree: impl Into<PathBuf>, flags: Arc<RepoFlags>) -> Self {
        let work_tree = work_tree.into();
        let git_dir = work_tree.join(".git");
        Self::with_git_dir(work_tree, git_dir, flags)
    }

    fn with_git_dir(work_tree: PathBuf, git_dir: PathBuf, flags: Arc<RepoFlags>) -> Self {
        Self {
            work_tree,
            git_dir,
            flags,
            info: RepoInfo::default(),
            submodules: Vec::new(),
            working_tree: Freshness::Uncomputed,
            submodules_state: Freshness::Uncomputed,
        }
    }

    pub fn working_tree_state(&self) -> Freshness {
        self.working_tree
    }

    pub fn submodules_state(&self) -> Freshness {
        self.submodules_state
    }

    #[cfg(test)]
    pub(crate) fn mark_computed_for_tests(&mut self) {
        self.working_tree = Freshness::Computed;
        self.submodules_state = Freshness::Computed;
    }

    #[cfg(test)]
    pub(crate) fn mark_failed_for_tests(&mut self) {
        self.working_tree = Freshness::Failed;
    }

    /// Run every enabled check, then recurse into submodules. Idempotent:
    /// an already-computed repository performs no further VCS calls.
    /// Returns the aggregated `has_changes` flag.
    ///
    /// A failure in the repository's own checks marks it `Failed` and is
    /// returned to the caller; the repository renders nothing afterwards.
    /// Submodule failures are logged and isolated so siblings still report.
    pub fn refresh<C: VcsClient>(&mut self, vcs: &C) -> Result<bool, GitError> {
        match self.working_tree {
            Freshness::Uncomputed => {
                if let Err(err) = self.refresh_own(vcs) {
                    self.working_tree = Freshness::Failed;
                    return Err(err);
                }
                self.working_tree = Freshness::Computed;
            }
            Freshness::Computed => {}
            Freshness::Failed => return Ok(false),
        }

        if self.flags.submodules && self.submodules_state == Freshness::Uncomputed {
            self.refresh_submodules(vcs);
            self.submodules_state = Freshness::Computed;
        }

        Ok(self.info.has_changes)
    }

    fn refresh_own<C: VcsClient>(&mut self, vcs: &C) -> Result<(), GitError> {
        self.check_working_tree(vcs)?;
        self.check_bugs();
        self.check_stash(vcs)?;
        self.check_remotes(vcs)?;
        Ok(())
    }

    fn check_working_tree<C: VcsClient>(&mut self, vcs: &C) -> Result<(), GitError> {
        for entry in vcs.status(&self.work_tree, &self.git_dir)? {
            if entry.index != ' ' && entry.index != '?' {
                self.info.staged = true;
            }
            if entry.worktree != ' ' && entry.worktree != '?' {
                self.info.unstaged = true;
            }
            if entry.index == '?' {
                self.info.untracked = true;
            }
        }
        if self.info.staged || self.info.unstaged || self.info.untracked {
            self.info.has_changes = true;
        }
        Ok(())
    }

    fn check_bugs(&mut self) {
        if !self.flags.bugs {
            return;
        }
        if self.work_tree.join("bugs").is_file() {
            self.info.bugs_file = true;
            self.info.has_changes = true;
        }
    }

    fn check_stash<C: VcsClient>(&mut self, vcs: &C) -> Result<(), GitError> {
        if !self.flags.stash {
            return Ok(());
        }
        let count = vcs.stash_count(&self.work_tree, &self.git_dir)?;
        self.info.stash_entries = count;
        if count > 0 {
            self.info.has_changes = true;
        }
        Ok(())
    }

    fn check_remotes<C: VcsClient>(&mut self, vcs: &C) -> Result<(), GitError> {
        if !self.flags.remotes {
            return Ok(());
        }

        log::info!("updating remote refs for {}", self.work_tree.display());
        if let Err(err) = vcs.update_remotes(&self.work_tree, &self.git_dir) {
            // Offline is fine: classify against the refs already on disk.
            log::warn!(
                "{}: remote update failed, using existing refs: {err}",
                self.work_tree.display()
            );
        }

        let locals = vcs.local_branches(&self.work_tree, &self.git_dir)?;
        let remotes = vcs.remote_branches(&self.work_tree, &self.git_dir)?;

        for local in locals {
            let status = self.classify_branch(vcs, &local, &remotes)?;
            if !status.is_clean() {
                self.info.has_changes = true;
            }
            self.info.branches.insert(local, status);
        }
        Ok(())
    }

    /// Classify one local branch against its remote counterpart. The match
    /// is by final path segment; when several remotes carry the branch, the
    /// first in ref-name sort order wins.
    fn classify_branch<C: VcsClient>(
        &self,
        vcs: &C,
        local: &str,
        remotes: &[String],
    ) -> Result<BranchStatus, GitError> {
        let Some(remote) = remotes
            .iter()
            .find(|remote| remote.rsplit('/').next() == Some(local))
        else {
            return Ok(BranchStatus::NoRemote);
        };

        let local_tip = vcs.rev_parse(
            &self.work_tree,
            &self.git_dir,
            &format!("refs/heads/{local}"),
        )?;
        let remote_tip = vcs.rev_parse(
            &self.work_tree,
            &self.git_dir,
            &format!("refs/remotes/{remote}"),
        )?;

        let (Some(local_tip), Some(remote_tip)) = (local_tip, remote_tip) else {
            // Ref vanished between enumeration and resolution.
            return Ok(BranchStatus::NoRemote);
        };

        if local_tip == remote_tip {
            return Ok(BranchStatus::UpToDate);
        }

        let base = vcs.merge_base(&self.work_tree, &self.git_dir, &local_tip, &remote_tip)?;
        Ok(match base {
            Some(base) if base == local_tip => BranchStatus::Behind,
            Some(base) if base == remote_tip => BranchStatus::Ahead,
            _ => BranchStatus::Diverged,
        })
    }

    fn refresh_submodules<C: VcsClient>(&mut self, vcs: &C) {
        let manifest = self.work_tree.join(".gitmodules");
        let content = std::fs::read_to_string(&manifest).unwrap_or_default();

        for entry in parse_gitmodules(&content) {
            let mut child = Repository::with_git_dir(
                self.work_tree.join(&entry.path),
                self.git_dir.join("modules").join(&entry.name),
                Arc::clone(&self.flags),
            );
            match child.refresh(vcs) {
                Ok(true) => self.info.has_changes = true,
                Ok(false) => {}
                Err(err) => {
                    log::warn!("skipping submodule {}: {err}", child.work_tree.display());
                }
            }
            self.submodules.push(child);
        }
    }
}
