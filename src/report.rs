//! Summary formatter: render a computed repository tree as indented,
//! optionally colorized, single-line summaries.
//!
//! Classification lives in [`crate::repo`]; this module only maps computed
//! state to glyphs and text. Each enabled category contributes a fixed-width
//! glyph, in the order bugs, stash, branch, working tree, followed by the
//! normalized repository path.

use std::path::Path;

use crate::repo::{BranchStatus, Freshness, RepoFlags, RepoInfo, Repository};
use crate::styling;

/// Rendering for a repository that has no local refs yet.
const NO_COMMITS_GLYPH: &str = "00";

/// Pure mapping from branch status to its two-character glyph.
fn branch_glyph(status: BranchStatus) -> &'static str {
    match status {
        BranchStatus::UpToDate => "uu",
        BranchStatus::Behind => "lr",
        BranchStatus::Ahead => "rl",
        BranchStatus::Diverged => "<>",
        BranchStatus::NoRemote => "  ",
    }
}

/// Render a repository and its submodule tree. Returns the empty string for
/// an unchanged repository unless verbose output is requested, and for a
/// repository whose checks failed.
pub fn render(repo: &Repository) -> String {
    render_with_home(repo, home::home_dir().as_deref())
}

/// [`render`] with an explicit home directory, for tests.
pub fn render_with_home(repo: &Repository, home: Option<&Path>) -> String {
    if repo.working_tree_state() == Freshness::Failed {
        return String::new();
    }
    if !repo.info.has_changes && !repo.flags.verbose {
        return String::new();
    }
    let mut out = String::new();
    render_node(repo, home, 0, None, &mut out);
    out
}

fn render_node(
    repo: &Repository,
    home: Option<&Path>,
    depth: usize,
    parent_path: Option<&str>,
    out: &mut String,
) {
    let flags = &repo.flags;
    let path = normalize_path(&repo.work_tree, home);

    // Submodules print relative to their parent, except in verbose mode
    // where the full path is kept.
    let shown = match parent_path {
        Some(prefix) if !flags.verbose => path
            .strip_prefix(prefix)
            .map(|rest| rest.trim_start_matches('/'))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(path.as_str()),
        _ => path.as_str(),
    };

    for _ in 0..depth {
        out.push('\t');
    }
    out.push_str(&glyph_string(&repo.info, flags));
    out.push(' ');
    out.push_str(shown);
    out.push('\n');

    for submodule in &repo.submodules {
        if submodule.working_tree_state() == Freshness::Failed {
            continue;
        }
        if submodule.info.has_changes || flags.verbose {
            render_node(submodule, home, depth + 1, Some(path.as_str()), out);
        }
    }
}

/// Build the status glyph string for one repository, honoring the enabled
/// checks and the color flag.
fn glyph_string(info: &RepoInfo, flags: &RepoFlags) -> String {
    let mut out = String::new();

    if flags.bugs {
        let glyph = if info.bugs_file { "B" } else { " " };
        out.push_str(&styling::paint(glyph, styling::BUGS, flags.color));
    }

    if flags.stash {
        let glyph = if info.stash_entries > 0 {
            info.stash_entries.to_string()
        } else {
            " ".to_string()
        };
        out.push_str(&styling::paint(&glyph, styling::STASH, flags.color));
    }

    if flags.remotes {
        let glyph = match info.worst_branch_status() {
            Some(status) => branch_glyph(status),
            None => NO_COMMITS_GLYPH,
        };
        out.push_str(&styling::paint(glyph, styling::BRANCH, flags.color));
    }

    let tree = [
        if info.staged { 'S' } else { ' ' },
        if info.unstaged { 'M' } else { ' ' },
        if info.untracked { 'U' } else { ' ' },
    ]
    .iter()
    .collect::<String>();
    out.push_str(&styling::paint(&tree, styling::WORKTREE, flags.color));

    out
}

/// Collapse repeated separators, drop a trailing separator, and contract a
/// home-directory prefix to `~`.
pub fn normalize_path(path: &Path, home: Option<&Path>) -> String {
    let raw = path.display().to_string();

    let mut collapsed = String::with_capacity(raw.len());
    let mut previous_was_separator = false;
    for ch in raw.chars() {
        if ch == '/' {
            if previous_was_separator {
                continue;
            }
            previous_was_separator = true;
        } else {
            previous_was_separator = false;
        }
        collapsed.push(ch);
    }
    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }

    if let Some(home) = home {
        let home = normalize_home(home);
        if collapsed == home {
            return "~".to_string();
        }
        if let Some(rest) = collapsed.strip_prefix(&home) {
            if rest.starts_with('/') {
                return format!("~{rest}");
            }
        }
    }

    collapsed
}

fn normalize_home(home: &Path) -> String {
    let raw = home.display().to_string();
    raw.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[rstest]
    #[case("/home/u//proj/", Some("/home/u"), "~/proj")]
    #[case("/home/u/proj", Some("/home/u"), "~/proj")]
    #[case("/home/u", Some("/home/u"), "~")]
    #[case("/home/username/proj", Some("/home/u"), "/home/username/proj")]
    #[case("/srv///code//app", None, "/srv/code/app")]
    #[case("/srv/code/", None, "/srv/code")]
    #[case("/", None, "/")]
    fn test_normalize_path(
        #[case] input: &str,
        #[case] home: Option<&str>,
        #[case] expected: &str,
    ) {
        let home = home.map(PathBuf::from);
        assert_eq!(
            normalize_path(&PathBuf::from(input), home.as_deref()),
            expected
        );
    }

    fn repo_at(path: &str, flags: RepoFlags) -> Repository {
        Repository::new(PathBuf::from(path), Arc::new(flags))
    }

    /// Build a repository with computed info without running the engine.
    fn computed(mut repo: Repository, info: RepoInfo) -> Repository {
        repo.info = info;
        repo.mark_computed_for_tests();
        repo
    }

    fn all_checks_no_color() -> RepoFlags {
        RepoFlags {
            submodules: true,
            bugs: true,
            color: false,
            stash: true,
            remotes: true,
            verbose: false,
        }
    }

    #[test]
    fn test_glyph_order_bugs_stash_tree() {
        let flags = RepoFlags {
            bugs: true,
            stash: true,
            color: false,
            ..Default::default()
        };
        let info = RepoInfo {
            staged: true,
            untracked: true,
            bugs_file: true,
            stash_entries: 2,
            has_changes: true,
            ..Default::default()
        };
        let repo = computed(repo_at("/home/u/repo", flags), info);

        let rendered = render_with_home(&repo, Some(Path::new("/home/u")));

        assert_eq!(rendered, "B2S U ~/repo\n");
    }

    #[test]
    fn test_glyph_string_with_remotes_enabled() {
        let mut info = RepoInfo {
            staged: true,
            untracked: true,
            bugs_file: true,
            stash_entries: 2,
            has_changes: true,
            ..Default::default()
        };
        info.branches
            .insert("main".to_string(), BranchStatus::Diverged);
        let repo = computed(repo_at("/home/u/repo", all_checks_no_color()), info);

        let rendered = render_with_home(&repo, Some(Path::new("/home/u")));

        assert_eq!(rendered, "B2<>S U ~/repo\n");
    }

    #[test]
    fn test_zero_commit_repository_renders_00() {
        let flags = RepoFlags {
            remotes: true,
            verbose: true,
            color: false,
            ..Default::default()
        };
        let repo = computed(repo_at("/home/u/fresh", flags), RepoInfo::default());

        let rendered = render_with_home(&repo, Some(Path::new("/home/u")));

        assert_eq!(rendered, "00    ~/fresh\n");
    }

    #[rstest]
    #[case(BranchStatus::UpToDate, "uu")]
    #[case(BranchStatus::Behind, "lr")]
    #[case(BranchStatus::Ahead, "rl")]
    #[case(BranchStatus::Diverged, "<>")]
    #[case(BranchStatus::NoRemote, "  ")]
    fn test_branch_glyph_table(#[case] status: BranchStatus, #[case] expected: &str) {
        assert_eq!(branch_glyph(status), expected);
    }

    #[test]
    fn test_unchanged_repository_renders_nothing() {
        let repo = computed(
            repo_at("/home/u/clean", RepoFlags::default()),
            RepoInfo::default(),
        );

        assert_eq!(render_with_home(&repo, Some(Path::new("/home/u"))), "");
    }

    #[test]
    fn test_unchanged_repository_renders_when_verbose() {
        let flags = RepoFlags {
            verbose: true,
            ..Default::default()
        };
        let repo = computed(repo_at("/home/u/clean", flags), RepoInfo::default());

        let rendered = render_with_home(&repo, Some(Path::new("/home/u")));

        assert_eq!(rendered, "    ~/clean\n");
    }

    #[test]
    fn test_failed_repository_renders_nothing() {
        let mut repo = repo_at("/home/u/broken", RepoFlags::default());
        repo.mark_failed_for_tests();

        assert_eq!(render_with_home(&repo, Some(Path::new("/home/u"))), "");
    }

    #[test]
    fn test_colored_glyphs_wrap_each_category() {
        let flags = RepoFlags {
            bugs: true,
            color: true,
            ..Default::default()
        };
        let info = RepoInfo {
            bugs_file: true,
            has_changes: true,
            ..Default::default()
        };
        let repo = computed(repo_at("/home/u/repo", flags), info);

        let rendered = render_with_home(&repo, Some(Path::new("/home/u")));

        assert!(rendered.contains("\x1b["), "colored output has escapes");
        assert!(rendered.contains('B'));
        assert!(rendered.ends_with("~/repo\n"));
    }

    fn submodule_tree() -> Repository {
        let flags = Arc::new(RepoFlags {
            submodules: true,
            ..Default::default()
        });

        let mut parent = Repository::new(PathBuf::from("/home/u/repo"), Arc::clone(&flags));
        parent.info = RepoInfo {
            staged: true,
            has_changes: true,
            ..Default::default()
        };
        parent.mark_computed_for_tests();

        let mut dirty = Repository::new(PathBuf::from("/home/u/repo/vendor/dirty"), Arc::clone(&flags));
        dirty.git_dir = PathBuf::from("/home/u/repo/.git/modules/dirty");
        dirty.info = RepoInfo {
            unstaged: true,
            has_changes: true,
            ..Default::default()
        };
        dirty.mark_computed_for_tests();

        let mut clean = Repository::new(PathBuf::from("/home/u/repo/vendor/clean"), Arc::clone(&flags));
        clean.git_dir = PathBuf::from("/home/u/repo/.git/modules/clean");
        clean.mark_computed_for_tests();

        parent.submodules.push(dirty);
        parent.submodules.push(clean);
        parent
    }

    #[test]
    fn test_changed_submodule_renders_indented_and_relative() {
        let repo = submodule_tree();

        let rendered = render_with_home(&repo, Some(Path::new("/home/u")));

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2, "clean submodule contributes nothing");
        assert_eq!(lines[0], "S   ~/repo");
        assert_eq!(lines[1], "\t M  vendor/dirty");
    }

    #[test]
    fn test_verbose_submodules_keep_full_paths() {
        let mut repo = submodule_tree();
        let mut flags = (*repo.flags).clone();
        flags.verbose = true;
        let flags = Arc::new(flags);
        repo.flags = Arc::clone(&flags);
        for submodule in &mut repo.submodules {
            submodule.flags = Arc::clone(&flags);
        }

        let rendered = render_with_home(&repo, Some(Path::new("/home/u")));

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3, "verbose shows the clean submodule too");
        assert_eq!(lines[1], "\t M  ~/repo/vendor/dirty");
        assert_eq!(lines[2], "\t    ~/repo/vendor/clean");
    }
}
