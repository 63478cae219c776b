//! The `list` subcommand: discover repositories, compute their status, and
//! print a report of everything that needs attention.

use std::sync::Arc;

use rayon::prelude::*;

use sysgit::config::Config;
use sysgit::discover;
use sysgit::git::GitCli;
use sysgit::repo::{RepoFlags, Repository};
use sysgit::report;
use sysgit::styling::print;

pub fn handle_list(config: &Config, flags: RepoFlags) -> anyhow::Result<()> {
    let flags = Arc::new(flags);

    log::info!("enumerating repositories in SYSGIT_PATH");
    let paths = discover::discover(config);
    log::info!("discovered {} repositories", paths.len());

    let client = GitCli::new();
    let mut repos: Vec<Repository> = paths
        .into_iter()
        .map(|path| Repository::new(path, Arc::clone(&flags)))
        .collect();

    // Status computation is external-process-bound, so fan out across
    // top-level repositories; each submodule tree stays sequential within
    // its parent. A failure in one repository never cancels its siblings.
    repos.par_iter_mut().for_each(|repo| {
        if let Err(err) = repo.refresh(&client) {
            log::warn!("skipping {}: {err}", repo.work_tree.display());
        }
    });

    // Emit in discovery order, not completion order.
    for repo in &repos {
        let rendered = report::render(repo);
        if !rendered.is_empty() {
            print!("{rendered}");
        }
    }

    Ok(())
}
