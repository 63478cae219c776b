mod commands;

use clap::{Parser, Subcommand};
use sysgit::config::Config;
use sysgit::repo::RepoFlags;

#[derive(Parser)]
#[command(name = "sysgit")]
#[command(about = "List status of the system's repositories", version)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Print activity messages to stderr and show all repositories,
    /// regardless of changes
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the status of the system's repositories
    List {
        /// List the status of each repository's submodules, if they contain
        /// changes
        #[arg(short, long)]
        submodules: bool,

        /// Show 'B' in the output if the repository contains a file named
        /// "bugs" in the top level directory
        #[arg(short, long)]
        bugs: bool,

        /// Show the number of entries in the repository's stash
        #[arg(short = 'p', long)]
        show_stash: bool,

        /// Check the refs of remote branches against the local refs:
        /// 'uu' up to date, 'lr' behind, 'rl' ahead, '<>' diverged,
        /// '  ' no remote branch, '00' no commits yet
        #[arg(short, long, verbatim_doc_comment)]
        remotes: bool,

        /// Same as --submodules --bugs --show-stash --remotes
        #[arg(short, long)]
        all: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "info" } else { "warn" }),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    if let Err(err) = run(cli) {
        sysgit::styling::eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    match cli.command {
        Commands::List {
            submodules,
            bugs,
            show_stash,
            remotes,
            all,
        } => {
            let flags = RepoFlags {
                submodules: submodules || all,
                bugs: bugs || all,
                color: !cli.no_color,
                stash: show_stash || all,
                remotes: remotes || all,
                verbose: cli.verbose,
            };
            commands::list::handle_list(&config, flags)
        }
    }
}
