//! pathstamp: stamps source files with a comment naming their
//! project-relative path.
//!
//! Runs the stamp-core logic against the native filesystem: a one-time
//! backfill per project and a watcher that stamps newly created files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use stamp_core::StampOutcome;
use stamp_daemon::{Config, Daemon};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pathstamp")]
#[command(about = "Stamp source files with their project-relative path")]
struct Args {
    /// State file holding the per-project processed flags
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Stamp new files even if they already start with a comment
    #[arg(long, global = true)]
    allow_duplicates: bool,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Backfill each project once, then stamp new files until Ctrl+C
    Watch {
        /// Project directories
        #[arg(required = true)]
        projects: Vec<PathBuf>,
    },
    /// Run the one-time backfill now
    Backfill {
        /// Project directories
        #[arg(required = true)]
        projects: Vec<PathBuf>,

        /// Rescan even if the project was already processed
        #[arg(long)]
        force: bool,
    },
    /// Stamp specific files as if they were just created
    Stamp {
        /// Files to stamp
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Project directories the files belong to (defaults to the current directory)
        #[arg(long = "project")]
        projects: Vec<PathBuf>,
    },
    /// Forget that projects were processed so the next backfill rescans them
    Reset {
        /// Project directories
        #[arg(required = true)]
        projects: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,stamp_core=debug,stamp_daemon=debug"
    } else {
        "info,stamp_core=info,stamp_daemon=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::resolve(args.state, args.allow_duplicates)?;
    info!("State file: {}", config.state_path.display());

    let mut daemon = Daemon::new(config);

    match args.command {
        Command::Watch { projects } => {
            open_projects(&mut daemon, &projects)?;
            daemon
                .watch(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Failed to listen for Ctrl+C: {}", e);
                        std::future::pending::<()>().await;
                    }
                })
                .await?;
            info!("Shutting down");
        }
        Command::Backfill { projects, force } => {
            open_projects(&mut daemon, &projects)?;
            let ids: Vec<String> = daemon
                .projects()
                .projects()
                .iter()
                .map(|p| p.id().to_string())
                .collect();
            for id in ids {
                let report = daemon.backfill(&id, force).await?;
                if report.skipped_processed {
                    println!("{}: already processed (use --force to rescan)", id);
                } else {
                    println!(
                        "{}: {} scanned, {} stamped, {} already stamped, {} unsupported, {} without text",
                        id,
                        report.total_scanned(),
                        report.stamped.len(),
                        report.already_stamped.len(),
                        report.unsupported.len(),
                        report.no_text.len()
                    );
                }
            }
        }
        Command::Stamp { files, projects } => {
            if projects.is_empty() {
                open_projects(&mut daemon, &[std::env::current_dir()?])?;
            } else {
                open_projects(&mut daemon, &projects)?;
            }

            for outcome in daemon.stamp_files(&files).await {
                match outcome {
                    StampOutcome::Stamped { path, header } => {
                        println!("{}: {}", path.display(), header.trim_end());
                    }
                    StampOutcome::Skipped { path, reason } => {
                        println!("{}: skipped ({:?})", path.display(), reason);
                    }
                }
            }
        }
        Command::Reset { projects } => {
            open_projects(&mut daemon, &projects)?;
            daemon.reset_all()?;
            for project in daemon.projects().projects() {
                println!("{}: reset", project.id());
            }
        }
    }

    Ok(())
}

fn open_projects(daemon: &mut Daemon, dirs: &[PathBuf]) -> Result<()> {
    for dir in dirs {
        let project = daemon.config().load_project(dir)?;
        daemon.open_project(project);
    }
    Ok(())
}
