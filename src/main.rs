mod cli;
mod error;
mod exporter;
mod fmt;
mod loader;
mod models;
mod reconciler;
mod settings;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init {
            export_dir,
            left_label,
            right_label,
            duplicates,
        } => cli::init::run(export_dir, left_label, right_label, duplicates),
        Commands::Reconcile(args) => cli::reconcile::run(args),
        Commands::Status => cli::status::run(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "payrecon", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {e}", "Error:".red().bold());
        if e.is_user_recoverable() {
            eprintln!("Fix the file and run the reconciliation again.");
        }
        std::process::exit(1);
    }
}
