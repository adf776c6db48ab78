mod agp;
mod breaks;
mod cli;
mod config;
mod dict;
mod enzyme;
mod error;
mod graph;
mod links;
mod matrix;
mod norm;
mod pipeline;
mod types;

use clap::Parser;
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    let args = cli::Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match args.verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match pipeline::run(&args) {
        Ok(stats) => {
            tracing::info!(
                contig_breaks = stats.contig_breaks,
                scaffold_breaks = stats.scaffold_breaks,
                rounds_completed = stats.rounds_completed,
                final_agp = %stats.final_agp.display(),
                "trellis-rs: scaffolding complete"
            );
        }
        Err(e) => {
            tracing::error!("{e:#}");
            let code = e
                .downcast_ref::<error::ScafError>()
                .map(|s| s.exit_code())
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}
