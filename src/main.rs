use clap::Parser;

mod app;
mod backfill;
mod cli;
mod config;
mod eid;
mod enrich;
mod fingerprint;
mod ingest;
mod search;
mod semantic;
mod store;
#[cfg(test)]
mod tests;
mod visit;
mod web;

use config::Config;
use ingest::IngestOutcome;
use search::SearchOutcome;
use visit::VisitCapture;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();
    let config = Config::load();

    match args.command {
        cli::Command::Daemon {} => {
            let app = app::App::open(config)?;
            web::start_daemon(app);
            Ok(())
        }

        cli::Command::Ingest { file } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            let capture: VisitCapture = serde_json::from_str(&raw)?;

            let app = app::App::open(config)?;
            match app.ingest(capture)? {
                IngestOutcome::Committed { id } => println!("committed: {id}"),
                IngestOutcome::Duplicate { existing_id } => {
                    println!("exact duplicate of {existing_id}")
                }
                IngestOutcome::NearDuplicate {
                    existing_id,
                    distance,
                } => println!("near-duplicate of {existing_id} (distance {distance})"),
            }
            Ok(())
        }

        cli::Command::Search { query, top_k } => {
            let app = app::App::open(config)?;
            match app.search(&query, top_k)? {
                SearchOutcome::Results(results) => {
                    println!("{}", serde_json::to_string_pretty(&results)?);
                }
                SearchOutcome::NoResults => println!("No results found."),
            }
            Ok(())
        }

        cli::Command::Backfill {} => {
            let app = app::App::open(config)?;
            let report = app.backfill()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
