//! Pobeda cinema catalog - warm and inspect the event cache
//!
//! Fetches the venue's event catalog, stores it in the local cache and prints
//! it for inspection. Logs go to stderr so stdout stays machine-readable.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vpobede::catalog::Catalog;
use vpobede::cli::{Cli, Command};
use vpobede::fetch::{Fetch, HttpFetcher};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("vpobede=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vpobede=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

fn step_status(ok: bool) -> &'static str {
    if ok {
        "done."
    } else {
        "failed."
    }
}

/// Forces a refresh and a save, reporting each step
async fn warm<F: Fetch>(catalog: &mut Catalog<F>) -> ExitCode {
    print!("Updating events from the website... ");
    let _ = io::stdout().flush();

    let report = catalog.warm_cache().await;
    println!("{}", step_status(report.refresh.is_ok()));
    if let Err(e) = &report.refresh {
        eprintln!("Error: {}", e);
    }

    if let Some(save) = &report.save {
        println!("Saving events to the cache... {}", step_status(save.is_ok()));
        if let Err(e) = save {
            eprintln!("Error: {}", e);
        }
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Prints the catalog view, refreshing only when the cache is stale
async fn show<F: Fetch>(catalog: &mut Catalog<F>) -> ExitCode {
    catalog.current().await;

    match serde_json::to_string_pretty(&catalog.view()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("vpobede starting with args: {:?}", cli);

    let config = match cli.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let fetcher = match HttpFetcher::new(config.request_timeout) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut catalog = Catalog::new(config, fetcher);

    match cli.command() {
        Command::Warm => warm(&mut catalog).await,
        Command::Show => show(&mut catalog).await,
        Command::Url => {
            println!("{}", catalog.venue_url());
            ExitCode::SUCCESS
        }
    }
}
