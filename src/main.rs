// Copyright 2026 Slotwatch Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use slotwatch::archive::S3EvidenceStore;
use slotwatch::browser::chromium::{find_chromium, ChromiumBrowser};
use slotwatch::browser::Browser;
use slotwatch::challenge::CaptchaSolver;
use slotwatch::config::{SiteList, SnapshotConfig, SolverConfig, StorageConfig};
use slotwatch::scraper::ChainScraper;
use slotwatch::snapshot::SnapshotWriter;

#[derive(Parser)]
#[command(
    name = "slotwatch",
    about = "Appointment-slot watcher for pharmacy booking sites",
    version
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scrape pass for a chain and print the results as JSON
    Check {
        /// Chain to scrape, as named in the site list
        chain: String,
        /// Path to the site list JSON
        #[arg(long, default_value = "sites.json")]
        sites: PathBuf,
        /// Directory for local evidence artifacts
        #[arg(long, default_value = ".")]
        artifact_dir: PathBuf,
        /// Seconds to let in-flight page requests settle before a markup capture
        #[arg(long, default_value = "1")]
        settle_secs: u64,
    },
    /// Check the environment: browser binary, storage credentials, solver token
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "slotwatch=debug"
    } else {
        "slotwatch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap()),
        )
        .init();

    match cli.command {
        Commands::Check {
            chain,
            sites,
            artifact_dir,
            settle_secs,
        } => run_check(&chain, &sites, artifact_dir, settle_secs).await,
        Commands::Doctor => run_doctor(),
    }
}

async fn run_check(
    chain: &str,
    sites: &Path,
    artifact_dir: PathBuf,
    settle_secs: u64,
) -> Result<()> {
    let site_list = SiteList::load(sites)?;
    let chain = site_list.chain(chain)?;

    let storage = StorageConfig::from_env().context("object storage is not configured")?;
    let solver = SolverConfig::from_env();

    let store = Arc::new(S3EvidenceStore::new(&storage));
    let snapshots = SnapshotWriter::new(
        SnapshotConfig::new(artifact_dir, Duration::from_secs(settle_secs)),
        store,
    );

    let browser = ChromiumBrowser::launch(CaptchaSolver::new(&solver)).await?;

    let scraper = ChainScraper::new(&chain, &snapshots);
    let outcome = scraper.run(&browser).await;
    if let Err(err) = browser.shutdown().await {
        tracing::warn!(%err, "browser shutdown failed");
    }
    let results = outcome?;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn run_doctor() -> Result<()> {
    match find_chromium() {
        Some(path) => println!("browser: {}", path.display()),
        None => {
            println!("browser: NOT FOUND (set SLOTWATCH_CHROMIUM_PATH or install google-chrome)")
        }
    }

    match StorageConfig::from_env() {
        Ok(cfg) => println!("storage: bucket {} in {}", cfg.bucket, cfg.region),
        Err(err) => println!("storage: {err}"),
    }

    let solver = SolverConfig::from_env();
    if solver.token.is_some() {
        println!("solver: token configured");
    } else {
        println!("solver: no token (challenge gate degrades to detect-and-warn)");
    }

    Ok(())
}
