mod options;

use clap::Parser;
use csaf_downloader::{downloader::Downloader, forwarder::Forwarder};
use options::Cli;
use std::{process::ExitCode, sync::Arc};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = run().await {
        eprintln!("{err:#}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run() -> anyhow::Result<()> {
    let (domains, logging, cfg) = Cli::parse().into_config()?;

    logging.init()?;

    if domains.is_empty() {
        log::warn!("No domains given.");
        return Ok(());
    }

    let cfg = Arc::new(cfg);
    let mut downloader = Downloader::new(cfg.clone())?;

    // the forwarder runs as its own task, fed through a bounded queue
    let mut forward = None;
    if cfg.forward_url.is_some() {
        let (forwarder, handle) = Forwarder::new(cfg.clone())?;
        forward = Some((tokio::spawn(forwarder.run()), handle.clone()));
        downloader = downloader.with_forwarder(handle);
    }

    // interrupts stop the dispatch of new work, advisories in flight are
    // finished
    let (shutdown_tx, _) = broadcast::channel(1);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Received interrupt, finishing current work");
                let _ = shutdown_tx.send(());
            }
        });
    }

    let result = if cfg.enumerate_pmd_only {
        downloader.run_enumerate(&domains).await
    } else {
        downloader.run(&shutdown_tx, &domains).await
    };

    downloader.close()?;

    // shut down the forwarder, logging its statistics first
    if let Some((task, handle)) = forward {
        handle.log_stats().await;
        drop(handle);
        let _ = task.await;
    }

    if let Err(err) = result {
        for leaf in err.flatten() {
            log::error!("{leaf}");
        }
        return Err(err.into());
    }

    Ok(())
}
