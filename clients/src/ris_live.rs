use anyhow::{Context, Result};
use clap::Parser;
use lib_ris::core::{ChannelSink, write_lines};
use lib_ris::{ConnectionManager, ShutdownCoordinator, SubscriptionRequest};

mod ris_logic;
use ris_logic::{config, logger};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = config::Cli::parse();
    let settings = config::Settings::resolve(cli.settings)?;

    let log_level = if cli.filters.debug { "debug" } else { settings.log_level() };
    logger::setup_logging(settings.log_dir.as_deref(), log_level)?;

    let filters = cli.filters.to_filter_set();
    if filters.collectors.len() > 1 {
        let ignored: Vec<&str> = filters.collectors[1..].iter().map(|c| c.as_str()).collect();
        log::warn!(
            "Only one collector can be subscribed at a time, using {} and ignoring {}",
            filters.collectors[0].as_str(),
            ignored.join(",")
        );
    }

    let request = SubscriptionRequest::build(&filters).context("Failed to encode the subscription")?;
    log::debug!("Subscription: {}", request.as_str());

    let shutdown = ShutdownCoordinator::new();
    let (sink, frames) = ChannelSink::channel();
    let manager = ConnectionManager::new(
        settings.stream_config(filters.auto_reconnect),
        request,
        sink,
        shutdown.token(),
    )
    .context("Failed to prepare the TLS configuration")?;

    // Stdout is written from its own task so a slow reader never blocks receiving
    let writer = shutdown.spawn(write_lines(frames, tokio::io::stdout(), shutdown.token()));
    let mut run = shutdown.spawn(manager.run());

    // Wait for the stream to end on its own or for a shutdown signal
    let joined = tokio::select! {
        joined = &mut run => joined,
        listened = shutdown.listen_for_signals() => {
            if let Err(e) = listened {
                log::error!("Failed to listen for shutdown signals: {}", e);
            }
            shutdown.request_shutdown();
            run.await
        }
    };

    // A signal still cuts short a writer that is draining into a stalled pipe
    tokio::select! {
        _ = shutdown.wait() => {}
        _ = shutdown.listen_for_signals() => {}
    }

    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("Failed to write to stdout: {}", e),
        Err(e) => log::error!("Stdout writer panicked: {}", e),
    }

    joined
        .context("Streaming task panicked")?
        .context("Connection to RIS Live failed")?;

    log::info!("Shutdown complete.");
    Ok(())
}
