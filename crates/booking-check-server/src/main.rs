//! Booking availability notifier binary.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_check_server::{Args, NotifierService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booking_check_server=info,booking_check_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting booking notifier");

    let config = Args::parse().into_config()?;
    tracing::info!(?config, "configuration loaded");

    let service = NotifierService::start(&config).await?;

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = signal_tx.send(());
    });

    if let Err(e) = service.run_until_shutdown(&shutdown_tx).await {
        tracing::error!(error = %e, "notifier stopped with an error");
        return Err(e.into());
    }

    tracing::info!("shutdown complete");
    Ok(())
}
