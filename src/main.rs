use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use castrec::capture::CaptureEngine;
use castrec::config::AppConfig;
use castrec::pipeline::upload::RcloneUploadService;
use castrec::pipeline::ActionDispatcher;
use castrec::platform::{PluginContext, PluginRegistry};
use castrec::supervisor::Supervisor;

#[derive(Parser, Debug)]
#[command(name = "castrec", version, about = "Supervised live-stream recorder")]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "castrec.toml")]
    config: std::path::PathBuf,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "castrec=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = AppConfig::load(&args.config).await?;

    let engine = Arc::new(CaptureEngine::new(config.ffmpeg_path.clone()));
    match engine.version() {
        Some(version) => info!(%version, "capture engine ready"),
        None => warn!(
            binary = %config.ffmpeg_path,
            "capture engine did not answer a version probe; captures will fail"
        ),
    }

    let context = PluginContext {
        client: reqwest::Client::new(),
        engine,
    };
    let registry = Arc::new(PluginRegistry::builtin(context));
    let uploads = Arc::new(RcloneUploadService::new(
        config.rclone.binary.clone(),
        config.rclone.config_path.clone(),
    ));
    let dispatcher = Arc::new(ActionDispatcher::new(uploads));

    let token = CancellationToken::new();
    let shutdown_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested");
        shutdown_token.cancel();
    });

    let supervisor = Supervisor::new(
        config.streamers.clone(),
        registry,
        dispatcher,
        config.max_download_retries,
        Duration::from_secs(config.download_retry_delay_seconds),
        token,
    );
    supervisor.run().await;

    info!("castrec stopped");
    Ok(())
}
