use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use handdet_pipeline::{HandPipeline, PipelineConfig};

mod api;
mod cli;
mod config;

use cli::{Cli, Command};
use config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so the file writer flushes on exit.
    let _log_guard = init_tracing(&cli.log_level, cli.log_file.as_deref())?;

    tracing::info!("handdet v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(cli.config.as_deref())?;

    if let Some(model) = &cli.model {
        config.pipeline.model_path = model.to_string_lossy().into_owned();
    }
    if let Some(conf) = cli.conf {
        anyhow::ensure!((0.0..=1.0).contains(&conf), "--conf must be within [0, 1], got {conf}");
        config.pipeline.conf_threshold = conf;
    }

    match cli.command {
        Command::Convert {
            annotations,
            output,
            classes,
            write_empty,
        } => {
            cli::run_convert(&annotations, &output, &config.convert, classes, write_empty)?;
        }
        Command::Prepare {
            data_dir,
            output,
            classes,
            no_copy,
        } => {
            cli::run_prepare(&data_dir, &output, &config.layout, &config.convert, classes, no_copy)?;
        }
        Command::Inspect { data_dir, json } => {
            cli::run_inspect(&data_dir, &config.layout, json)?;
        }
        Command::Detect { input, output, format } => {
            let pipeline = HandPipeline::build(config.pipeline)?;
            cli::detect_path(&pipeline, &input, output.as_deref(), &format)?;
        }
        Command::Serve { host, port } => {
            serve(config.pipeline, &host, port).await?;
        }
    }

    Ok(())
}

fn init_tracing(log_level: &str, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer().with_target(true).with_thread_ids(true);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .with_context(|| format!("--log-file needs a file name: {}", path.display()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn serve(config: PipelineConfig, host: &str, port: u16) -> anyhow::Result<()> {
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    let pipeline = HandPipeline::build(config)?;
    pipeline.warmup()?;

    let state = Arc::new(api::AppState::new(pipeline, metrics_handle));

    let app = api::create_router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    tracing::info!(%addr, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
