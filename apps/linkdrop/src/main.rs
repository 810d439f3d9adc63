//! linkdrop entry point.

mod app;
mod config;
mod console;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the chat transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting linkdrop");

    let config = config::Config::load()?;
    tracing::info!(
        download_dir = %config.download_dir.display(),
        outbox_dir = %config.outbox_dir.display(),
        max_file_size = config.max_file_size,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("linkdrop shut down cleanly");
    Ok(())
}
