use anyhow::{Context, Result};
use par_note::app::App;
use par_note::cli::{self, Commands};
use par_note::config::Config;
use par_note::editor::PlainTextSurface;
use par_note::storage::FsStorage;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    // Parse CLI arguments first (before logging init for cleaner output)
    let cli = cli::parse();

    // CLI --log-level flag takes highest precedence, then RUST_LOG, then config
    par_note::debug::init_log_bridge(cli.log_level);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    par_note::debug::set_level(config.log_level);

    log::info!("Starting par-note");

    let runtime = Runtime::new()?;
    let command = cli.command.unwrap_or(Commands::Status);
    let result = runtime.block_on(async {
        let app = App::start(config, Arc::new(FsStorage::new()), PlainTextSurface::factory());
        let result = cli::execute(&app, &command).await;
        let failures = app.shutdown().await?;
        for (id, e) in &failures {
            eprintln!("par-note: {id} was not saved: {e}");
        }
        result
    });

    // Use `shutdown_timeout` to avoid blocking forever if a background task
    // hangs
    log::info!("Shutting down runtime");
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));

    if let Err(ref e) = result {
        eprintln!("par-note: error: {e:#}");
    }
    result
}
