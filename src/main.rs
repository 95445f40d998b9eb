use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use phorn::config::settings::Settings;
use phorn::crawler;
use phorn::models::hit::Hit;
use phorn::observer::CrawlObserver;
use phorn::output;

/// Parse the `--config` CLI flag. Defaults to `phorn.toml`.
fn parse_config_path() -> String {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = String::from("phorn.toml");

    let mut i = 1;
    while i < args.len() {
        if args[i] == "--config" {
            if let Some(path) = args.get(i + 1) {
                config_path = path.clone();
            }
            i += 2;
        } else {
            i += 1;
        }
    }

    config_path
}

/// Initialise the `tracing` subscriber with both stdout and file output.
fn init_tracing(level: &str, log_file: &str) {
    if let Some(dir) = std::path::Path::new(log_file).parent() {
        let _ = std::fs::create_dir_all(dir);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .expect("Failed to open log file");

    let file_layer = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},phorn=debug", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}

/// Console observer for unattended runs: one line per event.
struct ConsoleObserver;

impl CrawlObserver for ConsoleObserver {
    fn on_scan(&self, url: &str) {
        println!("[SCAN] {url}");
    }

    fn on_found(&self, hit: &Hit) {
        println!("[FOUND] {} {} {}", hit.phone, hit.email, hit.url);
    }

    fn on_status(&self, scanned: usize, queued: usize, found: usize, errors: usize) {
        println!("[STAT] scanned={scanned} queued={queued} found={found} errors={errors}");
    }

    fn on_detail(&self, msg: &str) {
        println!("[DETAIL] {msg}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---------------------------------------------------------------
    // 1. Configuration
    // ---------------------------------------------------------------
    let config_path = parse_config_path();
    let settings = Settings::load(&config_path)?;
    settings.validate()?;

    // ---------------------------------------------------------------
    // 2. Logging
    // ---------------------------------------------------------------
    init_tracing(&settings.logging.level, &settings.logging.file);

    info!("Starting PHORN contact crawler");
    info!("Config loaded from {}", config_path);

    // ---------------------------------------------------------------
    // 3. Crawl
    // ---------------------------------------------------------------
    let hits = crawler::crawl(settings, Arc::new(ConsoleObserver)).await?;
    info!(hits = hits.len(), "Crawl finished");

    // ---------------------------------------------------------------
    // 4. Export
    // ---------------------------------------------------------------
    let path = output::save_csv(&hits)?;
    println!("[PHORN] saved: {}", path.display());

    Ok(())
}
