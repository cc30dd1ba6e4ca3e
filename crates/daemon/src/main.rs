//! Tidepool - Main Entry Point
//! Reads newline-delimited items from stdin and drains them through an
//! adaptive worker pool. EOF (or Ctrl+C) completes the pool.

mod settings;

use anyhow::Result;
use settings::Settings;
use std::sync::Arc;
use std::time::Duration;
use tidepool_core::{FnProcessor, ItemProcessor, Pool, ProcessError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::interval;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    init_logging()?;
    info!("Tidepool v{} starting...", VERSION);

    // 2. Load configuration
    let settings = Settings::load()?;
    info!(?settings, "Configuration loaded");

    // 3. Build the pool
    let processor = simulated_processor(settings.work());
    let pool = Arc::new(Pool::<String>::new(settings.pool_config(), processor)?);

    // 4. Periodic stats
    let reporter = {
        let pool = Arc::clone(&pool);
        let every = settings.stats_interval();
        tokio::spawn(async move { report_stats(pool, every).await })
    };

    // 5. Feed stdin until EOF or interrupt
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut submitted: u64 = 0;
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    pool.submit(line)?;
                    submitted += 1;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received. Draining queued items...");
                break;
            }
        }
    }

    // 6. Graceful shutdown: stop accepting, drain, wait for workers
    info!(submitted, "Input finished. Completing pool...");
    pool.complete();
    pool.join().await;
    reporter.abort();

    let stats = pool.stats();
    info!(
        processed = stats.processed,
        failed = stats.failed,
        "Shutdown complete."
    );

    Ok(())
}

/// JSON or pretty output, chosen by `TIDEPOOL_LOG_FORMAT`
fn init_logging() -> Result<()> {
    let log_format = std::env::var("TIDEPOOL_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("tidepool=info"))?;

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init()?;
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
    }
    Ok(())
}

/// Stand-in workload: sleeps, logs, rejects blank lines
fn simulated_processor(work: Duration) -> Arc<dyn ItemProcessor<String>> {
    Arc::new(FnProcessor::new(move |line: String| async move {
        if line.trim().is_empty() {
            return Err(ProcessError::failed("blank line"));
        }
        tokio::time::sleep(work).await;
        info!(item = %line, "Item processed");
        Ok(())
    }))
}

async fn report_stats(pool: Arc<Pool<String>>, every: Duration) {
    let mut tick = interval(every);
    loop {
        tick.tick().await;
        let stats = pool.stats();
        info!(
            workers = stats.registered,
            active = stats.active,
            backlog = stats.backlog,
            processed = stats.processed,
            failed = stats.failed,
            "Pool stats"
        );
        if stats.is_terminal() {
            break;
        }
    }
}
