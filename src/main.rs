use aggregate_metric_logger::{MetricLogger, MetricLoggerConfig, Params};
use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal metric logger demo error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = MetricLoggerConfig::from_env().context("load configuration from environment")?;
    if !config.enabled {
        warn!("METRIC_LOGGER_ENABLED is not set; enabling for the demo workload");
    }
    let config = MetricLoggerConfig {
        enabled: true,
        ..config
    };

    let metrics = MetricLogger::new(config);
    metrics.set_thresholds("demo-request", [50.0, 200.0, 1000.0]);

    info!(
        namespace = %metrics.namespace(),
        "metric logger demo online; records flush at :30 of every minute"
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut tick: u64 = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick += 1;
                let route = if tick % 3 == 0 { "/orders" } else { "/users" };
                let id = metrics.start("demo-request", Params::new().with("route", route));
                let worker = metrics.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(20 + (tick * 37) % 400)).await;
                    worker.stop(&id);
                });

                metrics.measure("demo-payload-bytes", ((tick * 131) % 4096) as f64, Params::new());
                if tick % 10 == 0 {
                    metrics.warn("demo-retry", Params::new().with("route", route));
                }
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    warn!(error = %err, "ctrl_c listener error");
                }
                let flushed = metrics.shutdown();
                info!(records = flushed, "Shutdown signal received, final window flushed");
                break;
            }
        }
    }
    Ok(())
}

fn init_tracing() -> Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
