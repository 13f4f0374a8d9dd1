//! CLI entry point for the Timepix detector driver.
//!
//! Connects to a detector control server (or an in-memory mock), prints a
//! diagnostic report, and either exits or keeps the driver alive with a
//! periodic telemetry refresh until Ctrl+C.
//!
//! # Usage
//!
//! One-shot connection check:
//! ```bash
//! det-timepix --url http://localhost:8080 --details 1
//! ```
//!
//! Keep running and refresh telemetry every 10 s:
//! ```bash
//! det-timepix --url http://localhost:8080 --monitor
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use det_driver_timepix::endpoint::{BasicAuth, EndpointClient, HttpEndpoint};
use det_driver_timepix::mock::MockEndpoint;
use det_driver_timepix::{DriverConfig, TimepixDriver};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[derive(Parser)]
#[command(name = "det-timepix")]
#[command(about = "Networked pixel-detector driver CLI", long_about = None)]
struct Cli {
    /// Control server address, e.g. http://localhost:8080
    #[arg(long, env = "DET_SERVER_URL", default_value = "")]
    url: String,

    /// Driver configuration file (TOML); flags below are ignored when set
    #[arg(long)]
    config: Option<PathBuf>,

    /// Instance name used in logs and reports
    #[arg(long, default_value = "TPX3")]
    name: String,

    /// Use a scripted in-memory endpoint instead of a real server
    #[arg(long)]
    mock: bool,

    /// Basic-auth user (password via DET_PASSWORD)
    #[arg(long)]
    user: Option<String>,

    /// Basic-auth password
    #[arg(long, env = "DET_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Bound on a single control round trip, in seconds
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Report detail level (0 = parameter dump only)
    #[arg(long, default_value = "1")]
    details: i32,

    /// Stay running and refresh telemetry periodically
    #[arg(long)]
    monitor: bool,

    /// Telemetry refresh interval in monitor mode, in seconds
    #[arg(long, default_value = "10")]
    refresh_secs: u64,

    /// Frame buffer count hint for the hosting runtime
    #[arg(long, default_value = "256")]
    buffers: usize,

    /// Frame memory limit hint, in bytes
    #[arg(long, default_value = "536870912")]
    memory: usize,

    /// Worker priority hint
    #[arg(long, default_value = "0")]
    priority: i32,

    /// Worker stack size hint, in bytes
    #[arg(long, default_value = "131072")]
    stack_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<DriverConfig>(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => {
            let mut config = DriverConfig::new(cli.name.clone(), cli.url.clone());
            config.buffer_limit = cli.buffers;
            config.memory_limit = cli.memory;
            config.priority = cli.priority;
            config.stack_size = cli.stack_size;
            config
        }
    };
    if cli.mock && config.server_url.is_empty() {
        config.server_url = "mock://detector".to_string();
    }

    let client: Arc<dyn EndpointClient> = if cli.mock {
        tracing::info!("using in-memory mock endpoint");
        Arc::new(MockEndpoint::new().with_response(
            "/dashboard",
            200,
            r#"{"manufacturer":"Mock","model":"TPX3","serial":"MOCK-0","firmware":"0.0.0","width":448,"height":512}"#,
        ))
    } else {
        let auth = cli.user.as_ref().map(|user| BasicAuth {
            user: user.clone(),
            password: cli.password.clone().unwrap_or_default(),
        });
        Arc::new(
            HttpEndpoint::with_options(
                config.server_url.clone(),
                Duration::from_secs(cli.timeout_secs),
                auth,
            )
            .context("building control endpoint client")?,
        )
    };

    let mut driver = TimepixDriver::new_async(config, client)
        .await
        .context("constructing detector driver")?;

    let mut report = String::new();
    driver.report(&mut report, cli.details);
    print!("{}", report);

    if !driver.is_connected() {
        tracing::warn!("detector not connected, see HTTP status parameter above");
    }

    if cli.monitor {
        println!("monitoring {} - press Ctrl+C to stop", driver.name());
        let mut interval = tokio::time::interval(Duration::from_secs(cli.refresh_secs.max(1)));
        interval.tick().await; // first tick fires immediately
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(error) = driver.refresh().await {
                        tracing::warn!(error = %error, "telemetry refresh failed");
                    }
                }
                _ = signal::ctrl_c() => {
                    println!("\nshutdown signal received");
                    break;
                }
            }
        }
    }

    driver.shutdown().await?;
    Ok(())
}
