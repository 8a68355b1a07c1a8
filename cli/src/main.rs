//! Beacon CLI
//!
//! Command-line interface for exercising a running Beacon server.
//!
//! # Usage
//!
//! ```bash
//! beacon --help
//! beacon health
//! beacon send add_button_click --message "Added a task"
//! beacon metrics --name add_button
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use shared::models::Event;

/// Beacon CLI - telemetry ingestion command-line interface
#[derive(Parser)]
#[command(name = "beacon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ingestion server URL
    #[arg(
        short,
        long,
        env = "BEACON_API_URL",
        default_value = "http://localhost:4000"
    )]
    api_url: String,

    /// Metrics server URL
    #[arg(
        short,
        long,
        env = "BEACON_METRICS_URL",
        default_value = "http://localhost:9464"
    )]
    metrics_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API server health
    Health,
    /// Send one telemetry event
    Send {
        /// Event kind, e.g. `add_button_click`
        kind: String,
        /// Free-form message attached to the event
        #[arg(long)]
        message: Option<String>,
        /// Emitting service name
        #[arg(long)]
        service: Option<String>,
    },
    /// Print the Prometheus exposition
    Metrics {
        /// Only show metric families whose name starts with this prefix
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    service: String,
    #[serde(default)]
    listener: Option<String>,
    version: String,
}

#[derive(Debug, Deserialize)]
struct TelemetryResponse {
    message: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Some(Commands::Health) => {
            let health = check_health(&client, &cli.api_url).await?;
            println!(
                "{} is {} on the {} listener (version {})",
                health.service,
                health.status,
                health.listener.as_deref().unwrap_or("unknown"),
                health.version
            );
        }
        Some(Commands::Send {
            kind,
            message,
            service,
        }) => {
            let mut event = Event::new(kind);
            if let Some(message) = message {
                event = event.with_message(message);
            }
            if let Some(service) = service {
                event = event.with_service_name(service);
            }
            let response = send_event(&client, &cli.api_url, &event).await?;
            println!("{}", response.message);
        }
        Some(Commands::Metrics { name }) => {
            let body = fetch_metrics(&client, &cli.metrics_url).await?;
            match name {
                Some(prefix) => print!("{}", filter_families(&body, &prefix)),
                None => print!("{body}"),
            }
        }
        None => {
            println!("Beacon CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

async fn check_health(client: &reqwest::Client, api_url: &str) -> Result<HealthResponse> {
    let url = endpoint(api_url, "/health");
    tracing::debug!(%url, "Checking health");

    client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?
        .error_for_status()?
        .json()
        .await
        .context("unexpected health response")
}

async fn send_event(
    client: &reqwest::Client,
    api_url: &str,
    event: &Event,
) -> Result<TelemetryResponse> {
    let url = endpoint(api_url, "/send-telemetry");
    tracing::debug!(%url, kind = %event.kind(), "Sending event");

    client
        .post(&url)
        .json(&event.to_json())
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?
        .error_for_status()?
        .json()
        .await
        .context("unexpected telemetry response")
}

async fn fetch_metrics(client: &reqwest::Client, metrics_url: &str) -> Result<String> {
    let url = endpoint(metrics_url, "/metrics");
    tracing::debug!(%url, "Scraping metrics");

    client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?
        .error_for_status()?
        .text()
        .await
        .context("failed to read metrics body")
}

/// Keeps the lines of every family whose name starts with `prefix`.
fn filter_families(exposition: &str, prefix: &str) -> String {
    exposition
        .lines()
        .filter(|line| {
            let name = line
                .strip_prefix("# HELP ")
                .or_else(|| line.strip_prefix("# TYPE "))
                .unwrap_or(line);
            name.starts_with(prefix)
        })
        .map(|line| format!("{line}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        // Verify CLI can parse without arguments
        let cli = Cli::try_parse_from(["beacon"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_health_command() {
        let cli = Cli::try_parse_from(["beacon", "health"]);
        assert!(cli.is_ok());
        let cli = cli.unwrap();
        assert!(matches!(cli.command, Some(Commands::Health)));
    }

    #[test]
    fn test_cli_send_command() {
        let cli = Cli::try_parse_from([
            "beacon",
            "--api-url",
            "http://127.0.0.1:5000",
            "send",
            "add_button_click",
            "--message",
            "hello",
        ])
        .unwrap();

        assert_eq!(cli.api_url, "http://127.0.0.1:5000");
        match cli.command {
            Some(Commands::Send {
                kind,
                message,
                service,
            }) => {
                assert_eq!(kind, "add_button_click");
                assert_eq!(message.as_deref(), Some("hello"));
                assert!(service.is_none());
            }
            _ => panic!("expected send command"),
        }
    }

    #[test]
    fn test_cli_send_requires_kind() {
        assert!(Cli::try_parse_from(["beacon", "send"]).is_err());
    }

    #[test]
    fn test_cli_metrics_command() {
        let cli = Cli::try_parse_from(["beacon", "metrics", "--name", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Metrics { name: Some(ref n) }) if n == "list"
        ));
    }

    #[test]
    fn test_endpoint_joins_paths() {
        assert_eq!(
            endpoint("http://localhost:4000/", "/health"),
            "http://localhost:4000/health"
        );
        assert_eq!(
            endpoint("http://localhost:9464", "/metrics"),
            "http://localhost:9464/metrics"
        );
    }

    #[test]
    fn test_filter_families() {
        let exposition = "\
# HELP add_button_clicks_total Counts Add button clicks
# TYPE add_button_clicks_total counter
add_button_clicks_total{service=\"ReactNativeApp\"} 2
# HELP list_updates_total Counts task list updates
# TYPE list_updates_total counter
list_updates_total{service=\"ReactNativeApp\"} 0
";
        let filtered = filter_families(exposition, "list_");

        assert_eq!(
            filtered,
            "\
# HELP list_updates_total Counts task list updates
# TYPE list_updates_total counter
list_updates_total{service=\"ReactNativeApp\"} 0
"
        );
    }

    #[test]
    fn test_unreachable_server_is_an_error() {
        let client = reqwest::Client::new();
        let result = tokio_test::block_on(check_health(&client, "http://127.0.0.1:9"));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("failed to reach"));
    }
}
