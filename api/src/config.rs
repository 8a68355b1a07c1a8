//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use shared::models::DEFAULT_SERVICE_NAME;
use shared::pipeline::TranslatorConfig;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::export::ExportConfig;

/// Output format of the service's own logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("unknown log format '{other}', expected 'text' or 'json'"),
        }
    }
}

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `BEACON_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `BEACON_PORT`: The ingestion port (default: 4000)
/// - `BEACON_METRICS_PORT`: The metrics scrape port (default: 9464)
/// - `BEACON_OTLP_ENDPOINT`: Trace collector base URL (default: unset, spans are discarded)
/// - `BEACON_DEFAULT_SERVICE_NAME`: Service name for events without one (default: "`ReactNativeApp`")
/// - `BEACON_EXPORTER_SERVICE_NAME`: `service.name` of exported spans (default: "beacon")
/// - `BEACON_EXPORT_QUEUE_SIZE`: Span queue capacity (default: 2048)
/// - `BEACON_EXPORT_BATCH_SIZE`: Max spans per export request (default: 512)
/// - `BEACON_EXPORT_INTERVAL_MS`: Export flush interval (default: 1000)
/// - `BEACON_EXPORT_TIMEOUT_MS`: Export request timeout (default: 10000)
/// - `BEACON_COUNT_UNCLASSIFIED`: Count unknown kinds on `button_clicks` (default: false)
/// - `BEACON_MAX_SERIES_PER_COUNTER`: Cap on label sets per counter (default: unset, unbounded)
/// - `BEACON_LOG_FORMAT`: `text` or `json` (default: text)
#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_ports"))]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The ingestion port.
    pub port: u16,
    /// The metrics scrape port.
    pub metrics_port: u16,
    /// Base URL of the OTLP/HTTP trace collector.
    #[validate(url(message = "BEACON_OTLP_ENDPOINT must be a URL"))]
    pub otlp_endpoint: Option<String>,
    /// Service name applied to events that carry none.
    #[validate(length(min = 1, message = "Default service name cannot be empty"))]
    pub default_service_name: String,
    /// `service.name` resource attribute of exported spans.
    #[validate(length(min = 1, message = "Exporter service name cannot be empty"))]
    pub exporter_service_name: String,
    /// Capacity of the span export queue.
    #[validate(range(min = 1, message = "Export queue size must be at least 1"))]
    pub export_queue_size: usize,
    /// Maximum number of spans per export request.
    #[validate(range(min = 1, message = "Export batch size must be at least 1"))]
    pub export_batch_size: usize,
    /// How long the exporter waits to fill a batch.
    pub export_interval: Duration,
    /// Timeout of one export request.
    pub export_timeout: Duration,
    /// Count unclassified events on the generic counter.
    pub count_unclassified: bool,
    /// Maximum label sets per counter; unset means unbounded.
    #[validate(range(min = 1, message = "Series limit must be at least 1"))]
    pub max_series_per_counter: Option<usize>,
    /// Format of the service's own logs.
    pub log_format: LogFormat,
}

fn validate_ports(config: &Config) -> Result<(), ValidationError> {
    if config.port == config.metrics_port {
        return Err(ValidationError::new("port_conflict")
            .with_message("BEACON_PORT and BEACON_METRICS_PORT must differ".into()));
    }
    Ok(())
}

/// Reads and parses an environment variable, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A numeric or boolean variable is set but cannot be parsed
    /// - The resulting configuration fails validation
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            host: std::env::var("BEACON_HOST").unwrap_or(defaults.host),
            port: env_or("BEACON_PORT", defaults.port)?,
            metrics_port: env_or("BEACON_METRICS_PORT", defaults.metrics_port)?,
            otlp_endpoint: std::env::var("BEACON_OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            default_service_name: std::env::var("BEACON_DEFAULT_SERVICE_NAME")
                .unwrap_or(defaults.default_service_name),
            exporter_service_name: std::env::var("BEACON_EXPORTER_SERVICE_NAME")
                .unwrap_or(defaults.exporter_service_name),
            export_queue_size: env_or("BEACON_EXPORT_QUEUE_SIZE", defaults.export_queue_size)?,
            export_batch_size: env_or("BEACON_EXPORT_BATCH_SIZE", defaults.export_batch_size)?,
            export_interval: Duration::from_millis(env_or("BEACON_EXPORT_INTERVAL_MS", 1000)?),
            export_timeout: Duration::from_millis(env_or("BEACON_EXPORT_TIMEOUT_MS", 10_000)?),
            count_unclassified: env_or("BEACON_COUNT_UNCLASSIFIED", defaults.count_unclassified)?,
            max_series_per_counter: std::env::var("BEACON_MAX_SERIES_PER_COUNTER")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|raw| raw.trim().parse::<usize>())
                .transpose()
                .context("invalid value for BEACON_MAX_SERIES_PER_COUNTER")?,
            log_format: env_or("BEACON_LOG_FORMAT", defaults.log_format)?,
        };

        config.validate_config()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing every invalid field.
    pub fn validate_config(&self) -> Result<()> {
        self.validate().context("invalid configuration")
    }

    /// Returns the socket address of the ingestion listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.host, self.port)
    }

    /// Returns the socket address of the metrics listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn metrics_socket_addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.host, self.metrics_port)
    }

    /// Returns the translator settings.
    #[must_use]
    pub fn translator_config(&self) -> TranslatorConfig {
        TranslatorConfig {
            default_service_name: self.default_service_name.clone(),
            count_unclassified: self.count_unclassified,
        }
    }

    /// Returns the span export settings.
    #[must_use]
    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            endpoint: self.otlp_endpoint.clone(),
            service_name: self.exporter_service_name.clone(),
            queue_size: self.export_queue_size,
            batch_size: self.export_batch_size,
            interval: self.export_interval,
            timeout: self.export_timeout,
        }
    }
}

fn parse_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid socket address {host}:{port}"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            metrics_port: 9464,
            otlp_endpoint: None,
            default_service_name: DEFAULT_SERVICE_NAME.to_string(),
            exporter_service_name: "beacon".to_string(),
            export_queue_size: 2048,
            export_batch_size: 512,
            export_interval: Duration::from_millis(1000),
            export_timeout: Duration::from_millis(10_000),
            count_unclassified: false,
            max_series_per_counter: None,
            log_format: LogFormat::Text,
        }
    }
}
