//! Prometheus text exposition.
//!
//! Renders a [`RegistrySnapshot`] in the text format (version 0.0.4) served on
//! the scrape endpoint:
//!
//! ```text
//! # HELP add_button_clicks_total Counts Add button clicks
//! # TYPE add_button_clicks_total counter
//! add_button_clicks_total{service="ReactNativeApp"} 1
//! ```

use super::labels::{is_valid_label_name, is_valid_metric_name, LabelSet};
use super::registry::{CounterRegistry, RegistryError, RegistrySnapshot};
use std::fmt::Write as _;
use thiserror::Error;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Errors that can occur while rendering the exposition text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    /// A counter name is not a valid metric name.
    #[error("invalid metric name: '{0}'")]
    InvalidMetricName(String),

    /// A label name is not a valid label name.
    #[error("invalid label name '{label}' on metric '{metric}'")]
    InvalidLabelName {
        /// The metric carrying the label.
        metric: String,
        /// The offending label name.
        label: String,
    },

    /// Taking the registry snapshot failed.
    #[error("failed to snapshot registry: {0}")]
    Snapshot(#[from] RegistryError),

    /// Writing to the output buffer failed.
    #[error("failed to format output")]
    Format(#[from] std::fmt::Error),
}

/// Renders the current state of a registry.
///
/// Never mutates the registry. Either the whole exposition is returned or an
/// error, never a truncated text.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be taken or contains a name that
/// the format cannot represent.
pub fn render(registry: &CounterRegistry) -> Result<String, RenderError> {
    render_snapshot(&registry.snapshot()?)
}

/// Renders a snapshot.
///
/// # Errors
///
/// Returns an error if the snapshot contains an invalid metric or label name.
pub fn render_snapshot(snapshot: &RegistrySnapshot) -> Result<String, RenderError> {
    let mut out = String::new();

    for family in &snapshot.families {
        if !is_valid_metric_name(&family.name) {
            return Err(RenderError::InvalidMetricName(family.name.clone()));
        }

        writeln!(out, "# HELP {} {}", family.name, escape_help(&family.description))?;
        writeln!(out, "# TYPE {} counter", family.name)?;

        for sample in &family.samples {
            out.push_str(&family.name);
            write_labels(&mut out, &family.name, &sample.labels)?;
            writeln!(out, " {}", sample.value)?;
        }
    }

    Ok(out)
}

fn write_labels(out: &mut String, metric: &str, labels: &LabelSet) -> Result<(), RenderError> {
    if labels.is_empty() {
        return Ok(());
    }

    out.push('{');
    for (i, (name, value)) in labels.iter().enumerate() {
        if !is_valid_label_name(name) {
            return Err(RenderError::InvalidLabelName {
                metric: metric.to_string(),
                label: name.to_string(),
            });
        }
        if i > 0 {
            out.push(',');
        }
        write!(out, "{name}=\"{}\"", escape_label_value(value))?;
    }
    out.push('}');
    Ok(())
}

/// Escapes a label value: backslash, double quote and line feed.
#[must_use]
pub fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escapes HELP text: backslash and line feed.
#[must_use]
pub fn escape_help(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}
