//! Counter registry and metric exposition.
//!
//! The registry is the only shared mutable state of the service. The
//! exposition module turns a registry snapshot into the text a pull-based
//! scraper reads from `/metrics`.

pub mod exposition;
pub mod labels;
pub mod registry;

pub use exposition::{render, render_snapshot, RenderError, CONTENT_TYPE};
pub use labels::{is_valid_label_name, is_valid_metric_name, LabelSet};
pub use registry::{
    CounterFamily, CounterHandle, CounterRegistry, CounterSample, RegistryError, RegistrySnapshot,
};
