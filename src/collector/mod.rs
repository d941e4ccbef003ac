// src/collector/mod.rs
//! Metric model and the collectors for each cluster subsystem.
//!
//! Every collector shells out to one or more cluster tools, parses what they
//! print into a typed status value and projects that status onto a flat list
//! of [`Metric`] observations. Nothing is cached between scrapes.

pub mod corosync;
pub mod drbd;
pub mod instrumented;
pub mod pacemaker;
pub mod sbd;
pub mod tool;

use crate::error::CollectError;

pub use instrumented::{InstrumentedCollector, Scrape};
pub use tool::check_executables;

/// Prefix shared by every exported metric name.
pub const NAMESPACE: &str = "ha_cluster";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Static description of one metric name and its fixed label schema.
#[derive(Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub subsystem: &'static str,
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
    pub kind: MetricKind,
}

impl Descriptor {
    pub const fn gauge(
        subsystem: &'static str,
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            subsystem,
            name,
            help,
            labels,
            kind: MetricKind::Gauge,
        }
    }

    pub const fn counter(
        subsystem: &'static str,
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            subsystem,
            name,
            help,
            labels,
            kind: MetricKind::Counter,
        }
    }

    /// Fully qualified name, e.g. `ha_cluster_drbd_written`.
    pub fn fq_name(&self) -> String {
        format!("{}_{}_{}", NAMESPACE, self.subsystem, self.name)
    }
}

/// One observation emitted by a collector during a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub descriptor: &'static Descriptor,
    pub value: f64,
    /// Label values, in the order of `descriptor.labels`.
    pub label_values: Vec<String>,
}

impl Metric {
    pub fn new<I, S>(descriptor: &'static Descriptor, value: f64, label_values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            descriptor,
            value,
            label_values: label_values.into_iter().map(Into::into).collect(),
        }
    }

    /// Observation for a descriptor without labels.
    pub fn unlabeled(descriptor: &'static Descriptor, value: f64) -> Self {
        Self {
            descriptor,
            value,
            label_values: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Looks up a label value by label name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.descriptor
            .labels
            .iter()
            .position(|label| *label == name)
            .and_then(|idx| self.label_values.get(idx))
            .map(String::as_str)
    }
}

/// Converts a flag into the 0/1 value used by boolean gauges.
pub fn bool_value(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

/// A subsystem collector. Implementations are built once from explicit
/// configuration and asked to collect on every scrape.
pub trait Collector: Send + Sync {
    /// Subsystem name, used in metric names and scrape instrumentation.
    fn subsystem(&self) -> &'static str;

    /// Every descriptor this collector may emit.
    fn descriptors(&self) -> &'static [&'static Descriptor];

    /// Runs the underlying tools and pushes this cycle's observations into
    /// `metrics`. Observations pushed before an error are still reported.
    fn collect_into(&self, metrics: &mut Vec<Metric>) -> Result<(), CollectError>;

    /// Runs the underlying tools and returns this cycle's observations,
    /// discarding partial ones on error.
    fn collect(&self) -> Result<Vec<Metric>, CollectError> {
        let mut metrics = Vec::new();
        self.collect_into(&mut metrics)?;
        Ok(metrics)
    }
}
