// src/collector/instrumented.rs
//! Scrape duration and success reporting around any collector.

use std::time::{Duration, Instant};

use tracing::warn;

use super::{Collector, Descriptor, Metric, bool_value};

pub static SCRAPE_DURATION: Descriptor = Descriptor::gauge(
    "scrape",
    "duration_seconds",
    "Duration of a collector scrape.",
    &["collector"],
);

pub static SCRAPE_SUCCESS: Descriptor = Descriptor::gauge(
    "scrape",
    "success",
    "Whether a collector succeeded.",
    &["collector"],
);

pub static SCRAPE_DESCRIPTORS: &[&Descriptor] = &[&SCRAPE_DURATION, &SCRAPE_SUCCESS];

/// Result of one instrumented scrape.
#[derive(Debug)]
pub struct Scrape {
    pub subsystem: &'static str,
    pub success: bool,
    pub duration: Duration,
    /// Subsystem observations followed by the two scrape metrics.
    pub metrics: Vec<Metric>,
}

pub struct InstrumentedCollector {
    collector: Box<dyn Collector>,
}

impl InstrumentedCollector {
    pub fn new(collector: Box<dyn Collector>) -> Self {
        Self { collector }
    }

    pub fn subsystem(&self) -> &'static str {
        self.collector.subsystem()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &'static Descriptor> {
        self.collector
            .descriptors()
            .iter()
            .chain(SCRAPE_DESCRIPTORS.iter())
            .copied()
    }

    /// Function to run one scrape cycle, never failing: errors flip the
    /// success metric and keep whatever was observed before the failure.
    pub fn scrape(&self) -> Scrape {
        let subsystem = self.collector.subsystem();
        let mut metrics = Vec::new();
        let begin = Instant::now();
        let result = self.collector.collect_into(&mut metrics);
        let duration = begin.elapsed();

        let success = match result {
            Ok(()) => true,
            Err(e) => {
                warn!(collector = subsystem, error = %e, "collector scrape failed");
                false
            }
        };

        metrics.push(Metric::new(
            &SCRAPE_DURATION,
            duration.as_secs_f64(),
            [subsystem],
        ));
        metrics.push(Metric::new(&SCRAPE_SUCCESS, bool_value(success), [subsystem]));

        Scrape {
            subsystem,
            success,
            duration,
            metrics,
        }
    }
}
