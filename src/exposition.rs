// src/exposition.rs
//! Prometheus text exposition and the HTTP surface serving it.
//!
//! Every request scrapes all collectors into a fresh registry, so no metric
//! state survives between scrapes.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tracing::{debug, error, warn};

use crate::collector::{InstrumentedCollector, Metric, MetricKind, Scrape};
use crate::error::ExpositionError;

type Collectors = Arc<Vec<InstrumentedCollector>>;

enum Family {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

/// Function to run one scrape of every collector, in order.
pub fn scrape_all(collectors: &[InstrumentedCollector]) -> Vec<Scrape> {
    collectors.iter().map(InstrumentedCollector::scrape).collect()
}

/// Function to encode scrape results in the Prometheus text format.
///
/// Observations sharing a name and label values collapse into one series,
/// the last one wins.
pub fn render(scrapes: &[Scrape]) -> Result<String, ExpositionError> {
    let registry = Registry::new();
    let mut families: HashMap<String, Family> = HashMap::new();

    for metric in scrapes.iter().flat_map(|scrape| scrape.metrics.iter()) {
        let descriptor = metric.descriptor;
        if metric.label_values.len() != descriptor.labels.len() {
            return Err(ExpositionError::LabelMismatch {
                name: descriptor.fq_name(),
                expected: descriptor.labels.len(),
                actual: metric.label_values.len(),
            });
        }

        let family = match families.entry(descriptor.fq_name()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let opts = Opts::new(entry.key().as_str(), descriptor.help);
                let family = match descriptor.kind {
                    MetricKind::Gauge => {
                        let vec = GaugeVec::new(opts, descriptor.labels)?;
                        registry.register(Box::new(vec.clone()))?;
                        Family::Gauge(vec)
                    }
                    MetricKind::Counter => {
                        let vec = CounterVec::new(opts, descriptor.labels)?;
                        registry.register(Box::new(vec.clone()))?;
                        Family::Counter(vec)
                    }
                };
                entry.insert(family)
            }
        };

        record(family, metric)?;
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

fn record(family: &Family, metric: &Metric) -> Result<(), ExpositionError> {
    let label_values: Vec<&str> = metric.label_values.iter().map(String::as_str).collect();

    match family {
        Family::Gauge(vec) => vec.get_metric_with_label_values(&label_values)?.set(metric.value),
        Family::Counter(vec) => {
            // counters only move forward
            if metric.value.is_nan() || metric.value < 0.0 {
                warn!(
                    metric = %metric.descriptor.fq_name(),
                    value = metric.value,
                    "dropping invalid counter value"
                );
                return Ok(());
            }
            let counter = vec.get_metric_with_label_values(&label_values)?;
            counter.reset();
            counter.inc_by(metric.value);
        }
    }

    Ok(())
}

/// Function to scrape every collector and encode the result.
pub fn gather(collectors: &[InstrumentedCollector]) -> Result<String, ExpositionError> {
    render(&scrape_all(collectors))
}

/// Function to build the landing page linking to the telemetry path.
pub fn landing_page(telemetry_path: &str) -> String {
    format!(
        r#"<html>
<head>
	<title>HA Cluster Exporter</title>
</head>
<body>
	<h1>HA Cluster Exporter</h1>
	<h2>Prometheus exporter for Pacemaker based Linux HA clusters</h2>
	<ul>
		<li><a href="{telemetry_path}">Metrics</a></li>
	</ul>
</body>
</html>
"#
    )
}

/// Function to build the HTTP router: metrics on `telemetry_path`, the
/// landing page on `/`.
pub fn router(telemetry_path: &str, collectors: Vec<InstrumentedCollector>) -> Router {
    let mut router = Router::new().route(telemetry_path, get(metrics_handler));

    if telemetry_path != "/" {
        let page = landing_page(telemetry_path);
        router = router.route("/", get(move || std::future::ready(Html(page.clone()))));
    }

    router.with_state(Arc::new(collectors))
}

async fn metrics_handler(State(collectors): State<Collectors>) -> Response {
    debug!("serving scrape request");

    match tokio::task::spawn_blocking(move || gather(&collectors)).await {
        Ok(Ok(body)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "could not encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "scrape task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
