//! # Telemetry
//!
//! Console logging is always installed through `tracing_subscriber::fmt`,
//! filtered by `RUST_LOG` (default `info`). Events are only produced when the
//! `tracing` feature is enabled (the default).
//!
//! ## Feature matrix
//!
//! - `tracing`: structured log events from the server and from `hashq`.
//! - `metrics`: OpenTelemetry metrics for units of work and HTTP rejections.
//! - `stdout`: periodic export of those metrics to stdout.
//!
//! ## Metrics
//!
//! - `units_dispatched` (counter)
//! - `units_inflight` (up-down counter)
//! - `units_failed` (counter)
//! - `unit_latency` (histogram, µs)
//! - `requests_rejected` (counter)
//!
//! Without `metrics` every recording function compiles to a no-op.
//!
//! ```bash
//! cargo run -p hashq-server --features metrics,stdout
//! ```

#[cfg(all(feature = "stdout", not(feature = "metrics")))]
compile_error!("The 'stdout' feature requires the 'metrics' feature to be enabled.");

use core::time::Duration;
use hashq::{Error, HashId, Observer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Histogram, Meter, UpDownCounter},
};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::{Resource, metrics as sdkmetrics};
#[cfg(feature = "metrics")]
use opentelemetry_semantic_conventions as semvcns;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

pub struct TelemetryProviders {
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes pending exports and shuts the providers down.
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        )
        .try_init()?;

    #[cfg(feature = "metrics")]
    let meter_provider = {
        let meter_provider = init_metrics();
        opentelemetry::global::set_meter_provider(meter_provider.clone());

        let scope = InstrumentationScope::builder("hashq")
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();
        init_metric_handles(opentelemetry::global::meter_with_scope(scope));
        meter_provider
    };

    Ok(TelemetryProviders {
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(feature = "metrics")]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("hashq")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(Duration::from_secs(5))
            .build();
        builder.with_reader(reader)
    };

    builder.build()
}

#[cfg(feature = "metrics")]
static UNITS_DISPATCHED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static UNITS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static UNITS_FAILED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static UNIT_LATENCY_US: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static REQUESTS_REJECTED: OnceLock<Counter<u64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = UNITS_DISPATCHED.set(
        meter
            .u64_counter("units_dispatched")
            .with_description("Units of work accepted for hashing")
            .build(),
    );

    let _ = UNITS_INFLIGHT.set(
        meter
            .i64_up_down_counter("units_inflight")
            .with_description("Units dispatched but not yet completed")
            .build(),
    );

    let _ = UNITS_FAILED.set(
        meter
            .u64_counter("units_failed")
            .with_description("Units whose transform failed or panicked")
            .build(),
    );

    let _ = UNIT_LATENCY_US.set(
        meter
            .f64_histogram("unit_latency")
            .with_unit("us")
            .with_description("Dispatch-to-completion latency")
            .build(),
    );

    let _ = REQUESTS_REJECTED.set(
        meter
            .u64_counter("requests_rejected")
            .with_description("HTTP requests answered with an error status")
            .build(),
    );
}

#[cfg(feature = "metrics")]
fn record_dispatch() {
    if let Some(counter) = UNITS_DISPATCHED.get() {
        counter.add(1, &[]);
    }
    if let Some(counter) = UNITS_INFLIGHT.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
fn record_dispatch() {}

#[cfg(feature = "metrics")]
fn record_completion(elapsed: Duration) {
    if let Some(counter) = UNITS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
    if let Some(histogram) = UNIT_LATENCY_US.get() {
        histogram.record(elapsed.as_micros() as f64, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
fn record_completion(_elapsed: Duration) {}

#[cfg(feature = "metrics")]
fn record_failure() {
    if let Some(counter) = UNITS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
    if let Some(counter) = UNITS_FAILED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
fn record_failure() {}

#[cfg(feature = "metrics")]
pub fn increment_requests_rejected(status: u16) {
    if let Some(counter) = REQUESTS_REJECTED.get() {
        counter.add(1, &[KeyValue::new("status", i64::from(status))]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_requests_rejected(_status: u16) {}

/// Feeds unit lifecycle events into the metric handles above.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsObserver;

impl Observer for MetricsObserver {
    fn on_dispatch(&self, _id: HashId) {
        record_dispatch();
    }

    fn on_complete(&self, _id: HashId, elapsed: Duration) {
        record_completion(elapsed);
    }

    fn on_failure(&self, _id: HashId, _error: &Error) {
        record_failure();
    }

    fn on_abandon(&self, _id: HashId) {
        record_failure();
    }
}
