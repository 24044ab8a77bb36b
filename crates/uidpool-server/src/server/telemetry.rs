//! # Telemetry Features
//!
//! Log output is always on: events go through `tracing-subscriber`'s pretty
//! `fmt` layer, filtered by `RUST_LOG` (default `info`). On top of that,
//! OpenTelemetry export is opt-in:
//!
//! - `tracing`: export spans. Each `POST /uid` request opens one span; the
//!   allocator worker thread logs its store reads and writes as events.
//! - `metrics`: export the allocation instruments listed below.
//! - `stdout`: print exported spans and metrics to stdout every 5 seconds.
//!
//! ## Feature constraints
//!
//! - `stdout` requires at least one of `tracing` or `metrics`.
//!
//! ## Metrics
//!
//! All are recorded by the `POST /uid` handler:
//!
//! - `requests` - allocation requests received
//! - `requests_inflight` - requests waiting on the single allocator worker;
//!   a steady rise means the store's writes are the bottleneck
//! - `ids_issued` - identifiers persisted and returned
//! - `allocation_errors` - persist failures, depletion, timeouts and requests
//!   refused during shutdown
//! - `request_duration` - receipt to reply, in ms, dominated by the store's
//!   `fsync`
//!
//! ## Example usage
//!
//! ```bash
//! RUST_LOG=debug cargo run -p uidpool-server --features tracing,metrics,stdout
//! ```

// Disallow using `stdout` without `tracing` or `metrics`
#[cfg(all(feature = "stdout", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!(
    "The 'stdout' feature requires at least one of 'tracing' or 'metrics' to be enabled."
);

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// Metrics-specific imports
#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

// Either
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

// Tracing-specific imports
#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;

/// Exporter pipelines that must be flushed before the process exits.
///
/// Empty when no OpenTelemetry feature is enabled.
pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down the exporters. Errors are printed, since the
    /// subscriber that would log them may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "tracing")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

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

/// Installs the global subscriber and, per enabled features, the
/// OpenTelemetry tracer and meter for the `uidpool` service.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "tracing")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "tracing")]
    let tracer_provider = init_tracer();

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder("uidpool")
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "tracing")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("uidpool")
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
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    builder.build()
}

#[cfg(feature = "tracing")]
fn init_tracer() -> sdktrace::SdkTracerProvider {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::SpanExporter;
        let exporter = SpanExporter::default();
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();
        builder.with_span_processor(batch)
    };

    builder.build()
}

/// Instruments recorded by the `POST /uid` handler.
#[cfg(feature = "metrics")]
struct AllocationMetrics {
    requests: Counter<u64>,
    inflight: UpDownCounter<i64>,
    ids_issued: Counter<u64>,
    errors: Counter<u64>,
    duration_ms: Histogram<f64>,
}

#[cfg(feature = "metrics")]
static METRICS: OnceLock<AllocationMetrics> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = METRICS.set(AllocationMetrics {
        requests: meter
            .u64_counter("requests")
            .with_description("Allocation requests received on POST /uid")
            .build(),
        inflight: meter
            .i64_up_down_counter("requests_inflight")
            .with_description("Allocation requests waiting on the allocator worker")
            .build(),
        ids_issued: meter
            .u64_counter("ids_issued")
            .with_description("Identifiers persisted and returned to a client")
            .build(),
        errors: meter
            .u64_counter("allocation_errors")
            .with_description("Allocation requests answered with an error status")
            .build(),
        duration_ms: meter
            .f64_histogram("request_duration")
            .with_unit("ms")
            .with_description("Time from request receipt to the allocator's reply")
            .build(),
    });
}

/// Runs `record` against the instruments when metrics export is enabled and
/// initialized. Without the `metrics` feature every recorder is a no-op.
#[cfg(feature = "metrics")]
fn with_metrics(record: impl FnOnce(&AllocationMetrics)) {
    if let Some(metrics) = METRICS.get() {
        record(metrics);
    }
}

/// Counts one allocation request.
pub fn increment_requests() {
    #[cfg(feature = "metrics")]
    with_metrics(|m| m.requests.add(1, &[]));
}

/// Marks a request as waiting on the allocator worker.
pub fn increment_requests_inflight() {
    #[cfg(feature = "metrics")]
    with_metrics(|m| m.inflight.add(1, &[]));
}

/// Marks a request as answered or abandoned by its client.
pub fn decrement_requests_inflight() {
    #[cfg(feature = "metrics")]
    with_metrics(|m| m.inflight.add(-1, &[]));
}

/// Counts one identifier handed to a client.
pub fn increment_ids_issued() {
    #[cfg(feature = "metrics")]
    with_metrics(|m| m.ids_issued.add(1, &[]));
}

/// Counts one request answered with an error status.
pub fn increment_allocation_errors() {
    #[cfg(feature = "metrics")]
    with_metrics(|m| m.errors.add(1, &[]));
}

/// Records how long one allocation request took, in milliseconds.
pub fn record_request_duration(duration_ms: f64) {
    #[cfg(feature = "metrics")]
    with_metrics(|m| m.duration_ms.record(duration_ms, &[]));
    #[cfg(not(feature = "metrics"))]
    let _ = duration_ms;
}
