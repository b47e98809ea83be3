//! Logging and trace export.
//!
//! Logs always go to stderr so that stdout carries nothing but YAML.

use std::io::IsTerminal;

use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
	layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

/// `service.name` reported when `OTEL_SERVICE_NAME` is unset.
const SERVICE_NAME: &str = "kubectl-save";

/// Keeps the trace exporter alive; spans are flushed when this is dropped.
pub struct TelemetryGuard {
	tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
	fn drop(&mut self) {
		if let Some(provider) = self.tracer_provider.take() {
			if let Err(e) = provider.shutdown() {
				eprintln!("Failed to shutdown tracer provider: {e}");
			}
		}
	}
}

fn otel_export_enabled() -> bool {
	std::env::var(opentelemetry_otlp::OTEL_EXPORTER_OTLP_ENDPOINT).is_ok()
		|| std::env::var(opentelemetry_otlp::OTEL_EXPORTER_OTLP_TRACES_ENDPOINT).is_ok()
}

/// Level filter: `--log-level` wins over `RUST_LOG`, which wins over `info`.
fn filter(log_level: Option<Level>) -> EnvFilter {
	match log_level {
		Some(level) => EnvFilter::new(level.as_str()),
		None => EnvFilter::builder()
			.with_default_directive(Level::INFO.into())
			.from_env_lossy(),
	}
}

/// Pretty output for a human at a terminal, JSON lines for everything else.
fn fmt_layer<S>() -> Box<dyn Layer<S> + Send + Sync>
where
	S: Subscriber + for<'span> LookupSpan<'span>,
{
	let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
	if std::io::stderr().is_terminal() {
		layer.pretty().boxed()
	} else {
		layer.json().boxed()
	}
}

/// Install the global subscriber.
///
/// When `OTEL_EXPORTER_OTLP_ENDPOINT` (or the traces-specific variant) is set,
/// spans are also exported over OTLP, configured by the standard `OTEL_*`
/// variables.
pub fn init(log_level: Option<Level>) -> Result<TelemetryGuard> {
	let registry = tracing_subscriber::registry()
		.with(filter(log_level))
		.with(fmt_layer());

	if !otel_export_enabled() {
		registry.init();
		return Ok(TelemetryGuard {
			tracer_provider: None,
		});
	}

	let tracer_provider = tracer_provider()?;
	let otel_layer = tracing_opentelemetry::layer()
		.with_error_records_to_exceptions(true)
		.with_tracer(tracer_provider.tracer(SERVICE_NAME));
	opentelemetry::global::set_tracer_provider(tracer_provider.clone());

	registry.with(otel_layer).init();

	Ok(TelemetryGuard {
		tracer_provider: Some(tracer_provider),
	})
}

fn tracer_provider() -> Result<SdkTracerProvider> {
	use opentelemetry_sdk::Resource;

	// The builder already honours OTEL_SERVICE_NAME and OTEL_RESOURCE_ATTRIBUTES.
	let mut resource = Resource::builder();
	if std::env::var("OTEL_SERVICE_NAME").is_err() {
		resource = resource.with_service_name(SERVICE_NAME);
	}

	let protocol = std::env::var(opentelemetry_otlp::OTEL_EXPORTER_OTLP_PROTOCOL);
	let exporter = match protocol
		.as_deref()
		.unwrap_or(opentelemetry_otlp::OTEL_EXPORTER_OTLP_PROTOCOL_DEFAULT)
	{
		"grpc" => opentelemetry_otlp::SpanExporter::builder()
			.with_tonic()
			.build()?,
		_ => opentelemetry_otlp::SpanExporter::builder()
			.with_http()
			.build()?,
	};

	Ok(SdkTracerProvider::builder()
		.with_resource(resource.build())
		.with_batch_exporter(exporter)
		.build())
}
