use std::time::Duration;

use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{Resource, logs::SdkLoggerProvider, trace::SdkTracerProvider};

use crate::error::TelemetryError;
use crate::init::TelemetryConfig;

const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();
static LOGGER_PROVIDER: OnceCell<SdkLoggerProvider> = OnceCell::new();

/// Tracer and logger providers exporting to the configured OTLP endpoint.
#[derive(Clone)]
pub struct OtlpProviders {
    pub tracer: SdkTracerProvider,
    pub logger: SdkLoggerProvider,
}

/// Builds both OTLP pipelines over plaintext gRPC.
///
/// Exporters connect lazily, so an unreachable collector does not fail here;
/// export errors surface through the SDK's own reporting.
pub fn build_providers(cfg: &TelemetryConfig) -> Result<OtlpProviders, TelemetryError> {
    let span_exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(cfg.otlp_endpoint.clone())
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;

    let log_exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(cfg.otlp_endpoint.clone())
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;

    let trace_resource = Resource::builder_empty()
        .with_attributes([KeyValue::new("service.name", cfg.service_name.clone())])
        .build();

    let log_resource = Resource::builder_empty()
        .with_attributes([
            KeyValue::new("service.name", cfg.service_name.clone()),
            KeyValue::new("service.instance.id", cfg.service_instance_id.clone()),
        ])
        .build();

    let tracer = SdkTracerProvider::builder()
        .with_resource(trace_resource)
        .with_batch_exporter(span_exporter)
        .build();

    let logger = SdkLoggerProvider::builder()
        .with_resource(log_resource)
        .with_batch_exporter(log_exporter)
        .build();

    Ok(OtlpProviders { tracer, logger })
}

/// Makes the providers process-wide so [`shutdown`] can flush them.
pub(crate) fn register_providers(providers: &OtlpProviders) {
    if TRACER_PROVIDER.set(providers.tracer.clone()).is_err() {
        tracing::warn!("otlp tracer provider already registered; skipping overwrite");
    }
    if LOGGER_PROVIDER.set(providers.logger.clone()).is_err() {
        tracing::warn!("otlp logger provider already registered; skipping overwrite");
    }
    global::set_tracer_provider(providers.tracer.clone());
}

/// Flushes pending spans and log records, then stops both pipelines.
pub fn shutdown() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(err) = provider.shutdown() {
            tracing::warn!(error = %err, "failed to shut down tracer provider");
        }
    }
    if let Some(provider) = LOGGER_PROVIDER.get() {
        // Nothing logged after this point reaches the collector.
        if let Err(err) = provider.shutdown() {
            tracing::warn!(error = %err, "failed to shut down logger provider");
        }
    }
}
