use once_cell::sync::OnceCell;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use tracing::{Metadata, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    filter::{FilterExt, filter_fn},
    fmt,
    prelude::*,
};

use crate::critical::CriticalLogLayer;
use crate::error::TelemetryError;
use crate::otlp::{self, OtlpProviders};
use crate::severity::CRITICAL_TARGET;

/// Target reserved for span event markers; never written out as a log line.
pub const SPAN_EVENT_TARGET: &str = "greenhouse_app::span_event";

const DEFAULT_FILTER: &str = "debug,h2=warn,hyper=warn,tonic=warn,tower=warn,opentelemetry=warn";

// Crates on the export path. Forwarding their events to the log exporter would feed back into it.
const TRANSPORT_TARGETS: &[&str] = &["h2", "hyper", "tonic", "tower", "opentelemetry"];

static INITED: OnceCell<()> = OnceCell::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_instance_id: String,
    pub otlp_endpoint: String,
    /// When false only local log output is installed.
    pub otlp_enabled: bool,
    pub log_format: LogFormat,
}

/// Installs the global subscriber: local fmt output plus OTLP spans and logs.
///
/// `RUST_LOG` overrides the default directives. Calling it again after a
/// successful init is a no-op.
pub fn init_telemetry(cfg: &TelemetryConfig) -> Result<(), TelemetryError> {
    if INITED.get().is_some() {
        return Ok(());
    }

    let directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|directives| !directives.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());

    let providers = if cfg.otlp_enabled {
        let providers = otlp::build_providers(cfg)?;
        otlp::register_providers(&providers);
        Some(providers)
    } else {
        None
    };

    telemetry_subscriber(&directives, cfg.log_format, providers.as_ref()).try_init()?;

    let _ = INITED.set(());
    tracing::debug!(
        endpoint = %cfg.otlp_endpoint,
        otlp = cfg.otlp_enabled,
        service = %cfg.service_name,
        "telemetry initialised"
    );
    Ok(())
}

/// Builds the subscriber without installing it.
///
/// `directives` only gate log output: the fmt layers, the OTLP log bridge and
/// the critical exporter. The span layer records every span and span event
/// outside the transport crates, so a `warn` filter still exports traces.
pub fn telemetry_subscriber(
    directives: &str,
    format: LogFormat,
    providers: Option<&OtlpProviders>,
) -> impl Subscriber + Send + Sync + use<> {
    let (text_layer, json_layer) = match format {
        LogFormat::Text => (
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_filter(env_filter(directives).and(filter_fn(is_log_line))),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_filter(env_filter(directives).and(filter_fn(is_log_line))),
            ),
        ),
    };

    let (span_layer, log_layer, critical_layer) = match providers {
        Some(providers) => {
            let tracer = providers.tracer.tracer("greenhouse-app");
            (
                Some(
                    tracing_opentelemetry::layer()
                        .with_tracer(tracer)
                        .with_filter(filter_fn(is_traced)),
                ),
                Some(
                    OpenTelemetryTracingBridge::new(&providers.logger)
                        .with_filter(env_filter(directives).and(filter_fn(is_exported_log))),
                ),
                Some(
                    CriticalLogLayer::new(&providers.logger)
                        .with_filter(env_filter(directives)),
                ),
            )
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(span_layer)
        .with(log_layer)
        .with(critical_layer)
}

fn env_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn is_log_line(meta: &Metadata<'_>) -> bool {
    meta.target() != SPAN_EVENT_TARGET
}

fn is_exported_log(meta: &Metadata<'_>) -> bool {
    is_log_line(meta) && meta.target() != CRITICAL_TARGET && !is_transport_target(meta.target())
}

fn is_traced(meta: &Metadata<'_>) -> bool {
    !is_transport_target(meta.target())
}

fn is_transport_target(target: &str) -> bool {
    TRANSPORT_TARGETS.iter().any(|prefix| {
        target.strip_prefix(prefix).is_some_and(|rest| {
            rest.is_empty() || rest.starts_with("::") || rest.starts_with(['_', '-'])
        })
    })
}
