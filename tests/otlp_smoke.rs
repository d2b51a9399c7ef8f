use greenhouse_app::{LogFormat, TelemetryConfig, init_telemetry, otlp};

fn config(otlp_enabled: bool) -> TelemetryConfig {
    TelemetryConfig {
        service_name: "greenhouse-app-test".into(),
        service_instance_id: "instance-test".into(),
        otlp_endpoint: "http://localhost:4317".into(),
        otlp_enabled,
        log_format: LogFormat::Text,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn otlp_providers_build_without_a_collector() {
    let providers = otlp::build_providers(&config(true)).expect("otlp providers build");
    let _ = providers.tracer.shutdown();
    let _ = providers.logger.shutdown();
}

#[test]
fn init_is_idempotent() {
    init_telemetry(&config(false)).expect("first init");
    init_telemetry(&config(false)).expect("second init is a no-op");
    tracing::info!("telemetry initialised twice");
}
