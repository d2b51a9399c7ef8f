use anyhow::{Context, Result};
use greenhouse_app::{
    AppConfig, MetricsServer, RequestCounter, RequestSimulator, TokioPause, init_telemetry,
    shutdown,
};
use prometheus::Registry;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    init_telemetry(&config.telemetry).context("initialising telemetry")?;

    let registry = Registry::new();
    let counter = RequestCounter::register(&registry)?;
    let server = MetricsServer::bind(config.metrics_addr, registry).await?;

    info!("Greenhouse app started. Generating telemetry data...");

    let simulator =
        RequestSimulator::new(counter, TokioPause).with_interval(config.request_interval);

    let outcome = tokio::select! {
        served = server.serve() => served.context("metrics endpoint stopped"),
        () = simulator.run() => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            info!("interrupt received, flushing telemetry");
            signal.context("listening for ctrl-c")
        }
    };

    shutdown();
    outcome
}
