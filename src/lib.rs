pub mod config;
pub mod critical;
pub mod error;
pub mod init;
pub mod metrics;
pub mod otlp;
pub mod severity;
pub mod simulator;
pub mod testutil;

pub use config::AppConfig;
pub use critical::CriticalLogLayer;
pub use error::TelemetryError;
pub use init::{LogFormat, TelemetryConfig, init_telemetry, telemetry_subscriber};
pub use metrics::{MetricsServer, RequestCounter};
pub use otlp::{OtlpProviders, shutdown};
pub use severity::Severity;
pub use simulator::{Pause, RequestSimulator, SimulatedRequest, TokioPause};
