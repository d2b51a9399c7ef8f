use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::init::{LogFormat, TelemetryConfig};

pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";
pub const DEFAULT_SERVICE_NAME: &str = "greenhouse-app";
pub const DEFAULT_INSTANCE_ID: &str = "instance-1";
pub const DEFAULT_METRICS_PORT: u16 = 8000;
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_secs(2);

/// Process configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub metrics_addr: SocketAddr,
    pub request_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let otlp_endpoint = parse_endpoint(get("OTEL_EXPORTER_OTLP_ENDPOINT").as_deref())?;

        let service_name = get("OTEL_SERVICE_NAME")
            .or_else(|| get("SERVICE_NAME"))
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
        let service_instance_id =
            get("SERVICE_INSTANCE_ID").unwrap_or_else(|| DEFAULT_INSTANCE_ID.to_string());

        let otlp_enabled = !parse_bool("OTEL_SDK_DISABLED", get("OTEL_SDK_DISABLED").as_deref())?;
        let log_format = parse_log_format(get("LOG_FORMAT").as_deref())?;

        let port = match get("METRICS_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid METRICS_PORT value '{raw}'"))?,
            None => DEFAULT_METRICS_PORT,
        };

        Ok(Self {
            telemetry: TelemetryConfig {
                service_name,
                service_instance_id,
                otlp_endpoint,
                otlp_enabled,
                log_format,
            },
            metrics_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            request_interval: DEFAULT_REQUEST_INTERVAL,
        })
    }
}

fn parse_endpoint(value: Option<&str>) -> Result<String> {
    let Some(value) = value else {
        return Ok(DEFAULT_OTLP_ENDPOINT.to_string());
    };

    let trimmed = value.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(anyhow!(
            "invalid OTEL_EXPORTER_OTLP_ENDPOINT '{trimmed}', expected an http:// or https:// url"
        ));
    }

    Ok(trimmed.to_string())
}

fn parse_bool(key: &str, value: Option<&str>) -> Result<bool> {
    let Some(value) = value else {
        return Ok(false);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(anyhow!("invalid {key} value '{other}', expected true or false")),
    }
}

fn parse_log_format(value: Option<&str>) -> Result<LogFormat> {
    let Some(value) = value else {
        return Ok(LogFormat::Text);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "text" | "pretty" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(anyhow!(
            "unsupported LOG_FORMAT '{other}', expected one of text, json"
        )),
    }
}
