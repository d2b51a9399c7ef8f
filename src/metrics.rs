use std::convert::Infallible;
use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::TelemetryError;

pub const REQUESTS_TOTAL: &str = "app_requests_total";
const REQUESTS_TOTAL_HELP: &str = "Total number of requests received";

/// Cumulative count of simulated requests. Starts at zero for every registry.
#[derive(Clone, Debug)]
pub struct RequestCounter {
    inner: IntCounter,
}

impl RequestCounter {
    pub fn register(registry: &Registry) -> Result<Self, TelemetryError> {
        let inner = IntCounter::new(REQUESTS_TOTAL, REQUESTS_TOTAL_HELP)?;
        registry.register(Box::new(inner.clone()))?;
        Ok(Self { inner })
    }

    pub fn inc(&self) {
        self.inner.inc();
    }

    pub fn get(&self) -> u64 {
        self.inner.get()
    }
}

/// Encodes every metric in `registry` in the Prometheus text format.
pub fn render(registry: &Registry) -> Result<Vec<u8>, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}

/// Plaintext HTTP endpoint serving a registry for pull-based scraping.
#[derive(Debug)]
pub struct MetricsServer {
    listener: TcpListener,
    registry: Registry,
}

impl MetricsServer {
    /// Binds eagerly so an occupied port fails at startup.
    pub async fn bind(addr: SocketAddr, registry: Registry) -> Result<Self, TelemetryError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TelemetryError::Bind { addr, source })?;
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the listener fails.
    pub async fn serve(self) -> Result<(), TelemetryError> {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "metrics endpoint listening");
        }

        loop {
            let (stream, _) = self
                .listener
                .accept()
                .await
                .map_err(TelemetryError::Accept)?;

            let io = TokioIo::new(stream);
            let registry = self.registry.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| handle(req, registry.clone()));
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(error = %err, "metrics connection error");
                }
            });
        }
    }
}

async fn handle(
    req: Request<Incoming>,
    registry: Registry,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match req.uri().path() {
        "/" | "/metrics" => match render(&registry) {
            Ok(body) => {
                let mut response = body_response(StatusCode::OK, body);
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(prometheus::TEXT_FORMAT));
                response
            }
            Err(err) => {
                error!(error = %err, "failed to encode metrics");
                body_response(StatusCode::INTERNAL_SERVER_ERROR, "encoding failed")
            }
        },
        _ => body_response(StatusCode::NOT_FOUND, "not found"),
    };
    Ok(response)
}

fn body_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_zero_and_counts_increments() {
        let registry = Registry::new();
        let counter = RequestCounter::register(&registry).expect("register");
        assert_eq!(counter.get(), 0);

        counter.inc();
        counter.inc();
        counter.inc();
        assert_eq!(counter.get(), 3);
    }

    #[test]
    fn registering_twice_in_one_registry_fails() {
        let registry = Registry::new();
        RequestCounter::register(&registry).expect("first register");
        assert!(matches!(
            RequestCounter::register(&registry),
            Err(TelemetryError::Metrics(_))
        ));
    }

    #[test]
    fn fresh_registry_resets_the_count() {
        let first = Registry::new();
        let counter = RequestCounter::register(&first).expect("register");
        counter.inc();

        let second = Registry::new();
        let restarted = RequestCounter::register(&second).expect("register");
        assert_eq!(restarted.get(), 0);
    }

    #[test]
    fn render_exposes_only_the_request_counter() {
        let registry = Registry::new();
        let counter = RequestCounter::register(&registry).expect("register");
        counter.inc();
        counter.inc();

        let text = String::from_utf8(render(&registry).expect("render")).expect("utf8");
        assert!(text.contains("# HELP app_requests_total Total number of requests received"));
        assert!(text.contains("# TYPE app_requests_total counter"));
        assert!(text.contains("app_requests_total 2"));

        let samples: Vec<&str> = text
            .lines()
            .filter(|line| !line.starts_with('#') && !line.is_empty())
            .collect();
        assert_eq!(samples, vec!["app_requests_total 2"]);
    }
}
