use std::future::Future;
use std::time::Duration;

use tracing::{field, info, info_span};

use crate::config::DEFAULT_REQUEST_INTERVAL;
use crate::init::SPAN_EVENT_TARGET;
use crate::metrics::RequestCounter;
use crate::severity::Severity;

pub const SPAN_NAME: &str = "process_request";
pub const PROCESSED_MARKER: &str = "Request processed";

/// Waits between two simulated requests.
pub trait Pause {
    fn pause(&mut self, interval: Duration) -> impl Future<Output = ()> + Send;
}

/// Pauses on the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioPause;

impl Pause for TokioPause {
    fn pause(&mut self, interval: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(interval)
    }
}

/// One unit of simulated work, identified by its sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulatedRequest {
    pub number: u64,
    pub severity: Option<Severity>,
}

/// Generates one request, with its span, log lines and counter increment, per tick.
#[derive(Debug)]
pub struct RequestSimulator<P> {
    counter: RequestCounter,
    pause: P,
    interval: Duration,
    sequence: u64,
}

impl<P: Pause> RequestSimulator<P> {
    pub fn new(counter: RequestCounter, pause: P) -> Self {
        Self {
            counter,
            pause,
            interval: DEFAULT_REQUEST_INTERVAL,
            sequence: 0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sequence number of the last processed request; 0 before the first one.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn counter(&self) -> &RequestCounter {
        &self.counter
    }

    /// Runs a single iteration. The span is closed before this returns.
    pub fn process_next(&mut self) -> SimulatedRequest {
        self.sequence += 1;
        let number = self.sequence;

        let span = info_span!(SPAN_NAME, request.number = field::Empty);
        let _entered = span.enter();

        self.counter.inc();
        info!("Processing request {number}");

        let severity = Severity::for_request(number);
        if let Some(severity) = severity {
            severity.emit();
        }

        span.record("request.number", number);
        info!(target: SPAN_EVENT_TARGET, "{PROCESSED_MARKER}");

        SimulatedRequest { number, severity }
    }

    /// Processes `iterations` requests, pausing after each one.
    pub async fn run_for(&mut self, iterations: u64) -> Vec<SimulatedRequest> {
        let mut processed = Vec::new();
        for _ in 0..iterations {
            processed.push(self.process_next());
            self.pause.pause(self.interval).await;
        }
        processed
    }

    /// Processes requests until the future is dropped.
    pub async fn run(mut self) {
        loop {
            self.process_next();
            self.pause.pause(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::span_recorder;
    use prometheus::Registry;
    use tracing_subscriber::{Registry as SubscriberRegistry, layer::SubscriberExt};

    #[derive(Default)]
    struct RecordingPause {
        calls: Vec<Duration>,
    }

    impl Pause for RecordingPause {
        fn pause(&mut self, interval: Duration) -> impl Future<Output = ()> + Send {
            self.calls.push(interval);
            std::future::ready(())
        }
    }

    fn simulator() -> RequestSimulator<RecordingPause> {
        let counter = RequestCounter::register(&Registry::new()).expect("register counter");
        RequestSimulator::new(counter, RecordingPause::default())
    }

    #[test]
    fn sequence_starts_at_one() {
        let mut sim = simulator();
        assert_eq!(sim.sequence(), 0);
        assert_eq!(sim.counter().get(), 0);

        let first = sim.process_next();
        assert_eq!(first.number, 1);
        assert_eq!(first.severity, Some(Severity::Debug));
        assert_eq!(sim.counter().get(), 1);
    }

    #[test]
    fn counter_tracks_every_iteration() {
        let mut sim = simulator();
        for expected in 1..=25 {
            let request = sim.process_next();
            assert_eq!(request.number, expected);
            assert_eq!(sim.counter().get(), expected);
        }
    }

    #[tokio::test]
    async fn run_for_pauses_after_each_request() {
        let mut sim = simulator().with_interval(Duration::from_millis(5));
        let processed = sim.run_for(3).await;

        let numbers: Vec<u64> = processed.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(sim.pause.calls, vec![Duration::from_millis(5); 3]);
    }

    #[test]
    fn span_is_closed_when_iteration_returns() {
        let (layer, store) = span_recorder();
        let subscriber = SubscriberRegistry::default().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut sim = simulator();
        sim.process_next();

        let capture = store.lock().expect("capture lock");
        assert_eq!(capture.opened, 1);
        assert_eq!(capture.spans.len(), 1);
        assert_eq!(capture.spans[0].name, SPAN_NAME);
        assert_eq!(capture.spans[0].request_number, Some(1));
        assert_eq!(capture.spans[0].events, vec![
            "Processing request 1".to_string(),
            Severity::Debug.message().to_string(),
            PROCESSED_MARKER.to_string(),
        ]);
    }
}
