//! Timing measures, emitted as `tracing` events on the `apigraph::metrology` target.
//!
//! Measures never affect the results: they are only logged.

use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Measures of one service request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceMeasures {
    pub invocations: usize,
    /// Triples produced by the JSON-LD expansion, before any rule.
    pub triples: usize,
    /// Time spent building and running the Web API queries, summed over the invocations.
    pub api_time: Duration,
}

impl ServiceMeasures {
    pub fn add(&mut self, triples: usize, api_time: Duration) {
        self.invocations += 1;
        self.triples += triples;
        self.api_time += api_time;
    }
}

pub fn report_service(service: &str, total: Duration, measures: &ServiceMeasures) {
    info!(
        target: "apigraph::metrology",
        service,
        total_ms = total.as_millis(),
        api_ms = measures.api_time.as_millis(),
        invocations = measures.invocations,
        triples = measures.triples,
        "service request completed"
    );
}

pub fn report_composition(services: usize, unmatched: usize, total: Duration) {
    info!(
        target: "apigraph::metrology",
        services,
        unmatched,
        total_ms = total.as_millis(),
        "composition completed"
    );
}
