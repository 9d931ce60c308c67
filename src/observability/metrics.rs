use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub routed_requests_total: IntCounterVec,
    pub open_requests: IntGauge,
    pub routing_latency_seconds: HistogramVec,
    pub lifecycle_transitions_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let routed_requests_total = IntCounterVec::new(
            Opts::new(
                "routed_requests_total",
                "Total routed requests by outcome (matched/fallback/unassigned)",
            ),
            &["outcome"],
        )
        .expect("valid routed_requests_total metric");

        let open_requests = IntGauge::new("open_requests", "Current number of open requests")
            .expect("valid open_requests metric");

        let routing_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "routing_latency_seconds",
                "Latency of routing a new request in seconds",
            ),
            &["outcome"],
        )
        .expect("valid routing_latency_seconds metric");

        let lifecycle_transitions_total = IntCounterVec::new(
            Opts::new(
                "lifecycle_transitions_total",
                "Total request lifecycle transitions by action",
            ),
            &["action"],
        )
        .expect("valid lifecycle_transitions_total metric");

        registry
            .register(Box::new(routed_requests_total.clone()))
            .expect("register routed_requests_total");
        registry
            .register(Box::new(open_requests.clone()))
            .expect("register open_requests");
        registry
            .register(Box::new(routing_latency_seconds.clone()))
            .expect("register routing_latency_seconds");
        registry
            .register(Box::new(lifecycle_transitions_total.clone()))
            .expect("register lifecycle_transitions_total");

        Self {
            registry,
            routed_requests_total,
            open_requests,
            routing_latency_seconds,
            lifecycle_transitions_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
