use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "gateway.request.duration",
    metric_type: MetricType::Histogram,
    description: "Gateway request duration in seconds. Tagged with status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "gateway.requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of gateway requests currently being processed",
};

pub const UPSTREAM_ERRORS: MetricDef = MetricDef {
    name: "gateway.upstream.errors",
    metric_type: MetricType::Counter,
    description: "Forwarded requests that failed. Tagged with kind (unavailable, timeout).",
};

// TODO: all metrics must be added here for now, this can be done dynamically with a macro in the future.
pub const ALL_METRICS: &[MetricDef] = &[REQUEST_DURATION, REQUESTS_INFLIGHT, UPSTREAM_ERRORS];
