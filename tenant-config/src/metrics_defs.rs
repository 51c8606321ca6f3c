//! Metrics definitions for tenant configuration resolution.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "tenant_config.cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of resolutions served from a verified cache entry",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "tenant_config.cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of resolutions that had to go to the registry",
};

pub const INTEGRITY_FAILURE: MetricDef = MetricDef {
    name: "tenant_config.integrity_failure",
    metric_type: MetricType::Counter,
    description: "Signed payloads that failed verification. Tagged with source (cache, registry).",
};

pub const REGISTRY_FETCH_DURATION: MetricDef = MetricDef {
    name: "tenant_config.registry.duration",
    metric_type: MetricType::Histogram,
    description: "Time to fetch a tenant configuration from the registry in seconds. Tagged with outcome.",
};

pub const CONFIG_MUTATION: MetricDef = MetricDef {
    name: "tenant_config.mutation",
    metric_type: MetricType::Counter,
    description: "Number of acknowledged configuration writes. Tagged with operation.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CACHE_HIT,
    CACHE_MISS,
    INTEGRITY_FAILURE,
    REGISTRY_FETCH_DURATION,
    CONFIG_MUTATION,
];
