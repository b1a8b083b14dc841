use shared::metrics_defs::{MetricDef, MetricType};

pub const CONNECTIONS_ACCEPTED: MetricDef = MetricDef {
    name: "connections.accepted",
    metric_type: MetricType::Counter,
    description: "Inbound connections accepted by the listener",
};

pub const CONNECTIONS_ACTIVE: MetricDef = MetricDef {
    name: "connections.active",
    metric_type: MetricType::Gauge,
    description: "Number of connections currently being read",
};

pub const EVENTS_PARSED: MetricDef = MetricDef {
    name: "events.parsed",
    metric_type: MetricType::Counter,
    description: "Lines turned into events and dispatched to the sinks",
};

pub const PARSE_FAILURES: MetricDef = MetricDef {
    name: "events.parse_failures",
    metric_type: MetricType::Counter,
    description: "Lines rejected, closing their connection. Tagged with reason.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CONNECTIONS_ACCEPTED,
    CONNECTIONS_ACTIVE,
    EVENTS_PARSED,
    PARSE_FAILURES,
];
