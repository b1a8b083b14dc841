//! Metrics definitions for the sinks.

use shared::metrics_defs::{MetricDef, MetricType};

pub const EVENTS_DROPPED: MetricDef = MetricDef {
    name: "sink.events.dropped",
    metric_type: MetricType::Counter,
    description: "Events that could not be handed to a stopped delivery task. Tagged with sink.",
};

pub const SCALYR_BATCHES_SENT: MetricDef = MetricDef {
    name: "scalyr.batches.sent",
    metric_type: MetricType::Counter,
    description: "Batches accepted by the Scalyr API",
};

pub const SCALYR_BATCHES_FAILED: MetricDef = MetricDef {
    name: "scalyr.batches.failed",
    metric_type: MetricType::Counter,
    description: "Batches given up on. Tagged with reason.",
};

pub const SCALYR_BATCH_SIZE: MetricDef = MetricDef {
    name: "scalyr.batch.size",
    metric_type: MetricType::Histogram,
    description: "Number of events per request",
};

pub const SCALYR_MAX_BATCH_EVENTS: MetricDef = MetricDef {
    name: "scalyr.batch.max_events",
    metric_type: MetricType::Gauge,
    description: "Current adaptive ceiling on events per request",
};

pub const DATADOG_LINES_SENT: MetricDef = MetricDef {
    name: "datadog.lines.sent",
    metric_type: MetricType::Counter,
    description: "Lines written to the Datadog intake",
};

pub const DATADOG_CONNECT_FAILURES: MetricDef = MetricDef {
    name: "datadog.connect.failures",
    metric_type: MetricType::Counter,
    description: "Failed connection attempts to the Datadog intake",
};

pub const DATADOG_WRITE_FAILURES: MetricDef = MetricDef {
    name: "datadog.write.failures",
    metric_type: MetricType::Counter,
    description: "Failed writes, the event is requeued",
};

pub const ALL_METRICS: &[MetricDef] = &[
    EVENTS_DROPPED,
    SCALYR_BATCHES_SENT,
    SCALYR_BATCHES_FAILED,
    SCALYR_BATCH_SIZE,
    SCALYR_MAX_BATCH_EVENTS,
    DATADOG_LINES_SENT,
    DATADOG_CONNECT_FAILURES,
    DATADOG_WRITE_FAILURES,
];
