pub mod event;
pub mod metrics_defs;
