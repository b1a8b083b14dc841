//! Output backends for normalized log events.
//!
//! Every connection gets its own instance of each enabled sink. An instance
//! owns a bounded queue and a delivery task; [`Sink::send`] only enqueues, the
//! task does all the network work.

pub mod config;
pub mod conversions;
pub mod datadog;
pub mod errors;
pub mod metrics_defs;
pub mod queue;
pub mod registry;
pub mod scalyr;

use async_trait::async_trait;
use shared::event::LogEvent;
use std::net::SocketAddr;

pub use errors::{RegistryError, SinkError};
pub use registry::{Registry, SinkConfig};

/// The inbound connection a sink instance is created for.
#[derive(Clone, Debug)]
pub struct ClientInfo {
    pub id: u64,
    pub peer: SocketAddr,
    /// Span of the connection, parent of every sink span.
    pub span: tracing::Span,
}

impl ClientInfo {
    pub fn new(id: u64, peer: SocketAddr, span: tracing::Span) -> Self {
        ClientInfo { id, peer, span }
    }

    pub(crate) fn sink_span(&self, name: &'static str) -> tracing::Span {
        tracing::info_span!(parent: &self.span, "sink", sink = name)
    }
}

#[async_trait]
pub trait Sink: Send {
    fn name(&self) -> &'static str;

    /// Derives the sink's representation of the event and queues it.
    ///
    /// Waits while the queue is full. Never performs network I/O.
    async fn send(&mut self, event: &LogEvent);

    /// Signals the end of the stream and waits for the delivery task to
    /// flush and exit.
    async fn close(self: Box<Self>) -> Result<(), SinkError>;
}
