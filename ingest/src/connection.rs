use crate::config::Config;
use crate::errors::IngestError;
use crate::metrics_defs::{CONNECTIONS_ACTIVE, EVENTS_PARSED, PARSE_FAILURES};
use crate::parser::Parser;
use chrono::Utc;
use futures::StreamExt;
use futures::future::join_all;
use serde_json::Value;
use shared::event::{Attributes, LogEvent, Severity};
use shared::{counter, gauge};
use sinks::Sink;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Framed, LinesCodec};

/// Reads one client connection and fans its events out to the sinks created
/// for it.
pub struct ClientHandler {
    parser: Parser,
    sinks: Vec<Box<dyn Sink>>,
    max_line_size: usize,
    arrival: Instant,
}

impl ClientHandler {
    pub fn new(config: &Config, sinks: Vec<Box<dyn Sink>>) -> Self {
        ClientHandler {
            parser: Parser::new(config.auth.clone()),
            sinks,
            max_line_size: config.max_line_size,
            arrival: Instant::now(),
        }
    }

    pub async fn run<S>(mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        gauge!(CONNECTIONS_ACTIVE).increment(1.0);
        tracing::info!("Client connected");

        match self.read_lines(stream).await {
            Ok(()) => tracing::info!(
                duration_s = self.arrival.elapsed().as_secs(),
                total_events = self.parser.nb_events(),
                "Client disconnected"
            ),
            Err(e) => tracing::error!(error = %e, "Couldn't read from client"),
        }

        self.shutdown().await;
        gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
    }

    /// Consumes lines until end of stream, a read error or a rejected line.
    ///
    /// A rejected line is answered with the error text before the stream is
    /// closed.
    async fn read_lines<S>(&mut self, stream: S) -> Result<(), IngestError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(self.max_line_size));

        while let Some(line) = lines.next().await {
            let line = line?;
            tracing::trace!(line = %line, "Received line");

            match self.parser.parse(&line) {
                Ok(event) => {
                    counter!(EVENTS_PARSED).increment(1);
                    self.dispatch(&event).await;
                }
                Err(e) => {
                    counter!(PARSE_FAILURES, "reason" => e.reason()).increment(1);
                    tracing::error!(error = %e, "Couldn't parse line from client");

                    let stream = lines.get_mut();
                    if let Err(e) = stream.write_all(format!("{e}\n").as_bytes()).await {
                        tracing::info!(error = %e, "Couldn't write bye bye message");
                    }
                    if let Err(e) = stream.shutdown().await {
                        tracing::debug!(error = %e, "Couldn't shut down client stream");
                    }
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    async fn dispatch(&mut self, event: &LogEvent) {
        for sink in &mut self.sinks {
            sink.send(event).await;
        }
    }

    /// Sends the disconnect event if anything was parsed, then flushes and
    /// closes every sink.
    async fn shutdown(mut self) {
        let total_events = self.parser.nb_events();
        if total_events > 0 {
            let mut attributes = Attributes::new();
            attributes.insert("message".into(), Value::from("Client disconnected"));
            attributes.insert("action".into(), Value::from("client_disconnected"));
            attributes.insert(
                "duration".into(),
                Value::from(self.arrival.elapsed().as_secs()),
            );
            attributes.insert("total_events".into(), Value::from(total_events));

            let event = LogEvent::new(Utc::now(), Severity::Debug, attributes);
            self.dispatch(&event).await;
        }

        let closing = self.sinks.into_iter().map(|sink| async move {
            let name = sink.name();
            (name, sink.close().await)
        });
        for (name, result) in join_all(closing).await {
            match result {
                Ok(()) => tracing::debug!(sink = name, "Sink closed"),
                Err(e) => tracing::warn!(sink = name, error = %e, "Sink stopped with an error"),
            }
        }
    }
}
