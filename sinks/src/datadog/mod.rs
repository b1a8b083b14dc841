//! Delivery to the Datadog log intake, one JSON line per event over a
//! long-lived TCP (usually TLS) connection.

pub mod config;
pub mod connection;

use crate::conversions::Conversion;
use crate::metrics_defs::{
    DATADOG_CONNECT_FAILURES, DATADOG_LINES_SENT, DATADOG_WRITE_FAILURES, EVENTS_DROPPED,
};
use crate::queue::{self, QueueReceiver, QueueSender};
use crate::{ClientInfo, Sink, SinkError};
use async_trait::async_trait;
use config::DatadogConfig;
use connection::{Connection, Connector};
use serde_json::Value;
use shared::counter;
use shared::event::{Attributes, LogEvent, Severity};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::Instrument;

pub const NAME: &str = "datadog";

/// Consecutive failed connection attempts after which the sink gives up.
pub const MAX_CONNECT_ATTEMPTS: u32 = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct DatadogEvent {
    pub timestamp_ms: i64,
    pub severity: Severity,
    pub attributes: Attributes,
    pub tags: BTreeMap<String, String>,
}

impl DatadogEvent {
    pub fn from_event(event: &LogEvent, config: &DatadogConfig) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("ddsource".into(), Value::from("logfwd"));
        let mut tags = BTreeMap::new();

        for (key, value) in &event.attributes {
            if key == "@tags" {
                continue;
            }
            if let Some(conversion) = config.message_conversions.get(key) {
                if let Conversion::Rename(target) = conversion {
                    attributes.insert(target.to_string(), value.clone());
                }
            } else if let Some(conversion) = config.tag_conversions.get(key) {
                if let Conversion::Rename(target) = conversion {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    tags.insert(target.to_string(), value);
                }
            } else {
                attributes.insert(key.clone(), value.clone());
            }
        }

        DatadogEvent {
            timestamp_ms: event.timestamp_millis(),
            severity: event.severity,
            attributes,
            tags,
        }
    }

    /// Formats the event as an intake line: `<token> <json>\n`.
    pub fn to_line(&self, token: &str) -> Result<Vec<u8>, serde_json::Error> {
        let mut attributes = self.attributes.clone();
        attributes.insert("timestamp".into(), Value::from(self.timestamp_ms));
        // A `status` sent by the client wins over the severity name.
        attributes
            .entry("status")
            .or_insert_with(|| Value::from(self.severity.as_str()));
        let ddtags = self
            .tags
            .iter()
            .map(|(tag, value)| format!("{tag}:{value}"))
            .collect::<Vec<_>>()
            .join(",");
        attributes.insert("ddtags".into(), Value::from(ddtags));

        let mut line = Vec::with_capacity(token.len() + 256);
        line.extend_from_slice(token.as_bytes());
        line.push(b' ');
        serde_json::to_writer(&mut line, &attributes)?;
        line.push(b'\n');
        Ok(line)
    }
}

pub struct DatadogSink {
    config: Arc<DatadogConfig>,
    queue: QueueSender<DatadogEvent>,
    task: JoinHandle<Result<(), SinkError>>,
    span: tracing::Span,
}

impl DatadogSink {
    pub fn new(client: &ClientInfo, config: Arc<DatadogConfig>, connector: Arc<Connector>) -> Self {
        let span = client.sink_span(NAME);
        let (queue, receiver) = queue::bounded(config.queue_size);

        let forwarder = Forwarder {
            config: config.clone(),
            connector,
            connection: None,
            attempts: 0,
        };
        let task = tokio::spawn(forwarder.run(receiver).instrument(span.clone()));

        DatadogSink {
            config,
            queue,
            task,
            span,
        }
    }
}

#[async_trait]
impl Sink for DatadogSink {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn send(&mut self, event: &LogEvent) {
        let event = DatadogEvent::from_event(event, &self.config);
        if self.queue.send(event).await.is_err() {
            counter!(EVENTS_DROPPED, "sink" => NAME).increment(1);
            tracing::debug!(parent: &self.span, "Forwarder stopped, dropping event");
        }
    }

    async fn close(self: Box<Self>) -> Result<(), SinkError> {
        let _ = self.queue.close().await;
        self.task.await?
    }
}

/// Writes queued events to the intake, reconnecting as needed.
struct Forwarder {
    config: Arc<DatadogConfig>,
    connector: Arc<Connector>,
    connection: Option<Connection>,
    attempts: u32,
}

impl Forwarder {
    async fn run(mut self, mut queue: QueueReceiver<DatadogEvent>) -> Result<(), SinkError> {
        while let Some(event) = queue.pop().await {
            let line = match event.to_line(&self.config.token) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "Could not encode event");
                    continue;
                }
            };

            let connection = match self.connection.take() {
                Some(connection) => connection,
                None => self.connect().await?,
            };
            let connection = self.connection.insert(connection);

            tracing::trace!(line = %String::from_utf8_lossy(&line), "Sending data");
            match connection.write_line(&line).await {
                Ok(()) => counter!(DATADOG_LINES_SENT).increment(1),
                Err(e) => {
                    counter!(DATADOG_WRITE_FAILURES).increment(1);
                    tracing::warn!(error = %e, "Could not send data");
                    self.connection = None;
                    queue.requeue(event);
                }
            }
        }

        if let Some(connection) = self.connection.take()
            && let Err(e) = connection.shutdown().await
        {
            tracing::warn!(error = %e, "Error while closing connection");
        }
        tracing::debug!("Forwarder finished");
        Ok(())
    }

    async fn connect(&mut self) -> Result<Connection, SinkError> {
        loop {
            self.attempts += 1;
            match self.connector.connect().await {
                Ok(connection) => {
                    tracing::debug!(attempts = self.attempts, "Connected");
                    self.attempts = 0;
                    return Ok(connection);
                }
                Err(e) => {
                    counter!(DATADOG_CONNECT_FAILURES).increment(1);
                    if self.attempts >= MAX_CONNECT_ATTEMPTS {
                        tracing::error!(
                            error = %e,
                            attempts = self.attempts,
                            "Could not connect, giving up"
                        );
                        return Err(SinkError::ConnectAttemptsExhausted {
                            attempts: self.attempts,
                        });
                    }

                    let delay = self.config.reconnect_delay() * self.attempts;
                    tracing::warn!(
                        error = %e,
                        attempts = self.attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Could not connect"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
