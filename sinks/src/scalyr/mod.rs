//! Delivery to the Scalyr bulk `addEvents` API.
//!
//! Events are batched per connection. The number of events per request adapts
//! to the API's request-size limit: it shrinks when a batch serializes too
//! large and grows back by one after every accepted request.

pub mod config;
mod upload;

use crate::conversions::Conversion;
use crate::metrics_defs::EVENTS_DROPPED;
use crate::queue::{self, QueueSender};
use crate::{ClientInfo, Sink, SinkError};
use async_trait::async_trait;
use config::ScalyrConfig;
use serde::Serialize;
use shared::counter;
use shared::event::{Attributes, LogEvent};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;
use upload::Uploader;
use url::Url;

pub const NAME: &str = "scalyr";

/// An event as specified by the `addEvents` API.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScalyrEvent {
    pub ts: i64,
    pub sev: u8,
    pub attrs: Attributes,
    /// Attributes promoted to the session, merged by the uploader.
    #[serde(skip)]
    pub session_attrs: Attributes,
}

impl ScalyrEvent {
    pub fn from_event(event: &LogEvent, config: &ScalyrConfig) -> Self {
        let mut attrs = Attributes::new();
        let mut session_attrs = Attributes::new();

        for (key, value) in &event.attributes {
            if let Some(conversion) = config.message_conversions.get(key) {
                if let Conversion::Rename(target) = conversion {
                    attrs.insert(target.to_string(), value.clone());
                }
            } else if let Some(conversion) = config.session_conversions.get(key) {
                if let Conversion::Rename(target) = conversion {
                    session_attrs.insert(target.to_string(), value.clone());
                }
            } else {
                attrs.insert(key.clone(), value.clone());
            }
        }

        // Renamed keys can land on a session key too.
        let promoted: Vec<String> = attrs
            .keys()
            .filter(|key| config.session_conversions.contains(key))
            .cloned()
            .collect();
        for key in promoted {
            if let Some(value) = attrs.remove(&key)
                && let Some(Conversion::Rename(target)) = config.session_conversions.get(&key)
            {
                session_attrs.insert(target.to_string(), value);
            }
        }

        ScalyrEvent {
            ts: event.timestamp_nanos(),
            sev: event.severity.as_u8(),
            attrs,
            session_attrs,
        }
    }
}

pub struct ScalyrSink {
    config: Arc<ScalyrConfig>,
    queue: QueueSender<ScalyrEvent>,
    task: JoinHandle<()>,
    span: tracing::Span,
}

impl ScalyrSink {
    pub fn new(
        client: &ClientInfo,
        config: Arc<ScalyrConfig>,
        endpoint: Url,
        http: reqwest::Client,
    ) -> Self {
        let span = client.sink_span(NAME);
        let (queue, receiver) = queue::bounded(config.queue_size);

        let uploader = Uploader::new(client, config.clone(), endpoint, http);
        let task = tokio::spawn(uploader.run(receiver).instrument(span.clone()));

        ScalyrSink {
            config,
            queue,
            task,
            span,
        }
    }
}

#[async_trait]
impl Sink for ScalyrSink {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn send(&mut self, event: &LogEvent) {
        let event = ScalyrEvent::from_event(event, &self.config);
        if self.queue.send(event).await.is_err() {
            counter!(EVENTS_DROPPED, "sink" => NAME).increment(1);
            tracing::debug!(parent: &self.span, "Uploader stopped, dropping event");
        }
    }

    async fn close(self: Box<Self>) -> Result<(), SinkError> {
        // Fails only when the uploader is already gone.
        let _ = self.queue.close().await;
        self.task.await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::KeyConversions;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use shared::event::Severity;
    use std::net::SocketAddr;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(attributes: serde_json::Value) -> LogEvent {
        let serde_json::Value::Object(attributes) = attributes else {
            panic!("attributes must be an object");
        };
        LogEvent::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Severity::Error,
            attributes,
        )
    }

    fn client_info() -> ClientInfo {
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        ClientInfo::new(7, peer, tracing::Span::none())
    }

    fn test_config(server: &str) -> ScalyrConfig {
        ScalyrConfig {
            token: "write-token".into(),
            server: server.into(),
            request_min_period_ms: 0,
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 8,
            ..Default::default()
        }
    }

    #[test]
    fn conversions() {
        let config = ScalyrConfig {
            message_conversions: KeyConversions::from([
                ("@source_host", "hostname"),
                ("password", ""),
                ("application", "appname"),
            ]),
            session_conversions: KeyConversions::from([("appname", "serverHost"), ("env", "logfile")]),
            ..Default::default()
        };
        let scalyr_event = ScalyrEvent::from_event(
            &event(json!({
                "@source_host": "web-1",
                "password": "hunter2",
                "env": "prod",
                "application": "api",
                "message": "hello",
            })),
            &config,
        );

        assert_eq!(scalyr_event.ts, 1_704_067_200_000_000_000);
        assert_eq!(scalyr_event.sev, 5);
        assert_eq!(
            serde_json::Value::Object(scalyr_event.attrs.clone()),
            json!({"hostname": "web-1", "message": "hello"})
        );
        assert_eq!(
            serde_json::Value::Object(scalyr_event.session_attrs.clone()),
            json!({"logfile": "prod", "serverHost": "api"})
        );

        let serialized = serde_json::to_value(&scalyr_event).unwrap();
        assert_eq!(
            serialized,
            json!({
                "ts": 1_704_067_200_000_000_000_i64,
                "sev": 5,
                "attrs": {"hostname": "web-1", "message": "hello"},
            })
        );
    }

    #[tokio::test]
    async fn uploads_events_with_session_info() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/addEvents"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\":\"success\"}"))
            .mount(&server)
            .await;

        let config = Arc::new(test_config(&server.uri()));
        let endpoint = config.endpoint().unwrap();
        let mut sink: Box<dyn Sink> = Box::new(ScalyrSink::new(
            &client_info(),
            config,
            endpoint,
            reqwest::Client::new(),
        ));

        sink.send(&event(json!({"message": "one", "appname": "api"})))
            .await;
        sink.send(&event(json!({"message": "two"}))).await;
        sink.close().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(!requests.is_empty());

        let mut messages = Vec::new();
        let mut sessions = Vec::new();
        for request in &requests {
            let body: serde_json::Value = request.body_json().unwrap();
            assert_eq!(body["token"], "write-token");
            assert_eq!(body["sessionInfo"]["conn_src"], "10.0.0.1:4000");
            assert_eq!(body["sessionInfo"]["conn_id"], 7);
            assert_eq!(body["sessionInfo"]["source"], "logfwd");
            sessions.push(body["session"].as_str().unwrap().to_string());
            for event in body["events"].as_array().unwrap() {
                messages.push(event["attrs"]["message"].as_str().unwrap().to_string());
                assert!(event["attrs"].get("appname").is_none());
            }
        }
        assert_eq!(messages, vec!["one", "two"]);
        sessions.dedup();
        assert_eq!(sessions.len(), 1);

        let last: serde_json::Value = requests.last().unwrap().body_json().unwrap();
        assert_eq!(last["sessionInfo"]["serverHost"], "api");
    }

    #[tokio::test]
    async fn shrinks_batches_to_fit_the_request_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/addEvents"))
            .respond_with(ResponseTemplate::new(200))
            .expect(3)
            .mount(&server)
            .await;

        // One event fits, two do not.
        let config = Arc::new(ScalyrConfig {
            request_max_size: 1500,
            ..test_config(&server.uri())
        });
        let endpoint = config.endpoint().unwrap();
        let mut sink = Box::new(ScalyrSink::new(
            &client_info(),
            config,
            endpoint,
            reqwest::Client::new(),
        ));

        for i in 0..3 {
            sink.send(&event(json!({"message": format!("{i}{}", "x".repeat(1000))})))
                .await;
        }
        sink.close().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        for request in &requests {
            assert!(request.body.len() <= 1500);
            let body: serde_json::Value = request.body_json().unwrap();
            assert_eq!(body["events"].as_array().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn unexpected_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/addEvents"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let config = Arc::new(test_config(&server.uri()));
        let endpoint = config.endpoint().unwrap();
        let mut sink = Box::new(ScalyrSink::new(
            &client_info(),
            config,
            endpoint,
            reqwest::Client::new(),
        ));
        sink.send(&event(json!({"message": "boom"}))).await;
        sink.close().await.unwrap();
    }
}
