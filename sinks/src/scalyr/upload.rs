use super::ScalyrEvent;
use super::config::ScalyrConfig;
use crate::metrics_defs::{
    SCALYR_BATCH_SIZE, SCALYR_BATCHES_FAILED, SCALYR_BATCHES_SENT, SCALYR_MAX_BATCH_EVENTS,
};
use crate::queue::QueueReceiver;
use crate::{ClientInfo, SinkError};
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use shared::event::Attributes;
use shared::{counter, gauge, histogram};
use std::sync::Arc;
use tokio::time::sleep;
use url::Url;

/// The request as specified in the API doc (https://app.scalyr.com/help/api#addEvents)
#[derive(Serialize)]
struct UploadData<'a> {
    token: &'a str,
    session: &'a str,
    #[serde(rename = "sessionInfo")]
    session_info: &'a Attributes,
    events: &'a [ScalyrEvent],
}

/// Drains one connection's queue into `addEvents` requests.
pub(crate) struct Uploader {
    config: Arc<ScalyrConfig>,
    http: reqwest::Client,
    endpoint: Url,
    session: String,
    session_info: Attributes,
    max_batch_events: usize,
}

impl Uploader {
    pub fn new(
        client: &ClientInfo,
        config: Arc<ScalyrConfig>,
        endpoint: Url,
        http: reqwest::Client,
    ) -> Self {
        let mut session_info = Attributes::new();
        session_info.insert("conn_src".into(), Value::from(client.peer.to_string()));
        session_info.insert("conn_id".into(), Value::from(client.id));
        session_info.insert("source".into(), Value::from("logfwd"));

        Uploader {
            max_batch_events: config.request_max_nb_events,
            config,
            http,
            endpoint,
            session: uuid::Uuid::new_v4().to_string(),
            session_info,
        }
    }

    pub async fn run(mut self, mut queue: QueueReceiver<ScalyrEvent>) {
        tracing::debug!(session = %self.session, "Uploader started");

        while let Some(first) = queue.pop().await {
            let mut batch = vec![first];
            while batch.len() < self.max_batch_events
                && let Some(event) = queue.try_pop()
            {
                batch.push(event);
            }

            for event in &mut batch {
                self.session_info
                    .extend(std::mem::take(&mut event.session_attrs));
            }

            if let Err(e) = self.upload(&mut batch, &mut queue).await {
                let reason = match &e {
                    SinkError::RequestTooLarge { .. } => "too_large",
                    SinkError::RetriesExhausted { .. } => "retries_exhausted",
                    SinkError::UnexpectedStatus(_) => "status",
                    _ => "other",
                };
                counter!(SCALYR_BATCHES_FAILED, "reason" => reason).increment(1);
                tracing::warn!(error = %e, "Problem sending data");
            }
        }

        tracing::debug!("Uploader finished");
    }

    async fn upload(
        &mut self,
        batch: &mut Vec<ScalyrEvent>,
        queue: &mut QueueReceiver<ScalyrEvent>,
    ) -> Result<(), SinkError> {
        let body = self.encode(batch, queue)?;

        tracing::debug!(
            nb_sent_events = batch.len(),
            nb_waiting_events = queue.len(),
            size = body.len(),
            "Scalyr HTTP request"
        );
        histogram!(SCALYR_BATCH_SIZE).record(batch.len() as f64);

        self.send(Bytes::from(body)).await
    }

    /// Serializes the batch, moving events back to the queue until it fits
    /// within the maximum request size.
    ///
    /// Every removal lowers the events-per-request ceiling. A single event
    /// that is still too large is dropped.
    pub(crate) fn encode(
        &mut self,
        batch: &mut Vec<ScalyrEvent>,
        queue: &mut QueueReceiver<ScalyrEvent>,
    ) -> Result<Vec<u8>, SinkError> {
        loop {
            let body = serde_json::to_vec(&UploadData {
                token: &self.config.token,
                session: &self.session,
                session_info: &self.session_info,
                events: batch,
            })?;

            let size = body.len();
            let max_size = self.config.request_max_size;
            if size <= max_size {
                return Ok(body);
            }

            if batch.len() <= 1 {
                batch.clear();
                return Err(SinkError::RequestTooLarge {
                    size,
                    max: max_size,
                });
            }

            tracing::debug!(
                nb_events = batch.len(),
                max_batch_events = self.max_batch_events,
                size,
                max_size,
                "Query too big, reducing the number of events"
            );
            self.max_batch_events = batch.len() - 1;
            gauge!(SCALYR_MAX_BATCH_EVENTS).set(self.max_batch_events as f64);
            if let Some(last) = batch.pop() {
                queue.requeue(last);
            }
        }
    }

    /// Posts the body, retrying transport failures with exponential backoff.
    pub(crate) async fn send(&mut self, body: Bytes) -> Result<(), SinkError> {
        let mut backoff = self.config.retry_base_delay();

        loop {
            sleep(self.config.request_min_period()).await;

            match self.post(body.clone()).await {
                Ok(StatusCode::OK) => {
                    self.on_success();
                    counter!(SCALYR_BATCHES_SENT).increment(1);
                    return Ok(());
                }
                Ok(status) => return Err(SinkError::UnexpectedStatus(status)),
                Err(e) => {
                    if backoff >= self.config.retry_max_delay() {
                        return Err(SinkError::RetriesExhausted { last: e });
                    }
                    tracing::warn!(
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "HTTP request error"
                    );
                    sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    /// One request/response exchange. The response body is read fully, a
    /// failure to do so counts as a transport error.
    async fn post(&self, body: Bytes) -> Result<StatusCode, reqwest::Error> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.config.request_timeout())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        tracing::debug!(
            status = %status,
            body = %String::from_utf8_lossy(&body),
            "Scalyr HTTP response"
        );

        Ok(status)
    }

    /// Slowly raises the ceiling again after a size-driven reduction.
    pub(crate) fn on_success(&mut self) {
        if self.max_batch_events < self.config.request_max_nb_events {
            self.max_batch_events += 1;
            gauge!(SCALYR_MAX_BATCH_EVENTS).set(self.max_batch_events as f64);
        }
    }

    #[cfg(test)]
    pub(crate) fn max_batch_events(&self) -> usize {
        self.max_batch_events
    }
}
