use crate::config::ValidationError;
use crate::conversions::KeyConversions;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Scalyr `addEvents` sink settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScalyrConfig {
    /// Write-logs token. The sink is disabled when empty.
    pub token: String,
    /// Base URL of the API, without a trailing slash.
    pub server: String,
    /// Events waiting between the connection and the uploader.
    pub queue_size: usize,
    /// Upper bound of the adaptive events-per-request ceiling.
    pub request_max_nb_events: usize,
    /// Maximum serialized request size in bytes.
    pub request_max_size: usize,
    /// Pause before every request.
    pub request_min_period_ms: u64,
    pub request_timeout_ms: u64,
    /// First backoff delay after a transport error, doubled on each failure.
    pub retry_base_delay_ms: u64,
    /// A batch is dropped once the backoff reaches this delay.
    pub retry_max_delay_ms: u64,
    /// Attribute keys renamed inside each event.
    pub message_conversions: KeyConversions,
    /// Attribute keys moved out of events into the session info.
    pub session_conversions: KeyConversions,
}

impl Default for ScalyrConfig {
    fn default() -> Self {
        ScalyrConfig {
            token: String::new(),
            server: "https://www.scalyr.com".into(),
            queue_size: 1000,
            request_max_nb_events: 20,
            // 2MB is much lower than the allowed 3MB
            request_max_size: 2 * 1024 * 1024,
            request_min_period_ms: 1000,
            request_timeout_ms: 30_000,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 60_000,
            message_conversions: KeyConversions::from([
                ("@source_host", "hostname"),
                ("@source_path", "file_path"),
                ("@message", "message"),
                ("@type", "logstash_type"),
                ("@source", "logstash_source"),
                ("@tags", "tags"),
            ]),
            session_conversions: KeyConversions::from([
                ("appname", "serverHost"),
                ("env", "logfile"),
            ]),
        }
    }
}

impl ScalyrConfig {
    pub fn enabled(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.server.ends_with('/') {
            return Err(ValidationError::TrailingSlash);
        }
        self.endpoint()?;
        if self.queue_size == 0 {
            return Err(ValidationError::EmptyQueue { sink: "scalyr" });
        }
        if self.request_max_nb_events == 0 {
            return Err(ValidationError::NoEventsPerRequest);
        }
        if self.request_max_size == 0 {
            return Err(ValidationError::NoRequestSize);
        }
        if self.retry_base_delay_ms == 0 {
            return Err(ValidationError::NoRetryDelay);
        }
        if self.retry_max_delay_ms == 0 {
            return Err(ValidationError::NoMaxRetryDelay);
        }
        Ok(())
    }

    /// Full URL of the `addEvents` call.
    pub fn endpoint(&self) -> Result<Url, ValidationError> {
        Url::parse(&format!("{}/addEvents", self.server))
            .map_err(|e| ValidationError::InvalidUrl(e.to_string()))
    }

    pub fn request_min_period(&self) -> Duration {
        Duration::from_millis(self.request_min_period_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}
