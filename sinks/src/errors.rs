use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised inside a sink's delivery task.
///
/// None of these reach the connection that produced the events: they are
/// logged by the sink, and the affected batch or event is dropped.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("request is too big: requestSize={size} > maxRequestSize={max}")]
    RequestTooLarge { size: usize, max: usize },

    #[error("couldn't send our data after retries: {last}")]
    RetriesExhausted { last: reqwest::Error },

    #[error("unexpected HTTP status: {0}")]
    UnexpectedStatus(StatusCode),

    #[error("could not encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connect timed out after {0} ms")]
    ConnectTimeout(u64),

    #[error("gave up connecting after {attempts} attempts")]
    ConnectAttemptsExhausted { attempts: u32 },

    #[error("delivery task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Errors building the set of sinks at startup.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no output is enabled, provide at least one sink token")]
    NoSinkEnabled,

    #[error("invalid endpoint for {sink}: {reason}")]
    InvalidEndpoint { sink: &'static str, reason: String },

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("could not load native certificates: {0}")]
    Certificates(#[from] std::io::Error),

    #[error("TLS configuration error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
}
