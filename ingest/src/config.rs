use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("max_line_size cannot be 0")]
    NoMaxLineSize,

    #[error("Empty auth token")]
    EmptyAuthToken,

    #[error("Empty auth key")]
    EmptyAuthKey,

    #[error("Empty auth value for key {0}")]
    EmptyAuthValue(String),
}

/// Inbound side of the relay.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub listener: Listener,
    /// Longest accepted line in bytes, the connection is dropped beyond it.
    pub max_line_size: usize,
    /// Authentication required from clients, none when absent.
    pub auth: Option<Auth>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listener: Listener::default(),
            max_line_size: 300 * 1024,
            auth: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if self.max_line_size == 0 {
            return Err(ValidationError::NoMaxLineSize);
        }
        if let Some(auth) = &self.auth {
            auth.validate()?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 5050,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Client authentication modes.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Auth {
    /// Every line starts with `<token> ` before the JSON object.
    Prefix { token: String },
    /// The first line of a connection must carry `key` with this string
    /// value. The key is stripped from every line.
    Key { key: String, value: String },
}

impl Auth {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Auth::Prefix { token } if token.is_empty() => Err(ValidationError::EmptyAuthToken),
            Auth::Key { key, .. } if key.is_empty() => Err(ValidationError::EmptyAuthKey),
            Auth::Key { key, value } if value.is_empty() => {
                Err(ValidationError::EmptyAuthValue(key.clone()))
            }
            _ => Ok(()),
        }
    }
}
