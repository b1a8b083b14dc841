use crate::datadog::config::DatadogConfig;
use crate::scalyr::config::ScalyrConfig;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("{sink}: queue_size cannot be 0")]
    EmptyQueue { sink: &'static str },

    #[error("scalyr: request_max_nb_events cannot be 0")]
    NoEventsPerRequest,

    #[error("scalyr: request_max_size cannot be 0")]
    NoRequestSize,

    #[error("scalyr: retry_base_delay_ms cannot be 0")]
    NoRetryDelay,

    #[error("scalyr: retry_max_delay_ms cannot be 0")]
    NoMaxRetryDelay,

    #[error("scalyr: do not end the server URL with a /")]
    TrailingSlash,

    #[error("scalyr: invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("datadog: server must be host:port, got {0}")]
    InvalidServer(String),
}

/// Settings of every known sink. A sink without a token is disabled.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SinksConfig {
    pub scalyr: Option<ScalyrConfig>,
    pub datadog: Option<DatadogConfig>,
}

impl SinksConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(scalyr) = self.scalyr.as_ref().filter(|c| c.enabled()) {
            scalyr.validate()?;
        }
        if let Some(datadog) = self.datadog.as_ref().filter(|c| c.enabled()) {
            datadog.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_sinks_are_not_validated() {
        let yaml = r#"
scalyr:
    server: "https://www.scalyr.com/"
datadog:
    token: abc
    server: intake.logs.datadoghq.com:10516
"#;
        let config: SinksConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.scalyr.as_ref().unwrap().enabled());
        assert!(config.datadog.as_ref().unwrap().enabled());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn enabled_sinks_are_validated() {
        let yaml = r#"
scalyr:
    token: abc
    server: "https://www.scalyr.com/"
"#;
        let config: SinksConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.validate(), Err(ValidationError::TrailingSlash));
    }
}
