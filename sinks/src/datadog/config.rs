use crate::config::ValidationError;
use crate::conversions::KeyConversions;
use serde::Deserialize;
use std::time::Duration;

/// Datadog TCP intake sink settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatadogConfig {
    /// API key prefixed to every line. The sink is disabled when empty.
    pub token: String,
    /// Intake address as `host:port`, e.g. `tcp-intake.logs.datadoghq.eu:443`.
    pub server: String,
    /// Wrap the connection in TLS.
    pub tls: bool,
    pub queue_size: usize,
    /// Reconnect delay unit, multiplied by the number of failed attempts.
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
    /// Attribute keys renamed inside each event.
    pub message_conversions: KeyConversions,
    /// Attribute keys moved to `ddtags`.
    pub tag_conversions: KeyConversions,
}

impl Default for DatadogConfig {
    fn default() -> Self {
        DatadogConfig {
            token: String::new(),
            server: "intake.logs.datadoghq.com:10516".into(),
            tls: true,
            queue_size: 20,
            reconnect_delay_ms: 5000,
            connect_timeout_ms: 10_000,
            message_conversions: KeyConversions::from([("appname", "service")]),
            tag_conversions: KeyConversions::from([("env", "env")]),
        }
    }
}

impl DatadogConfig {
    pub fn enabled(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.host()?;
        if self.queue_size == 0 {
            return Err(ValidationError::EmptyQueue { sink: "datadog" });
        }
        Ok(())
    }

    /// Host part of `server`, used for TLS server name verification.
    pub fn host(&self) -> Result<&str, ValidationError> {
        match self.server.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(host.trim_start_matches('[').trim_end_matches(']'))
            }
            _ => Err(ValidationError::InvalidServer(self.server.clone())),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_host() {
        let config = DatadogConfig::default();
        assert_eq!(config.host(), Ok("intake.logs.datadoghq.com"));

        let config = DatadogConfig {
            server: "[::1]:10516".into(),
            ..Default::default()
        };
        assert_eq!(config.host(), Ok("::1"));

        let config = DatadogConfig {
            server: "intake.logs.datadoghq.com".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_yaml() {
        let yaml = r#"
token: api-key
tls: false
message_conversions:
    appname: service
    hostname: ""
"#;
        let config: DatadogConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.enabled());
        assert!(!config.tls);
        assert_eq!(config.queue_size, 20);
        assert!(config.message_conversions.contains("hostname"));
        assert!(config.tag_conversions.contains("env"));
    }
}
