use serde::Deserialize;
use sinks::config::SinksConfig;
use sinks::datadog::config::DatadogConfig;
use sinks::scalyr::config::ScalyrConfig;
use std::fs::File;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
    pub sentry_dsn: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".into(),
            format: LogFormat::Json,
            sentry_dsn: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    "logfwd".into()
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub ingest: ingest::config::Config,
    pub logging: LoggingConfig,
    pub metrics: Option<MetricsConfig>,
    pub sinks: SinksConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Applies the environment variable overrides, `var` returning the value
    /// of a variable when set.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = var("LISTEN_ADDR") {
            let (host, port) = addr
                .rsplit_once(':')
                .and_then(|(host, port)| Some((host, port.parse::<u16>().ok()?)))
                .ok_or_else(|| ConfigError::InvalidEnv {
                    name: "LISTEN_ADDR",
                    value: addr.clone(),
                })?;
            if !host.is_empty() {
                self.ingest.listener.host = host.to_string();
            }
            self.ingest.listener.port = port;
        }

        if let Some(token) = var("SCALYR_WRITELOG_TOKEN") {
            self.sinks
                .scalyr
                .get_or_insert_with(ScalyrConfig::default)
                .token = token;
        }
        if let Some(server) = var("SCALYR_SERVER") {
            self.sinks
                .scalyr
                .get_or_insert_with(ScalyrConfig::default)
                .server = server;
        }
        if let Some(token) = var("DATADOG_TOKEN") {
            self.sinks
                .datadog
                .get_or_insert_with(DatadogConfig::default)
                .token = token;
        }
        if let Some(server) = var("DATADOG_SERVER") {
            self.sinks
                .datadog
                .get_or_insert_with(DatadogConfig::default)
                .server = server;
        }

        if var("LOG_ENV").as_deref() == Some("dev") {
            self.logging.format = LogFormat::Pretty;
            self.logging.level = "debug".into();
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ingest.validate()?;
        self.sinks.validate()?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("invalid ingest config: {0}")]
    Ingest(#[from] ingest::config::ValidationError),
    #[error("invalid sink config: {0}")]
    Sinks(#[from] sinks::config::ValidationError),
}
