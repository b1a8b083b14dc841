use crate::config::SinksConfig;
use crate::datadog::config::DatadogConfig;
use crate::datadog::connection::Connector;
use crate::datadog::{self, DatadogSink};
use crate::scalyr::config::ScalyrConfig;
use crate::scalyr::{self, ScalyrSink};
use crate::{ClientInfo, RegistryError, Sink};
use std::sync::Arc;
use url::Url;

/// An enabled sink kind together with what its instances share.
#[derive(Clone)]
pub enum SinkConfig {
    Scalyr {
        config: Arc<ScalyrConfig>,
        endpoint: Url,
        http: reqwest::Client,
    },
    Datadog {
        config: Arc<DatadogConfig>,
        connector: Arc<Connector>,
    },
}

impl SinkConfig {
    pub fn name(&self) -> &'static str {
        match self {
            SinkConfig::Scalyr { .. } => scalyr::NAME,
            SinkConfig::Datadog { .. } => datadog::NAME,
        }
    }

    pub fn create(&self, client: &ClientInfo) -> Box<dyn Sink> {
        match self {
            SinkConfig::Scalyr {
                config,
                endpoint,
                http,
            } => Box::new(ScalyrSink::new(
                client,
                config.clone(),
                endpoint.clone(),
                http.clone(),
            )),
            SinkConfig::Datadog { config, connector } => Box::new(DatadogSink::new(
                client,
                config.clone(),
                connector.clone(),
            )),
        }
    }
}

/// The fixed, ordered set of enabled sinks, decided once at startup.
#[derive(Clone)]
pub struct Registry {
    sinks: Vec<SinkConfig>,
}

impl Registry {
    pub fn from_config(config: &SinksConfig) -> Result<Self, RegistryError> {
        let mut sinks = Vec::new();

        if let Some(scalyr) = config.scalyr.as_ref().filter(|c| c.enabled()) {
            let endpoint = scalyr
                .endpoint()
                .map_err(|e| RegistryError::InvalidEndpoint {
                    sink: scalyr::NAME,
                    reason: e.to_string(),
                })?;
            let http = reqwest::Client::builder().build()?;
            sinks.push(SinkConfig::Scalyr {
                config: Arc::new(scalyr.clone()),
                endpoint,
                http,
            });
        }

        if let Some(datadog) = config.datadog.as_ref().filter(|c| c.enabled()) {
            let connector = Connector::new(datadog)?;
            sinks.push(SinkConfig::Datadog {
                config: Arc::new(datadog.clone()),
                connector: Arc::new(connector),
            });
        }

        if sinks.is_empty() {
            return Err(RegistryError::NoSinkEnabled);
        }

        Ok(Registry { sinks })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(SinkConfig::name).collect()
    }

    /// One fresh instance of every enabled sink for a new connection.
    pub fn create(&self, client: &ClientInfo) -> Vec<Box<dyn Sink>> {
        self.sinks.iter().map(|sink| sink.create(client)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[test]
    fn nothing_enabled() {
        let config = SinksConfig::default();
        assert!(matches!(
            Registry::from_config(&config),
            Err(RegistryError::NoSinkEnabled)
        ));

        // Present but without a token.
        let config = SinksConfig {
            scalyr: Some(ScalyrConfig::default()),
            datadog: Some(DatadogConfig::default()),
        };
        assert!(matches!(
            Registry::from_config(&config),
            Err(RegistryError::NoSinkEnabled)
        ));
    }

    #[tokio::test]
    async fn creates_enabled_sinks_in_order() {
        let config = SinksConfig {
            scalyr: Some(ScalyrConfig {
                token: "scalyr-token".into(),
                ..Default::default()
            }),
            datadog: Some(DatadogConfig {
                token: "dd-token".into(),
                tls: false,
                ..Default::default()
            }),
        };
        let registry = Registry::from_config(&config).unwrap();
        assert_eq!(registry.names(), vec!["scalyr", "datadog"]);

        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let client = ClientInfo::new(1, peer, tracing::Span::none());
        let sinks = registry.create(&client);
        let names: Vec<_> = sinks.iter().map(|sink| sink.name()).collect();
        assert_eq!(names, vec!["scalyr", "datadog"]);

        // Nothing was sent, closing must not touch the network.
        for sink in sinks {
            sink.close().await.unwrap();
        }
    }

    #[test]
    fn invalid_scalyr_endpoint() {
        let config = SinksConfig {
            scalyr: Some(ScalyrConfig {
                token: "scalyr-token".into(),
                server: "not a url".into(),
                ..Default::default()
            }),
            datadog: None,
        };
        assert!(matches!(
            Registry::from_config(&config),
            Err(RegistryError::InvalidEndpoint { sink: "scalyr", .. })
        ));
    }
}
