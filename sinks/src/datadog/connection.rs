use super::config::DatadogConfig;
use crate::{RegistryError, SinkError};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

struct Tls {
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

/// Opens connections to the intake. Built once and shared by every sink
/// instance so the certificate store is only loaded at startup.
pub struct Connector {
    server: String,
    tls: Option<Tls>,
    timeout: Duration,
}

impl Connector {
    pub fn new(config: &DatadogConfig) -> Result<Self, RegistryError> {
        if !config.tls {
            return Ok(Connector {
                server: config.server.clone(),
                tls: None,
                timeout: config.connect_timeout(),
            });
        }

        let mut root_store = RootCertStore::empty();
        for cert in rustls_native_certs::load_native_certs()? {
            let _ = root_store.add(cert);
        }
        Self::with_root_store(config, root_store)
    }

    pub fn with_root_store(
        config: &DatadogConfig,
        root_store: RootCertStore,
    ) -> Result<Self, RegistryError> {
        let host = config
            .host()
            .map_err(|e| RegistryError::InvalidEndpoint {
                sink: super::NAME,
                reason: e.to_string(),
            })?;
        let server_name = ServerName::try_from(host.to_string()).map_err(|e| {
            RegistryError::InvalidEndpoint {
                sink: super::NAME,
                reason: e.to_string(),
            }
        })?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls_config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Connector {
            server: config.server.clone(),
            tls: Some(Tls {
                connector: TlsConnector::from(Arc::new(tls_config)),
                server_name,
            }),
            timeout: config.connect_timeout(),
        })
    }

    pub async fn connect(&self) -> Result<Connection, SinkError> {
        let connect = async {
            let stream = TcpStream::connect(self.server.as_str()).await?;
            let _ = stream.set_nodelay(true);

            let connection = match &self.tls {
                Some(tls) => {
                    let stream = tls
                        .connector
                        .connect(tls.server_name.clone(), stream)
                        .await?;
                    Connection::Tls(Box::new(stream))
                }
                None => Connection::Plain(stream),
            };
            Ok::<_, io::Error>(connection)
        };

        let connection = timeout(self.timeout, connect)
            .await
            .map_err(|_| SinkError::ConnectTimeout(self.timeout.as_millis() as u64))??;
        Ok(connection)
    }
}

pub enum Connection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    pub async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        match self {
            Connection::Plain(stream) => {
                stream.write_all(line).await?;
                stream.flush().await
            }
            Connection::Tls(stream) => {
                stream.write_all(line).await?;
                stream.flush().await
            }
        }
    }

    pub async fn shutdown(self) -> io::Result<()> {
        match self {
            Connection::Plain(mut stream) => stream.shutdown().await,
            Connection::Tls(mut stream) => stream.shutdown().await,
        }
    }
}
