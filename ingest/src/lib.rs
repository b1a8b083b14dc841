//! TCP intake of newline-delimited JSON log lines.

pub mod config;
pub mod connection;
pub mod errors;
pub mod metrics_defs;
pub mod parser;

use config::Config;
use connection::ClientHandler;
use errors::IngestError;
use metrics_defs::CONNECTIONS_ACCEPTED;
use shared::counter;
use sinks::{ClientInfo, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::Instrument;

pub use errors::ParseError;

pub async fn run(config: Config, registry: Registry) -> Result<(), IngestError> {
    let addr = config.listener.addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, sinks = ?registry.names(), "Listening");

    serve(listener, Arc::new(config), Arc::new(registry)).await
}

/// Accepts connections forever, one task per connection.
pub async fn serve(
    listener: TcpListener,
    config: Arc<Config>,
    registry: Arc<Registry>,
) -> Result<(), IngestError> {
    let mut conn_id: u64 = 0;

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Couldn't accept connection");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Couldn't set TCP_NODELAY");
        }
        conn_id += 1;
        counter!(CONNECTIONS_ACCEPTED).increment(1);

        let span = tracing::info_span!("connection", conn_id, peer = %peer);
        let client = ClientInfo::new(conn_id, peer, span.clone());
        let sinks = registry.create(&client);
        let handler = ClientHandler::new(&config, sinks);

        tokio::spawn(handler.run(stream).instrument(span));
    }
}
