//! Command implementations.

pub mod config;
pub mod listen;
pub mod publish;

use std::sync::Arc;

use bayeux_transport::ReqwestTransport;
use tracing::info;

use crate::config::ClientConfig;
use crate::connection::BayeuxConnection;
use crate::error::{ClientError, ClientResult};

/// Builds a connection from configuration and completes the handshake.
pub(crate) async fn open_session(
    config: &ClientConfig,
    long_polling: bool,
) -> ClientResult<BayeuxConnection> {
    let transport_config = config.transport_config()?;
    let primary = ReqwestTransport::new(transport_config.clone())?;

    let mut builder = BayeuxConnection::builder(Arc::new(primary))
        .options(config.connection_options());
    if long_polling {
        let polling = ReqwestTransport::new(transport_config)?;
        builder = builder.long_polling_transport(Arc::new(polling));
    }
    let connection = builder.spawn();

    let reply = connection.handshake().await?.await?;
    if !reply.is_successful() {
        let reason = reply
            .response()
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no reason given".to_string());
        return Err(ClientError::Rejected(format!("handshake ({})", reason)));
    }

    info!(client_id = ?connection.client_id(), "Session open");
    Ok(connection)
}

/// Sends a disconnect, ignoring failures.
pub(crate) async fn close_session(connection: &BayeuxConnection) {
    if let Ok(pending) = connection.disconnect().await {
        let _ = pending.await;
    }
    connection.shutdown().await;
}
