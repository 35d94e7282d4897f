//! Subscribe and stream events.

use bayeux_protocol::{BayeuxResponse, ProtocolError};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::connection::{BayeuxConnection, PendingResponse};
use crate::error::{ClientError, ClientResult};
use crate::events::BayeuxEvent;
use crate::state::{ConnectionState, ConnectionStatus};

use super::{close_session, open_session};

/// Subscribes to `channels` and prints every pushed event until Ctrl-C.
pub async fn run(
    config: &ClientConfig,
    channels: &[String],
    long_polling: bool,
) -> ClientResult<()> {
    let long_polling = long_polling && config.long_polling.enabled;
    let connection = open_session(config, long_polling).await?;
    let outcome = listen(&connection, channels, long_polling).await;
    close_session(&connection).await;
    outcome
}

async fn listen(
    connection: &BayeuxConnection,
    channels: &[String],
    long_polling: bool,
) -> ClientResult<()> {
    let mut events = connection.events();

    for channel in channels {
        let reply = connection.subscribe(channel).await?.await?;
        if !reply.is_successful() {
            return Err(ClientError::Rejected(format!("subscription to {}", channel)));
        }
    }

    if long_polling {
        connection.start_long_polling().await?;
    }
    info!(channels = channels.len(), long_polling, "Listening");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut status = connection.watch_status();

    // Without long polling, connect requests go out one at a time on the
    // main transport.
    let mut pending: Option<PendingResponse> = None;
    loop {
        if !long_polling && pending.is_none() {
            pending = Some(connection.connect().await?);
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                return Ok(());
            }
            changed = status.changed() => {
                if changed.is_err() || session_ended(&status.borrow_and_update()) {
                    warn!("Server ended the session");
                    return Err(ClientError::ConnectionClosed);
                }
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped events"),
                Err(RecvError::Closed) => return Err(ClientError::ConnectionClosed),
            },
            result = wait(&mut pending) => {
                pending = None;
                result?;
            }
        }
    }
}

fn session_ended(status: &ConnectionStatus) -> bool {
    status.state != ConnectionState::Connected
}

async fn wait(pending: &mut Option<PendingResponse>) -> ClientResult<BayeuxResponse> {
    match pending {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}

fn print_event(event: &BayeuxEvent) -> ClientResult<()> {
    match event {
        BayeuxEvent::EventReceived(_) => {
            let line = serde_json::to_string(event).map_err(ProtocolError::from)?;
            println!("{}", line);
            Ok(())
        }
        BayeuxEvent::LongPollingFailed(n) => {
            Err(ClientError::Rejected(format!("long polling ({})", n.description)))
        }
        _ => Ok(()),
    }
}
