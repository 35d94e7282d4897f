//! One-shot publish.

use bayeux_protocol::ProtocolError;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

use super::{close_session, open_session};

/// Publishes `data` on `channel` and prints the acknowledgement.
pub async fn run(config: &ClientConfig, channel: &str, data: &str) -> ClientResult<()> {
    let data: Value = serde_json::from_str(data).map_err(ProtocolError::from)?;

    let connection = open_session(config, false).await?;
    let outcome = async {
        let reply = connection.publish(channel, data).await?.await?;
        println!("{}", reply.response().to_value());
        if reply.is_successful() {
            Ok(())
        } else {
            Err(ClientError::Rejected(format!("publish to {}", channel)))
        }
    }
    .await;

    close_session(&connection).await;
    outcome
}
