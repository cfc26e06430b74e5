use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::ChangeStream;

use super::wire::{GatewayCommand, GatewayFrame};

/// First retry delay after a dropped gateway connection.
const RECONNECT_BASE: Duration = Duration::from_secs(1);

/// Retry delays double until they hit this ceiling.
const RECONNECT_CAP: Duration = Duration::from_secs(30);

/// Open-ended change feed for one collection.
///
/// Each connection starts with a subscribe command, then relays pushed
/// frames. When the socket drops the feed reconnects with exponential
/// backoff and subscribes again; the service may redeliver recent changes
/// after that, which consumers are expected to absorb. The feed never ends
/// on its own. Dropping the stream closes the socket.
pub(crate) fn change_stream(gateway_url: String, collection: String) -> ChangeStream {
    Box::pin(async_stream::stream! {
        let mut attempt: u32 = 0;
        loop {
            match connect_async(gateway_url.as_str()).await {
                Ok((socket, _)) => {
                    info!("gateway connected for '{}'", collection);
                    attempt = 0;
                    let (mut tx, mut rx) = socket.split();

                    let subscribe = GatewayCommand::Subscribe { collection: collection.clone() };
                    let command = serde_json::to_string(&subscribe)
                        .expect("gateway commands are always serializable");
                    if tx.send(Message::Text(command)).await.is_err() {
                        warn!("gateway dropped before the subscribe command went out");
                    } else {
                        while let Some(result) = rx.next().await {
                            match result {
                                Ok(Message::Text(text)) => {
                                    match serde_json::from_str::<GatewayFrame>(&text) {
                                        Ok(frame) => yield frame.into_change(),
                                        Err(e) => warn!("bad gateway frame: {}", e),
                                    }
                                }
                                Ok(Message::Ping(payload)) => {
                                    if tx.send(Message::Pong(payload)).await.is_err() {
                                        break;
                                    }
                                }
                                Ok(Message::Close(_)) => break,
                                Ok(_) => {}
                                Err(e) => {
                                    warn!("gateway read error: {}", e);
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("gateway connect failed: {}", e);
                }
            }

            let delay = RECONNECT_BASE
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(RECONNECT_CAP);
            attempt = attempt.saturating_add(1);
            debug!("retrying gateway for '{}' in {:?}", collection, delay);
            tokio::time::sleep(delay).await;
        }
    })
}
