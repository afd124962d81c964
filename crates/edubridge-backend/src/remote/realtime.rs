use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::backend::MessageSubscription;
use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};

use super::protocol::{self, EVENT_CLOSE, EVENT_ERROR, EVENT_REPLY, Frame};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// `wss://{host}/realtime/v1/websocket?apikey=…&vsn=1.0.0`
pub fn websocket_url(config: &BackendConfig) -> BackendResult<String> {
    let mut url = Url::parse(&config.url).map_err(|e| BackendError::Realtime(e.to_string()))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(BackendError::Realtime(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| BackendError::Realtime("cannot switch to websocket scheme".into()))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", &config.anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url.into())
}

/// Open the socket, join the recipient's channel and forward inserted messages.
pub async fn subscribe_messages(
    config: &BackendConfig,
    access_token: &str,
    recipient_id: Uuid,
) -> BackendResult<MessageSubscription> {
    let ws_url = websocket_url(config)?;
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .map_err(|e| BackendError::Realtime(format!("connect failed: {}", e)))?;
    let (mut sink, mut stream) = ws_stream.split();

    let mut next_ref: u64 = 1;
    let join = protocol::join_messages(recipient_id, access_token, next_ref);
    let topic = join.topic.clone();
    sink.send(WsMessage::Text(join.to_text()))
        .await
        .map_err(|e| BackendError::Realtime(format!("join failed: {}", e)))?;
    info!(%recipient_id, "Joined realtime channel");

    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        // The first tick completes immediately.
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    next_ref += 1;
                    let frame = protocol::heartbeat(next_ref);
                    if let Err(e) = sink.send(WsMessage::Text(frame.to_text())).await {
                        warn!("Realtime heartbeat failed: {}", e);
                        break;
                    }
                }
                incoming = stream.next() => {
                    let text = match incoming {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(_))) | None => {
                            debug!("Realtime socket closed");
                            break;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            warn!("Realtime socket error: {}", e);
                            break;
                        }
                    };

                    let Some(frame) = Frame::parse(&text) else {
                        debug!("Ignoring unreadable realtime frame");
                        continue;
                    };
                    if let Some(message) = protocol::decode_message_insert(&frame) {
                        if tx.send(message).is_err() {
                            break;
                        }
                        continue;
                    }
                    if frame.event == EVENT_REPLY && frame.topic == topic && !frame.is_ok_reply() {
                        warn!(payload = %frame.payload, "Realtime channel join rejected");
                    } else if frame.topic == topic && (frame.event == EVENT_ERROR || frame.event == EVENT_CLOSE) {
                        warn!(event = %frame.event, "Realtime channel closed by server");
                        break;
                    }
                }
            }
        }

        next_ref += 1;
        let _ = sink.send(WsMessage::Text(protocol::leave(&topic, next_ref).to_text())).await;
        let _ = sink.close().await;
    });

    Ok(MessageSubscription::new(rx, task))
}
