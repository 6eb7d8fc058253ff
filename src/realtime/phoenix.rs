//! Websocket transport for the hosted database's realtime service.
//!
//! The service speaks the Phoenix channel protocol (v1 JSON frames:
//! `{topic, event, payload, ref}`). We join one channel per user with a
//! `postgres_changes` filter per watched table, keep the socket alive with
//! heartbeats and translate replies and change payloads into
//! [`ChannelMessage`]s.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{
    ChangeEvent, ChangeKind, ChannelMessage, ChannelSpec, RealtimeError, RealtimeTransport,
    WatchedTable,
};
use crate::config::{RealtimeSettings, RemoteSettings};

const CHANNEL_CAPACITY: usize = 64;
const JOIN_REF: &str = "1";

/// Topic name for a channel.
pub fn topic(spec: &ChannelSpec) -> String {
    format!("realtime:{}", spec.channel_name())
}

/// Build the `phx_join` frame for a channel.
pub fn encode_join(spec: &ChannelSpec, access_token: Option<&str>) -> String {
    let changes: Vec<Value> = spec
        .tables
        .iter()
        .map(|table| {
            json!({
                "event": "*",
                "schema": "public",
                "table": table.table_name(),
                "filter": table.filter(spec.user_id),
            })
        })
        .collect();

    let mut payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": changes,
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }

    json!({
        "topic": topic(spec),
        "event": "phx_join",
        "payload": payload,
        "ref": JOIN_REF,
    })
    .to_string()
}

/// Build a heartbeat frame.
pub fn encode_heartbeat(reference: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string(),
    })
    .to_string()
}

/// Build the `phx_leave` frame for a channel.
pub fn encode_leave(spec: &ChannelSpec, reference: u64) -> String {
    json!({
        "topic": topic(spec),
        "event": "phx_leave",
        "payload": {},
        "ref": reference.to_string(),
    })
    .to_string()
}

fn reply_reason(payload: &Value) -> String {
    payload["response"]["reason"]
        .as_str()
        .or_else(|| payload["message"].as_str())
        .unwrap_or("subscription rejected")
        .to_string()
}

fn decode_change(payload: &Value) -> Result<Option<ChannelMessage>, RealtimeError> {
    let data = &payload["data"];

    let kind = data["type"]
        .as_str()
        .and_then(ChangeKind::parse)
        .ok_or_else(|| RealtimeError::Protocol(format!("unknown change type: {}", data["type"])))?;

    let Some(table) = data["table"].as_str().and_then(WatchedTable::from_table_name) else {
        tracing::debug!("Ignoring change on unwatched table {}", data["table"]);
        return Ok(None);
    };

    let row = match kind {
        ChangeKind::Delete => data["old_record"].clone(),
        _ => data["record"].clone(),
    };

    Ok(Some(ChannelMessage::Change(ChangeEvent { table, kind, row })))
}

/// Translate an incoming frame for `topic`.
///
/// Returns `Ok(None)` for frames that carry nothing for the bridge
/// (heartbeat replies, other topics, presence).
pub fn decode_frame(text: &str, topic: &str) -> Result<Option<ChannelMessage>, RealtimeError> {
    let frame: Value =
        serde_json::from_str(text).map_err(|e| RealtimeError::Protocol(e.to_string()))?;

    if frame["topic"].as_str() != Some(topic) {
        return Ok(None);
    }

    let payload = &frame["payload"];
    match frame["event"].as_str() {
        Some("phx_reply") if frame["ref"].as_str() == Some(JOIN_REF) => {
            match payload["status"].as_str() {
                Some("ok") => Ok(Some(ChannelMessage::Subscribed)),
                _ => Ok(Some(ChannelMessage::Error(reply_reason(payload)))),
            }
        }
        Some("system") if payload["status"].as_str() == Some("error") => {
            Ok(Some(ChannelMessage::Error(reply_reason(payload))))
        }
        Some("phx_error") => Ok(Some(ChannelMessage::Error("channel crashed".to_string()))),
        Some("phx_close") => Ok(Some(ChannelMessage::Closed)),
        Some("postgres_changes") => decode_change(payload),
        _ => Ok(None),
    }
}

/// Realtime transport over a websocket.
#[derive(Debug, Clone)]
pub struct PhoenixTransport {
    endpoint: String,
    access_token: Option<String>,
    heartbeat: Duration,
}

impl PhoenixTransport {
    /// Create a transport from connection settings.
    pub fn new(remote: &RemoteSettings, realtime: &RealtimeSettings) -> Result<Self, RealtimeError> {
        let base = remote.base_url.trim_end_matches('/');
        let socket_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(RealtimeError::ConnectionFailed(format!(
                "unsupported base url: {:?}",
                remote.base_url
            )));
        };

        Ok(Self {
            endpoint: format!(
                "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
                socket_base, remote.api_key
            ),
            access_token: None,
            heartbeat: Duration::from_secs(realtime.heartbeat_secs.max(1)),
        })
    }

    /// Use the signed-in user's token when joining.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RealtimeTransport for PhoenixTransport {
    async fn subscribe(
        &self,
        spec: ChannelSpec,
    ) -> Result<mpsc::Receiver<ChannelMessage>, RealtimeError> {
        let (socket, _) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let (mut write, mut read) = socket.split();

        write
            .send(Message::Text(encode_join(&spec, self.access_token.as_deref())))
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let heartbeat = self.heartbeat;
        let topic = topic(&spec);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat);
            ticker.tick().await;
            let mut next_ref: u64 = 2;

            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        let _ = write.send(Message::Text(encode_leave(&spec, next_ref))).await;
                        let _ = write.close().await;
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = write.send(Message::Text(encode_heartbeat(next_ref))).await {
                            let _ = tx.send(ChannelMessage::Error(e.to_string())).await;
                            break;
                        }
                        next_ref += 1;
                    }
                    frame = read.next() => {
                        let message = match frame {
                            Some(Ok(Message::Text(text))) => match decode_frame(&text, &topic) {
                                Ok(message) => message,
                                Err(e) => {
                                    tracing::warn!("Skipping realtime frame: {}", e);
                                    None
                                }
                            },
                            Some(Ok(Message::Close(_))) | None => Some(ChannelMessage::Closed),
                            Some(Ok(_)) => None,
                            Some(Err(e)) => Some(ChannelMessage::Error(e.to_string())),
                        };

                        if let Some(message) = message {
                            let done = matches!(message, ChannelMessage::Closed | ChannelMessage::Error(_));
                            if tx.send(message).await.is_err() || done {
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}
