//! Listener WebSocket
//!
//! Each connection receives the latest meta and a snapshot on join, then
//! every broadcast message. Control requests arriving on the same socket
//! are answered only to the sender.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use relay::{RelayError, RelayHandle, Subscription};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use stream_protocol::{ControlReply, ControlRequest, RelayMessage};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::AppState;

/// Handle WebSocket upgrade
pub async fn stream_socket(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let subscription = match state.relay.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!("Rejecting listener: {}", e);
            return;
        }
    };
    info!("Listener connected");

    let (sender, receiver) = socket.split();
    serve_listener(sender, receiver, subscription, &state.relay).await;

    info!("Listener disconnected");
}

/// Drive one listener until either side goes away.
///
/// Sends the subscription's meta and snapshot first, then forwards every
/// broadcast message. A listener that falls behind the broadcast buffer
/// skips what it missed and carries on.
pub async fn serve_listener<S, R, E>(
    mut sender: S,
    mut receiver: R,
    subscription: Subscription,
    relay: &RelayHandle,
) where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let Subscription {
        meta,
        snapshot,
        receiver: mut updates,
    } = subscription;

    if let Some(meta) = meta {
        if send_json(&mut sender, &RelayMessage::Meta(meta)).await.is_err() {
            return;
        }
    }
    if let Some(snapshot) = snapshot {
        if send_json(&mut sender, &RelayMessage::Snapshot(snapshot)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(message) => {
                    if send_json(&mut sender, &message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Listener fell behind, {} messages skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match handle_control(relay, &text).await {
                        Ok(Some(reply)) => {
                            if send_json(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("Control request failed: {}", e);
                            break;
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    }
}

/// Apply one control request from a listener.
///
/// Unparseable requests are logged and ignored.
pub async fn handle_control(
    relay: &RelayHandle,
    text: &str,
) -> Result<Option<ControlReply>, RelayError> {
    let request: ControlRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            warn!("Ignoring malformed control request: {}", e);
            return Ok(None);
        }
    };

    let reply = match request {
        ControlRequest::SetFilters(update) => ControlReply::Filters(relay.set_filters(update).await?),
        ControlRequest::ClearBuffer => {
            relay.clear().await?;
            ControlReply::Cleared
        }
        ControlRequest::RequestStatus => ControlReply::Status(relay.status().await?),
    };
    Ok(Some(reply))
}

async fn send_json<S, T>(sender: &mut S, message: &T) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
    T: Serialize,
{
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            error!("Failed to serialize message: {}", e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay::{LoopbackSource, PassthroughProcessor, Relay, RelayConfig};
    use sampler::{Sampler, SamplerConfig};
    use std::convert::Infallible;
    use stream_protocol::{DeltaPayload, MetaPayload, SnapshotPayload, SnapshotSamples};
    use tokio::sync::broadcast;

    fn idle_handle() -> RelayHandle {
        let sampler = Sampler::new(SamplerConfig::default());
        let (_relay, handle) = Relay::new(
            RelayConfig::default(),
            LoopbackSource::new(sampler.encoder()),
            PassthroughProcessor,
        );
        handle
    }

    fn delta(t0_ms: u32, value: u16) -> RelayMessage {
        RelayMessage::Delta(DeltaPayload {
            t0_ms,
            value: vec![value],
            dt_ms: vec![0],
            threshold: None,
        })
    }

    fn decode(sent: &[Message]) -> Vec<RelayMessage> {
        sent.iter()
            .map(|message| match message {
                Message::Text(text) => serde_json::from_str(text).unwrap(),
                other => panic!("unexpected frame {:?}", other),
            })
            .collect()
    }

    /// Incoming side of a client that never sends anything
    fn silent_client() -> impl Stream<Item = Result<Message, Infallible>> + Unpin {
        futures_util::stream::pending()
    }

    #[tokio::test]
    async fn test_join_sends_meta_then_snapshot_then_updates() {
        let meta = MetaPayload {
            status: "Connected (loopback)".to_string(),
            ..Default::default()
        };
        let snapshot = SnapshotPayload {
            t0_ms: 100,
            samples: SnapshotSamples {
                t_rel_ms: vec![0, 5],
                value: vec![1, 2],
            },
            threshold: None,
        };
        let (tx, rx) = broadcast::channel(8);
        tx.send(delta(110, 3)).unwrap();
        drop(tx);

        let subscription = Subscription {
            meta: Some(meta.clone()),
            snapshot: Some(snapshot.clone()),
            receiver: rx,
        };
        let mut sent: Vec<Message> = Vec::new();
        serve_listener(&mut sent, silent_client(), subscription, &idle_handle()).await;

        assert_eq!(
            decode(&sent),
            vec![
                RelayMessage::Meta(meta),
                RelayMessage::Snapshot(snapshot),
                delta(110, 3),
            ]
        );
        match &sent[0] {
            Message::Text(text) => assert!(text.starts_with(r#"{"event":"ecg_meta""#)),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lagging_listener_keeps_receiving() {
        let (tx, rx) = broadcast::channel(2);
        for i in 0..4u16 {
            tx.send(delta(i as u32 * 5, i)).unwrap();
        }
        drop(tx);

        let subscription = Subscription {
            meta: None,
            snapshot: None,
            receiver: rx,
        };
        let mut sent: Vec<Message> = Vec::new();
        serve_listener(&mut sent, silent_client(), subscription, &idle_handle()).await;

        // The two oldest were overwritten; the stream resumes after them.
        assert_eq!(decode(&sent), vec![delta(10, 2), delta(15, 3)]);
    }
}
