//! Live frame feed over WebSocket
//!
//! Each connection subscribes to the fan-out hub and forwards observed frame
//! records as text messages. Inbound client messages are ignored apart from
//! close.

use crate::app::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use canflex_rules::FrameSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

/// Upgrade handler for `GET /sniff`
pub async fn sniff_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let hub = state.runtime.hub();
    let mut feed = hub.subscribe();
    info!("Sniff subscriber connected ({} active)", hub.subscriber_count());

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            },
            record = feed.recv() => match record {
                Ok(text) => {
                    if sender.send(Message::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Sniff subscriber lagging, {} frames skipped", skipped);
                },
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {},
            },
        }
    }

    drop(feed);
    info!("Sniff subscriber disconnected ({} active)", hub.subscriber_count());
}
