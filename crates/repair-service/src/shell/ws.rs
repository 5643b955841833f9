// Per-connection websocket session: forwards hub frames to the socket and
// unregisters on close or write failure.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::shell::hub::StatusHub;

pub async fn client_session(hub: Arc<StatusHub>, user_id: String, socket: WebSocket) {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<String>();
    let connection_id = hub.register(&user_id, frames_tx);
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = frames_rx.recv() => match frame {
                Some(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    hub.unregister(&user_id, connection_id);
    tracing::debug!(user_id, connection = connection_id, "websocket session closed");
}
