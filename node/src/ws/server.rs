use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::{SinkExt, StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::events::EventBus;
use crate::rpc::RpcContext;

pub async fn ws_handler(
    Extension(ctx): Extension<RpcContext>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let events = ctx.events.clone();
    ws.on_upgrade(move |socket| handle_socket(events, socket))
}

async fn handle_socket(events: EventBus, socket: WebSocket) {
    let (mut sink, mut inbound) = socket.split();
    let mut stream = BroadcastStream::new(events.subscribe());

    // Forward bus events; a lagging socket loses its oldest events but stays
    // connected, and the drop count is recorded.
    let bus = events.clone();
    let forward = tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    let Ok(txt) = serde_json::to_string(&event) else { continue };
                    if sink.send(Message::Text(txt)).await.is_err() {
                        debug!("ws subscriber disconnected");
                        break;
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    bus.note_lagged(n);
                    warn!(dropped = n, "ws subscriber lagged, dropping oldest events");
                }
            }
        }
    });

    // Inbound messages are ignored; the stream ending means disconnect.
    while let Some(msg) = inbound.next().await {
        if msg.is_err() {
            break;
        }
    }
    forward.abort();
}
