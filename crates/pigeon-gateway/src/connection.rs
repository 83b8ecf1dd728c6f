use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message as Frame, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use pigeon_types::events::GatewayEvent;

use crate::dispatcher::Dispatcher;

const PING_EVERY: Duration = Duration::from_secs(15);
/// Unanswered pings tolerated before the socket is considered dead.
const MAX_MISSED_PONGS: u8 = 2;

/// Counts pings that have gone unanswered since the last pong.
#[derive(Default)]
struct Liveness {
    missed: AtomicU8,
}

impl Liveness {
    fn pong(&self) {
        self.missed.store(0, Ordering::Release);
    }

    /// Record an outgoing ping. Returns how many earlier pings went unanswered.
    fn ping(&self) -> u8 {
        self.missed.fetch_add(1, Ordering::AcqRel)
    }
}

/// Drive an already-authenticated WebSocket until either side goes away.
/// The token is checked at the HTTP upgrade, before this is called.
pub async fn handle_connection_authenticated(
    socket: WebSocket,
    dispatcher: Dispatcher,
    user_id: Uuid,
    username: String,
) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe before Ready so nothing dispatched in between is lost
    let (conn_id, mut events) = dispatcher.register_user_channel(user_id).await;
    info!(
        "Gateway session opened for {} ({}), {} active",
        username,
        user_id,
        dispatcher.connection_count(user_id).await
    );

    let hello = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    if !send_event(&mut sink, &hello).await {
        dispatcher.unregister_user_channel(user_id, conn_id).await;
        return;
    }

    let liveness = Arc::new(Liveness::default());

    let outbound_liveness = liveness.clone();
    let mut outbound = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PING_EVERY);
        // The first tick fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if !send_event(&mut sink, &event).await {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let missed = outbound_liveness.ping();
                    if missed >= MAX_MISSED_PONGS {
                        warn!("No pong for {} pings, closing gateway session {}", missed, conn_id);
                        break;
                    }
                    if sink.send(Frame::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Push-only: inbound frames are read for liveness and close.
    let reader_name = username.clone();
    let mut inbound = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            match frame {
                Frame::Pong(_) => liveness.pong(),
                Frame::Close(_) => break,
                Frame::Text(text) => {
                    debug!("Ignoring {}-byte text frame from {} ({})", text.as_str().len(), reader_name, user_id);
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut outbound => inbound.abort(),
        _ = &mut inbound => outbound.abort(),
    }

    dispatcher.unregister_user_channel(user_id, conn_id).await;
    info!("Gateway session closed for {} ({})", username, user_id);
}

/// Serialize and send one event. Returns `false` once the socket is unusable.
async fn send_event(sink: &mut SplitSink<WebSocket, Frame>, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize gateway event: {}", e);
            return true;
        }
    };
    sink.send(Frame::Text(text.into())).await.is_ok()
}
