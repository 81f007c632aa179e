use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use amphi_core::net::messages::ClientMessage;
use amphi_core::net::protocol::{MAX_MESSAGE_SIZE, decode_client_message};

use crate::game_loop::{ConnectionId, GameCommand};
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let conn = state.allocate_connection_id();
    let (ws_sender, mut ws_receiver) = socket.split();

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    if state
        .commands
        .send(GameCommand::Connect { conn, tx })
        .is_err()
    {
        tracing::warn!(conn, "Game loop unavailable, closing connection");
        return;
    }
    tracing::info!(conn, "Client connected");

    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, conn).await;

    let _ = state.commands.send(GameCommand::Disconnect { conn });
    tracing::info!(conn, "Client disconnected");
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Map a decoded client message to the command the game loop handles.
fn to_command(conn: ConnectionId, msg: ClientMessage) -> GameCommand {
    match msg {
        ClientMessage::JoinGame(join) => GameCommand::Join {
            conn,
            name: join.name,
        },
        ClientMessage::AttachDisplay => GameCommand::AttachDisplay { conn },
        ClientMessage::PlayerAction(a) => GameCommand::Action {
            conn,
            action: a.action,
        },
        ClientMessage::AdminStart => GameCommand::AdminStart { conn },
        ClientMessage::AdminReset => GameCommand::AdminReset,
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    conn: ConnectionId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(conn, "Rate limited");
            continue;
        }

        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(conn, error = %e, "Ignoring malformed client message");
                continue;
            },
        };

        if state.commands.send(to_command(conn, msg)).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amphi_core::game_trait::Action;
    use amphi_core::net::messages::{JoinGameMsg, PlayerActionMsg};

    #[tokio::test]
    async fn rate_limiter_allows_burst_then_blocks() {
        let mut limiter = RateLimiter::new(3.0, 0.0);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[tokio::test]
    async fn rate_limiter_refills_over_time() {
        let mut limiter = RateLimiter::new(1.0, 100.0);
        assert!(limiter.allow());
        assert!(!limiter.allow());
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(limiter.allow());
    }

    #[test]
    fn client_messages_map_to_commands() {
        let join = to_command(
            4,
            ClientMessage::JoinGame(JoinGameMsg {
                name: "Dana".to_string(),
            }),
        );
        assert!(matches!(join, GameCommand::Join { conn: 4, ref name } if name == "Dana"));

        let action = to_command(
            4,
            ClientMessage::PlayerAction(PlayerActionMsg {
                action: Action::Tap,
            }),
        );
        assert!(matches!(
            action,
            GameCommand::Action {
                conn: 4,
                action: Action::Tap
            }
        ));
        assert!(matches!(
            to_command(4, ClientMessage::AdminReset),
            GameCommand::AdminReset
        ));
    }
}
