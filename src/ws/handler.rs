//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::broadcast::{outbound_channel, Payload};
use crate::game::{AdmitError, LeaveReason, SessionHandle};
use crate::http::routes::AppError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{decode_client, ClientMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if state.session.is_closed() {
        return Err(AppError::Unavailable);
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state)))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    debug!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = outbound_channel();

    // The session owns the only sender; when it lets go, the writer closes the socket
    let mut writer = tokio::spawn(write_loop(conn_id, ws_sink, outbound_rx));

    match state.session.join(conn_id, outbound_tx).await {
        Ok(side) => {
            info!(conn_id = %conn_id, side = side.as_str(), "Connection admitted");
        }
        Err(AdmitError::Full) => {
            info!(conn_id = %conn_id, "Connection rejected, match full");
            let _ = writer.await;
            return;
        }
        Err(e) => {
            error!(conn_id = %conn_id, error = %e, "Failed to join session");
            writer.abort();
            return;
        }
    }

    let limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);
    let reason = tokio::select! {
        reason = read_loop(conn_id, ws_stream, &state.session, &limiter) => reason,
        // Session closed this connection (teardown or timeout)
        _ = &mut writer => LeaveReason::Closed,
    };

    state.session.leave(conn_id, reason).await;
    writer.abort();

    info!(conn_id = %conn_id, reason = ?reason, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> session
async fn read_loop(
    conn_id: Uuid,
    mut ws_stream: SplitStream<WebSocket>,
    session: &SessionHandle,
    limiter: &ConnectionRateLimiter,
) -> LeaveReason {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let Some(msg) = decode_client(&text) else {
                    debug!(conn_id = %conn_id, "Ignoring malformed client message");
                    continue;
                };

                if counts_against_input_limit(&msg) && !limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                if !session.submit(conn_id, msg).await {
                    debug!(conn_id = %conn_id, "Session closed");
                    return LeaveReason::Closed;
                }
            }
            Ok(Message::Binary(_)) => {
                debug!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!(conn_id = %conn_id, "Client initiated close");
                return LeaveReason::Closed;
            }
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket error");
                return LeaveReason::ProtocolError;
            }
        }
    }
    LeaveReason::Closed
}

/// Pongs bypass the input budget
fn counts_against_input_limit(msg: &ClientMsg) -> bool {
    !matches!(msg, ClientMsg::Pong { .. })
}

/// Writer loop: outbound queue -> WebSocket, then close
async fn write_loop(
    conn_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Payload>,
) {
    while let Some(payload) = outbound_rx.recv().await {
        if let Err(e) = ws_sink.send(Message::Text(payload.to_string())).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            return;
        }
    }

    let _ = ws_sink.send(Message::Close(None)).await;
    let _ = ws_sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_intent_messages_spend_the_input_budget() {
        assert!(counts_against_input_limit(&ClientMsg::Input {
            up: true,
            down: false
        }));
        assert!(counts_against_input_limit(&ClientMsg::TouchMove {
            desired_y: 10.0
        }));
        assert!(counts_against_input_limit(&ClientMsg::TouchEnd));
        assert!(!counts_against_input_limit(&ClientMsg::Pong { t: 1 }));
    }

    #[test]
    fn exhausted_budget_still_admits_pongs() {
        let limiter = ConnectionRateLimiter::new(2);
        let touch = ClientMsg::TouchMove { desired_y: 0.0 };
        let admitted = |msg: &ClientMsg| !counts_against_input_limit(msg) || limiter.check_input();

        assert!(admitted(&touch));
        assert!(admitted(&touch));
        assert!(!admitted(&touch));
        assert!(admitted(&ClientMsg::Pong { t: 5 }));
    }
}
