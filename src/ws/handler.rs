//! WebSocket session handler
//!
//! One task pair per connection: a reader that parses client messages and
//! routes them to the room directory, and a single writer fed by an mpsc
//! channel so room broadcasts and direct replies never interleave mid-frame.

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::room::RoomError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, LeaderboardEntry, ServerMsg};

/// Leaderboard size returned to clients
const LEADERBOARD_LIMIT: usize = 10;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection state held by the reader loop
struct ConnState {
    conn_id: Uuid,
    /// Joined rooms and their broadcast-forwarder tasks
    joined: HashMap<String, JoinHandle<()>>,
    limiter: ConnectionRateLimiter,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "new websocket connection");

    let (ws_sink, mut ws_stream) = socket.split();

    let (out_tx, out_rx) = mpsc::channel::<ServerMsg>(256);
    let writer = tokio::spawn(write_loop(ws_sink, out_rx));

    // Lobby listing updates go to every connection
    let list_forwarder = spawn_forwarder(state.rooms.subscribe_list(), out_tx.clone());

    let _ = out_tx
        .send(ServerMsg::Welcome {
            conn_id,
            server_time: unix_millis(),
        })
        .await;

    let mut conn = ConnState {
        conn_id,
        joined: HashMap::new(),
        limiter: ConnectionRateLimiter::new(),
    };

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(msg) => handle_msg(&state, &mut conn, &out_tx, msg).await,
                Err(e) => {
                    warn!(conn_id = %conn_id, error = %e, "failed to parse client message");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "websocket keepalive");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "websocket error");
                break;
            }
        }
    }

    // Disconnect counts as leaving every joined room
    for (room_id, forwarder) in conn.joined.drain() {
        forwarder.abort();
        state.rooms.leave_room(&room_id, conn_id).await;
    }
    state.sessions.remove(conn_id);
    list_forwarder.abort();
    writer.abort();

    info!(conn_id = %conn_id, "websocket connection closed");
}

async fn handle_msg(
    state: &AppState,
    conn: &mut ConnState,
    out_tx: &mpsc::Sender<ServerMsg>,
    msg: ClientMsg,
) {
    match msg {
        ClientMsg::Login { username, guest } => {
            state.sessions.set(conn.conn_id, username.clone(), guest);
            send(out_tx, ServerMsg::LoginAccepted { username, guest }).await;
        }

        ClientMsg::CreateRoom {
            room_id,
            password,
            duration_minutes,
            bot_difficulty,
        } => {
            match state.rooms.create_room(
                &room_id,
                conn.conn_id,
                password,
                duration_minutes,
                bot_difficulty,
            ) {
                Ok(()) => send(out_tx, ServerMsg::RoomCreated { room_id }).await,
                Err(e) => send_error(out_tx, &e).await,
            }
        }

        ClientMsg::JoinRoom { room_id, password } => {
            let username = state
                .sessions
                .get(conn.conn_id)
                .map(|s| s.username)
                .unwrap_or_else(|| format!("Player_{}", &conn.conn_id.to_string()[..8]));

            match state
                .rooms
                .join_room(&room_id, conn.conn_id, &username, password)
                .await
            {
                Ok(info) => {
                    if let Some(rx) = state.rooms.subscribe_room(&room_id) {
                        let forwarder = spawn_forwarder(rx, out_tx.clone());
                        if let Some(old) = conn.joined.insert(room_id.clone(), forwarder) {
                            old.abort();
                        }
                    }
                    send(
                        out_tx,
                        ServerMsg::RoomJoined {
                            room: info.room,
                            wall: info.wall,
                            countdown: info.countdown,
                        },
                    )
                    .await;
                }
                Err(e) => send_error(out_tx, &e).await,
            }
        }

        ClientMsg::LeaveRoom { room_id } => {
            if let Some(forwarder) = conn.joined.remove(&room_id) {
                forwarder.abort();
            }
            state.rooms.leave_room(&room_id, conn.conn_id).await;
        }

        ClientMsg::StartGame { room_id } => {
            if let Err(e) = state.rooms.start_game(&room_id, conn.conn_id).await {
                send_error(out_tx, &e).await;
            }
        }

        ClientMsg::Input { room_id, position } => {
            if conn.limiter.check_input() {
                state.rooms.submit_input(&room_id, conn.conn_id, position);
            } else {
                warn!(conn_id = %conn.conn_id, "rate limited input message");
            }
        }

        ClientMsg::GetRooms => {
            send(
                out_tx,
                ServerMsg::RoomList {
                    rooms: state.rooms.get_rooms(),
                },
            )
            .await;
        }

        ClientMsg::GetLeaderboard => match state.stats.get_top_scores(LEADERBOARD_LIMIT).await {
            Ok(rows) => {
                let entries = rows
                    .into_iter()
                    .map(|row| LeaderboardEntry {
                        username: row.username,
                        high_score: row.high_score,
                    })
                    .collect();
                send(out_tx, ServerMsg::Leaderboard { entries }).await;
            }
            Err(e) => {
                warn!(error = %e, "leaderboard fetch failed");
                send(
                    out_tx,
                    ServerMsg::Error {
                        code: "leaderboard_unavailable".to_string(),
                        message: "Leaderboard is unavailable".to_string(),
                    },
                )
                .await;
            }
        },

        ClientMsg::Ping { t } => send(out_tx, ServerMsg::Pong { t }).await,
    }
}

/// Forward a broadcast subscription into the connection's write queue
fn spawn_forwarder(
    mut rx: broadcast::Receiver<ServerMsg>,
    out_tx: mpsc::Sender<ServerMsg>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if out_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Slow client: drop snapshots rather than disconnect
                    warn!(lagged_count = n, "client lagged, skipping {} broadcasts", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Single writer for the socket
async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<ServerMsg>) {
    while let Some(msg) = rx.recv().await {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!(error = %e, "failed to serialize server message");
            }
        }
    }
}

async fn send(out_tx: &mpsc::Sender<ServerMsg>, msg: ServerMsg) {
    let _ = out_tx.send(msg).await;
}

async fn send_error(out_tx: &mpsc::Sender<ServerMsg>, err: &RoomError) {
    send(
        out_tx,
        ServerMsg::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    )
    .await;
}
