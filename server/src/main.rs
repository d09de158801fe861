use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use werewolf_protocol::*;

mod bridge;
mod game;
mod registry;

use bridge::Connections;
use game::Room;
use registry::{RoomError, RoomRegistry};

// ==== knobs ====
const START_COUNTDOWN: Duration = Duration::from_secs(5); // lobby-full to first night

#[derive(Clone)]
struct AppState {
    registry: Arc<RoomRegistry>,
    connections: Arc<Connections>,
}

impl AppState {
    fn new() -> Self {
        AppState {
            registry: Arc::new(RoomRegistry::new()),
            connections: Arc::new(Connections::new()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("werewolf_server=debug,info")),
        )
        .init();

    let state = AppState::new();
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state);

    let addr = std::env::var("WEREWOLF_ADDR").unwrap_or_else(|_| "0.0.0.0:9001".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("server listening on ws://{addr}/ws");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (tx_out, mut rx_out) = mpsc::unbounded_channel::<ServerToClient>();

    tokio::spawn(async move {
        while let Some(msg) = rx_out.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(err) => {
                    warn!(%err, "failed to encode outbound message");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let my_id = Uuid::new_v4();
    state.connections.register(my_id, tx_out.clone());
    let _ = tx_out.send(ServerToClient::Hello { your_id: my_id });
    info!(conn = %my_id, "connected");

    let mut joined_room: Option<String> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                if let Ok(cmd) = serde_json::from_str::<ClientToServer>(&text) {
                    route_cmd(cmd, &state, &mut joined_room, my_id);
                } else {
                    let _ = tx_out.send(ServerToClient::Error {
                        message: "bad json".into(),
                    });
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    handle_disconnect(&state, my_id, &mut joined_room);
    info!(conn = %my_id, "disconnected");
}

fn route_cmd(cmd: ClientToServer, state: &AppState, joined_room: &mut Option<String>, conn: Uuid) {
    debug!(conn = %conn, ?cmd, "inbound");
    match cmd {
        ClientToServer::CreateRoom {
            name,
            room,
            werewolf_count,
            capacity,
        } => handle_create_room(state, conn, joined_room, name, room, werewolf_count, capacity),
        ClientToServer::JoinRoom { name, room } => {
            handle_join_room(state, conn, joined_room, name, room)
        }
        ClientToServer::WerewolfVote { room, target_id } => {
            handle_werewolf_vote(state, conn, &room, target_id)
        }
        ClientToServer::VillagerVote { room, target_id } => {
            handle_villager_vote(state, conn, &room, target_id)
        }
    }
}

fn send_error(state: &AppState, conn: Uuid, err: &RoomError) {
    state.connections.send(
        conn,
        ServerToClient::Error {
            message: err.to_string(),
        },
    );
}

fn handle_create_room(
    state: &AppState,
    conn: Uuid,
    joined_room: &mut Option<String>,
    name: String,
    room_id: String,
    werewolf_count: usize,
    capacity: usize,
) {
    if joined_room.is_some() {
        return send_error(state, conn, &RoomError::AlreadyInRoom);
    }
    let room = match state.registry.create(&room_id, capacity, werewolf_count) {
        Ok(room) => room,
        Err(err) => {
            warn!(conn = %conn, room = %room_id, %err, "create rejected");
            return send_error(state, conn, &err);
        }
    };
    let mut r = room.lock();
    let player = r.add_player(conn, name.clone(), true);
    *joined_room = Some(room_id.clone());

    state.connections.send(
        conn,
        ServerToClient::RoomCreated {
            room: room_id.clone(),
            player,
        },
    );
    state
        .connections
        .broadcast(&r, ServerToClient::PlayerJoined { players: r.roster() });
    info!(room = %room_id, creator = %name, "room created");
}

fn handle_join_room(
    state: &AppState,
    conn: Uuid,
    joined_room: &mut Option<String>,
    name: String,
    room_id: String,
) {
    if joined_room.is_some() {
        return send_error(state, conn, &RoomError::AlreadyInRoom);
    }
    let room = match state.registry.get(&room_id) {
        Ok(room) => room,
        Err(err) => return send_error(state, conn, &err),
    };
    let mut r = room.lock();
    if r.is_full() {
        return send_error(state, conn, &RoomError::RoomFull);
    }
    if r.started() {
        return send_error(state, conn, &RoomError::GameAlreadyStarted);
    }

    let player = r.add_player(conn, name.clone(), false);
    *joined_room = Some(room_id.clone());
    state.connections.send(
        conn,
        ServerToClient::RoomJoined {
            room: room_id.clone(),
            player,
        },
    );
    state
        .connections
        .broadcast(&r, ServerToClient::PlayerJoined { players: r.roster() });
    info!(room = %room_id, player = %name, "joined");

    if r.is_full() {
        state
            .connections
            .broadcast(&r, ServerToClient::StartCountdown);
        drop(r);
        let state = state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(START_COUNTDOWN).await;
            start_game_when_ready(&state, &room_id);
        });
    }
}

/// Countdown epilogue. The room may have been torn down or drained while
/// the countdown ran; roles are only assigned if it is still full and still
/// in lobby, so assignment happens at most once per room.
fn start_game_when_ready(state: &AppState, room_id: &str) {
    let Ok(room) = state.registry.get(room_id) else {
        debug!(room = %room_id, "countdown fired on destroyed room");
        return;
    };
    let mut r = room.lock();
    if r.phase != Phase::Lobby || !r.is_full() {
        debug!(room = %room_id, phase = ?r.phase, "countdown fired but room no longer ready");
        return;
    }

    r.start_game();
    for p in &r.players {
        if let Some(role) = p.role {
            state
                .connections
                .send(p.conn, ServerToClient::RoleAssigned { role });
        }
    }
    info!(room = %room_id, werewolves = r.werewolf_count, "game started");
    begin_night_phase(state, &mut r);
}

fn begin_night_phase(state: &AppState, r: &mut Room) {
    r.begin_night();
    state.connections.broadcast(r, ServerToClient::NightPhaseStarted);

    let targets = r.alive_targets();
    for wolf in r.werewolves() {
        state.connections.send(
            wolf.conn,
            ServerToClient::WerewolfTurn {
                targets: targets.clone(),
            },
        );
    }
}

fn begin_day_phase(state: &AppState, r: &mut Room) {
    r.begin_day();
    state.connections.broadcast(
        r,
        ServerToClient::DayPhaseStarted {
            targets: r.alive_targets(),
        },
    );
}

fn handle_werewolf_vote(state: &AppState, conn: Uuid, room_id: &str, target: Uuid) {
    let room = match state.registry.get(room_id) {
        Ok(room) => room,
        Err(err) => return send_error(state, conn, &err),
    };
    let mut r = room.lock();
    let Some(voter) = r.player_by_conn(conn).map(|p| p.id) else {
        return;
    };
    if !r.record_werewolf_vote(voter, target) {
        debug!(room = %room_id, conn = %conn, "night vote ignored");
        return;
    }
    if r.all_werewolves_voted() {
        conclude_night(state, &mut r);
    }
}

fn handle_villager_vote(state: &AppState, conn: Uuid, room_id: &str, target: Uuid) {
    let room = match state.registry.get(room_id) {
        Ok(room) => room,
        Err(err) => return send_error(state, conn, &err),
    };
    let mut r = room.lock();
    let Some(voter) = r.player_by_conn(conn).map(|p| p.id) else {
        return;
    };
    if !r.record_day_vote(voter, target) {
        debug!(room = %room_id, conn = %conn, "day vote ignored");
        return;
    }

    state.connections.broadcast(
        &r,
        ServerToClient::VoteUpdate {
            counts: counts_for_targets(&r.votes, &r.alive_ids()),
        },
    );

    if r.all_alive_voted() {
        conclude_day(state, &mut r);
    }
}

/// Runs once the last alive werewolf has voted: resolve, eliminate, then
/// either end the game or hand over to the day phase.
fn conclude_night(state: &AppState, r: &mut Room) {
    let Some(victim) = r.votes.resolve() else {
        return;
    };
    r.eliminate(victim);
    let eliminated = r
        .player_by_id(victim)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    info!(room = %r.id, victim = %eliminated, "night elimination");
    state.connections.broadcast(
        r,
        ServerToClient::NightResult {
            eliminated,
            players: r.roster(),
        },
    );

    match r.winner() {
        Some(winner) => finish_game(state, r, winner),
        None => begin_day_phase(state, r),
    }
}

/// Same shape as the night resolution, but the next phase is night again.
fn conclude_day(state: &AppState, r: &mut Room) {
    let Some(victim) = r.votes.resolve() else {
        return;
    };
    r.eliminate(victim);
    let eliminated = r
        .player_by_id(victim)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    info!(room = %r.id, victim = %eliminated, "day elimination");
    state.connections.broadcast(
        r,
        ServerToClient::DayResult {
            eliminated,
            players: r.roster(),
        },
    );

    match r.winner() {
        Some(winner) => finish_game(state, r, winner),
        None => begin_night_phase(state, r),
    }
}

fn finish_game(state: &AppState, r: &mut Room, winner: Winner) {
    r.end();
    info!(room = %r.id, %winner, "game over");
    state.connections.broadcast(
        r,
        ServerToClient::GameOver {
            winner,
            werewolves: r.werewolves_public(),
        },
    );
}

fn handle_disconnect(state: &AppState, conn: Uuid, joined_room: &mut Option<String>) {
    if let Some(room_id) = joined_room.take() {
        if let Ok(room) = state.registry.get(&room_id) {
            let mut r = room.lock();
            if let Some(player) = r.remove_player_by_conn(conn) {
                info!(room = %room_id, player = %player.name, "left");
                state.connections.broadcast(
                    &r,
                    ServerToClient::PlayerLeft {
                        player_id: player.id,
                        players: r.roster(),
                    },
                );
            }
            drop(r);
            if state.registry.destroy_if_empty(&room_id) {
                info!(room = %room_id, "room removed");
            }
        }
    }
    state.connections.unregister(conn);
}
