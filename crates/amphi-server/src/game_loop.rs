use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use amphi_core::events::{Audience, Envelope};
use amphi_core::game_trait::{Action, ParticipantId};
use amphi_core::net::messages::{DeclinedMsg, JoinAcceptedMsg, ServerMessage};
use amphi_core::net::protocol::encode_server_message;
use amphi_core::phase::Phase;
use amphi_core::snapshot::{DisplaySnapshot, ParticipantSnapshot};

use crate::session::GameSession;

/// Connection handle. A connection that joins keeps it as its participant id.
pub type ConnectionId = ParticipantId;

/// Commands sent from the WebSocket and HTTP handlers to the game tick loop.
#[derive(Debug)]
pub enum GameCommand {
    Connect {
        conn: ConnectionId,
        tx: mpsc::Sender<Bytes>,
    },
    Disconnect {
        conn: ConnectionId,
    },
    Join {
        conn: ConnectionId,
        name: String,
    },
    AttachDisplay {
        conn: ConnectionId,
    },
    Action {
        conn: ConnectionId,
        action: Action,
    },
    AdminStart {
        conn: ConnectionId,
    },
    AdminReset,
    Snapshot {
        reply: oneshot::Sender<DisplaySnapshot>,
    },
    ParticipantState {
        id: ParticipantId,
        reply: oneshot::Sender<Option<ParticipantSnapshot>>,
    },
    Stats {
        reply: oneshot::Sender<SessionStats>,
    },
    Stop,
}

/// Counters reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub phase: Phase,
    pub round_number: u32,
    pub joined: usize,
    pub alive: usize,
    pub displays: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Pending,
    Participant,
    Display,
}

struct Connection {
    tx: mpsc::Sender<Bytes>,
    role: Role,
}

/// Live connections and audience routing for outbound messages.
#[derive(Default)]
struct Connections {
    conns: HashMap<ConnectionId, Connection>,
}

impl Connections {
    fn send(&self, conn: ConnectionId, data: &Bytes) {
        if let Some(c) = self.conns.get(&conn) {
            push(conn, c, data);
        }
    }

    fn send_where(&self, data: &Bytes, pred: impl Fn(Role) -> bool) {
        for (&conn, c) in &self.conns {
            if pred(c.role) {
                push(conn, c, data);
            }
        }
    }

    fn has_displays(&self) -> bool {
        self.conns.values().any(|c| c.role == Role::Display)
    }

    fn count(&self, role: Role) -> usize {
        self.conns.values().filter(|c| c.role == role).count()
    }

    /// Encode each notification once and fan it out to its audience.
    fn deliver(&self, envelopes: Vec<Envelope>) {
        for Envelope { audience, event } in envelopes {
            let Some(data) = encode(&ServerMessage::Event(event)) else {
                continue;
            };
            match audience {
                Audience::All => self.send_where(&data, |_| true),
                Audience::Displays => self.send_where(&data, |r| r == Role::Display),
                Audience::Participant(id) => self.send(id, &data),
            }
        }
    }
}

/// Slow consumers lose messages instead of stalling the tick loop.
fn push(conn: ConnectionId, c: &Connection, data: &Bytes) {
    if let Err(e) = c.tx.try_send(data.clone()) {
        tracing::debug!(conn, error = %e, "Dropping outbound message");
    }
}

fn encode(msg: &ServerMessage) -> Option<Bytes> {
    match encode_server_message(msg) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::error!(msg_type = ?msg.message_type(), error = %e, "Failed to encode server message");
            None
        },
    }
}

/// Spawn the game tick loop as a tokio task. It owns the session.
pub fn spawn_game_loop(
    session: GameSession,
) -> (mpsc::UnboundedSender<GameCommand>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_game_loop(session, cmd_rx));
    (cmd_tx, handle)
}

async fn run_game_loop(mut session: GameSession, mut cmd_rx: mpsc::UnboundedReceiver<GameCommand>) {
    let tick_interval = Duration::from_secs_f64(1.0 / f64::from(session.tick_rate()));
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut conns = Connections::default();

    tracing::info!(tick_rate = session.tick_rate(), "Game loop running");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                session.tick();
                conns.deliver(session.drain_outbox());
                broadcast_snapshots(&session, &conns);
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(GameCommand::Stop) | None => break,
                    Some(cmd) => handle_command(&mut session, &mut conns, cmd),
                }
                conns.deliver(session.drain_outbox());
            }
        }
    }
    tracing::info!("Game loop stopped");
}

fn broadcast_snapshots(session: &GameSession, conns: &Connections) {
    if conns.has_displays() {
        let msg = ServerMessage::DisplayState(Box::new(session.display_snapshot()));
        if let Some(data) = encode(&msg) {
            conns.send_where(&data, |r| r == Role::Display);
        }
    }
    for (&conn, c) in &conns.conns {
        if c.role != Role::Participant {
            continue;
        }
        if let Some(snapshot) = session.participant_snapshot(conn)
            && let Some(data) = encode(&ServerMessage::PlayerState(snapshot))
        {
            push(conn, c, &data);
        }
    }
}

fn decline(conns: &Connections, conn: ConnectionId, reason: String) {
    if let Some(data) = encode(&ServerMessage::Declined(DeclinedMsg { reason })) {
        conns.send(conn, &data);
    }
}

fn handle_command(session: &mut GameSession, conns: &mut Connections, cmd: GameCommand) {
    match cmd {
        GameCommand::Connect { conn, tx } => {
            conns.conns.insert(
                conn,
                Connection {
                    tx,
                    role: Role::Pending,
                },
            );
            tracing::debug!(conn, "Connection registered");
        },
        GameCommand::Disconnect { conn } => {
            if let Some(c) = conns.conns.remove(&conn)
                && c.role == Role::Participant
            {
                session.leave(conn);
            }
            tracing::debug!(conn, "Connection closed");
        },
        GameCommand::Join { conn, name } => {
            let Some(role) = conns.conns.get(&conn).map(|c| c.role) else {
                return;
            };
            if role == Role::Display {
                decline(conns, conn, "displays cannot join".to_string());
                return;
            }
            match session.join(conn, &name) {
                Ok(participant) => {
                    if let Some(c) = conns.conns.get_mut(&conn) {
                        c.role = Role::Participant;
                    }
                    let msg = ServerMessage::JoinAccepted(JoinAcceptedMsg { participant });
                    if let Some(data) = encode(&msg) {
                        conns.send(conn, &data);
                    }
                },
                Err(e) => {
                    tracing::debug!(conn, name = %name, reason = %e, "Join declined");
                    decline(conns, conn, e.to_string());
                },
            }
        },
        GameCommand::AttachDisplay { conn } => {
            let Some(c) = conns.conns.get_mut(&conn) else {
                return;
            };
            if c.role == Role::Participant {
                tracing::debug!(conn, "Participant tried to attach as display");
                return;
            }
            c.role = Role::Display;
            tracing::info!(conn, "Display attached");
            let msg = ServerMessage::DisplayState(Box::new(session.display_snapshot()));
            if let Some(data) = encode(&msg) {
                conns.send(conn, &data);
            }
        },
        GameCommand::Action { conn, action } => {
            if conns
                .conns
                .get(&conn)
                .is_some_and(|c| c.role == Role::Participant)
            {
                session.route_input(conn, &action);
            }
        },
        GameCommand::AdminStart { conn } => {
            if let Err(e) = session.start_game() {
                tracing::warn!(conn, reason = %e, "Start declined");
                decline(conns, conn, e.to_string());
            }
        },
        GameCommand::AdminReset => session.reset(),
        GameCommand::Snapshot { reply } => {
            let _ = reply.send(session.display_snapshot());
        },
        GameCommand::ParticipantState { id, reply } => {
            let _ = reply.send(session.participant_snapshot(id));
        },
        GameCommand::Stats { reply } => {
            let _ = reply.send(SessionStats {
                phase: session.phase(),
                round_number: session.round_number(),
                joined: session.roster().len(),
                alive: session.roster().alive_count(),
                displays: conns.count(Role::Display),
            });
        },
        GameCommand::Stop => {},
    }
}
