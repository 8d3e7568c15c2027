//! Connection hub: the synchronization layer between clients and the engine.
//!
//! The hub owns the [`GameEngine`] and one record per connected participant.
//! Every inbound message goes through rate limiting and envelope validation,
//! is applied to the engine, and the resulting event is broadcast to all
//! connections. Failures are answered to the sender only.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use antgrid_core::ParticipantId;
use antgrid_simulation::{EngineError, GameEngine, TickSummary};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::protocol::{grid_chunks, ClientMessage, GridInfo, ProtocolError, ServerMessage, WelcomeState};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::sender::{Frame, Sender};

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSettings {
    pub rate_limit: RateLimitConfig,
    /// Maximum cells per GRID_CHUNK during initial transfer.
    pub chunk_size: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            chunk_size: 1000,
        }
    }
}

/// Lifecycle of one connection.
///
/// `Connecting` between [`Hub::register`] and [`Hub::welcome`], `Joined` until the first accepted message, then `Active` and
/// `RateLimited` alternate as the limiter trips and recovers. `Disconnected`
/// is terminal and is what the hub reports for ids it no longer tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Joined,
    Active,
    RateLimited,
    Disconnected,
}

struct Connection {
    sender: Box<dyn Sender>,
    limiter: RateLimiter,
    /// Cleared by each heartbeat, set again by any inbound frame.
    alive: bool,
    state: ConnectionState,
}

pub struct Hub {
    engine: GameEngine,
    settings: HubSettings,
    connections: HashMap<ParticipantId, Connection>,
    tick_interval: watch::Sender<Duration>,
}

impl Hub {
    pub fn new(engine: GameEngine, settings: HubSettings) -> Self {
        let (tick_interval, _) = watch::channel(engine.tick_interval());
        Self {
            engine,
            settings,
            connections: HashMap::new(),
            tick_interval,
        }
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn tick_interval(&self) -> Duration {
        self.engine.tick_interval()
    }

    /// Receives the new tick interval whenever a config update changes it.
    pub fn watch_tick_interval(&self) -> watch::Receiver<Duration> {
        self.tick_interval.subscribe()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connection_state(&self, id: ParticipantId) -> ConnectionState {
        self.connections
            .get(&id)
            .map_or(ConnectionState::Disconnected, |connection| connection.state)
    }

    /// Registers a new connection as a participant and sends it the initial
    /// state; see [`Self::register`] and [`Self::welcome`].
    pub fn connect(&mut self, sender: Box<dyn Sender>) -> Result<ParticipantId, EngineError> {
        let id = self.register(sender)?;
        self.welcome(id);
        Ok(id)
    }

    /// Joins the engine and records the connection as `Connecting`. When the
    /// session is full the sender gets ERROR and Close instead.
    pub fn register(&mut self, sender: Box<dyn Sender>) -> Result<ParticipantId, EngineError> {
        let participant = match self.engine.join() {
            Ok(participant) => participant,
            Err(err) => {
                warn!(error = %err, "Rejecting connection");
                let mut frames = Vec::with_capacity(2);
                if let Some(text) = encode(&ServerMessage::error(err.to_string())) {
                    frames.push(Frame::Text(text));
                }
                frames.push(Frame::Close);
                for frame in frames {
                    if let Err(send_err) = sender.send(frame) {
                        warn!(error = %send_err, "Failed to notify rejected connection");
                    }
                }
                return Err(err);
            }
        };

        self.connections.insert(participant.id, Connection {
            sender,
            limiter: RateLimiter::new(self.settings.rate_limit),
            alive: true,
            state: ConnectionState::Connecting,
        });
        Ok(participant.id)
    }

    /// Sends WELCOME and the painted cells as GRID_CHUNKs to a `Connecting`
    /// connection, moves it to `Joined` and tells every other connection
    /// with PLAYER_JOINED.
    pub fn welcome(&mut self, id: ParticipantId) {
        let Some(participant) = self.engine.participant(id).cloned() else {
            warn!(participant = %id, "Cannot welcome unknown participant");
            return;
        };
        let Some(connection) = self.connections.get_mut(&id) else {
            warn!(participant = %id, "Cannot welcome unregistered connection");
            return;
        };
        if connection.state != ConnectionState::Connecting {
            return;
        }

        let grid = self.engine.grid();
        let welcome = ServerMessage::Welcome {
            participant: participant.clone(),
            state: WelcomeState {
                ants: self.engine.ants().to_vec(),
                grid: GridInfo {
                    width: grid.width(),
                    height: grid.height(),
                },
            },
        };
        send_message(id, connection, &welcome);

        let chunks = grid_chunks(&grid.snapshot(), self.settings.chunk_size);
        if !chunks.is_empty() {
            debug!(participant = %id, chunks = chunks.len(), "Sending initial grid");
        }
        for chunk in &chunks {
            send_message(id, connection, chunk);
        }
        connection.state = ConnectionState::Joined;

        self.broadcast_except(
            id,
            &ServerMessage::PlayerJoined {
                participant_id: id,
                color: participant.color,
            },
        );

        info!(participant = %id, connections = self.connections.len(), "Connection joined");
    }

    /// Handles one inbound text frame received at `now`.
    pub fn handle_text(&mut self, id: ParticipantId, text: &str, now: Instant) {
        if self.admit(id, now) {
            self.process(id, ClientMessage::parse(text));
        }
    }

    /// Binary frames are treated as text when they hold valid UTF-8.
    pub fn handle_binary(&mut self, id: ParticipantId, data: &[u8], now: Instant) {
        if self.admit(id, now) {
            let parsed = std::str::from_utf8(data)
                .map_err(|_| ProtocolError::InvalidJson)
                .and_then(ClientMessage::parse);
            self.process(id, parsed);
        }
    }

    /// Rate limiting and state bookkeeping for one inbound frame.
    fn admit(&mut self, id: ParticipantId, now: Instant) -> bool {
        let Some(connection) = self.connections.get_mut(&id) else {
            debug!(participant = %id, "Ignoring frame from unknown connection");
            return false;
        };
        connection.alive = true;

        if !connection.limiter.check(now) {
            if connection.state != ConnectionState::RateLimited {
                warn!(participant = %id, "Rate limit exceeded");
            }
            connection.state = ConnectionState::RateLimited;
            send_message(id, connection, &ServerMessage::error(RATE_LIMIT_MESSAGE));
            return false;
        }

        connection.state = ConnectionState::Active;
        true
    }

    fn process(&mut self, id: ParticipantId, parsed: Result<ClientMessage, ProtocolError>) {
        let message = match parsed {
            Ok(message) => message,
            Err(err) => {
                debug!(participant = %id, error = %err, "Rejected malformed message");
                self.reply_error(id, err.to_string());
                return;
            }
        };

        let kind = message.kind();
        match self.apply(id, message) {
            Ok(event) => {
                debug!(participant = %id, kind, "Applied message");
                self.broadcast(&event);
            }
            Err(err) => {
                warn!(participant = %id, kind, error = %err, error_kind = ?err.kind(), "Rejected message");
                self.reply_error(id, err.to_string());
            }
        }
    }

    fn apply(&mut self, id: ParticipantId, message: ClientMessage) -> Result<ServerMessage, EngineError> {
        let engine = &mut self.engine;
        match message {
            ClientMessage::PlaceAnt(payload) => {
                let ant = engine.place_ant(
                    id,
                    payload.position,
                    payload.rules.as_deref(),
                    payload.direction.unwrap_or_default(),
                )?;
                Ok(ServerMessage::AntPlaced {
                    participant_id: id,
                    ant,
                    cells: engine.changed_cells().clone(),
                })
            }
            ClientMessage::ChangeRules(payload) => {
                let rules = engine.update_rules(id, &payload.rules)?;
                Ok(ServerMessage::RulesChanged { participant_id: id, rules })
            }
            ClientMessage::FlipTile(payload) => {
                let cells = engine.flip_tile(id, payload.position)?;
                Ok(ServerMessage::TileFlipped { participant_id: id, cells })
            }
            ClientMessage::UpdateGameConfig(payload) => {
                engine.update_config(
                    payload.grid_size,
                    payload.grid_size,
                    payload.tick_interval_ms.map(Duration::from_millis),
                )?;
                let interval = engine.tick_interval();
                self.tick_interval.send_if_modified(|current| {
                    let changed = *current != interval;
                    *current = interval;
                    changed
                });
                Ok(ServerMessage::GameConfigUpdated {
                    grid_size: engine.grid().width(),
                    tick_interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Advances the simulation one tick and broadcasts the diff, if any.
    pub fn tick(&mut self) -> TickSummary {
        let summary = self.engine.tick();
        let cells = self.engine.changed_cells();
        if summary.moved == 0 && cells.is_empty() {
            return summary;
        }

        let update = ServerMessage::GameTickUpdate {
            cells: cells.clone(),
            ants: self.engine.ants().to_vec(),
        };
        self.broadcast(&update);
        summary
    }

    /// Marks a connection as responsive (pong received).
    pub fn mark_alive(&mut self, id: ParticipantId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.alive = true;
        }
    }

    /// Pings every connection that answered since the previous call and
    /// disconnects the ones that did not. Returns the disconnected ids.
    pub fn heartbeat(&mut self) -> Vec<ParticipantId> {
        let mut dead = Vec::new();
        for (id, connection) in self.connections.iter_mut() {
            if !connection.alive {
                dead.push(*id);
                continue;
            }
            connection.alive = false;
            deliver(*id, connection, Frame::Ping);
        }

        for id in &dead {
            if let Some(connection) = self.connections.get(id) {
                deliver(*id, connection, Frame::Close);
            }
            info!(participant = %id, "Heartbeat timed out");
            self.disconnect(*id);
        }
        dead
    }

    /// Removes a connection and its participant, broadcasting PLAYER_LEFT with
    /// the cells that reverted to WHITE. Returns false if the id was unknown.
    pub fn disconnect(&mut self, id: ParticipantId) -> bool {
        if self.connections.remove(&id).is_none() {
            return false;
        }

        match self.engine.leave(id) {
            Ok(departure) => {
                self.broadcast(&ServerMessage::PlayerLeft {
                    participant_id: id,
                    cleared_cells: departure.cleared,
                });
            }
            Err(err) => warn!(participant = %id, error = %err, "Connection had no participant"),
        }

        info!(participant = %id, connections = self.connections.len(), "Connection left");
        true
    }

    /// Tells every connection why the server is going away, then closes them.
    pub fn shutdown(&mut self, reason: &str) {
        info!(connections = self.connections.len(), reason, "Closing all connections");
        self.broadcast(&ServerMessage::Info {
            message: reason.to_string(),
        });
        for (id, connection) in &self.connections {
            deliver(*id, connection, Frame::Close);
        }
    }

    fn reply_error(&self, id: ParticipantId, message: String) {
        if let Some(connection) = self.connections.get(&id) {
            send_message(id, connection, &ServerMessage::error(message));
        }
    }

    fn broadcast(&self, message: &ServerMessage) {
        let Some(text) = encode(message) else { return };
        for (id, connection) in &self.connections {
            deliver(*id, connection, Frame::Text(Arc::clone(&text)));
        }
    }

    fn broadcast_except(&self, skip: ParticipantId, message: &ServerMessage) {
        let Some(text) = encode(message) else { return };
        for (id, connection) in self.connections.iter().filter(|(id, _)| **id != skip) {
            deliver(*id, connection, Frame::Text(Arc::clone(&text)));
        }
    }
}

fn encode(message: &ServerMessage) -> Option<Arc<str>> {
    match message.to_json() {
        Ok(text) => Some(Arc::from(text)),
        Err(err) => {
            error!(error = %err, "Failed to encode outbound message");
            None
        }
    }
}

fn send_message(id: ParticipantId, connection: &Connection, message: &ServerMessage) {
    if let Some(text) = encode(message) {
        deliver(id, connection, Frame::Text(text));
    }
}

/// A failed send only affects its own connection.
fn deliver(id: ParticipantId, connection: &Connection, frame: Frame) {
    if let Err(err) = connection.sender.send(frame) {
        warn!(participant = %id, error = %err, "Failed to send frame");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::TransportError;
    use antgrid_simulation::EngineSettings;
    use serde_json::{json, Value};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    struct FailingSender;

    impl Sender for FailingSender {
        fn send(&self, _frame: Frame) -> Result<(), TransportError> {
            Err(TransportError::ChannelClosed)
        }
    }

    fn hub_with(max_participants: usize, max_messages: u32, chunk_size: usize) -> Hub {
        let engine = GameEngine::with_seed(
            EngineSettings {
                max_participants,
                ..EngineSettings::default()
            },
            11,
        );
        Hub::new(engine, HubSettings {
            rate_limit: RateLimitConfig {
                window: Duration::from_millis(1000),
                max_messages,
            },
            chunk_size,
        })
    }

    fn hub() -> Hub {
        hub_with(10, 30, 1000)
    }

    fn connect(hub: &mut Hub) -> (ParticipantId, UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = hub.connect(Box::new(tx)).unwrap();
        (id, rx)
    }

    fn frames(rx: &mut UnboundedReceiver<Frame>) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn messages(rx: &mut UnboundedReceiver<Frame>) -> Vec<Value> {
        frames(rx)
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => Some(serde_json::from_str(&text).unwrap()),
                _ => None,
            })
            .collect()
    }

    fn types(messages: &[Value]) -> Vec<&str> {
        messages.iter().map(|m| m["type"].as_str().unwrap()).collect()
    }

    fn send(hub: &mut Hub, id: ParticipantId, message: Value) {
        hub.handle_text(id, &message.to_string(), Instant::now());
    }

    #[test]
    fn connect_welcomes_and_announces_to_others() {
        let mut hub = hub();
        let (a, mut rx_a) = connect(&mut hub);
        let welcome = messages(&mut rx_a);
        assert_eq!(types(&welcome), vec!["WELCOME"]);
        assert_eq!(welcome[0]["payload"]["participant"]["id"], a.to_string());
        assert_eq!(welcome[0]["payload"]["state"]["grid"], json!({ "width": 20, "height": 20 }));
        assert_eq!(hub.connection_state(a), ConnectionState::Joined);

        let (b, mut rx_b) = connect(&mut hub);

        let seen_by_a = messages(&mut rx_a);
        assert_eq!(types(&seen_by_a), vec!["PLAYER_JOINED"]);
        assert_eq!(seen_by_a[0]["payload"]["participantId"], b.to_string());
        assert_eq!(types(&messages(&mut rx_b)), vec!["WELCOME"]);
    }

    #[test]
    fn registered_connection_is_connecting_until_welcomed() {
        let mut hub = hub();
        let (a, mut rx_a) = connect(&mut hub);
        messages(&mut rx_a);

        let (tx, mut rx_b) = mpsc::unbounded_channel();
        let b = hub.register(Box::new(tx)).unwrap();
        assert_eq!(hub.connection_state(b), ConnectionState::Connecting);
        assert!(frames(&mut rx_b).is_empty());
        assert!(messages(&mut rx_a).is_empty());

        hub.welcome(b);
        assert_eq!(hub.connection_state(b), ConnectionState::Joined);
        assert_eq!(types(&messages(&mut rx_b)), vec!["WELCOME"]);
        assert_eq!(types(&messages(&mut rx_a)), vec!["PLAYER_JOINED"]);

        hub.welcome(b);
        assert!(frames(&mut rx_b).is_empty());
    }

    #[test]
    fn late_joiner_receives_grid_in_chunks() {
        let mut hub = hub_with(10, 30, 2);
        let (a, mut rx_a) = connect(&mut hub);
        for x in 0..5 {
            send(&mut hub, a, json!({ "type": "FLIP_TILE", "payload": { "position": { "x": x, "y": 0 } } }));
        }
        messages(&mut rx_a);

        let (_, mut rx_b) = connect(&mut hub);
        let received = messages(&mut rx_b);

        assert_eq!(types(&received), vec!["WELCOME", "GRID_CHUNK", "GRID_CHUNK", "GRID_CHUNK"]);
        let chunks: Vec<(u64, u64, usize)> = received[1..]
            .iter()
            .map(|m| {
                let p = &m["payload"];
                (p["chunk"].as_u64().unwrap(), p["total"].as_u64().unwrap(), p["cells"].as_object().unwrap().len())
            })
            .collect();
        assert_eq!(chunks, vec![(1, 3, 2), (2, 3, 2), (3, 3, 1)]);
    }

    #[test]
    fn full_session_rejects_with_error_and_close() {
        let mut hub = hub_with(1, 30, 1000);
        connect(&mut hub);

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert_eq!(hub.connect(Box::new(tx)), Err(EngineError::CapacityReached));

        let frames = frames(&mut rx);
        assert_eq!(frames.len(), 2);
        let Frame::Text(text) = &frames[0] else { panic!("expected text, got {:?}", frames[0]) };
        let error: Value = serde_json::from_str(text).unwrap();
        assert_eq!(error["type"], "ERROR");
        assert_eq!(error["payload"]["message"], "Maximum number of participants reached");
        assert_eq!(frames[1], Frame::Close);
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn envelope_errors_go_to_sender_only() {
        let mut hub = hub();
        let (a, mut rx_a) = connect(&mut hub);
        let (_, mut rx_b) = connect(&mut hub);
        messages(&mut rx_a);
        messages(&mut rx_b);

        let now = Instant::now();
        hub.handle_text(a, "not json", now);
        hub.handle_text(a, r#"{"payload":{}}"#, now);
        hub.handle_text(a, r#"{"type":"PLACE_ANT"}"#, now);
        hub.handle_text(a, r#"{"type":"JUMP","payload":{}}"#, now);
        hub.handle_binary(a, &[0xff, 0xfe], now);

        let errors: Vec<String> = messages(&mut rx_a)
            .iter()
            .map(|m| m["payload"]["message"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(errors, vec![
            "Invalid JSON format",
            "Invalid message format: missing type",
            "Invalid message format: missing payload",
            "Invalid message type: JUMP",
            "Invalid JSON format",
        ]);
        assert!(messages(&mut rx_b).is_empty());
        assert_eq!(hub.connection_state(a), ConnectionState::Active);
    }

    #[test]
    fn binary_frame_with_valid_json_is_applied() {
        let mut hub = hub();
        let (a, mut rx) = connect(&mut hub);
        messages(&mut rx);

        let flip = json!({ "type": "FLIP_TILE", "payload": { "position": { "x": 5, "y": 6 } } }).to_string();
        hub.handle_binary(a, flip.as_bytes(), Instant::now());

        let flipped = messages(&mut rx);
        assert_eq!(types(&flipped), vec!["TILE_FLIPPED"]);
        let color = hub.engine().participant(a).unwrap().color.to_string();
        assert_eq!(flipped[0]["payload"]["cells"], json!({ "5,6": color }));
    }

    #[test]
    fn rate_limit_rejects_once_then_recovers() {
        let mut hub = hub_with(10, 3, 1000);
        let (a, mut rx) = connect(&mut hub);
        messages(&mut rx);
        let start = Instant::now();
        let flip = r#"{"type":"FLIP_TILE","payload":{"position":{"x":1,"y":1}}}"#;

        for i in 0..4 {
            hub.handle_text(a, flip, start + Duration::from_millis(i));
        }
        let received = messages(&mut rx);
        assert_eq!(types(&received), vec!["TILE_FLIPPED", "TILE_FLIPPED", "TILE_FLIPPED", "ERROR"]);
        assert_eq!(received[3]["payload"]["message"], RATE_LIMIT_MESSAGE);
        assert_eq!(hub.connection_state(a), ConnectionState::RateLimited);

        hub.handle_text(a, flip, start + Duration::from_millis(1500));
        assert_eq!(types(&messages(&mut rx)), vec!["TILE_FLIPPED"]);
        assert_eq!(hub.connection_state(a), ConnectionState::Active);
    }

    #[test]
    fn placement_is_broadcast_and_errors_are_private() {
        let mut hub = hub();
        let (a, mut rx_a) = connect(&mut hub);
        let (b, mut rx_b) = connect(&mut hub);
        messages(&mut rx_a);
        messages(&mut rx_b);

        send(&mut hub, a, json!({ "type": "PLACE_ANT", "payload": { "position": { "x": 10, "y": 10 } } }));

        let placed = messages(&mut rx_b);
        assert_eq!(types(&placed), vec!["ANT_PLACED"]);
        assert_eq!(placed[0]["payload"]["participantId"], a.to_string());
        assert_eq!(placed[0]["payload"]["ant"]["position"], json!({ "x": 10, "y": 10 }));
        assert_eq!(placed[0]["payload"]["ant"]["rules"].as_array().unwrap().len(), 2);
        assert_eq!(types(&messages(&mut rx_a)), vec!["ANT_PLACED"]);

        send(&mut hub, b, json!({ "type": "PLACE_ANT", "payload": { "position": { "x": 10, "y": 10 } } }));
        let errors = messages(&mut rx_b);
        assert_eq!(errors[0]["payload"]["message"], "An ant already exists at this position");
        assert!(messages(&mut rx_a).is_empty());
    }

    #[test]
    fn rule_change_broadcasts_resulting_rules() {
        let mut hub = hub();
        let (a, mut rx) = connect(&mut hub);
        send(&mut hub, a, json!({ "type": "PLACE_ANT", "payload": { "position": { "x": 1, "y": 1 } } }));
        messages(&mut rx);

        send(&mut hub, a, json!({
            "type": "CHANGE_RULES",
            "payload": { "rules": [{ "cellColor": "#00FF00", "turnDirection": "LEFT" }] }
        }));

        let changed = messages(&mut rx);
        assert_eq!(types(&changed), vec!["RULES_CHANGED"]);
        let rules = changed[0]["payload"]["rules"].as_array().unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[2], json!({ "cellColor": "#00FF00", "turnDirection": "LEFT" }));
    }

    #[test]
    fn tick_broadcasts_only_when_something_changed() {
        let mut hub = hub();
        let (a, mut rx) = connect(&mut hub);
        messages(&mut rx);

        hub.tick();
        assert!(messages(&mut rx).is_empty());

        send(&mut hub, a, json!({ "type": "PLACE_ANT", "payload": { "position": { "x": 10, "y": 10 } } }));
        messages(&mut rx);
        let summary = hub.tick();

        assert_eq!(summary.moved, 1);
        let update = messages(&mut rx);
        assert_eq!(types(&update), vec!["GAME_TICK_UPDATE"]);
        let color = hub.engine().participant(a).unwrap().color.to_string();
        assert_eq!(update[0]["payload"]["cells"], json!({ "10,10": color }));
        assert_eq!(update[0]["payload"]["ants"][0]["position"], json!({ "x": 10, "y": 9 }));
        assert_eq!(update[0]["payload"]["ants"][0]["direction"], "LEFT");
    }

    #[test]
    fn config_update_broadcasts_and_locks_after_start() {
        let mut hub = hub();
        let (a, mut rx) = connect(&mut hub);
        messages(&mut rx);

        send(&mut hub, a, json!({ "type": "UPDATE_GAME_CONFIG", "payload": { "gridSize": 64, "tickIntervalMs": 100 } }));
        let updated = messages(&mut rx);
        assert_eq!(updated[0], json!({
            "type": "GAME_CONFIG_UPDATED",
            "payload": { "gridSize": 64, "tickIntervalMs": 100 }
        }));
        assert_eq!(hub.tick_interval(), Duration::from_millis(100));

        send(&mut hub, a, json!({ "type": "PLACE_ANT", "payload": { "position": { "x": 63, "y": 63 } } }));
        send(&mut hub, a, json!({ "type": "UPDATE_GAME_CONFIG", "payload": { "gridSize": 10 } }));
        let received = messages(&mut rx);
        assert_eq!(types(&received), vec!["ANT_PLACED", "ERROR"]);
        assert_eq!(hub.engine().grid().width(), 64);
    }

    #[test]
    fn config_update_publishes_new_tick_interval() {
        let mut hub = hub();
        let (a, mut rx) = connect(&mut hub);
        messages(&mut rx);
        let mut interval_rx = hub.watch_tick_interval();
        assert_eq!(*interval_rx.borrow_and_update(), Duration::from_millis(250));

        send(&mut hub, a, json!({ "type": "UPDATE_GAME_CONFIG", "payload": { "gridSize": 30 } }));
        assert!(!interval_rx.has_changed().unwrap());

        send(&mut hub, a, json!({ "type": "UPDATE_GAME_CONFIG", "payload": { "gridSize": 30, "tickIntervalMs": 40 } }));
        assert!(interval_rx.has_changed().unwrap());
        assert_eq!(*interval_rx.borrow_and_update(), Duration::from_millis(40));
    }

    #[test]
    fn failing_sender_does_not_block_others() {
        let mut hub = hub();
        hub.connect(Box::new(FailingSender)).unwrap();
        let (b, mut rx_b) = connect(&mut hub);
        messages(&mut rx_b);

        send(&mut hub, b, json!({ "type": "FLIP_TILE", "payload": { "position": { "x": 2, "y": 2 } } }));

        assert_eq!(types(&messages(&mut rx_b)), vec!["TILE_FLIPPED"]);
    }

    #[test]
    fn disconnect_clears_cells_and_is_idempotent() {
        let mut hub = hub();
        let (a, _rx_a) = connect(&mut hub);
        let (_, mut rx_b) = connect(&mut hub);
        send(&mut hub, a, json!({ "type": "FLIP_TILE", "payload": { "position": { "x": 4, "y": 4 } } }));
        messages(&mut rx_b);

        assert!(hub.disconnect(a));
        assert!(!hub.disconnect(a));

        let left = messages(&mut rx_b);
        assert_eq!(left, vec![json!({
            "type": "PLAYER_LEFT",
            "payload": { "participantId": a.to_string(), "clearedCells": { "4,4": "#FFFFFF" } }
        })]);
        assert_eq!(hub.connection_state(a), ConnectionState::Disconnected);
        assert_eq!(hub.engine().participant_count(), 1);
    }

    #[test]
    fn heartbeat_disconnects_silent_connections() {
        let mut hub = hub();
        let (a, mut rx_a) = connect(&mut hub);
        let (b, mut rx_b) = connect(&mut hub);
        frames(&mut rx_a);
        frames(&mut rx_b);

        assert!(hub.heartbeat().is_empty());
        assert_eq!(frames(&mut rx_a), vec![Frame::Ping]);
        assert_eq!(frames(&mut rx_b), vec![Frame::Ping]);

        hub.mark_alive(b);
        assert_eq!(hub.heartbeat(), vec![a]);

        assert_eq!(frames(&mut rx_a), vec![Frame::Close]);
        let seen_by_b = frames(&mut rx_b);
        assert_eq!(seen_by_b.len(), 2);
        assert!(seen_by_b.contains(&Frame::Ping));
        assert_eq!(hub.connection_state(a), ConnectionState::Disconnected);
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn shutdown_sends_info_then_close() {
        let mut hub = hub();
        let (_, mut rx) = connect(&mut hub);
        frames(&mut rx);

        hub.shutdown("Server is shutting down");

        let frames = frames(&mut rx);
        assert_eq!(frames.len(), 2);
        let Frame::Text(text) = &frames[0] else { panic!("expected text, got {:?}", frames[0]) };
        let info: Value = serde_json::from_str(text).unwrap();
        assert_eq!(info, json!({ "type": "INFO", "payload": { "message": "Server is shutting down" } }));
        assert_eq!(frames[1], Frame::Close);
    }
}
