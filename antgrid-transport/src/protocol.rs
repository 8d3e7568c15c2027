//! Wire messages exchanged with clients.
//!
//! Every frame is a JSON envelope `{ "type": ..., "payload": ... }`. Inbound
//! envelopes are validated in two steps: the envelope itself (type present,
//! payload present, type recognized), then the payload shape for that type.
//! Each failure maps to its own [`ProtocolError`] so clients get a precise
//! message back.

use antgrid_core::{Ant, CellMap, Color, Direction, Participant, ParticipantId, Position, RuleSet};
use antgrid_simulation::RawRule;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why an inbound frame could not be turned into a [`ClientMessage`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid JSON format")]
    InvalidJson,

    #[error("Invalid message format: missing type")]
    MissingType,

    #[error("Invalid message format: missing payload")]
    MissingPayload,

    #[error("Invalid message type: {0}")]
    UnknownType(String),

    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceAntPayload {
    pub position: Position,
    #[serde(default)]
    pub rules: Option<Vec<RawRule>>,
    #[serde(default)]
    pub direction: Option<Direction>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChangeRulesPayload {
    pub rules: Vec<RawRule>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlipTilePayload {
    pub position: Position,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameConfigPayload {
    /// Side length of the (square) grid.
    pub grid_size: i64,
    #[serde(default, alias = "tickInterval")]
    pub tick_interval_ms: Option<u64>,
}

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    PlaceAnt(PlaceAntPayload),
    ChangeRules(ChangeRulesPayload),
    FlipTile(FlipTilePayload),
    UpdateGameConfig(UpdateGameConfigPayload),
}

impl ClientMessage {
    pub const PLACE_ANT: &'static str = "PLACE_ANT";
    pub const CHANGE_RULES: &'static str = "CHANGE_RULES";
    pub const FLIP_TILE: &'static str = "FLIP_TILE";
    pub const UPDATE_GAME_CONFIG: &'static str = "UPDATE_GAME_CONFIG";

    /// Parses and validates one text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidJson)?;

        let kind = envelope
            .get("type")
            .and_then(Value::as_str)
            .filter(|kind| !kind.is_empty())
            .ok_or(ProtocolError::MissingType)?;
        let payload = match envelope.get("payload") {
            None | Some(Value::Null) => return Err(ProtocolError::MissingPayload),
            Some(payload) => payload.clone(),
        };

        match kind {
            Self::PLACE_ANT => payload_as(Self::PLACE_ANT, payload).map(ClientMessage::PlaceAnt),
            Self::CHANGE_RULES => payload_as(Self::CHANGE_RULES, payload).map(ClientMessage::ChangeRules),
            Self::FLIP_TILE => payload_as(Self::FLIP_TILE, payload).map(ClientMessage::FlipTile),
            Self::UPDATE_GAME_CONFIG => {
                payload_as(Self::UPDATE_GAME_CONFIG, payload).map(ClientMessage::UpdateGameConfig)
            }
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::PlaceAnt(_) => Self::PLACE_ANT,
            ClientMessage::ChangeRules(_) => Self::CHANGE_RULES,
            ClientMessage::FlipTile(_) => Self::FLIP_TILE,
            ClientMessage::UpdateGameConfig(_) => Self::UPDATE_GAME_CONFIG,
        }
    }
}

fn payload_as<T: DeserializeOwned>(kind: &'static str, payload: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|err| ProtocolError::InvalidPayload {
        kind,
        reason: err.to_string(),
    })
}

/// Grid dimensions sent in WELCOME. Cell contents follow as GRID_CHUNKs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WelcomeState {
    pub ants: Vec<Ant>,
    pub grid: GridInfo,
}

/// Every message the server sends.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Welcome {
        participant: Participant,
        state: WelcomeState,
    },
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        participant_id: ParticipantId,
        color: Color,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        participant_id: ParticipantId,
        cleared_cells: CellMap,
    },
    #[serde(rename_all = "camelCase")]
    AntPlaced {
        participant_id: ParticipantId,
        ant: Ant,
        cells: CellMap,
    },
    #[serde(rename_all = "camelCase")]
    RulesChanged {
        participant_id: ParticipantId,
        rules: RuleSet,
    },
    #[serde(rename_all = "camelCase")]
    TileFlipped {
        participant_id: ParticipantId,
        cells: CellMap,
    },
    GameTickUpdate {
        cells: CellMap,
        ants: Vec<Ant>,
    },
    /// One numbered slice of the painted cells; `chunk` counts from 1.
    GridChunk {
        chunk: usize,
        total: usize,
        cells: CellMap,
    },
    #[serde(rename_all = "camelCase")]
    GameConfigUpdated {
        grid_size: u32,
        tick_interval_ms: u64,
    },
    Info {
        message: String,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Splits `cells` into GRID_CHUNK messages of at most `chunk_size` entries.
/// An empty map yields no messages.
pub fn grid_chunks(cells: &CellMap, chunk_size: usize) -> Vec<ServerMessage> {
    let chunks = cells.chunks(chunk_size);
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, cells)| ServerMessage::GridChunk { chunk: i + 1, total, cells })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_place_ant() {
        let message = ClientMessage::parse(
            r##"{"type":"PLACE_ANT","payload":{"position":{"x":3,"y":4},"rules":[{"cellColor":"#FFFFFF","turnDirection":"RIGHT"}]}}"##,
        )
        .unwrap();

        let ClientMessage::PlaceAnt(payload) = message else {
            panic!("expected PLACE_ANT");
        };
        assert_eq!(payload.position, Position::new(3, 4));
        assert_eq!(payload.rules, Some(vec![RawRule::new("#FFFFFF", "RIGHT")]));
        assert_eq!(payload.direction, None);
    }

    #[test]
    fn parses_config_update_with_either_interval_name() {
        let a = ClientMessage::parse(r#"{"type":"UPDATE_GAME_CONFIG","payload":{"gridSize":50,"tickIntervalMs":100}}"#);
        let b = ClientMessage::parse(r#"{"type":"UPDATE_GAME_CONFIG","payload":{"gridSize":50,"tickInterval":100}}"#);
        let expected = ClientMessage::UpdateGameConfig(UpdateGameConfigPayload {
            grid_size: 50,
            tick_interval_ms: Some(100),
        });
        assert_eq!(a, Ok(expected.clone()));
        assert_eq!(b, Ok(expected));
    }

    #[test]
    fn envelope_errors() {
        assert_eq!(ClientMessage::parse("{oops"), Err(ProtocolError::InvalidJson));
        assert_eq!(ClientMessage::parse(r#"{"payload":{}}"#), Err(ProtocolError::MissingType));
        assert_eq!(ClientMessage::parse("[1,2]"), Err(ProtocolError::MissingType));
        assert_eq!(ClientMessage::parse(r#"{"type":"FLIP_TILE"}"#), Err(ProtocolError::MissingPayload));
        assert_eq!(
            ClientMessage::parse(r#"{"type":"FLIP_TILE","payload":null}"#),
            Err(ProtocolError::MissingPayload)
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"DANCE","payload":{}}"#),
            Err(ProtocolError::UnknownType("DANCE".into()))
        );
        assert_eq!(
            ProtocolError::UnknownType("DANCE".into()).to_string(),
            "Invalid message type: DANCE"
        );
    }

    #[test]
    fn non_integer_position_is_a_payload_error() {
        let result = ClientMessage::parse(r#"{"type":"FLIP_TILE","payload":{"position":{"x":1.5,"y":2}}}"#);
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidPayload { kind: "FLIP_TILE", .. })
        ));
    }

    #[test]
    fn server_message_envelope_shape() {
        let id = ParticipantId::random();
        let mut cells = CellMap::new();
        cells.insert(Position::new(1, 2), Color::WHITE);

        let value = serde_json::to_value(ServerMessage::PlayerLeft {
            participant_id: id,
            cleared_cells: cells,
        })
        .unwrap();

        assert_eq!(value, json!({
            "type": "PLAYER_LEFT",
            "payload": { "participantId": id.to_string(), "clearedCells": { "1,2": "#FFFFFF" } }
        }));

        let value = serde_json::to_value(ServerMessage::GameConfigUpdated {
            grid_size: 40,
            tick_interval_ms: 250,
        })
        .unwrap();
        assert_eq!(value["type"], "GAME_CONFIG_UPDATED");
        assert_eq!(value["payload"]["gridSize"], 40);
        assert_eq!(value["payload"]["tickIntervalMs"], 250);
    }

    #[test]
    fn chunks_are_numbered_from_one() {
        let red = Color::from_rgb(0xFF_00_00).unwrap();
        let cells: CellMap = (0..5).map(|i| (Position::new(i, i), red)).collect();

        let messages = grid_chunks(&cells, 2);

        assert_eq!(messages.len(), 3);
        match &messages[2] {
            ServerMessage::GridChunk { chunk, total, cells } => {
                assert_eq!((*chunk, *total, cells.len()), (3, 3, 1));
            }
            other => panic!("unexpected message {:?}", other),
        }
        assert!(grid_chunks(&CellMap::new(), 2).is_empty());
    }
}
