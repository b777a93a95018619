//! Ledger Event Payloads
//!
//! Raw event payloads as the ledger emits them: JSON objects tagged by event
//! name, addresses hex-encoded, positioned by `blockNumber` and `logIndex`.
//!
//! ```json
//! {"event":"ResponseSubmitted","responder":"0x…","hit":true,"blockNumber":12,"logIndex":0}
//! {"event":"GameWon","winner":"0x…","blockNumber":40,"logIndex":1}
//! ```

use serde::{Serialize, Deserialize};

use crate::game::events::{EventId, LedgerEvent, LedgerEventData};
use crate::game::state::ActorId;

/// Event as delivered by a ledger subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RawLedgerEvent {
    /// A defender answered the pending guess.
    #[serde(rename_all = "camelCase")]
    ResponseSubmitted {
        /// Defender address (hex).
        responder: String,
        /// Whether the guess hit.
        hit: bool,
        /// Block the event was emitted in.
        block_number: u64,
        /// Index within the block.
        log_index: u32,
    },

    /// The game ended.
    #[serde(rename_all = "camelCase")]
    GameWon {
        /// Winner address (hex).
        winner: String,
        /// Block the event was emitted in.
        block_number: u64,
        /// Index within the block.
        log_index: u32,
    },
}

impl RawLedgerEvent {
    /// Encode a typed event.
    pub fn encode(event: &LedgerEvent) -> Self {
        let EventId { block, log_index } = event.id;
        match event.data {
            LedgerEventData::ResponseSubmitted { responder, hit } => RawLedgerEvent::ResponseSubmitted {
                responder: responder.to_hex(),
                hit,
                block_number: block,
                log_index,
            },
            LedgerEventData::GameWon { winner } => RawLedgerEvent::GameWon {
                winner: winner.to_hex(),
                block_number: block,
                log_index,
            },
        }
    }

    /// Decode into a typed event.
    pub fn decode(&self) -> Result<LedgerEvent, ProtocolError> {
        match self {
            RawLedgerEvent::ResponseSubmitted { responder, hit, block_number, log_index } => {
                let responder = parse_address(responder)?;
                Ok(LedgerEvent::response(EventId::new(*block_number, *log_index), responder, *hit))
            }
            RawLedgerEvent::GameWon { winner, block_number, log_index } => {
                let winner = parse_address(winner)?;
                Ok(LedgerEvent::won(EventId::new(*block_number, *log_index), winner))
            }
        }
    }

    /// Ledger position.
    pub fn id(&self) -> EventId {
        match self {
            RawLedgerEvent::ResponseSubmitted { block_number, log_index, .. }
            | RawLedgerEvent::GameWon { block_number, log_index, .. } => {
                EventId::new(*block_number, *log_index)
            }
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Parse and decode a JSON payload in one step.
pub fn parse_event(json: &str) -> Result<LedgerEvent, ProtocolError> {
    RawLedgerEvent::from_json(json)?.decode()
}

fn parse_address(s: &str) -> Result<ActorId, ProtocolError> {
    ActorId::from_hex(s).ok_or_else(|| ProtocolError::InvalidAddress(s.to_string()))
}

/// Payload decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Malformed JSON or unknown event.
    #[error("Malformed event payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Address is not 20 hex-encoded bytes.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> ActorId {
        ActorId::new([byte; 20])
    }

    #[test]
    fn test_parse_response_submitted() {
        let json = format!(
            r#"{{"event":"ResponseSubmitted","responder":"{}","hit":true,"blockNumber":12,"logIndex":3}}"#,
            addr(0xAA).to_hex()
        );

        let event = parse_event(&json).unwrap();
        assert_eq!(event, LedgerEvent::response(EventId::new(12, 3), addr(0xAA), true));
    }

    #[test]
    fn test_parse_game_won() {
        let json = format!(
            r#"{{"event":"GameWon","winner":"{}","blockNumber":40,"logIndex":0}}"#,
            hex::encode(addr(0x0B).as_bytes())
        );

        let event = parse_event(&json).unwrap();
        assert_eq!(event, LedgerEvent::won(EventId::new(40, 0), addr(0x0B)));
    }

    #[test]
    fn test_encode_matches_wire_names() {
        let raw = RawLedgerEvent::encode(&LedgerEvent::won(EventId::new(7, 2), addr(1)));
        let json = raw.to_json().unwrap();

        assert!(json.contains(r#""event":"GameWon""#));
        assert!(json.contains(r#""blockNumber":7"#));
        assert!(json.contains(r#""logIndex":2"#));
        assert_eq!(raw.id(), EventId::new(7, 2));
    }

    #[test]
    fn test_rejects_bad_address() {
        let json = r#"{"event":"GameWon","winner":"0x1234","blockNumber":1,"logIndex":0}"#;
        assert!(matches!(parse_event(json), Err(ProtocolError::InvalidAddress(_))));
    }

    #[test]
    fn test_rejects_unknown_event() {
        let json = r#"{"event":"GuessSubmitted","guesser":"0x00","blockNumber":1,"logIndex":0}"#;
        assert!(matches!(parse_event(json), Err(ProtocolError::Json(_))));
    }
}
