use serde::{Deserialize, Serialize};

use crate::game::{classify, Card, Champion};

use super::session::PeerError;

/// Messages exchanged between the two engines of an online battle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    Handshake { champion: Champion },
    PlayCard { card: Card },
    UseAbility,
    EndTurn,
}

impl PeerMessage {
    pub fn encode(&self) -> Result<String, PeerError> {
        serde_json::to_string(self).map_err(|error| PeerError::Encode {
            message: error.to_string(),
        })
    }

    /// Parses a payload. Cards sent without an effect list are classified from
    /// their description.
    pub fn decode(payload: &str) -> Result<Self, PeerError> {
        let mut message: PeerMessage =
            serde_json::from_str(payload).map_err(|error| PeerError::Decode {
                message: error.to_string(),
            })?;
        if let PeerMessage::PlayCard { card } = &mut message {
            if card.effects.is_empty() {
                card.effects = classify(card.card_type, card.value, &card.description);
            }
        }
        Ok(message)
    }
}
