//! Battle commentary. An external text generator may supply lines; when it is
//! missing or fails, a fixed local pool is used instead.

use std::fmt;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::game::{Card, Realm, Side};

const CARD_LINES: &[&str] = &[
    "The arena trembles as the card takes hold!",
    "A bold play, and the crowd roars.",
    "Power surges across the battlefield.",
    "Steel and sorcery collide!",
    "That one will leave a mark.",
    "The realms themselves seem to hold their breath.",
];

const HINT_LINES: &[&str] = &[
    "Spend your mana wisely; unused mana is lost at the end of the turn.",
    "A shield now can save a champion later.",
    "Watch the enemy's health. Sometimes the best defence is a finishing blow.",
    "Your ability refreshes every turn. Don't let it go to waste.",
    "Cheap cards can fill the gaps left by expensive ones.",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FlavorError {
    Unavailable,
    Empty,
}

impl fmt::Display for FlavorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlavorError::Unavailable => f.write_str("text generator unavailable"),
            FlavorError::Empty => f.write_str("text generator returned nothing"),
        }
    }
}

impl std::error::Error for FlavorError {}

#[derive(Debug, Clone, Copy)]
pub struct CardLineRequest<'a> {
    pub card_name: &'a str,
    pub realm: Realm,
    pub side: Side,
}

#[derive(Debug, Clone, Copy)]
pub struct HintRequest<'a> {
    pub hand: &'a [Card],
    pub opponent_health: u16,
    pub mana: u8,
}

/// External text generator; every call may fail.
pub trait FlavorSource {
    fn card_line(&mut self, request: &CardLineRequest<'_>) -> Result<String, FlavorError>;
    fn tactical_hint(&mut self, request: &HintRequest<'_>) -> Result<String, FlavorError>;
}

/// Text produced ahead of time by the front end (which owns the latency of the call).
#[derive(Debug, Clone, Default)]
pub struct ProvidedText(pub Option<String>);

impl ProvidedText {
    fn take(&mut self) -> Result<String, FlavorError> {
        let text = self.0.take().ok_or(FlavorError::Unavailable)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(FlavorError::Empty);
        }
        Ok(trimmed.to_owned())
    }
}

impl FlavorSource for ProvidedText {
    fn card_line(&mut self, _request: &CardLineRequest<'_>) -> Result<String, FlavorError> {
        self.take()
    }

    fn tactical_hint(&mut self, _request: &HintRequest<'_>) -> Result<String, FlavorError> {
        self.take()
    }
}

pub struct Commentator {
    rng: SmallRng,
}

impl Commentator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self { rng }
    }

    fn fallback(&mut self, pool: &[&str]) -> String {
        pool.choose(&mut self.rng).copied().unwrap_or_default().to_owned()
    }

    pub fn card_line(
        &mut self,
        source: Option<&mut dyn FlavorSource>,
        request: &CardLineRequest<'_>,
    ) -> String {
        match source.map(|source| source.card_line(request)) {
            Some(Ok(line)) => line,
            Some(Err(error)) => {
                log::debug!("commentary for {} fell back: {error}", request.card_name);
                self.fallback(CARD_LINES)
            }
            None => self.fallback(CARD_LINES),
        }
    }

    pub fn tactical_hint(
        &mut self,
        source: Option<&mut dyn FlavorSource>,
        request: &HintRequest<'_>,
    ) -> String {
        match source.map(|source| source.tactical_hint(request)) {
            Some(Ok(hint)) => hint,
            Some(Err(error)) => {
                log::debug!("tactical hint fell back: {error}");
                self.fallback(HINT_LINES)
            }
            None => self.fallback(HINT_LINES),
        }
    }
}
