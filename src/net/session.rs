use std::collections::VecDeque;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::{
    catalog, end_turn, play_card, play_relayed_card, use_ability, BattleConfig, BattleEvent,
    BattleSetup, BattleState, Card, CardId, Champion, RuleError, Side,
};

use super::protocol::PeerMessage;

/// Ordered, reliable transport to the other engine. Connecting and event
/// delivery live on the other side of this seam.
pub trait PeerChannel {
    fn send(&mut self, payload: &str) -> Result<(), ChannelError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelError {
    pub message: String,
}

impl ChannelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    /// Waited for the connection; moves first.
    Host,
    /// Connected by the host's identifier.
    Guest,
}

impl PeerRole {
    pub fn starting_side(self) -> Side {
        match self {
            PeerRole::Host => Side::Player,
            PeerRole::Guest => Side::Opponent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status")]
pub enum LobbyStatus {
    Idle,
    Connecting { peer_id: String },
    AwaitingHandshake,
    Ready { remote: Champion },
    InBattle,
    Failed { message: String },
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum PeerError {
    Channel { message: String },
    Encode { message: String },
    Decode { message: String },
    UnexpectedMessage { context: String },
    NotInBattle,
    Disconnected,
    Rule { error: RuleError },
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerError::Channel { message } => write!(f, "channel error: {message}"),
            PeerError::Encode { message } => write!(f, "could not encode message: {message}"),
            PeerError::Decode { message } => write!(f, "could not decode message: {message}"),
            PeerError::UnexpectedMessage { context } => write!(f, "unexpected: {context}"),
            PeerError::NotInBattle => f.write_str("no battle in progress"),
            PeerError::Disconnected => f.write_str("the opponent disconnected"),
            PeerError::Rule { error } => write!(f, "rejected: {error}"),
        }
    }
}

impl std::error::Error for PeerError {}

impl From<RuleError> for PeerError {
    fn from(error: RuleError) -> Self {
        PeerError::Rule { error }
    }
}

/// One side of an online battle: lobby handshake, then intent relay.
///
/// Local intents are applied to the local `Player` side and forwarded; remote
/// intents are replayed on the `Opponent` side.
pub struct PeerSession<C> {
    channel: C,
    role: PeerRole,
    local_champion: Champion,
    remote_champion: Option<Champion>,
    status: LobbyStatus,
    handshake_sent: bool,
    /// Remote intents that arrived before the local battle was built.
    pending: VecDeque<PeerMessage>,
}

impl<C: PeerChannel> PeerSession<C> {
    pub fn host(channel: C, champion: Champion) -> Self {
        Self {
            channel,
            role: PeerRole::Host,
            local_champion: champion,
            remote_champion: None,
            status: LobbyStatus::Idle,
            handshake_sent: false,
            pending: VecDeque::new(),
        }
    }

    pub fn guest(channel: C, champion: Champion, peer_id: impl Into<String>) -> Self {
        Self {
            channel,
            role: PeerRole::Guest,
            local_champion: champion,
            remote_champion: None,
            status: LobbyStatus::Connecting {
                peer_id: peer_id.into(),
            },
            handshake_sent: false,
            pending: VecDeque::new(),
        }
    }

    pub fn status(&self) -> &LobbyStatus {
        &self.status
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn remote_champion(&self) -> Option<&Champion> {
        self.remote_champion.as_ref()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    fn send(&mut self, message: &PeerMessage) -> Result<(), PeerError> {
        let payload = message.encode()?;
        self.channel
            .send(&payload)
            .map_err(|error| PeerError::Channel {
                message: error.message,
            })
    }

    /// Channel is open: announce our champion.
    pub fn on_open(&mut self) -> Result<(), PeerError> {
        if self.handshake_sent {
            return Ok(());
        }
        let handshake = PeerMessage::Handshake {
            champion: self.local_champion.clone(),
        };
        if let Err(error) = self.send(&handshake) {
            self.on_error(error.to_string());
            return Err(error);
        }
        self.handshake_sent = true;
        self.status = match self.remote_champion.clone() {
            Some(remote) => LobbyStatus::Ready { remote },
            None => LobbyStatus::AwaitingHandshake,
        };
        Ok(())
    }

    pub fn on_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("peer connection error: {message}");
        self.status = match self.status {
            LobbyStatus::InBattle | LobbyStatus::Disconnected => LobbyStatus::Disconnected,
            _ => LobbyStatus::Failed { message },
        };
    }

    pub fn on_close(&mut self) {
        match self.status {
            LobbyStatus::InBattle => {
                log::warn!("peer closed the connection mid-battle");
                self.status = LobbyStatus::Disconnected;
            }
            LobbyStatus::Failed { .. } | LobbyStatus::Disconnected => {}
            _ => {
                self.status = LobbyStatus::Failed {
                    message: "connection closed".into(),
                }
            }
        }
    }

    /// Acknowledges a lobby failure and returns to idle.
    pub fn dismiss(&mut self) {
        if matches!(self.status, LobbyStatus::Failed { .. }) {
            self.status = LobbyStatus::Idle;
            self.remote_champion = None;
            self.handshake_sent = false;
            self.pending.clear();
        }
    }

    /// Builds the local engine's battle once both champions are known. The
    /// remote side gets a placeholder deck from its realm.
    ///
    /// Intents the remote sent while this side was still in the lobby are
    /// replayed onto the new state; their events are returned with it.
    pub fn start_battle<R: Rng + ?Sized>(
        &mut self,
        deck: Vec<Card>,
        config: &BattleConfig,
        rng: &mut R,
    ) -> Result<(BattleState, Vec<BattleEvent>), PeerError> {
        let LobbyStatus::Ready { remote } = &self.status else {
            return Err(PeerError::UnexpectedMessage {
                context: "battle start before handshake".into(),
            });
        };
        let remote = remote.clone();

        let local = BattleSetup::new(self.local_champion.clone(), deck, config)?;
        let placeholder = BattleSetup {
            deck: catalog::starter_deck(remote.realm),
            champion: remote,
        };
        let starting_side = self.role.starting_side();
        let mut state = BattleState::new(local, placeholder, starting_side, config, rng);
        state.opponent.display_only = true;
        self.status = LobbyStatus::InBattle;
        log::info!("online battle started as {:?}", self.role);

        let mut events = Vec::new();
        while let Some(message) = self.pending.pop_front() {
            match replay_remote(&mut state, message) {
                Ok(replayed) => events.extend(replayed),
                Err(error) => log::warn!("queued remote intent rejected locally: {error}"),
            }
        }
        Ok((state, events))
    }

    fn ensure_in_battle(&self) -> Result<(), PeerError> {
        match self.status {
            LobbyStatus::InBattle => Ok(()),
            LobbyStatus::Disconnected => Err(PeerError::Disconnected),
            _ => Err(PeerError::NotInBattle),
        }
    }

    /// Fire-and-forget: a failed send ends the battle but does not undo the local intent.
    fn relay(&mut self, message: PeerMessage) {
        if let Err(error) = self.send(&message) {
            log::warn!("failed to relay {message:?}: {error}");
            self.status = LobbyStatus::Disconnected;
        }
    }

    pub fn play_card(
        &mut self,
        state: &mut BattleState,
        card_id: CardId,
    ) -> Result<Vec<BattleEvent>, PeerError> {
        self.ensure_in_battle()?;
        let card = state
            .player
            .hand_index(card_id)
            .map(|index| state.player.hand[index].clone());
        let events = play_card(state, Side::Player, card_id)?;
        if let Some(card) = card {
            self.relay(PeerMessage::PlayCard { card });
        }
        Ok(events)
    }

    pub fn use_ability(&mut self, state: &mut BattleState) -> Result<Vec<BattleEvent>, PeerError> {
        self.ensure_in_battle()?;
        let events = use_ability(state, Side::Player)?;
        self.relay(PeerMessage::UseAbility);
        Ok(events)
    }

    pub fn end_turn(&mut self, state: &mut BattleState) -> Result<Vec<BattleEvent>, PeerError> {
        self.ensure_in_battle()?;
        let events = end_turn(state, Side::Player)?;
        self.relay(PeerMessage::EndTurn);
        Ok(events)
    }

    /// Handles one inbound payload. Intents replay on the local `Opponent` side.
    pub fn on_data(
        &mut self,
        state: Option<&mut BattleState>,
        payload: &str,
    ) -> Result<Vec<BattleEvent>, PeerError> {
        match PeerMessage::decode(payload)? {
            PeerMessage::Handshake { champion } => {
                log::info!("remote champion is {}", champion.name);
                if self.handshake_sent && self.status == LobbyStatus::AwaitingHandshake {
                    self.status = LobbyStatus::Ready {
                        remote: champion.clone(),
                    };
                }
                self.remote_champion = Some(champion);
                Ok(Vec::new())
            }
            intent => {
                // The remote may start first and act before our battle exists.
                if matches!(self.status, LobbyStatus::Ready { .. }) {
                    log::debug!("holding {intent:?} until the battle starts");
                    self.pending.push_back(intent);
                    return Ok(Vec::new());
                }
                self.ensure_in_battle()?;
                let state = state.ok_or(PeerError::NotInBattle)?;
                replay_remote(state, intent).map_err(|error| {
                    log::warn!("remote intent rejected locally: {error}");
                    PeerError::Rule { error }
                })
            }
        }
    }
}

fn replay_remote(
    state: &mut BattleState,
    message: PeerMessage,
) -> Result<Vec<BattleEvent>, RuleError> {
    match message {
        PeerMessage::PlayCard { card } => play_relayed_card(state, Side::Opponent, card),
        PeerMessage::UseAbility => use_ability(state, Side::Opponent),
        PeerMessage::EndTurn => end_turn(state, Side::Opponent),
        PeerMessage::Handshake { .. } => Ok(Vec::new()),
    }
}
