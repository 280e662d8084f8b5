use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::effects::CardEffect;
use super::rules::RuleError;

pub const DEFAULT_HAND_LIMIT: u8 = 6;
pub const DEFAULT_MANA_CAP: u8 = 10;
pub const DEFAULT_OPENING_HAND: u8 = 3;
pub const DEFAULT_DECK_SIZE: u8 = 8;

fn default_hand_limit() -> u8 {
    DEFAULT_HAND_LIMIT
}

fn default_mana_cap() -> u8 {
    DEFAULT_MANA_CAP
}

/// 目录中唯一的卡牌标识。
pub type CardId = u32;

/// Which of the two combatants an action belongs to, from the local engine's point of view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player,
    Opponent,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Player => Side::Opponent,
            Side::Opponent => Side::Player,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Player => f.write_str("Player"),
            Side::Opponent => f.write_str("Opponent"),
        }
    }
}

impl FromStr for Side {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "player" | "local" => Ok(Side::Player),
            "opponent" | "ai" | "remote" => Ok(Side::Opponent),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CardType {
    Attack,
    Spell,
    Minion,
    Weapon,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Realm {
    Fire,
    Ice,
    Tech,
    Forest,
}

impl Realm {
    pub const ALL: [Realm; 4] = [Realm::Fire, Realm::Ice, Realm::Tech, Realm::Forest];
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Realm::Fire => "Fire",
            Realm::Ice => "Ice",
            Realm::Tech => "Tech",
            Realm::Forest => "Forest",
        };
        f.write_str(name)
    }
}

impl FromStr for Realm {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fire" => Ok(Realm::Fire),
            "ice" => Ok(Realm::Ice),
            "tech" => Ok(Realm::Tech),
            "forest" => Ok(Realm::Forest),
            _ => Err(()),
        }
    }
}

/// 目录中的卡牌定义，加载后不可变。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub cost: u8,
    pub card_type: CardType,
    pub value: u8,
    pub description: String,
    pub realm: Realm,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<CardEffect>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ability {
    pub name: String,
    pub description: String,
    pub cost: u8,
    pub effect: CardEffect,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Champion {
    pub id: String,
    pub name: String,
    pub title: String,
    pub realm: Realm,
    pub max_health: u16,
    pub ability: Ability,
    #[serde(default)]
    pub portrait: String,
    #[serde(default)]
    pub flavor: String,
}

/// One side of the battle: champion, resources and card zones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Combatant {
    pub champion: Champion,
    pub health: u16,
    pub max_health: u16,
    pub mana: u8,
    pub max_mana: u8,
    #[serde(default)]
    pub deck: VecDeque<Card>,
    #[serde(default)]
    pub hand: Vec<Card>,
    #[serde(default)]
    pub graveyard: Vec<Card>,
    #[serde(default)]
    pub shield: u16,
    #[serde(default)]
    pub ability_used: bool,
    /// Number of cards the deck held when the battle was built.
    #[serde(default)]
    pub deck_size: u8,
    /// Remote side in peer mode: zones are a placeholder, relayed intents are authoritative.
    #[serde(default)]
    pub display_only: bool,
}

impl Combatant {
    pub fn new(champion: Champion, deck: Vec<Card>) -> Self {
        let max_health = champion.max_health;
        Self {
            champion,
            health: max_health,
            max_health,
            mana: 1,
            max_mana: 1,
            deck_size: deck.len() as u8,
            deck: deck.into(),
            hand: Vec::new(),
            graveyard: Vec::new(),
            shield: 0,
            ability_used: false,
            display_only: false,
        }
    }

    pub fn hand_index(&self, card_id: CardId) -> Option<usize> {
        self.hand.iter().position(|card| card.id == card_id)
    }

    pub fn ability_ready(&self) -> bool {
        !self.ability_used && self.mana >= self.champion.ability.cost
    }

    pub fn playable_cards(&self) -> impl Iterator<Item = &Card> {
        self.hand.iter().filter(move |card| card.cost <= self.mana)
    }

    pub fn is_defeated(&self) -> bool {
        self.health == 0
    }

    /// Shield soaks damage first; returns `(absorbed, health_lost)`.
    pub fn take_damage(&mut self, amount: u16) -> (u16, u16) {
        let absorbed = amount.min(self.shield);
        self.shield -= absorbed;
        let remaining = amount - absorbed;
        let health_lost = remaining.min(self.health);
        self.health -= health_lost;
        (absorbed, health_lost)
    }

    pub fn heal(&mut self, amount: u16) -> u16 {
        let before = self.health;
        self.health = self.health.saturating_add(amount).min(self.max_health);
        self.health - before
    }

    pub fn gain_shield(&mut self, amount: u16) {
        self.shield = self.shield.saturating_add(amount);
    }

    pub fn gain_mana(&mut self, amount: u8, cap: u8) -> u8 {
        let before = self.mana;
        self.mana = self.mana.saturating_add(amount).min(cap);
        self.mana.saturating_sub(before)
    }
}

/// Champion and deck chosen for one side before the battle starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleSetup {
    pub champion: Champion,
    pub deck: Vec<Card>,
}

impl BattleSetup {
    pub fn new(
        champion: Champion,
        deck: Vec<Card>,
        config: &BattleConfig,
    ) -> Result<Self, RuleError> {
        if deck.len() != config.deck_size as usize {
            return Err(RuleError::DeckSize {
                expected: config.deck_size,
                actual: deck.len(),
            });
        }
        let mut seen = HashSet::new();
        for card in &deck {
            if !seen.insert(card.id) {
                return Err(RuleError::DuplicateCard { card_id: card.id });
            }
        }
        Ok(Self { champion, deck })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BattleConfig {
    pub hand_limit: u8,
    pub mana_cap: u8,
    pub opening_hand: u8,
    pub deck_size: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            hand_limit: DEFAULT_HAND_LIMIT,
            mana_cap: DEFAULT_MANA_CAP,
            opening_hand: DEFAULT_OPENING_HAND,
            deck_size: DEFAULT_DECK_SIZE,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BattlePhase {
    PlayerTurn,
    OpponentTurn,
    GameOver,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ForfeitReason {
    DeckEmpty,
    HandFull,
}

/// 战斗事件流，每个事件同时生成一行战斗日志。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum BattleEvent {
    CardPlayed {
        side: Side,
        card_id: CardId,
        card_name: String,
        cost: u8,
    },
    AbilityUsed {
        side: Side,
        ability: String,
        cost: u8,
    },
    DamageDealt {
        source: Side,
        target: Side,
        amount: u16,
        absorbed: u16,
        health_lost: u16,
    },
    Healed {
        side: Side,
        amount: u16,
    },
    ShieldGained {
        side: Side,
        amount: u16,
    },
    ManaGained {
        side: Side,
        amount: u8,
    },
    CardDrawn {
        side: Side,
        card_id: CardId,
        card_name: String,
    },
    DrawForfeited {
        side: Side,
        reason: ForfeitReason,
    },
    TurnStarted {
        side: Side,
        turn: u32,
        max_mana: u8,
    },
    TurnEnded {
        side: Side,
    },
    BattleWon {
        winner: Side,
    },
}

impl fmt::Display for BattleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BattleEvent::CardPlayed {
                side,
                card_name,
                cost,
                ..
            } => write!(f, "{side} plays {card_name} ({cost} mana)"),
            BattleEvent::AbilityUsed { side, ability, .. } => {
                write!(f, "{side} unleashes {ability}")
            }
            BattleEvent::DamageDealt {
                target,
                amount,
                absorbed,
                ..
            } if *absorbed > 0 => write!(
                f,
                "{target} takes {amount} damage ({absorbed} absorbed by shield)"
            ),
            BattleEvent::DamageDealt { target, amount, .. } => {
                write!(f, "{target} takes {amount} damage")
            }
            BattleEvent::Healed { side, amount } => write!(f, "{side} heals {amount}"),
            BattleEvent::ShieldGained { side, amount } => write!(f, "{side} gains {amount} shield"),
            BattleEvent::ManaGained { side, amount } => write!(f, "{side} gains {amount} mana"),
            BattleEvent::CardDrawn { side, card_name, .. } => write!(f, "{side} draws {card_name}"),
            BattleEvent::DrawForfeited { side, reason } => match reason {
                ForfeitReason::DeckEmpty => write!(f, "{side} has no cards left to draw"),
                ForfeitReason::HandFull => write!(f, "{side}'s hand is full"),
            },
            BattleEvent::TurnStarted { side, turn, .. } => write!(f, "Turn {turn}: {side}'s move"),
            BattleEvent::TurnEnded { side } => write!(f, "{side} ends the turn"),
            BattleEvent::BattleWon { winner } => write!(f, "{winner} wins the battle!"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    HealthOutOfRange { side: Side, value: u16 },
    ManaOutOfRange { side: Side, value: u8 },
    HandOverflow { side: Side, size: usize },
    DuplicateCard { side: Side, card_id: CardId },
    CardCountMismatch { side: Side, expected: usize, actual: usize },
}

/// 战斗整体状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleState {
    pub player: Combatant,
    pub opponent: Combatant,
    pub turn: u32,
    pub active_side: Side,
    pub starting_side: Side,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Side>,
    #[serde(default)]
    pub log: Vec<String>,
    #[serde(default = "default_hand_limit")]
    pub hand_limit: u8,
    #[serde(default = "default_mana_cap")]
    pub mana_cap: u8,
    /// Presentation hint only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_played: Option<CardId>,
}

impl BattleState {
    pub fn new<R: Rng + ?Sized>(
        player: BattleSetup,
        opponent: BattleSetup,
        starting_side: Side,
        config: &BattleConfig,
        rng: &mut R,
    ) -> Self {
        let mut player_deck = player.deck;
        let mut opponent_deck = opponent.deck;
        player_deck.shuffle(rng);
        opponent_deck.shuffle(rng);

        let mut state = Self {
            player: Combatant::new(player.champion, player_deck),
            opponent: Combatant::new(opponent.champion, opponent_deck),
            turn: 1,
            active_side: starting_side,
            starting_side,
            winner: None,
            log: Vec::new(),
            hand_limit: config.hand_limit,
            mana_cap: config.mana_cap.clamp(1, DEFAULT_MANA_CAP),
            last_played: None,
        };

        state.draw_cards(Side::Player, config.opening_hand);
        state.draw_cards(Side::Opponent, config.opening_hand);
        let opening = state.record(BattleEvent::TurnStarted {
            side: starting_side,
            turn: 1,
            max_mana: 1,
        });
        log::info!("battle started: {opening}");
        state
    }

    pub fn combatant(&self, side: Side) -> &Combatant {
        match side {
            Side::Player => &self.player,
            Side::Opponent => &self.opponent,
        }
    }

    pub fn combatant_mut(&mut self, side: Side) -> &mut Combatant {
        match side {
            Side::Player => &mut self.player,
            Side::Opponent => &mut self.opponent,
        }
    }

    pub fn phase(&self) -> BattlePhase {
        if self.winner.is_some() {
            return BattlePhase::GameOver;
        }
        match self.active_side {
            Side::Player => BattlePhase::PlayerTurn,
            Side::Opponent => BattlePhase::OpponentTurn,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    pub fn record(&mut self, event: BattleEvent) -> BattleEvent {
        self.log.push(event.to_string());
        event
    }

    /// Takes the front card of the deck unless the deck is empty or the hand is full.
    pub fn draw_card(&mut self, side: Side) -> BattleEvent {
        let hand_limit = self.hand_limit as usize;
        let combatant = self.combatant_mut(side);
        let event = if combatant.hand.len() >= hand_limit {
            BattleEvent::DrawForfeited {
                side,
                reason: ForfeitReason::HandFull,
            }
        } else if let Some(card) = combatant.deck.pop_front() {
            let event = BattleEvent::CardDrawn {
                side,
                card_id: card.id,
                card_name: card.name.clone(),
            };
            combatant.hand.push(card);
            event
        } else {
            BattleEvent::DrawForfeited {
                side,
                reason: ForfeitReason::DeckEmpty,
            }
        };
        self.record(event)
    }

    pub fn draw_cards(&mut self, side: Side, count: u8) -> Vec<BattleEvent> {
        (0..count).map(|_| self.draw_card(side)).collect()
    }

    /// Refills the side's resources for its new turn and draws one card.
    pub fn begin_turn(&mut self, side: Side) -> Vec<BattleEvent> {
        let max_mana = self.turn.min(self.mana_cap as u32) as u8;
        let combatant = self.combatant_mut(side);
        combatant.max_mana = max_mana;
        combatant.mana = max_mana;
        combatant.shield = 0;
        combatant.ability_used = false;

        let mut events = vec![self.record(BattleEvent::TurnStarted {
            side,
            turn: self.turn,
            max_mana,
        })];
        events.push(self.draw_card(side));
        events
    }

    /// Hands control to the other side. The turn counter advances when the
    /// starting side is up again.
    pub fn pass_turn(&mut self) -> Vec<BattleEvent> {
        let ending = self.active_side;
        let mut events = vec![self.record(BattleEvent::TurnEnded { side: ending })];

        let next = ending.opponent();
        if next == self.starting_side {
            self.turn += 1;
        }
        self.active_side = next;
        events.extend(self.begin_turn(next));
        events
    }

    pub fn evaluate_victory(&mut self) -> Option<BattleEvent> {
        if self.winner.is_some() {
            return None;
        }
        let loser = if self.opponent.is_defeated() {
            Side::Opponent
        } else if self.player.is_defeated() {
            Side::Player
        } else {
            return None;
        };
        let winner = loser.opponent();
        self.winner = Some(winner);
        log::info!("{winner} wins on turn {}", self.turn);
        Some(self.record(BattleEvent::BattleWon { winner }))
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        for side in [Side::Player, Side::Opponent] {
            let combatant = self.combatant(side);
            if combatant.health > combatant.max_health {
                return Err(IntegrityError::HealthOutOfRange {
                    side,
                    value: combatant.health,
                });
            }
            if combatant.mana > self.mana_cap || combatant.max_mana > self.mana_cap {
                return Err(IntegrityError::ManaOutOfRange {
                    side,
                    value: combatant.mana.max(combatant.max_mana),
                });
            }
            if combatant.hand.len() > self.hand_limit as usize {
                return Err(IntegrityError::HandOverflow {
                    side,
                    size: combatant.hand.len(),
                });
            }
            if combatant.display_only {
                continue;
            }

            let mut seen = HashSet::new();
            for card in combatant
                .deck
                .iter()
                .chain(combatant.hand.iter())
                .chain(combatant.graveyard.iter())
            {
                if !seen.insert(card.id) {
                    return Err(IntegrityError::DuplicateCard {
                        side,
                        card_id: card.id,
                    });
                }
            }
            if seen.len() != combatant.deck_size as usize {
                return Err(IntegrityError::CardCountMismatch {
                    side,
                    expected: combatant.deck_size as usize,
                    actual: seen.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn fresh_state(seed: u64) -> BattleState {
        let config = BattleConfig::default();
        let player = BattleSetup::new(
            catalog::champion_by_id("ignis").expect("ignis exists").clone(),
            catalog::starter_deck(Realm::Fire),
            &config,
        )
        .expect("starter deck is valid");
        let opponent = BattleSetup::new(
            catalog::champion_by_id("glacia").expect("glacia exists").clone(),
            catalog::starter_deck(Realm::Ice),
            &config,
        )
        .expect("starter deck is valid");
        let mut rng = SmallRng::seed_from_u64(seed);
        BattleState::new(player, opponent, Side::Player, &config, &mut rng)
    }

    #[test]
    fn snapshot_without_limits_uses_defaults() {
        let mut json = serde_json::to_value(fresh_state(9)).expect("state encodes");
        let fields = json.as_object_mut().expect("state is an object");
        fields.remove("hand_limit");
        fields.remove("mana_cap");

        let mut state: BattleState = serde_json::from_value(json).expect("state decodes");
        assert_eq!(state.hand_limit, DEFAULT_HAND_LIMIT);
        assert_eq!(state.mana_cap, DEFAULT_MANA_CAP);

        state.pass_turn();
        assert_eq!(state.opponent.max_mana, 1);
        assert_eq!(state.opponent.mana, 1);
        assert_eq!(state.opponent.hand.len(), 4);
    }

    #[test]
    fn mana_cap_is_held_to_ten() {
        let config = BattleConfig {
            mana_cap: 40,
            ..BattleConfig::default()
        };
        let setup = |id: &str, realm: Realm| {
            let champion = catalog::champion_by_id(id).expect("champion exists").clone();
            BattleSetup::new(champion, catalog::starter_deck(realm), &config).expect("valid setup")
        };
        let mut rng = SmallRng::seed_from_u64(4);
        let state = BattleState::new(
            setup("ignis", Realm::Fire),
            setup("volt", Realm::Tech),
            Side::Player,
            &config,
            &mut rng,
        );
        assert_eq!(state.mana_cap, 10);
    }

    #[test]
    fn new_battle_draws_opening_hands() {
        let state = fresh_state(7);
        assert_eq!(state.player.hand.len(), 3);
        assert_eq!(state.opponent.hand.len(), 3);
        assert_eq!(state.player.deck.len(), 5);
        assert_eq!(state.turn, 1);
        assert_eq!(state.phase(), BattlePhase::PlayerTurn);
        assert_eq!(state.player.mana, 1);
        assert!(state.integrity_check().is_ok());
    }

    #[test]
    fn setup_rejects_wrong_deck_size() {
        let config = BattleConfig::default();
        let mut deck = catalog::starter_deck(Realm::Tech);
        deck.pop();
        let champion = catalog::champion_by_id("volt").expect("volt exists").clone();
        let err = BattleSetup::new(champion, deck, &config).expect_err("seven cards is not a deck");
        assert!(matches!(err, RuleError::DeckSize { expected: 8, actual: 7 }));
    }

    #[test]
    fn shield_absorbs_before_health() {
        let mut state = fresh_state(1);
        state.player.shield = 5;
        assert_eq!(state.player.take_damage(3), (3, 0));
        assert_eq!(state.player.shield, 2);
        assert_eq!(state.player.health, 30);

        assert_eq!(state.player.take_damage(6), (2, 4));
        assert_eq!(state.player.shield, 0);
        assert_eq!(state.player.health, 26);
    }

    #[test]
    fn damage_floors_health_at_zero() {
        let mut state = fresh_state(2);
        state.opponent.health = 4;
        assert_eq!(state.opponent.take_damage(10), (0, 4));
        assert_eq!(state.opponent.health, 0);
    }

    #[test]
    fn draw_stops_at_hand_limit_and_keeps_card_in_deck() {
        let mut state = fresh_state(3);
        state.draw_cards(Side::Player, 3);
        assert_eq!(state.player.hand.len(), 6);
        let deck_before = state.player.deck.len();

        let event = state.draw_card(Side::Player);
        assert_eq!(
            event,
            BattleEvent::DrawForfeited {
                side: Side::Player,
                reason: ForfeitReason::HandFull
            }
        );
        assert_eq!(state.player.hand.len(), 6);
        assert_eq!(state.player.deck.len(), deck_before);
        assert!(state.integrity_check().is_ok());
    }

    #[test]
    fn pass_turn_increments_turn_only_when_starter_returns() {
        let mut state = fresh_state(4);
        state.player.shield = 3;
        state.opponent.shield = 2;
        state.opponent.ability_used = true;

        state.pass_turn();
        assert_eq!(state.turn, 1);
        assert_eq!(state.active_side, Side::Opponent);
        assert_eq!(state.opponent.shield, 0);
        assert!(!state.opponent.ability_used);
        assert_eq!(state.player.shield, 3, "only the new active side resets");

        state.pass_turn();
        assert_eq!(state.turn, 2);
        assert_eq!(state.player.max_mana, 2);
        assert_eq!(state.player.mana, 2);
        assert_eq!(state.player.shield, 0);
    }

    #[test]
    fn max_mana_caps_at_ten() {
        let mut state = fresh_state(5);
        state.turn = 14;
        state.begin_turn(Side::Player);
        assert_eq!(state.player.max_mana, 10);
        assert_eq!(state.player.mana, 10);
    }

    #[test]
    fn every_event_lands_in_the_log() {
        let mut state = fresh_state(6);
        let before = state.log.len();
        let events = state.pass_turn();
        assert_eq!(state.log.len(), before + events.len());
        assert_eq!(state.log[before], "Player ends the turn");
    }
}
