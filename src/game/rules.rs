use std::fmt;

use serde::{Deserialize, Serialize};

use super::effects;
use super::state::{BattleEvent, BattleState, Card, CardId, Side};

/// The three things a combatant can do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Intent {
    PlayCard { side: Side, card_id: CardId },
    UseAbility { side: Side },
    EndTurn { side: Side },
}

impl Intent {
    pub fn side(&self) -> Side {
        match self {
            Intent::PlayCard { side, .. }
            | Intent::UseAbility { side }
            | Intent::EndTurn { side } => *side,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    GameFinished,
    NotYourTurn {
        side: Side,
    },
    CardNotInHand {
        card_id: CardId,
    },
    InsufficientMana {
        required: u8,
        available: u8,
    },
    AbilityAlreadyUsed,
    DeckSize {
        expected: u8,
        actual: usize,
    },
    DuplicateCard {
        card_id: CardId,
    },
    UnknownCard {
        card_id: CardId,
    },
    UnknownChampion {
        id: String,
    },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::GameFinished => f.write_str("the battle is already over"),
            RuleError::NotYourTurn { side } => write!(f, "it is not {side}'s turn"),
            RuleError::CardNotInHand { card_id } => write!(f, "card {card_id} is not in hand"),
            RuleError::InsufficientMana {
                required,
                available,
            } => write!(f, "needs {required} mana, has {available}"),
            RuleError::AbilityAlreadyUsed => f.write_str("ability already used this turn"),
            RuleError::DeckSize { expected, actual } => {
                write!(f, "deck must hold {expected} cards, got {actual}")
            }
            RuleError::DuplicateCard { card_id } => write!(f, "card {card_id} appears twice"),
            RuleError::UnknownCard { card_id } => write!(f, "unknown card {card_id}"),
            RuleError::UnknownChampion { id } => write!(f, "unknown champion {id:?}"),
        }
    }
}

impl std::error::Error for RuleError {}

/// Result of running one intent: the (possibly unchanged) state and what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub state: BattleState,
    pub events: Vec<BattleEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<RuleError>,
}

impl Transition {
    pub fn applied(&self) -> bool {
        self.rejected.is_none()
    }
}

fn ensure_open(state: &BattleState) -> Result<(), RuleError> {
    if state.is_finished() {
        return Err(RuleError::GameFinished);
    }
    Ok(())
}

fn ensure_turn_owner(state: &BattleState, side: Side) -> Result<(), RuleError> {
    if state.active_side != side {
        return Err(RuleError::NotYourTurn { side });
    }
    Ok(())
}

pub fn play_card(
    state: &mut BattleState,
    side: Side,
    card_id: CardId,
) -> Result<Vec<BattleEvent>, RuleError> {
    ensure_open(state)?;
    ensure_turn_owner(state, side)?;

    let combatant = state.combatant(side);
    let index = combatant
        .hand_index(card_id)
        .ok_or(RuleError::CardNotInHand { card_id })?;
    let card = &combatant.hand[index];
    if card.cost > combatant.mana {
        return Err(RuleError::InsufficientMana {
            required: card.cost,
            available: combatant.mana,
        });
    }

    let card = card.clone();
    Ok(effects::resolve_card(state, side, card))
}

/// Plays a card relayed from the remote peer. The sender already validated hand
/// and mana, so only turn order is checked here.
pub fn play_relayed_card(
    state: &mut BattleState,
    side: Side,
    card: Card,
) -> Result<Vec<BattleEvent>, RuleError> {
    ensure_open(state)?;
    ensure_turn_owner(state, side)?;
    Ok(effects::resolve_card(state, side, card))
}

pub fn use_ability(state: &mut BattleState, side: Side) -> Result<Vec<BattleEvent>, RuleError> {
    ensure_open(state)?;
    ensure_turn_owner(state, side)?;
    effects::resolve_ability(state, side)
}

pub fn end_turn(state: &mut BattleState, side: Side) -> Result<Vec<BattleEvent>, RuleError> {
    ensure_open(state)?;
    ensure_turn_owner(state, side)?;
    Ok(state.pass_turn())
}

pub fn try_apply(state: &mut BattleState, intent: &Intent) -> Result<Vec<BattleEvent>, RuleError> {
    match *intent {
        Intent::PlayCard { side, card_id } => play_card(state, side, card_id),
        Intent::UseAbility { side } => use_ability(state, side),
        Intent::EndTurn { side } => end_turn(state, side),
    }
}

/// Runs an intent to completion. Invalid intents leave the state exactly as it was.
pub fn apply_intent(mut state: BattleState, intent: Intent) -> Transition {
    match try_apply(&mut state, &intent) {
        Ok(events) => Transition {
            state,
            events,
            rejected: None,
        },
        Err(error) => {
            log::debug!("ignored {intent:?}: {error}");
            Transition {
                state,
                events: Vec::new(),
                rejected: Some(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog;
    use crate::game::state::{BattleConfig, BattleSetup, CardType};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn setup_state() -> BattleState {
        let config = BattleConfig::default();
        let setup = |id: &str| {
            let champion = catalog::champion_by_id(id).expect("champion exists").clone();
            let deck = catalog::starter_deck(champion.realm);
            BattleSetup::new(champion, deck, &config).expect("valid setup")
        };
        let mut rng = SmallRng::seed_from_u64(99);
        BattleState::new(setup("ignis"), setup("sylva"), Side::Player, &config, &mut rng)
    }

    fn put_in_hand(state: &mut BattleState, side: Side, card_id: CardId) {
        let card = catalog::card_by_id(card_id).expect("card exists").clone();
        let combatant = state.combatant_mut(side);
        combatant.deck.retain(|c| c.id != card_id);
        if combatant.hand_index(card_id).is_none() {
            combatant.hand.push(card);
        }
    }

    #[test]
    fn unaffordable_card_is_rejected_without_change() {
        let mut state = setup_state();
        put_in_hand(&mut state, Side::Player, 8);
        let before = state.clone();

        let transition = apply_intent(
            state,
            Intent::PlayCard {
                side: Side::Player,
                card_id: 8,
            },
        );

        assert_eq!(
            transition.rejected,
            Some(RuleError::InsufficientMana {
                required: 4,
                available: 1
            })
        );
        assert!(transition.events.is_empty());
        assert_eq!(transition.state, before);
    }

    #[test]
    fn card_not_in_hand_is_rejected() {
        let state = setup_state();
        let before = state.clone();
        let transition = apply_intent(
            state,
            Intent::PlayCard {
                side: Side::Player,
                card_id: 40,
            },
        );
        assert_eq!(transition.rejected, Some(RuleError::CardNotInHand { card_id: 40 }));
        assert_eq!(transition.state, before);
    }

    #[test]
    fn acting_out_of_turn_is_rejected() {
        let state = setup_state();
        let before = state.clone();
        let transition = apply_intent(state, Intent::EndTurn { side: Side::Opponent });
        assert_eq!(
            transition.rejected,
            Some(RuleError::NotYourTurn {
                side: Side::Opponent
            })
        );
        assert_eq!(transition.state, before);
    }

    #[test]
    fn end_turn_refills_new_side_only() {
        let mut state = setup_state();
        state.player.mana = 0;
        state.player.shield = 2;

        end_turn(&mut state, Side::Player).expect("player may end turn");
        assert_eq!(state.active_side, Side::Opponent);
        assert_eq!(state.opponent.max_mana, 1);
        assert_eq!(state.opponent.mana, 1);
        assert_eq!(state.opponent.hand.len(), 4);
        assert_eq!(state.player.mana, 0);
        assert_eq!(state.player.shield, 2);

        end_turn(&mut state, Side::Opponent).expect("opponent may end turn");
        assert_eq!(state.turn, 2);
        assert_eq!(state.player.max_mana, 2);
        assert_eq!(state.player.mana, 2);
        assert_eq!(state.player.shield, 0);
        assert!(!state.player.ability_used);
    }

    #[test]
    fn lethal_scenario_ends_battle_and_blocks_further_intents() {
        let mut state = setup_state();
        state.opponent.health = 2;
        state.opponent.shield = 0;
        put_in_hand(&mut state, Side::Player, 1);

        let events = play_card(&mut state, Side::Player, 1).expect("ember strike is affordable");
        assert_eq!(state.opponent.health, 0);
        assert_eq!(state.winner, Some(Side::Player));
        assert!(events.contains(&BattleEvent::BattleWon {
            winner: Side::Player
        }));

        let after_win = state.clone();
        let transition = apply_intent(state, Intent::EndTurn { side: Side::Player });
        assert_eq!(transition.rejected, Some(RuleError::GameFinished));
        assert_eq!(transition.state, after_win);
    }

    #[test]
    fn ability_below_cost_changes_nothing() {
        let state = setup_state();
        let before = state.clone();
        let transition = apply_intent(state, Intent::UseAbility { side: Side::Player });
        assert!(!transition.applied());
        assert_eq!(transition.state, before);
        assert!(!transition.state.player.ability_used);
    }

    #[test]
    fn relayed_card_resolves_without_hand_membership() {
        let mut state = setup_state();
        end_turn(&mut state, Side::Player).expect("pass to opponent");
        let card = Card {
            id: 500,
            name: "Remote Strike".into(),
            cost: 1,
            card_type: CardType::Attack,
            value: 4,
            description: "Strike.".into(),
            realm: crate::game::Realm::Forest,
            effects: crate::game::classify(CardType::Attack, 4, "Strike."),
        };

        play_relayed_card(&mut state, Side::Opponent, card).expect("opponent's turn");
        assert_eq!(state.player.health, 26);
        assert_eq!(state.opponent.mana, 0);
        assert_eq!(state.opponent.graveyard.last().map(|c| c.id), Some(500));
    }
}
