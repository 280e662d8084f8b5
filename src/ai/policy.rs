use serde::{Deserialize, Serialize};

use crate::game::{
    end_turn, play_card, use_ability, BattleEvent, BattleState, Card, CardId, EffectDeltas, Intent,
    Side,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameAction {
    PlayCard { card_id: CardId },
    UseAbility,
    EndTurn,
}

impl GameAction {
    pub fn into_intent(self, side: Side) -> Intent {
        match self {
            GameAction::PlayCard { card_id } => Intent::PlayCard { side, card_id },
            GameAction::UseAbility => Intent::UseAbility { side },
            GameAction::EndTurn => Intent::EndTurn { side },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AiConfig {
    pub lethal_bonus: i32,
    pub defensive_bonus: i32,
    pub full_health_heal_penalty: i32,
    pub exhaust_bonus: i32,
    /// Below this share of max health (in percent) heals and shields are favoured.
    pub low_health_percent: u16,
    /// Safety cap on actions in one turn. Values below 1 are treated as 1.
    pub max_actions_per_turn: u8,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            lethal_bonus: 1000,
            defensive_bonus: 40,
            full_health_heal_penalty: 100,
            exhaust_bonus: 5,
            low_health_percent: 35,
            max_actions_per_turn: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiDecision {
    pub action: GameAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    /// Playable cards plus the ability, if usable.
    pub candidates: usize,
}

impl AiDecision {
    fn end_turn(candidates: usize) -> Self {
        Self {
            action: GameAction::EndTurn,
            score: None,
            candidates,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiStep {
    pub decision: AiDecision,
    pub events: Vec<BattleEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct AiAgent {
    config: AiConfig,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    fn score_effects(
        &self,
        state: &BattleState,
        side: Side,
        cost: u8,
        deltas: EffectDeltas,
    ) -> i32 {
        let own = state.combatant(side);
        let foe = state.combatant(side.opponent());
        let mut score = i32::from(cost) * 10;

        if deltas.damage > 0 && deltas.damage >= foe.health {
            score += self.config.lethal_bonus;
        }
        let threshold = u32::from(own.max_health) * u32::from(self.config.low_health_percent);
        let low_health = u32::from(own.health) * 100 < threshold;
        if low_health && deltas.is_defensive() {
            score += self.config.defensive_bonus;
        }
        if deltas.heal > 0 && own.health >= own.max_health {
            score -= self.config.full_health_heal_penalty;
        }
        if cost == own.mana {
            score += self.config.exhaust_bonus;
        }
        score
    }

    pub fn score_card(&self, state: &BattleState, side: Side, card: &Card) -> i32 {
        self.score_effects(state, side, card.cost, EffectDeltas::of_card(card))
    }

    pub fn score_ability(&self, state: &BattleState, side: Side) -> i32 {
        let ability = &state.combatant(side).champion.ability;
        let deltas = EffectDeltas::from_effects(std::slice::from_ref(&ability.effect));
        self.score_effects(state, side, ability.cost, deltas)
    }

    /// Picks the next action for `side`: the best affordable card, or the ability
    /// when it scores strictly higher, or ending the turn when neither is available.
    pub fn decide_action(&self, state: &BattleState, side: Side) -> AiDecision {
        if state.is_finished() || state.active_side != side {
            return AiDecision::end_turn(0);
        }

        let combatant = state.combatant(side);
        let mut best_card: Option<(CardId, i32)> = None;
        let mut candidates = 0;
        for card in combatant.playable_cards() {
            candidates += 1;
            let score = self.score_card(state, side, card);
            if best_card.map_or(true, |(_, best)| score > best) {
                best_card = Some((card.id, score));
            }
        }

        let ability_score = if combatant.ability_ready() {
            candidates += 1;
            Some(self.score_ability(state, side))
        } else {
            None
        };

        match (best_card, ability_score) {
            (Some((_, card_score)), Some(ability)) if ability > card_score => AiDecision {
                action: GameAction::UseAbility,
                score: Some(ability),
                candidates,
            },
            (None, Some(ability)) => AiDecision {
                action: GameAction::UseAbility,
                score: Some(ability),
                candidates,
            },
            (Some((card_id, score)), _) => AiDecision {
                action: GameAction::PlayCard { card_id },
                score: Some(score),
                candidates,
            },
            (None, None) => AiDecision::end_turn(candidates),
        }
    }

    /// Plays out the whole turn for `side`, one resolved action per step, and ends it.
    pub fn play_turn(&self, state: &mut BattleState, side: Side) -> Vec<AiStep> {
        let mut steps = Vec::new();

        for _ in 0..self.config.max_actions_per_turn.max(1) {
            if state.is_finished() || state.active_side != side {
                return steps;
            }

            let decision = self.decide_action(state, side);
            let result = match decision.action {
                GameAction::PlayCard { card_id } => play_card(state, side, card_id),
                GameAction::UseAbility => use_ability(state, side),
                GameAction::EndTurn => break,
            };

            match result {
                Ok(events) => {
                    log::debug!("{side} chose {:?} (score {:?})", decision.action, decision.score);
                    steps.push(AiStep { decision, events });
                }
                Err(error) => {
                    log::warn!(
                        "{side} policy picked an invalid action {:?}: {error}",
                        decision.action
                    );
                    break;
                }
            }
        }

        if state.is_finished() {
            return steps;
        }
        match end_turn(state, side) {
            Ok(events) => steps.push(AiStep {
                decision: AiDecision::end_turn(0),
                events,
            }),
            Err(error) => log::debug!("{side} could not end turn: {error}"),
        }
        steps
    }
}
