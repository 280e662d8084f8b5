use serde::{Deserialize, Serialize};

use super::rules::RuleError;
use super::state::{BattleEvent, BattleState, Card, CardType, Side};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum CardEffect {
    Damage { amount: u16 },
    Heal { amount: u16 },
    Shield { amount: u16 },
    ManaGain { amount: u8 },
    Draw { count: u8 },
}

/// Derives a card's effects from its type and description text.
///
/// Runs once when the catalog is authored; battle code only reads the
/// resulting effect list.
pub fn classify(card_type: CardType, value: u8, description: &str) -> Vec<CardEffect> {
    let amount = u16::from(value);
    let mut damage = matches!(card_type, CardType::Attack | CardType::Minion)
        || (card_type == CardType::Spell && description.to_lowercase().contains("dmg"));
    let mut heal = false;
    let mut shield = false;
    let mut mana = false;

    if matches!(card_type, CardType::Spell | CardType::Weapon) {
        heal = description.contains("Heal");
        shield = description.contains("Shield");
        mana = description.contains("Mana");
        if card_type == CardType::Weapon && description.contains("Atk") {
            damage = true;
        }
    }

    let mut effects = Vec::new();
    if damage {
        effects.push(CardEffect::Damage { amount });
    }
    if heal {
        effects.push(CardEffect::Heal { amount });
    }
    if shield {
        effects.push(CardEffect::Shield { amount });
    }
    if mana {
        effects.push(CardEffect::ManaGain { amount: value });
    }
    effects
}

/// Numeric outcome of one card or ability; at most one amount per kind.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectDeltas {
    pub damage: u16,
    pub heal: u16,
    pub shield: u16,
    pub mana: u8,
    pub draw: u8,
}

impl EffectDeltas {
    pub fn from_effects(effects: &[CardEffect]) -> Self {
        let mut deltas = Self::default();
        for effect in effects {
            match *effect {
                CardEffect::Damage { amount } if deltas.damage == 0 => deltas.damage = amount,
                CardEffect::Heal { amount } if deltas.heal == 0 => deltas.heal = amount,
                CardEffect::Shield { amount } if deltas.shield == 0 => deltas.shield = amount,
                CardEffect::ManaGain { amount } if deltas.mana == 0 => deltas.mana = amount,
                CardEffect::Draw { count } if deltas.draw == 0 => deltas.draw = count,
                _ => {}
            }
        }
        deltas
    }

    pub fn of_card(card: &Card) -> Self {
        Self::from_effects(&card.effects)
    }

    pub fn is_defensive(&self) -> bool {
        self.heal > 0 || self.shield > 0
    }
}

/// Applies deltas for `actor`: damage lands on the other side, everything else on the actor.
pub fn apply_deltas(
    state: &mut BattleState,
    actor: Side,
    deltas: EffectDeltas,
) -> Vec<BattleEvent> {
    let mut events = Vec::new();
    let mana_cap = state.mana_cap;

    if deltas.damage > 0 {
        let target = actor.opponent();
        let (absorbed, health_lost) = state.combatant_mut(target).take_damage(deltas.damage);
        events.push(state.record(BattleEvent::DamageDealt {
            source: actor,
            target,
            amount: deltas.damage,
            absorbed,
            health_lost,
        }));
    }
    if deltas.heal > 0 {
        let amount = state.combatant_mut(actor).heal(deltas.heal);
        events.push(state.record(BattleEvent::Healed {
            side: actor,
            amount,
        }));
    }
    if deltas.shield > 0 {
        state.combatant_mut(actor).gain_shield(deltas.shield);
        events.push(state.record(BattleEvent::ShieldGained {
            side: actor,
            amount: deltas.shield,
        }));
    }
    if deltas.mana > 0 {
        let amount = state.combatant_mut(actor).gain_mana(deltas.mana, mana_cap);
        events.push(state.record(BattleEvent::ManaGained {
            side: actor,
            amount,
        }));
    }
    if deltas.draw > 0 {
        events.extend(state.draw_cards(actor, deltas.draw));
    }
    events
}

/// Resolves a card for `side`. Affordability is the caller's concern; the cost
/// is deducted unconditionally.
pub fn resolve_card(state: &mut BattleState, side: Side, card: Card) -> Vec<BattleEvent> {
    let deltas = EffectDeltas::of_card(&card);
    let combatant = state.combatant_mut(side);
    combatant.mana = combatant.mana.saturating_sub(card.cost);
    if let Some(index) = combatant.hand_index(card.id) {
        combatant.hand.remove(index);
    }

    let played = BattleEvent::CardPlayed {
        side,
        card_id: card.id,
        card_name: card.name.clone(),
        cost: card.cost,
    };
    state.last_played = Some(card.id);
    state.combatant_mut(side).graveyard.push(card);

    let mut events = vec![state.record(played)];
    events.extend(apply_deltas(state, side, deltas));
    events.extend(state.evaluate_victory());
    events
}

/// Casts the side's champion ability. Re-checks mana and the once-per-turn
/// flag and leaves the state untouched when either fails.
pub fn resolve_ability(state: &mut BattleState, side: Side) -> Result<Vec<BattleEvent>, RuleError> {
    let combatant = state.combatant(side);
    let ability = combatant.champion.ability.clone();
    if combatant.ability_used {
        return Err(RuleError::AbilityAlreadyUsed);
    }
    if combatant.mana < ability.cost {
        return Err(RuleError::InsufficientMana {
            required: ability.cost,
            available: combatant.mana,
        });
    }

    let combatant = state.combatant_mut(side);
    combatant.mana -= ability.cost;
    combatant.ability_used = true;

    let mut events = vec![state.record(BattleEvent::AbilityUsed {
        side,
        ability: ability.name.clone(),
        cost: ability.cost,
    })];
    let deltas = EffectDeltas::from_effects(std::slice::from_ref(&ability.effect));
    events.extend(apply_deltas(state, side, deltas));
    events.extend(state.evaluate_victory());
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog;
    use crate::game::state::{BattleConfig, BattleSetup, Realm};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn state_with(player: &str, opponent: &str) -> BattleState {
        let config = BattleConfig::default();
        let setup = |id: &str| {
            let champion = catalog::champion_by_id(id).expect("champion exists").clone();
            let deck = catalog::starter_deck(champion.realm);
            BattleSetup::new(champion, deck, &config).expect("valid setup")
        };
        let mut rng = SmallRng::seed_from_u64(11);
        BattleState::new(setup(player), setup(opponent), Side::Player, &config, &mut rng)
    }

    fn test_card(card_type: CardType, cost: u8, value: u8, description: &str) -> Card {
        Card {
            id: 900,
            name: "Test Card".into(),
            cost,
            card_type,
            value,
            description: description.into(),
            realm: Realm::Fire,
            effects: classify(card_type, value, description),
        }
    }

    #[test]
    fn attack_and_minion_always_deal_damage() {
        assert_eq!(
            classify(CardType::Attack, 4, "Sear the foe."),
            vec![CardEffect::Damage { amount: 4 }]
        );
        assert_eq!(
            classify(CardType::Minion, 2, "Heal nothing, just bite."),
            vec![CardEffect::Damage { amount: 2 }]
        );
    }

    #[test]
    fn spell_keywords_select_effects() {
        assert_eq!(
            classify(CardType::Spell, 5, "Pierce for 5 DMG."),
            vec![CardEffect::Damage { amount: 5 }]
        );
        assert_eq!(
            classify(CardType::Spell, 3, "Siphon 3 dmg and Heal the same."),
            vec![CardEffect::Damage { amount: 3 }, CardEffect::Heal { amount: 3 }]
        );
        assert_eq!(
            classify(CardType::Spell, 2, "Gain 2 Mana."),
            vec![CardEffect::ManaGain { amount: 2 }]
        );
        assert!(classify(CardType::Spell, 2, "heal and shield, lower-case").is_empty());
    }

    #[test]
    fn weapon_needs_atk_keyword_for_damage() {
        assert_eq!(
            classify(CardType::Weapon, 3, "A Shield that also lands +3 Atk."),
            vec![CardEffect::Damage { amount: 3 }, CardEffect::Shield { amount: 3 }]
        );
        assert_eq!(
            classify(CardType::Weapon, 4, "Brace with a Shield worth 4."),
            vec![CardEffect::Shield { amount: 4 }]
        );
    }

    #[test]
    fn deltas_keep_first_amount_per_kind() {
        let deltas = EffectDeltas::from_effects(&[
            CardEffect::Damage { amount: 3 },
            CardEffect::Damage { amount: 9 },
            CardEffect::Shield { amount: 2 },
        ]);
        assert_eq!(deltas.damage, 3);
        assert_eq!(deltas.shield, 2);
        assert!(deltas.is_defensive());
    }

    #[test]
    fn resolve_card_moves_card_to_graveyard_and_pays_cost() {
        let mut state = state_with("ignis", "glacia");
        let card = test_card(CardType::Attack, 1, 3, "Deal 3 dmg.");
        state.player.hand.push(card.clone());
        state.player.mana = 4;

        let events = resolve_card(&mut state, Side::Player, card);

        assert_eq!(state.player.mana, 3);
        assert!(state.player.hand_index(900).is_none());
        assert_eq!(state.player.graveyard.last().map(|c| c.id), Some(900));
        assert_eq!(state.opponent.health, 27);
        assert_eq!(state.last_played, Some(900));
        assert!(matches!(events[0], BattleEvent::CardPlayed { card_id: 900, .. }));
    }

    #[test]
    fn lethal_card_sets_winner_immediately() {
        let mut state = state_with("ignis", "glacia");
        state.opponent.health = 2;
        let card = test_card(CardType::Attack, 1, 3, "Deal 3 dmg.");

        let events = resolve_card(&mut state, Side::Player, card);

        assert_eq!(state.opponent.health, 0);
        assert_eq!(state.winner, Some(Side::Player));
        assert_eq!(
            events.last(),
            Some(&BattleEvent::BattleWon {
                winner: Side::Player
            })
        );
    }

    #[test]
    fn heal_caps_and_mana_gain_caps_at_ten() {
        let mut state = state_with("sylva", "volt");
        state.player.health = 28;
        state.player.mana = 9;
        let deltas = EffectDeltas {
            heal: 5,
            mana: 4,
            ..EffectDeltas::default()
        };
        apply_deltas(&mut state, Side::Player, deltas);
        assert_eq!(state.player.health, 30);
        assert_eq!(state.player.mana, 10);
    }

    #[test]
    fn ability_without_mana_is_a_no_op() {
        let mut state = state_with("ignis", "glacia");
        state.player.mana = 1;
        let before = state.clone();

        let err = resolve_ability(&mut state, Side::Player).expect_err("costs 2 mana");
        assert!(matches!(err, RuleError::InsufficientMana { required: 2, available: 1 }));
        assert_eq!(state, before);
    }

    #[test]
    fn ability_is_once_per_turn() {
        let mut state = state_with("glacia", "ignis");
        state.player.mana = 6;

        resolve_ability(&mut state, Side::Player).expect("first cast succeeds");
        assert_eq!(state.player.shield, 4);
        assert_eq!(state.player.mana, 4);
        assert!(state.player.ability_used);

        let before = state.clone();
        let err = resolve_ability(&mut state, Side::Player).expect_err("second cast rejected");
        assert_eq!(err, RuleError::AbilityAlreadyUsed);
        assert_eq!(state, before);
    }

    #[test]
    fn draw_ability_respects_hand_limit() {
        let mut state = state_with("volt", "sylva");
        state.player.mana = 2;
        state.draw_cards(Side::Player, 2);
        assert_eq!(state.player.hand.len(), 5);

        resolve_ability(&mut state, Side::Player).expect("cast succeeds");
        assert_eq!(state.player.hand.len(), 6);
        assert_eq!(state.player.deck.len(), 2);
    }
}
