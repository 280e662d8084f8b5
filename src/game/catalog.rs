//! 卡牌与英雄目录（只读数据）。

use std::collections::HashSet;

use once_cell::sync::Lazy;

use super::effects::{classify, CardEffect};
use super::rules::RuleError;
use super::state::{Ability, Card, CardId, CardType, Champion, Realm};

static CARDS: Lazy<Vec<Card>> = Lazy::new(build_cards);
static CHAMPIONS: Lazy<Vec<Champion>> = Lazy::new(build_champions);

const STARTER_DECK_SIZE: usize = 8;

fn card(
    id: CardId,
    name: &str,
    cost: u8,
    card_type: CardType,
    value: u8,
    description: &str,
    realm: Realm,
) -> Card {
    Card {
        id,
        name: name.into(),
        cost,
        card_type,
        value,
        description: description.into(),
        realm,
        effects: classify(card_type, value, description),
    }
}

fn build_cards() -> Vec<Card> {
    use CardType::*;
    use Realm::*;

    vec![
        card(1, "Ember Strike", 1, Attack, 3, "Deal 3 dmg to the enemy.", Fire),
        card(2, "Flame Imp", 2, Minion, 3, "A cackling imp that bites for 3.", Fire),
        card(3, "Molten Blade", 3, Weapon, 4, "Swing for +4 Atk.", Fire),
        card(4, "Phoenix Feather", 3, Spell, 5, "Heal 5 health with rebirth flames.", Fire),
        card(5, "Kindling", 0, Spell, 2, "Gain 2 Mana this turn.", Fire),
        card(6, "Scorch", 2, Attack, 4, "Sear the foe.", Fire),
        card(7, "Ember Ward", 2, Spell, 3, "Gain 3 Shield of living flame.", Fire),
        card(8, "Fireball", 4, Spell, 6, "Hurl a fireball for 6 dmg.", Fire),
        card(9, "Magma Golem", 5, Minion, 7, "A hulking golem that slams for 7.", Fire),
        card(10, "Inferno", 7, Spell, 10, "Engulf the battlefield for 10 dmg.", Fire),
        card(11, "Frost Bolt", 1, Attack, 2, "Chill the foe.", Ice),
        card(12, "Snow Sprite", 1, Minion, 2, "A playful sprite that nips for 2.", Ice),
        card(13, "Glacial Wall", 2, Spell, 5, "Raise a Shield of 5 ice.", Ice),
        card(14, "Winter's Touch", 2, Spell, 3, "Heal 3 health in the cold.", Ice),
        card(15, "Crystal Focus", 1, Spell, 2, "Gain 2 Mana from crystals.", Ice),
        card(16, "Ice Lance", 3, Spell, 5, "Pierce for 5 dmg.", Ice),
        card(17, "Frozen Aegis", 3, Weapon, 4, "Brace with a Shield worth 4.", Ice),
        card(18, "Icicle Spear", 4, Weapon, 5, "Thrust for +5 Atk.", Ice),
        card(19, "Yeti Brute", 4, Minion, 6, "Pounds for 6.", Ice),
        card(20, "Blizzard", 6, Spell, 8, "A storm dealing 8 dmg.", Ice),
        card(21, "Laser Pulse", 2, Attack, 3, "Fire a precise beam.", Tech),
        card(22, "Plasma Cutter", 2, Weapon, 3, "+3 Atk arc blade.", Tech),
        card(23, "Nano Repair", 2, Spell, 4, "Heal 4 health with nanites.", Tech),
        card(24, "Power Cell", 0, Spell, 3, "Gain 3 Mana instantly.", Tech),
        card(25, "Riot Shield", 2, Weapon, 3, "A Shield that also lands +3 Atk.", Tech),
        card(26, "Drone Swarm", 3, Minion, 4, "A drone swarm that zaps for 4.", Tech),
        card(27, "Force Field", 3, Spell, 6, "Project a Shield of 6.", Tech),
        card(28, "EMP Blast", 4, Spell, 5, "Overload circuits for 5 dmg.", Tech),
        card(29, "Railgun", 5, Attack, 8, "Deliver a devastating slug.", Tech),
        card(30, "Mech Sentinel", 6, Minion, 8, "A towering mech that fires for 8.", Tech),
        card(31, "Thorn Lash", 1, Attack, 2, "Whip with thorns.", Forest),
        card(32, "Moonwell", 1, Spell, 2, "Gain 2 Mana from the well.", Forest),
        card(33, "Oak Staff", 2, Weapon, 3, "Strike for +3 Atk.", Forest),
        card(34, "Bark Skin", 2, Spell, 4, "Gain a Shield of 4 bark.", Forest),
        card(35, "Wolf Pack", 3, Minion, 4, "Wolves that maul for 4.", Forest),
        card(36, "Healing Spring", 3, Spell, 6, "Heal 6 health.", Forest),
        card(37, "Vine Drain", 3, Spell, 3, "Siphon 3 dmg and Heal the same.", Forest),
        card(38, "Stampede", 4, Attack, 6, "The herd tramples the foe.", Forest),
        card(39, "Treant Guardian", 5, Minion, 6, "An ancient treant that crushes for 6.", Forest),
        card(40, "Nature's Wrath", 6, Spell, 9, "Unleash 9 dmg of primal fury.", Forest),
    ]
}

fn build_champions() -> Vec<Champion> {
    vec![
        Champion {
            id: "ignis".into(),
            name: "Ignis".into(),
            title: "the Ember Tyrant".into(),
            realm: Realm::Fire,
            max_health: 30,
            ability: Ability {
                name: "Inferno Blast".into(),
                description: "Deal 3 damage to the enemy champion.".into(),
                cost: 2,
                effect: CardEffect::Damage { amount: 3 },
            },
            portrait: "portraits/ignis.png".into(),
            flavor: "Where Ignis walks, the ground remembers fire.".into(),
        },
        Champion {
            id: "glacia".into(),
            name: "Glacia".into(),
            title: "Warden of the Frozen Gate".into(),
            realm: Realm::Ice,
            max_health: 30,
            ability: Ability {
                name: "Frost Armor".into(),
                description: "Gain 4 Shield.".into(),
                cost: 2,
                effect: CardEffect::Shield { amount: 4 },
            },
            portrait: "portraits/glacia.png".into(),
            flavor: "Patience is a blade that never dulls.".into(),
        },
        Champion {
            id: "volt".into(),
            name: "Volt-9".into(),
            title: "the Clockwork Savant".into(),
            realm: Realm::Tech,
            max_health: 30,
            ability: Ability {
                name: "Overclock".into(),
                description: "Draw 2 cards.".into(),
                cost: 2,
                effect: CardEffect::Draw { count: 2 },
            },
            portrait: "portraits/volt.png".into(),
            flavor: "Every battle is a solved equation.".into(),
        },
        Champion {
            id: "sylva".into(),
            name: "Sylva".into(),
            title: "Heart of the Grove".into(),
            realm: Realm::Forest,
            max_health: 30,
            ability: Ability {
                name: "Verdant Bloom".into(),
                description: "Heal 3 health.".into(),
                cost: 2,
                effect: CardEffect::Heal { amount: 3 },
            },
            portrait: "portraits/sylva.png".into(),
            flavor: "The forest forgives, but it does not forget.".into(),
        },
    ]
}

pub fn cards() -> &'static [Card] {
    &CARDS
}

pub fn champions() -> &'static [Champion] {
    &CHAMPIONS
}

pub fn card_by_id(id: CardId) -> Option<&'static Card> {
    CARDS.iter().find(|card| card.id == id)
}

pub fn champion_by_id(id: &str) -> Option<&'static Champion> {
    CHAMPIONS.iter().find(|champion| champion.id == id)
}

pub fn cards_for_realm(realm: Realm) -> impl Iterator<Item = &'static Card> {
    CARDS.iter().filter(move |card| card.realm == realm)
}

/// Fixed eight-card list for a realm, used by the scripted opponent and as the
/// placeholder deck of a remote peer.
pub fn starter_deck(realm: Realm) -> Vec<Card> {
    cards_for_realm(realm)
        .take(STARTER_DECK_SIZE)
        .cloned()
        .collect()
}

/// Resolves a deck list of catalog ids; every id must be known and distinct.
pub fn build_deck(ids: &[CardId], deck_size: u8) -> Result<Vec<Card>, RuleError> {
    if ids.len() != deck_size as usize {
        return Err(RuleError::DeckSize {
            expected: deck_size,
            actual: ids.len(),
        });
    }
    let mut seen = HashSet::new();
    ids.iter()
        .map(|&id| {
            if !seen.insert(id) {
                return Err(RuleError::DuplicateCard { card_id: id });
            }
            card_by_id(id)
                .cloned()
                .ok_or(RuleError::UnknownCard { card_id: id })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_ids_are_unique() {
        let mut seen = HashSet::new();
        for card in cards() {
            assert!(seen.insert(card.id), "duplicate id {}", card.id);
        }
    }

    #[test]
    fn every_card_has_an_effect() {
        for card in cards() {
            assert!(!card.effects.is_empty(), "{} resolves to nothing", card.name);
        }
    }

    #[test]
    fn every_realm_has_a_champion_and_full_starter_deck() {
        for realm in Realm::ALL {
            assert!(champions().iter().any(|c| c.realm == realm));
            assert_eq!(starter_deck(realm).len(), 8);
        }
    }

    #[test]
    fn build_deck_validates_ids() {
        let ids: Vec<CardId> = (1..=8).collect();
        assert_eq!(build_deck(&ids, 8).map(|deck| deck.len()), Ok(8));

        let duplicated = [1, 1, 2, 3, 4, 5, 6, 7];
        assert_eq!(
            build_deck(&duplicated, 8),
            Err(RuleError::DuplicateCard { card_id: 1 })
        );

        let unknown = [1, 2, 3, 4, 5, 6, 7, 999];
        assert_eq!(
            build_deck(&unknown, 8),
            Err(RuleError::UnknownCard { card_id: 999 })
        );
        assert!(matches!(build_deck(&ids[..5], 8), Err(RuleError::DeckSize { .. })));
    }

    #[test]
    fn composite_cards_carry_both_effects() {
        let drain = card_by_id(37).expect("vine drain exists");
        assert_eq!(
            drain.effects,
            vec![CardEffect::Damage { amount: 3 }, CardEffect::Heal { amount: 3 }]
        );
    }
}
