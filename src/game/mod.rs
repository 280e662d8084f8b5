//! 游戏核心逻辑模块（状态机、效果结算、卡牌目录）。

pub mod catalog;
pub mod effects;
pub mod rules;
pub mod state;

pub use effects::{apply_deltas, classify, resolve_ability, resolve_card, CardEffect, EffectDeltas};
pub use rules::{
    apply_intent, end_turn, play_card, play_relayed_card, try_apply, use_ability, Intent,
    RuleError, Transition,
};
pub use state::{
    Ability, BattleConfig, BattleEvent, BattlePhase, BattleSetup, BattleState, Card, CardId,
    CardType, Champion, Combatant, ForfeitReason, IntegrityError, Realm, Side,
};
