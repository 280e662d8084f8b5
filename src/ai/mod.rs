//! AI 对手决策模块（启发式评分策略）。

pub mod policy;

pub use policy::{AiAgent, AiConfig, AiDecision, AiStep, GameAction};
