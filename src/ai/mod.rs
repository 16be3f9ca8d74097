//! AI 决策模块（走法生成、极小极大搜索、难度选择等）。

pub mod agent;
pub mod moves;
pub mod search;
pub mod selector;

pub use agent::{AiAgent, AiConfig, AiDecision};
pub use moves::{RoundMove, generate_moves, generate_stake_moves, generate_wager_moves};
pub use search::{NullObserver, ScoredMove, SearchObserver, SearchStats, Searcher, apply_move};
pub use selector::{Difficulty, HAND_TAPER, adjusted_mean, filter_candidates, select_move};
