//! 游戏核心逻辑模块（牌局状态、手牌评估、规则引擎等）。

pub mod evaluator;
pub mod rules;
pub mod state;

pub use evaluator::{
    CardValueMask,
    HandComparison,
    HandScore,
    MIN_RUN_LENGTH,
    PAIR_STRENGTH,
    compare_hands,
    evaluate_hand,
};
pub use state::{
    BOARD_COLUMNS,
    COLUMN_DEPTH,
    Card,
    CardColor,
    CardId,
    Column,
    HAND_SIZE,
    IntegrityError,
    Player,
    Position,
    Round,
    RoundEvent,
    RoundState,
    Suit,
    standard_deck,
};
pub use rules::{MoveError, MoveResolution, RoundEngine, RoundOutcome, StakeMove, WagerMove};
