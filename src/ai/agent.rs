use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::game::{
    CardColor, MoveError, MoveResolution, Player, Round, RoundEngine, StakeMove,
};

use super::moves::RoundMove;
use super::search::{leaf_value, NullObserver, SearchObserver, SearchStats, Searcher};
use super::selector::{select_move, Difficulty};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub difficulty: Difficulty,
    pub depth: u8,
    pub node_budget: u64,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self {
                difficulty,
                depth: 2,
                node_budget: 20_000,
            },
            Difficulty::Normal => Self {
                difficulty,
                depth: 3,
                node_budget: 60_000,
            },
            Difficulty::Hard => Self {
                difficulty,
                depth: 4,
                node_budget: 150_000,
            },
            Difficulty::Expert => Self {
                difficulty,
                depth: 5,
                node_budget: 400_000,
            },
        }
    }

    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_node_budget(mut self, node_budget: u64) -> Self {
        self.node_budget = node_budget;
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(Difficulty::Normal)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<RoundMove>,
    pub evaluation: f64,
    pub depth_reached: u8,
    pub nodes: u64,
    pub budget_exhausted: bool,
    pub fallback: bool,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<MoveResolution>,
}

pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn decide(&mut self, round: &Round, side: CardColor) -> AiDecision {
        let mut observer = NullObserver;
        self.decide_with_observer(round, side, &mut observer)
    }

    pub fn decide_with_observer(
        &mut self,
        round: &Round,
        side: CardColor,
        observer: &mut dyn SearchObserver,
    ) -> AiDecision {
        if round.is_finished() || round.active != side {
            return self.empty_decision(round, side);
        }
        let Some(player) = round.get_player(side) else {
            return self.empty_decision(round, side);
        };
        if player.hand.is_empty() {
            return self.empty_decision(round, side);
        }

        // A round that fails its own bookkeeping never reaches the search
        let searcher = Searcher::new(self.config.depth, self.config.node_budget);
        let (candidates, stats) = if round.integrity_check().is_ok() {
            searcher.search_root(round, side, observer)
        } else {
            (Vec::new(), SearchStats::new())
        };

        let selected = select_move(candidates, player, self.config.difficulty, &mut self.rng);
        let (action, evaluation, fallback) = match selected {
            Some(scored) => (Some(scored.action), scored.score, false),
            None => match fallback_stake(player, side) {
                Some(action) => (Some(action), leaf_value(round, side), true),
                None => (None, leaf_value(round, side), false),
            },
        };

        let resolution = action
            .as_ref()
            .and_then(|mv| simulate_resolution(round, mv).ok());

        AiDecision {
            action,
            evaluation,
            depth_reached: stats.depth_reached,
            nodes: stats.nodes,
            budget_exhausted: stats.budget_exhausted,
            fallback,
            difficulty: self.config.difficulty,
            resolution,
        }
    }

    fn empty_decision(&self, round: &Round, side: CardColor) -> AiDecision {
        AiDecision {
            action: None,
            evaluation: leaf_value(round, side),
            depth_reached: 0,
            nodes: 0,
            budget_exhausted: false,
            fallback: false,
            difficulty: self.config.difficulty,
            resolution: None,
        }
    }
}

fn fallback_stake(player: &Player, side: CardColor) -> Option<RoundMove> {
    let card = player.hand.first()?;
    let column = *player.available_stakes.first()?;
    Some(RoundMove::Stake {
        action: StakeMove {
            side,
            card_id: card.id,
            column,
        },
    })
}

fn simulate_resolution(round: &Round, mv: &RoundMove) -> Result<MoveResolution, MoveError> {
    let engine = RoundEngine::new();
    let mut preview = round.clone();
    let events = match mv {
        RoundMove::Stake { action } => engine.stake(&mut preview, action.clone())?,
        RoundMove::Wager { action } => engine.wager(&mut preview, action.clone())?,
    };
    Ok(MoveResolution::new(preview, events))
}
