use serde::{Deserialize, Serialize};

use crate::game::{
    compare_hands, evaluate_hand, CardColor, CardValueMask, MoveError, Round, RoundEngine,
};

use super::moves::{generate_moves, heuristic_score, RoundMove};

pub trait SearchObserver {
    fn node_expanded(&mut self, parent_id: u64, node_id: u64, depth: u8, score: f64, pruned: bool);
}

pub struct NullObserver;

impl SearchObserver for NullObserver {
    fn node_expanded(&mut self, _: u64, _: u64, _: u8, _: f64, _: bool) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMove {
    pub action: RoundMove,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchStats {
    pub nodes: u64,
    pub depth_reached: u8,
    pub budget_exhausted: bool,
}

impl SearchStats {
    pub fn new() -> Self {
        Self {
            nodes: 0,
            depth_reached: 0,
            budget_exhausted: false,
        }
    }
}

impl Default for SearchStats {
    fn default() -> Self {
        SearchStats::new()
    }
}

// Clones the parent snapshot and plays the move on the copy, so sibling
// branches never see each other's mutations.
pub fn apply_move(engine: &RoundEngine, round: &Round, mv: &RoundMove) -> Result<Round, MoveError> {
    let mut next = round.clone();
    match mv {
        RoundMove::Stake { action } => engine.stake(&mut next, action.clone())?,
        RoundMove::Wager { action } => engine.wager(&mut next, action.clone())?,
    };
    Ok(next)
}

pub struct Searcher {
    depth: u8,
    node_budget: u64,
}

impl Searcher {
    pub fn new(depth: u8, node_budget: u64) -> Self {
        Self { depth, node_budget }
    }

    pub fn search_root(
        &self,
        round: &Round,
        side: CardColor,
        observer: &mut dyn SearchObserver,
    ) -> (Vec<ScoredMove>, SearchStats) {
        let mut stats = SearchStats::new();
        if round.is_finished() || round.active != side {
            return (Vec::new(), stats);
        }

        let engine = RoundEngine::new();
        let transitions = Self::expand(&engine, round);
        let mut scored = Vec::with_capacity(transitions.len());

        // Beta stays open at the top so every candidate gets its own score
        let mut alpha = f64::NEG_INFINITY;
        let beta = f64::INFINITY;
        let root_id = 0;

        for (action, child) in transitions {
            let score = self.minimax_rec(
                &engine,
                &child,
                self.depth.saturating_sub(1),
                alpha,
                beta,
                side,
                root_id,
                &mut stats,
                observer,
            );
            alpha = alpha.max(score);
            scored.push(ScoredMove { action, score });
        }

        (scored, stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn minimax_rec(
        &self,
        engine: &RoundEngine,
        round: &Round,
        depth_remaining: u8,
        mut alpha: f64,
        mut beta: f64,
        root_side: CardColor,
        parent_id: u64,
        stats: &mut SearchStats,
        observer: &mut dyn SearchObserver,
    ) -> f64 {
        // Soft cutoff: beyond the budget every node reads as neutral
        if stats.nodes >= self.node_budget {
            stats.budget_exhausted = true;
            return 0.0;
        }
        stats.nodes += 1;
        let node_id = stats.nodes;
        let depth_explored = self.depth.saturating_sub(depth_remaining);
        if depth_explored > stats.depth_reached {
            stats.depth_reached = depth_explored;
        }

        if depth_remaining == 0 || round.is_finished() {
            let value = leaf_value(round, root_side);
            observer.node_expanded(parent_id, node_id, depth_explored, value, false);
            return value;
        }

        let transitions = Self::expand(engine, round);
        if transitions.is_empty() {
            let value = leaf_value(round, root_side);
            observer.node_expanded(parent_id, node_id, depth_explored, value, false);
            return value;
        }

        let maximizing = round.active == root_side;
        let mut value = if maximizing {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
        let mut pruned = false;
        for (_, child) in transitions {
            let score = self.minimax_rec(
                engine,
                &child,
                depth_remaining.saturating_sub(1),
                alpha,
                beta,
                root_side,
                node_id,
                stats,
                observer,
            );
            if maximizing {
                value = value.max(score);
                alpha = alpha.max(value);
            } else {
                value = value.min(score);
                beta = beta.min(value);
            }
            if beta <= alpha {
                pruned = true;
                break;
            }
            if stats.budget_exhausted {
                break;
            }
        }

        observer.node_expanded(parent_id, node_id, depth_explored, value, pruned);
        value
    }

    fn expand(engine: &RoundEngine, round: &Round) -> Vec<(RoundMove, Round)> {
        let mut moves = generate_moves(round, round.active);
        if moves.len() > 1 {
            moves.sort_by(|a, b| {
                heuristic_score(round, b)
                    .partial_cmp(&heuristic_score(round, a))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        moves
            .into_iter()
            .filter_map(|mv| apply_move(engine, round, &mv).ok().map(|child| (mv, child)))
            .collect()
    }
}

// Score gap dominates, then the transfer each contested column would produce
// if the round ended now. Opponent hand values go through the poison mask.
pub(crate) fn leaf_value(round: &Round, side: CardColor) -> f64 {
    let Some(player) = round.get_player(side) else {
        return 0.0;
    };
    let Some(opponent) = round.get_player(side.opponent()) else {
        return 0.0;
    };

    let weights = EvalWeights::default();

    let score_diff = player.score as f64 - opponent.score as f64;
    let pending = pending_transfer(round, side);

    let own_strength = evaluate_hand(&player.hand_ranks(), None).strength as f64;
    let opponent_strength = evaluate_hand(&opponent.hand_ranks(), None).strength as f64;

    let mask = CardValueMask::poison_masked(opponent.hand.iter());
    let own_hand_value: f64 = player.hand.iter().map(|card| card.value as f64).sum();
    let opponent_hand_value: f64 = opponent
        .hand
        .iter()
        .map(|card| mask.value_of(card) as f64)
        .sum();

    let stake_diff = player.available_stakes.len() as f64 - opponent.available_stakes.len() as f64;

    score_diff * weights.score
        + pending * weights.pending
        + (own_strength - opponent_strength) * weights.hand_strength
        + (own_hand_value - opponent_hand_value) * weights.hand_value
        + stake_diff * weights.stakes
}

fn pending_transfer(round: &Round, side: CardColor) -> f64 {
    let mut total = 0.0;
    for column in &round.columns {
        if !column.is_contested() {
            continue;
        }
        let black_ranks = column.wager_ranks(CardColor::Black);
        let red_ranks = column.wager_ranks(CardColor::Red);
        let stake_rank = column.stake.as_ref().map(|card| card.rank);
        let stake_is_black = column
            .stake
            .as_ref()
            .map(|card| card.color == CardColor::Black)
            .unwrap_or(false);

        if let Some(result) = compare_hands(&black_ranks, &red_ranks, stake_rank, stake_is_black) {
            let winner = if result.hand1_wins {
                CardColor::Black
            } else {
                CardColor::Red
            };
            let loser = winner.opponent();
            let mut transfer: f64 = column
                .wagered_cards(loser)
                .iter()
                .map(|card| card.value as f64)
                .sum();
            if result.stake_goes_to_jail {
                transfer += column
                    .stake
                    .as_ref()
                    .map(|card| card.value as f64)
                    .unwrap_or(0.0);
            }
            total += if winner == side { transfer } else { -transfer };
        }
    }
    total
}

#[derive(Debug, Clone, Copy)]
struct EvalWeights {
    score: f64,
    pending: f64,
    hand_strength: f64,
    hand_value: f64,
    stakes: f64,
}

impl Default for EvalWeights {
    fn default() -> Self {
        Self {
            score: 10.0,
            pending: 6.0,
            hand_strength: 1.5,
            hand_value: 0.8,
            stakes: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Card, Player, Suit};

    fn small_round() -> Round {
        let black = Player::new(
            CardColor::Black,
            vec![Card::standard(Suit::Spades, 9), Card::standard(Suit::Spades, 10)],
            Vec::new(),
        );
        let red = Player::new(
            CardColor::Red,
            vec![Card::standard(Suit::Hearts, 2), Card::standard(Suit::Hearts, 6)],
            Vec::new(),
        );
        Round::new(vec![black, red], CardColor::Black)
            .with_opening_stake(Card::standard(Suit::Spades, 7), 1)
            .with_opening_stake(Card::standard(Suit::Hearts, 11), 2)
    }

    fn plain_minimax(round: &Round, depth_remaining: u8, root_side: CardColor) -> f64 {
        if depth_remaining == 0 || round.is_finished() {
            return leaf_value(round, root_side);
        }
        let engine = RoundEngine::new();
        let children: Vec<Round> = generate_moves(round, round.active)
            .iter()
            .filter_map(|mv| apply_move(&engine, round, mv).ok())
            .collect();
        if children.is_empty() {
            return leaf_value(round, root_side);
        }
        let scores = children
            .iter()
            .map(|child| plain_minimax(child, depth_remaining - 1, root_side));
        if round.active == root_side {
            scores.fold(f64::NEG_INFINITY, f64::max)
        } else {
            scores.fold(f64::INFINITY, f64::min)
        }
    }

    fn best_of(scored: &[ScoredMove]) -> ScoredMove {
        let mut best = scored[0].clone();
        for candidate in &scored[1..] {
            if candidate.score > best.score {
                best = candidate.clone();
            }
        }
        best
    }

    #[test]
    fn pruned_search_matches_exhaustive_minimax() {
        let round = small_round();
        let depth = 3;
        let searcher = Searcher::new(depth, u64::MAX);
        let mut observer = NullObserver;
        let (scored, stats) = searcher.search_root(&round, CardColor::Black, &mut observer);
        assert!(!scored.is_empty());
        assert!(!stats.budget_exhausted);

        let engine = RoundEngine::new();
        let mut moves = generate_moves(&round, CardColor::Black);
        moves.sort_by(|a, b| {
            heuristic_score(&round, b)
                .partial_cmp(&heuristic_score(&round, a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut plain_best: Option<(RoundMove, f64)> = None;
        for mv in moves {
            let child = apply_move(&engine, &round, &mv).expect("generated moves are legal");
            let score = plain_minimax(&child, depth - 1, CardColor::Black);
            let replace = match &plain_best {
                Some((_, best_score)) => score > *best_score,
                None => true,
            };
            if replace {
                plain_best = Some((mv, score));
            }
        }
        let (plain_move, plain_score) = plain_best.expect("fixture has legal moves");

        let pruned_best = best_of(&scored);
        assert_eq!(pruned_best.action, plain_move);
        assert!(
            (pruned_best.score - plain_score).abs() < 1e-9,
            "pruning must not change the chosen line's value"
        );
    }

    #[test]
    fn every_root_candidate_is_recorded() {
        let round = small_round();
        let searcher = Searcher::new(2, u64::MAX);
        let mut observer = NullObserver;
        let (scored, _) = searcher.search_root(&round, CardColor::Black, &mut observer);
        let generated = generate_moves(&round, CardColor::Black).len();
        assert_eq!(scored.len(), generated);
    }

    #[test]
    fn exhausted_budget_reads_neutral_and_flags_stats() {
        let round = small_round();
        let searcher = Searcher::new(4, 3);
        let mut observer = NullObserver;
        let (scored, stats) = searcher.search_root(&round, CardColor::Black, &mut observer);
        assert!(stats.budget_exhausted);
        assert_eq!(
            scored.len(),
            generate_moves(&round, CardColor::Black).len(),
            "late candidates still get a neutral score"
        );
        assert!(scored.iter().any(|candidate| candidate.score == 0.0));
    }

    #[test]
    fn inactive_or_finished_rounds_yield_no_candidates() {
        let round = small_round();
        let searcher = Searcher::new(2, u64::MAX);
        let mut observer = NullObserver;
        let (for_red, _) = searcher.search_root(&round, CardColor::Red, &mut observer);
        assert!(for_red.is_empty());

        let mut complete = round.clone();
        complete.state = crate::game::RoundState::Complete;
        let (none, _) = searcher.search_root(&complete, CardColor::Black, &mut observer);
        assert!(none.is_empty());
    }

    #[test]
    fn observer_sees_the_tree_shape() {
        struct Recorder {
            edges: Vec<(u64, u64, u8)>,
        }
        impl SearchObserver for Recorder {
            fn node_expanded(
                &mut self,
                parent_id: u64,
                node_id: u64,
                depth: u8,
                _score: f64,
                _pruned: bool,
            ) {
                self.edges.push((parent_id, node_id, depth));
            }
        }

        let round = small_round();
        let searcher = Searcher::new(2, u64::MAX);
        let mut recorder = Recorder { edges: Vec::new() };
        let (_, stats) = searcher.search_root(&round, CardColor::Black, &mut recorder);

        assert_eq!(recorder.edges.len() as u64, stats.nodes);
        assert!(recorder.edges.iter().any(|(parent, _, _)| *parent == 0));
        assert!(recorder
            .edges
            .iter()
            .all(|(parent, node, _)| parent < node));
    }

    #[test]
    fn leaf_value_counts_pending_column_transfers() {
        let mut round = small_round();
        // Black's queen beats red's 3 in column 1, and black owns that stake
        let _ = round.columns[1].place_wager(Card::standard(Suit::Spades, 12));
        let _ = round.columns[1].place_wager(Card::standard(Suit::Hearts, 3));
        let black_view = leaf_value(&round, CardColor::Black);
        let red_view = leaf_value(&round, CardColor::Red);
        assert!(black_view > red_view);
    }
}
