use std::str::FromStr;

use rand::Rng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};

use crate::game::{CardId, Player, HAND_SIZE};

use super::moves::RoundMove;
use super::search::ScoredMove;

// Shrinking hands concentrate the pick toward the top of the list
pub const HAND_TAPER: f64 = 0.65;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Expert,
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" | "medium" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            "expert" | "extreme" => Ok(Difficulty::Expert),
            _ => Err(()),
        }
    }
}

impl Difficulty {
    pub fn poisson_mean(self) -> f64 {
        match self {
            Difficulty::Easy => 3.5,
            Difficulty::Normal => 2.0,
            Difficulty::Hard => 0.9,
            Difficulty::Expert => 0.25,
        }
    }
}

pub fn adjusted_mean(difficulty: Difficulty, hand_size: usize) -> f64 {
    let missing = HAND_SIZE.saturating_sub(hand_size) as i32;
    difficulty.poisson_mean() * HAND_TAPER.powi(missing)
}

pub fn filter_candidates(mut candidates: Vec<ScoredMove>, player: &Player) -> Vec<ScoredMove> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.action.card_count().cmp(&b.action.card_count()))
    });

    let mut seen: Vec<(usize, Vec<CardId>)> = Vec::with_capacity(candidates.len());
    let mut kept = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let mut ids = candidate.action.card_ids();
        ids.sort_unstable();
        let key = (candidate.action.column(), ids);
        if seen.contains(&key) {
            continue;
        }
        // A dropped stake still claims its key, so later duplicates stay out
        seen.push(key);
        if splits_pair(&candidate.action, player) {
            continue;
        }
        kept.push(candidate);
    }
    kept
}

pub fn select_move<R: Rng + ?Sized>(
    candidates: Vec<ScoredMove>,
    player: &Player,
    difficulty: Difficulty,
    rng: &mut R,
) -> Option<ScoredMove> {
    let filtered = filter_candidates(candidates, player);
    if filtered.is_empty() {
        return None;
    }
    let mean = adjusted_mean(difficulty, player.hand.len());
    let index = poisson_index(mean, rng).min(filtered.len() - 1);
    filtered.into_iter().nth(index)
}

fn splits_pair(action: &RoundMove, player: &Player) -> bool {
    let RoundMove::Stake { action } = action else {
        return false;
    };
    match player.hand.iter().find(|card| card.id == action.card_id) {
        // Trips and quads keep a pair intact after one card leaves
        Some(card) => player.rank_count_in_hand(card.rank) == 2,
        None => false,
    }
}

fn poisson_index<R: Rng + ?Sized>(mean: f64, rng: &mut R) -> usize {
    match Poisson::new(mean) {
        Ok(dist) => dist.sample(rng) as usize,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Card, CardColor, StakeMove, Suit, WagerMove};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn stake_candidate(card: &Card, column: usize, score: f64) -> ScoredMove {
        ScoredMove {
            action: RoundMove::Stake {
                action: StakeMove {
                    side: CardColor::Black,
                    card_id: card.id,
                    column,
                },
            },
            score,
        }
    }

    fn wager_candidate(ids: Vec<CardId>, column: usize, score: f64) -> ScoredMove {
        ScoredMove {
            action: RoundMove::Wager {
                action: WagerMove {
                    side: CardColor::Black,
                    card_ids: ids,
                    column,
                },
            },
            score,
        }
    }

    fn five_card_player() -> Player {
        Player::new(
            CardColor::Black,
            vec![
                Card::standard(Suit::Spades, 2),
                Card::standard(Suit::Spades, 5),
                Card::standard(Suit::Spades, 8),
                Card::standard(Suit::Spades, 11),
                Card::standard(Suit::Clubs, 14),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn difficulty_parsing_accepts_synonyms() {
        assert_eq!("medium".parse::<Difficulty>(), Ok(Difficulty::Normal));
        assert_eq!("extreme".parse::<Difficulty>(), Ok(Difficulty::Expert));
        assert_eq!("EASY".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert!("impossible".parse::<Difficulty>().is_err());
    }

    #[test]
    fn short_hands_taper_the_mean() {
        assert!((adjusted_mean(Difficulty::Easy, HAND_SIZE) - 3.5).abs() < 1e-12);
        let two_missing = 3.5 * HAND_TAPER * HAND_TAPER;
        assert!((adjusted_mean(Difficulty::Easy, 3) - two_missing).abs() < 1e-12);
        assert!(adjusted_mean(Difficulty::Expert, 1) > 0.0);
    }

    #[test]
    fn pair_splitting_stakes_are_dropped_even_when_best() {
        let nine_a = Card::standard(Suit::Spades, 9);
        let nine_b = Card::standard(Suit::Clubs, 9);
        let five = Card::standard(Suit::Spades, 5);
        let player = Player::new(
            CardColor::Black,
            vec![nine_a.clone(), nine_b, five.clone()],
            Vec::new(),
        );

        let candidates = vec![
            stake_candidate(&nine_a, 0, 9.0),
            stake_candidate(&five, 1, 4.0),
        ];
        let kept = filter_candidates(candidates, &player);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].action.card_ids(), vec![five.id]);
    }

    #[test]
    fn stakes_drawn_from_trips_survive_the_filter() {
        let nine_a = Card::standard(Suit::Spades, 9);
        let nine_b = Card::standard(Suit::Clubs, 9);
        let nine_c = Card::new(53, Suit::Spades, 9);
        let player = Player::new(
            CardColor::Black,
            vec![nine_a.clone(), nine_b, nine_c],
            Vec::new(),
        );

        let kept = filter_candidates(vec![stake_candidate(&nine_a, 0, 5.0)], &player);
        assert_eq!(kept.len(), 1, "staking from trips still leaves a pair");
    }

    #[test]
    fn duplicate_targets_keep_the_better_score() {
        let player = five_card_player();
        let candidates = vec![
            wager_candidate(vec![40, 41], 3, 2.0),
            wager_candidate(vec![41, 40], 3, 6.5),
        ];
        let kept = filter_candidates(candidates, &player);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].score - 6.5).abs() < f64::EPSILON);
    }

    #[test]
    fn score_ties_prefer_fewer_cards() {
        let player = five_card_player();
        let two_cards = wager_candidate(vec![40, 41], 3, 5.0);
        let one_card = wager_candidate(vec![42], 4, 5.0);
        let kept = filter_candidates(vec![two_cards, one_card], &player);
        assert_eq!(kept[0].action.card_count(), 1);
        assert_eq!(kept[1].action.card_count(), 2);
    }

    #[test]
    fn empty_candidate_lists_select_nothing() {
        let player = five_card_player();
        let mut rng = SmallRng::seed_from_u64(11);
        assert!(select_move(Vec::new(), &player, Difficulty::Normal, &mut rng).is_none());
    }

    #[test]
    fn harder_difficulties_pick_nearer_the_top() {
        let player = five_card_player();
        let candidates: Vec<ScoredMove> = (0..6)
            .map(|rank| wager_candidate(vec![60 + rank as u32], rank, 6.0 - rank as f64))
            .collect();

        let mean_index = |difficulty: Difficulty| {
            let mut rng = SmallRng::seed_from_u64(7);
            let mut total = 0usize;
            let draws = 800;
            for _ in 0..draws {
                let picked = select_move(candidates.clone(), &player, difficulty, &mut rng)
                    .expect("candidates are non-empty");
                total += (6.0 - picked.score) as usize;
            }
            total as f64 / draws as f64
        };

        let easy = mean_index(Difficulty::Easy);
        let normal = mean_index(Difficulty::Normal);
        let hard = mean_index(Difficulty::Hard);
        let expert = mean_index(Difficulty::Expert);

        assert!(easy >= normal, "easy {easy} should sit below normal {normal}");
        assert!(normal >= hard, "normal {normal} should sit below hard {hard}");
        assert!(hard >= expert, "hard {hard} should sit below expert {expert}");
        assert!(expert < 1.0, "expert play stays near the best candidate");
    }
}
