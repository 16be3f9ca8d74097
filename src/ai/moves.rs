use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::{
    evaluate_hand, Card, CardColor, CardId, Round, StakeMove, WagerMove, COLUMN_DEPTH,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RoundMove {
    Stake { action: StakeMove },
    Wager { action: WagerMove },
}

impl RoundMove {
    pub fn side(&self) -> CardColor {
        match self {
            RoundMove::Stake { action } => action.side,
            RoundMove::Wager { action } => action.side,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            RoundMove::Stake { action } => action.column,
            RoundMove::Wager { action } => action.column,
        }
    }

    pub fn card_ids(&self) -> Vec<CardId> {
        match self {
            RoundMove::Stake { action } => vec![action.card_id],
            RoundMove::Wager { action } => action.card_ids.clone(),
        }
    }

    pub fn card_count(&self) -> usize {
        match self {
            RoundMove::Stake { .. } => 1,
            RoundMove::Wager { action } => action.card_ids.len(),
        }
    }
}

pub fn generate_stake_moves(round: &Round, side: CardColor) -> Vec<RoundMove> {
    let Some(player) = round.get_player(side) else {
        return Vec::new();
    };

    let mut moves = Vec::new();
    for card in &player.hand {
        for &column in &player.available_stakes {
            moves.push(RoundMove::Stake {
                action: StakeMove {
                    side,
                    card_id: card.id,
                    column,
                },
            });
        }
    }
    moves
}

pub fn generate_wager_moves(round: &Round, side: CardColor) -> Vec<RoundMove> {
    let Some(player) = round.get_player(side) else {
        return Vec::new();
    };
    if player.hand.is_empty() {
        return Vec::new();
    }

    let combinations = hand_combinations(&player.hand);
    let mut moves = Vec::new();
    for column in &round.columns {
        if column.stake.is_none() {
            continue;
        }
        let existing = column.wager_count(side);
        for combination in &combinations {
            if existing + combination.len() > COLUMN_DEPTH {
                continue;
            }
            moves.push(RoundMove::Wager {
                action: WagerMove {
                    side,
                    card_ids: combination.clone(),
                    column: column.index,
                },
            });
        }
    }
    moves
}

pub fn generate_moves(round: &Round, side: CardColor) -> Vec<RoundMove> {
    let mut moves = generate_stake_moves(round, side);
    moves.extend(generate_wager_moves(round, side));
    moves
}

fn hand_combinations(hand: &[Card]) -> Vec<Vec<CardId>> {
    let mut combinations: Vec<Vec<CardId>> = Vec::new();

    // Singles
    for card in hand {
        combinations.push(vec![card.id]);
    }

    // Equal-rank pairs, including every two-card subset of trips and quads
    let mut by_rank: BTreeMap<u8, Vec<CardId>> = BTreeMap::new();
    for card in hand {
        by_rank.entry(card.rank).or_default().push(card.id);
    }
    for ids in by_rank.values() {
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                combinations.push(vec![ids[i], ids[j]]);
            }
        }
    }

    // Maximal runs of consecutive ranks plus every contiguous sub-run of length >= 2
    let mut rank_card: BTreeMap<u8, CardId> = BTreeMap::new();
    for card in hand {
        rank_card.entry(card.rank).or_insert(card.id);
    }
    let ranks: Vec<u8> = rank_card.keys().copied().collect();
    let mut start = 0;
    while start < ranks.len() {
        let mut end = start;
        while end + 1 < ranks.len() && ranks[end + 1] == ranks[end] + 1 {
            end += 1;
        }
        if end > start {
            for window_start in start..=end {
                for window_end in (window_start + 1)..=end {
                    let ids: Vec<CardId> = ranks[window_start..=window_end]
                        .iter()
                        .map(|rank| rank_card[rank])
                        .collect();
                    combinations.push(ids);
                }
            }
        }
        start = end + 1;
    }

    combinations
}

// Cheap ordering score for move sorting, never the search value itself:
// capture incentive plus combination strength, minus the points put at risk.
pub fn heuristic_score(round: &Round, mv: &RoundMove) -> f64 {
    let Some(player) = round.get_player(mv.side()) else {
        return 0.0;
    };

    match mv {
        RoundMove::Stake { action } => {
            let committed = player
                .hand
                .iter()
                .find(|card| card.id == action.card_id)
                .map(|card| card.value as f64)
                .unwrap_or(0.0);
            1.5 - committed * 0.4
        }
        RoundMove::Wager { action } => {
            let Some(column) = round.column(action.column) else {
                return 0.0;
            };
            let cards: Vec<&Card> = action
                .card_ids
                .iter()
                .filter_map(|card_id| player.hand.iter().find(|card| card.id == *card_id))
                .collect();

            let mut ranks = column.wager_ranks(action.side);
            ranks.extend(cards.iter().map(|card| card.rank));
            let stake_rank = column
                .stake
                .as_ref()
                .filter(|stake| stake.color == action.side)
                .map(|stake| stake.rank);
            let strength = evaluate_hand(&ranks, stake_rank).strength as f64;

            let capture = column
                .stake
                .as_ref()
                .map(|stake| stake.value as f64)
                .unwrap_or(0.0);
            let committed: f64 = cards.iter().map(|card| card.value as f64).sum();

            strength * 1.2 + capture * 0.8 - committed * 0.5
        }
    }
}
