use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::state::{Card, CardId, FACE_VALUE, MAX_RANK};

pub const PAIR_STRENGTH: i32 = 3;
pub const MIN_RUN_LENGTH: i32 = 3;

/// 牌组强度评估结果：strength 为主比较值，high_cards 仅用于平局裁决。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandScore {
    pub strength: i32,
    pub high_cards: Vec<u8>,
    pub used_stake: bool,
}

/// 列争夺的裁决结果；真正的平局返回 None，任何卡牌都不移动。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandComparison {
    pub hand1_wins: bool,
    pub stake_goes_to_jail: bool,
    pub jail_ranks: Vec<u8>,
}

fn split_pairs(sorted: &[u8]) -> (i32, Vec<u8>) {
    let mut strength = 0;
    let mut leftovers = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        if i + 1 < sorted.len() && sorted[i] == sorted[i + 1] {
            strength += PAIR_STRENGTH;
            i += 2;
        } else {
            leftovers.push(sorted[i]);
            i += 1;
        }
    }
    (strength, leftovers)
}

fn longest_run(ranks: &[u8]) -> i32 {
    let mut unique: Vec<i32> = ranks.iter().map(|&rank| i32::from(rank)).collect();
    // A 既可作 14 也可作 1 参与顺子
    if unique.iter().any(|&rank| rank == i32::from(MAX_RANK)) {
        unique.push(1);
    }
    unique.sort_unstable();
    unique.dedup();

    let mut best = 0;
    let mut current = 0;
    let mut previous = None;
    for rank in unique {
        current = match previous {
            Some(prev) if rank == prev + 1 => current + 1,
            _ => 1,
        };
        previous = Some(rank);
        if current > best {
            best = current;
        }
    }
    if best >= MIN_RUN_LENGTH {
        best
    } else {
        0
    }
}

fn pairs_then_run(sorted: &[u8]) -> i32 {
    let (pair_strength, leftovers) = split_pairs(sorted);
    pair_strength + longest_run(&leftovers)
}

/// 评估一手牌的强度。可选的赌注牌只允许折入配对或顺子两步之一，
/// 取总强度更高的折法，且仅在确实提升强度时计入。
pub fn evaluate_hand(ranks: &[u8], stake: Option<u8>) -> HandScore {
    let mut sorted = ranks.to_vec();
    sorted.sort_unstable();

    let base = pairs_then_run(&sorted);

    let (strength, used_stake) = match stake {
        None => (base, false),
        Some(stake_rank) => {
            let mut with_stake = sorted.clone();
            let insert_at = with_stake
                .iter()
                .position(|&rank| rank > stake_rank)
                .unwrap_or(with_stake.len());
            with_stake.insert(insert_at, stake_rank);
            let folded_into_pairs = pairs_then_run(&with_stake);

            let (pair_strength, mut leftovers) = split_pairs(&sorted);
            leftovers.push(stake_rank);
            let folded_into_run = pair_strength + longest_run(&leftovers);

            let folded = folded_into_pairs.max(folded_into_run);
            if folded > base {
                (folded, true)
            } else {
                (base, false)
            }
        }
    };

    let mut high_cards = sorted;
    if used_stake {
        if let Some(stake_rank) = stake {
            high_cards.push(stake_rank);
        }
    }
    high_cards.sort_unstable_by(|a, b| b.cmp(a));

    HandScore {
        strength,
        high_cards,
        used_stake,
    }
}

/// 比较两手牌。赌注牌只供其归属一方折算；胜负先看强度，强度相同
/// 再按 high_cards 逐位比较（缺位视为更小）；完全相同为平局。
pub fn compare_hands(
    hand1: &[u8],
    hand2: &[u8],
    stake: Option<u8>,
    stake_is_hand1: bool,
) -> Option<HandComparison> {
    let score1 = evaluate_hand(hand1, if stake_is_hand1 { stake } else { None });
    let score2 = evaluate_hand(hand2, if stake_is_hand1 { None } else { stake });

    let hand1_wins = if score1.strength != score2.strength {
        score1.strength > score2.strength
    } else {
        let mut decided = None;
        let positions = score1.high_cards.len().max(score2.high_cards.len());
        for i in 0..positions {
            let left = score1.high_cards.get(i).copied().unwrap_or(0);
            let right = score2.high_cards.get(i).copied().unwrap_or(0);
            if left != right {
                decided = Some(left > right);
                break;
            }
        }
        decided?
    };

    let stake_goes_to_jail = match stake {
        Some(_) => stake_is_hand1 != hand1_wins,
        None => false,
    };
    let mut jail_ranks: Vec<u8> = if hand1_wins {
        hand2.to_vec()
    } else {
        hand1.to_vec()
    };
    if stake_goes_to_jail {
        if let Some(stake_rank) = stake {
            jail_ranks.push(stake_rank);
        }
    }

    Some(HandComparison {
        hand1_wins,
        stake_goes_to_jail,
        jail_ranks,
    })
}

/// 评估期的观测值覆盖表。剧毒牌在评估对手暗牌时按普通花牌计值，
/// 避免启发式从隐藏信息获利；覆盖表只影响读数，从不改写卡牌本身。
#[derive(Debug, Clone, Default)]
pub struct CardValueMask {
    overrides: HashMap<CardId, u32>,
}

impl CardValueMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poison_masked<'a, I>(cards: I) -> Self
    where
        I: IntoIterator<Item = &'a Card>,
    {
        let mut mask = Self::default();
        for card in cards {
            if card.is_poison() {
                mask.overrides.insert(card.id, FACE_VALUE);
            }
        }
        mask
    }

    pub fn with_override(mut self, card_id: CardId, value: u32) -> Self {
        self.overrides.insert(card_id, value);
        self
    }

    pub fn value_of(&self, card: &Card) -> u32 {
        self.overrides.get(&card.id).copied().unwrap_or(card.value)
    }
}
