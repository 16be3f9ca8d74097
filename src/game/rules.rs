use serde::{Deserialize, Serialize};

use super::{
    evaluator::compare_hands,
    state::{CardColor, CardId, IntegrityError, Round, RoundEvent, RoundState},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakeMove {
    pub side: CardColor,
    pub card_id: CardId,
    pub column: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WagerMove {
    pub side: CardColor,
    pub card_ids: Vec<CardId>,
    pub column: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MoveError {
    RoundFinished,
    NotPlayerTurn,
    PlayerNotFound {
        color: CardColor,
    },
    ColumnNotFound {
        column: usize,
    },
    ColumnNotAvailable {
        column: usize,
    },
    StakeOccupied {
        column: usize,
    },
    ColumnNotStaked {
        column: usize,
    },
    CardNotInHand {
        card_id: CardId,
    },
    EmptyWager,
    DuplicateWagerCard {
        card_id: CardId,
    },
    WagerOverflow {
        column: usize,
        capacity: usize,
        requested: usize,
    },
    IntegrityViolation {
        error: IntegrityError,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<CardColor>,
    pub black_score: u32,
    pub red_score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResolution {
    pub round: Round,
    pub events: Vec<RoundEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RoundOutcome>,
}

impl MoveResolution {
    pub fn new(round: Round, mut events: Vec<RoundEvent>) -> Self {
        let outcome = RoundEngine::outcome(&round);
        if outcome.is_some() {
            let has_event = events
                .iter()
                .any(|event| matches!(event, RoundEvent::RoundCompleted { .. }));
            if !has_event {
                let (black_score, red_score) = round.scores();
                events.push(RoundEvent::RoundCompleted {
                    black_score,
                    red_score,
                });
            }
        }

        Self {
            round,
            events,
            outcome,
        }
    }
}

#[derive(Default)]
pub struct RoundEngine;

impl RoundEngine {
    pub fn new() -> Self {
        Self
    }

    fn ensure_turn_owner(round: &Round, side: CardColor) -> Result<(), MoveError> {
        if round.active != side {
            return Err(MoveError::NotPlayerTurn);
        }
        Ok(())
    }

    fn ensure_integrity(round: &Round) -> Result<(), MoveError> {
        round
            .integrity_check()
            .map_err(|error| MoveError::IntegrityViolation { error })
    }

    pub fn stake(&self, round: &mut Round, action: StakeMove) -> Result<Vec<RoundEvent>, MoveError> {
        if round.is_finished() {
            return Err(MoveError::RoundFinished);
        }

        Self::ensure_integrity(round)?;
        Self::ensure_turn_owner(round, action.side)?;

        if action.column >= round.columns.len() {
            return Err(MoveError::ColumnNotFound {
                column: action.column,
            });
        }
        if round.columns[action.column].stake.is_some() {
            return Err(MoveError::StakeOccupied {
                column: action.column,
            });
        }
        {
            let player = round
                .get_player(action.side)
                .ok_or(MoveError::PlayerNotFound { color: action.side })?;
            if !player.available_stakes.contains(&action.column) {
                return Err(MoveError::ColumnNotAvailable {
                    column: action.column,
                });
            }
            if player.find_card_in_hand_index(action.card_id).is_none() {
                return Err(MoveError::CardNotInHand {
                    card_id: action.card_id,
                });
            }
        }

        let mut card = round
            .get_player_mut(action.side)
            .and_then(|player| player.remove_card_from_hand(action.card_id))
            .ok_or(MoveError::CardNotInHand {
                card_id: action.card_id,
            })?;
        card.played = true;
        round.columns[action.column].stake = Some(card);
        // 赌注槽整局只用一次，双方的可下注列都要剔除
        for player in &mut round.players {
            player.remove_stake_column(action.column);
        }
        if round.first_stake.is_none() {
            round.first_stake = Some(action.side);
        }

        let mut events = Vec::new();
        let stake_event = RoundEvent::CardStaked {
            side: action.side,
            card_id: action.card_id,
            column: action.column,
        };
        round.record_event(stake_event.clone());
        events.push(stake_event);

        let mut post_events = Self::finish_move(round, action.side)?;
        events.append(&mut post_events);
        Ok(events)
    }

    pub fn wager(&self, round: &mut Round, action: WagerMove) -> Result<Vec<RoundEvent>, MoveError> {
        if round.is_finished() {
            return Err(MoveError::RoundFinished);
        }

        Self::ensure_integrity(round)?;
        Self::ensure_turn_owner(round, action.side)?;

        if action.card_ids.is_empty() {
            return Err(MoveError::EmptyWager);
        }
        let mut sorted_ids = action.card_ids.clone();
        sorted_ids.sort_unstable();
        if let Some(pair) = sorted_ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(MoveError::DuplicateWagerCard { card_id: pair[0] });
        }

        let column = round
            .columns
            .get(action.column)
            .ok_or(MoveError::ColumnNotFound {
                column: action.column,
            })?;
        if column.stake.is_none() {
            return Err(MoveError::ColumnNotStaked {
                column: action.column,
            });
        }
        let open_slots: Vec<usize> = column
            .positions
            .iter()
            .enumerate()
            .filter(|(_, position)| position.owner == action.side && position.card.is_none())
            .map(|(slot, _)| slot)
            .collect();
        if action.card_ids.len() > open_slots.len() {
            return Err(MoveError::WagerOverflow {
                column: action.column,
                capacity: open_slots.len(),
                requested: action.card_ids.len(),
            });
        }

        let cards = {
            let player = round
                .get_player_mut(action.side)
                .ok_or(MoveError::PlayerNotFound { color: action.side })?;
            match player.take_cards_from_hand(&action.card_ids) {
                Some(cards) => cards,
                None => {
                    let missing = action
                        .card_ids
                        .iter()
                        .find(|&&card_id| player.find_card_in_hand_index(card_id).is_none())
                        .copied()
                        .unwrap_or(sorted_ids[0]);
                    return Err(MoveError::CardNotInHand { card_id: missing });
                }
            }
        };
        for (slot, mut card) in open_slots.into_iter().zip(cards) {
            card.played = true;
            round.columns[action.column].positions[slot].card = Some(card);
        }

        let mut events = Vec::new();
        let wager_event = RoundEvent::CardsWagered {
            side: action.side,
            card_ids: action.card_ids.clone(),
            column: action.column,
        };
        round.record_event(wager_event.clone());
        events.push(wager_event);

        let mut post_events = Self::finish_move(round, action.side)?;
        events.append(&mut post_events);
        Ok(events)
    }

    fn finish_move(round: &mut Round, side: CardColor) -> Result<Vec<RoundEvent>, MoveError> {
        let mut events = Vec::new();

        let drawn = round
            .get_player_mut(side)
            .ok_or(MoveError::PlayerNotFound { color: side })?
            .draw_to_hand_size();
        for card_id in drawn {
            let draw_event = RoundEvent::CardDrawn { side, card_id };
            round.record_event(draw_event.clone());
            events.push(draw_event);
        }

        let hand_empty = |color: CardColor| {
            round
                .get_player(color)
                .map(|player| player.hand.is_empty())
                .unwrap_or(true)
        };
        let mover_empty = hand_empty(side);
        let opponent_empty = hand_empty(side.opponent());
        // 一方打空手牌后，对方还有最后一手；最后一手打完即收官
        round.state = match round.state {
            RoundState::LastPlay => RoundState::Complete,
            RoundState::Running if mover_empty && opponent_empty => RoundState::Complete,
            RoundState::Running if mover_empty => RoundState::LastPlay,
            state => state,
        };

        let end_event = RoundEvent::TurnEnded { side };
        round.record_event(end_event.clone());
        events.push(end_event);

        round.turn += 1;
        round.swap_active();

        if round.state == RoundState::Complete {
            let mut resolution_events = Self::resolve_columns(round);
            events.append(&mut resolution_events);
            let (black_score, red_score) = round.scores();
            let done_event = RoundEvent::RoundCompleted {
                black_score,
                red_score,
            };
            round.record_event(done_event.clone());
            events.push(done_event);
        }

        Ok(events)
    }

    fn resolve_columns(round: &mut Round) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        for index in 0..round.columns.len() {
            if !round.columns[index].is_contested() {
                continue;
            }
            let black_ranks = round.columns[index].wager_ranks(CardColor::Black);
            let red_ranks = round.columns[index].wager_ranks(CardColor::Red);
            let stake_rank = round.columns[index].stake.as_ref().map(|card| card.rank);
            let stake_is_black = round.columns[index]
                .stake
                .as_ref()
                .map(|card| card.color == CardColor::Black)
                .unwrap_or(false);

            let result = match compare_hands(&black_ranks, &red_ranks, stake_rank, stake_is_black)
            {
                Some(result) => result,
                None => {
                    let tie_event = RoundEvent::ColumnTied { column: index };
                    round.record_event(tie_event.clone());
                    events.push(tie_event);
                    continue;
                }
            };

            let winner = if result.hand1_wins {
                CardColor::Black
            } else {
                CardColor::Red
            };
            let loser = winner.opponent();

            let cards_to_jail = {
                let column = &mut round.columns[index];
                let mut cards = column.take_wagered_cards(loser);
                if result.stake_goes_to_jail {
                    if let Some(stake_card) = column.stake.take() {
                        cards.push(stake_card);
                    }
                }
                cards
            };
            let jailed_card_ids: Vec<CardId> = cards_to_jail.iter().map(|card| card.id).collect();
            round.jailed_this_round += cards_to_jail.len() as u32;
            if let Some(winner_player) = round.get_player_mut(winner) {
                winner_player.jail_cards(cards_to_jail);
            }

            let resolved_event = RoundEvent::ColumnResolved {
                column: index,
                winner,
                jailed_card_ids,
                stake_jailed: result.stake_goes_to_jail,
            };
            round.record_event(resolved_event.clone());
            events.push(resolved_event);
        }
        events
    }

    /// 不再等待走子，直接收官并裁决所有争夺中的列。
    pub fn finalize(&self, round: &mut Round) -> Result<Vec<RoundEvent>, MoveError> {
        if round.is_finished() {
            return Err(MoveError::RoundFinished);
        }
        Self::ensure_integrity(round)?;

        round.state = RoundState::Complete;
        let mut events = Self::resolve_columns(round);
        let (black_score, red_score) = round.scores();
        let done_event = RoundEvent::RoundCompleted {
            black_score,
            red_score,
        };
        round.record_event(done_event.clone());
        events.push(done_event);
        Ok(events)
    }

    pub fn outcome(round: &Round) -> Option<RoundOutcome> {
        if !round.is_finished() {
            return None;
        }
        let (black_score, red_score) = round.scores();
        let winner = match black_score.cmp(&red_score) {
            std::cmp::Ordering::Greater => Some(CardColor::Black),
            std::cmp::Ordering::Less => Some(CardColor::Red),
            std::cmp::Ordering::Equal => None,
        };
        Some(RoundOutcome {
            winner,
            black_score,
            red_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Card, Player, Suit, HAND_SIZE};

    fn setup_round() -> Round {
        Round::sample()
    }

    #[test]
    fn stake_move_places_card_and_refills_hand() {
        let engine = RoundEngine::new();
        let mut round = setup_round();
        let staked = Card::standard(Suit::Spades, 9);

        let events = engine
            .stake(
                &mut round,
                StakeMove {
                    side: CardColor::Black,
                    card_id: staked.id,
                    column: 0,
                },
            )
            .expect("stake into an open own column should succeed");

        assert_eq!(
            round.columns[0].stake.as_ref().map(|card| card.id),
            Some(staked.id)
        );
        let black = round.get_player(CardColor::Black).expect("black exists");
        let red = round.get_player(CardColor::Red).expect("red exists");
        assert_eq!(black.hand.len(), HAND_SIZE, "hand should refill after the move");
        assert!(!black.available_stakes.contains(&0));
        assert!(!red.available_stakes.contains(&0));
        assert_eq!(round.active, CardColor::Red, "turn should pass to red");
        assert_eq!(round.turn, 4);
        assert!(events
            .iter()
            .any(|event| matches!(event, RoundEvent::CardStaked { column: 0, .. })));
        assert!(events
            .iter()
            .any(|event| matches!(event, RoundEvent::CardDrawn { .. })));
    }

    #[test]
    fn wager_rejects_unstaked_and_overfull_columns() {
        let engine = RoundEngine::new();
        let mut round = setup_round();
        let four = Card::standard(Suit::Spades, 4);
        let five = Card::standard(Suit::Spades, 5);

        let unstaked = engine.wager(
            &mut round,
            WagerMove {
                side: CardColor::Black,
                card_ids: vec![four.id],
                column: 0,
            },
        );
        assert_eq!(
            unstaked,
            Err(MoveError::ColumnNotStaked { column: 0 }),
            "column without a stake cannot take wagers"
        );

        let overflow = engine.wager(
            &mut round,
            WagerMove {
                side: CardColor::Black,
                card_ids: vec![
                    four.id,
                    five.id,
                    Card::standard(Suit::Spades, 6).id,
                    Card::standard(Suit::Spades, 9).id,
                ],
                column: 3,
            },
        );
        assert_eq!(
            overflow,
            Err(MoveError::WagerOverflow {
                column: 3,
                capacity: 3,
                requested: 4,
            }),
            "two cards already sit on black's side of column 3"
        );

        engine
            .wager(
                &mut round,
                WagerMove {
                    side: CardColor::Black,
                    card_ids: vec![four.id, five.id],
                    column: 3,
                },
            )
            .expect("two more cards still fit");
        assert_eq!(round.columns[3].wager_count(CardColor::Black), 4);
    }

    #[test]
    fn moving_out_of_turn_is_rejected() {
        let engine = RoundEngine::new();
        let mut round = setup_round();
        let heart = Card::standard(Suit::Hearts, 4);

        let result = engine.wager(
            &mut round,
            WagerMove {
                side: CardColor::Red,
                card_ids: vec![heart.id],
                column: 3,
            },
        );
        assert_eq!(result, Err(MoveError::NotPlayerTurn));
    }

    #[test]
    fn exhausted_hands_finish_the_round_and_resolve_columns() {
        let engine = RoundEngine::new();
        let club_five = Card::standard(Suit::Clubs, 5);
        let heart_nine = Card::standard(Suit::Hearts, 9);
        let stake = Card::standard(Suit::Spades, 8);

        let black = Player::new(CardColor::Black, vec![club_five.clone()], Vec::new());
        let red = Player::new(CardColor::Red, vec![heart_nine.clone()], Vec::new());
        let mut round =
            Round::new(vec![black, red], CardColor::Black).with_opening_stake(stake.clone(), 2);

        engine
            .wager(
                &mut round,
                WagerMove {
                    side: CardColor::Black,
                    card_ids: vec![club_five.id],
                    column: 2,
                },
            )
            .expect("black's wager is legal");
        assert_eq!(round.state, RoundState::LastPlay, "red still holds a card");
        assert_eq!(round.active, CardColor::Red);

        let events = engine
            .wager(
                &mut round,
                WagerMove {
                    side: CardColor::Red,
                    card_ids: vec![heart_nine.id],
                    column: 2,
                },
            )
            .expect("red's final wager is legal");

        assert_eq!(round.state, RoundState::Complete);
        assert!(events.iter().any(|event| matches!(
            event,
            RoundEvent::ColumnResolved {
                column: 2,
                winner: CardColor::Red,
                stake_jailed: true,
                ..
            }
        )));
        assert!(events
            .iter()
            .any(|event| matches!(event, RoundEvent::RoundCompleted { .. })));

        let red_player = round.get_player(CardColor::Red).expect("red exists");
        assert_eq!(red_player.jail.len(), 2, "wager and stake both jailed");
        assert_eq!(red_player.score, club_five.value + stake.value);
        assert_eq!(round.jailed_this_round, 2);
        assert_eq!(
            RoundEngine::outcome(&round)
                .expect("round is complete")
                .winner,
            Some(CardColor::Red)
        );
    }

    #[test]
    fn tied_columns_leave_cards_in_place() {
        let engine = RoundEngine::new();
        let club_nine = Card::standard(Suit::Clubs, 9);
        let heart_nine = Card::standard(Suit::Hearts, 9);

        let black = Player::new(CardColor::Black, vec![club_nine.clone()], Vec::new());
        let red = Player::new(CardColor::Red, vec![heart_nine.clone()], Vec::new());
        let mut round = Round::new(vec![black, red], CardColor::Red)
            .with_opening_stake(Card::standard(Suit::Diamonds, 12), 4);

        engine
            .wager(
                &mut round,
                WagerMove {
                    side: CardColor::Red,
                    card_ids: vec![heart_nine.id],
                    column: 4,
                },
            )
            .expect("red's wager is legal");
        let events = engine
            .wager(
                &mut round,
                WagerMove {
                    side: CardColor::Black,
                    card_ids: vec![club_nine.id],
                    column: 4,
                },
            )
            .expect("black's final wager is legal");

        assert!(events
            .iter()
            .any(|event| matches!(event, RoundEvent::ColumnTied { column: 4 })));
        assert_eq!(round.columns[4].wager_count(CardColor::Black), 1);
        assert_eq!(round.columns[4].wager_count(CardColor::Red), 1);
        assert!(round.columns[4].stake.is_some(), "tied stake stays on board");
        assert_eq!(round.scores(), (0, 0));
    }
}
