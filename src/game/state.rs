use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use once_cell::sync::Lazy;

pub const BOARD_COLUMNS: usize = 9;
pub const COLUMN_DEPTH: usize = 5;
pub const HAND_SIZE: usize = 5;
pub const MIN_RANK: u8 = 2;
pub const MAX_RANK: u8 = 14;
pub const POISON_RANK: u8 = 13;
pub const POISON_SUIT: Suit = Suit::Hearts;
pub const FACE_VALUE: u32 = 3;
pub const ACE_VALUE: u32 = 4;
pub const POISON_VALUE: u32 = 7;

/// 全局唯一的卡牌标识。
pub type CardId = u32;

/// 阵营颜色，同时标识棋盘两侧的归属。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CardColor {
    Black,
    Red,
}

impl CardColor {
    pub fn opponent(self) -> CardColor {
        match self {
            CardColor::Black => CardColor::Red,
            CardColor::Red => CardColor::Black,
        }
    }

    /// 下注方向：黑方从上沿向下(+1)，红方从下沿向上(-1)。
    pub fn edge_sign(self) -> i8 {
        match self {
            CardColor::Black => 1,
            CardColor::Red => -1,
        }
    }
}

impl FromStr for CardColor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "black" => Ok(CardColor::Black),
            "red" => Ok(CardColor::Red),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Suit {
    Spades,
    Clubs,
    Hearts,
    Diamonds,
}

impl Suit {
    pub fn color(self) -> CardColor {
        match self {
            Suit::Spades | Suit::Clubs => CardColor::Black,
            Suit::Hearts | Suit::Diamonds => CardColor::Red,
        }
    }
}

/// 对局中使用的卡牌数据。rank 2–14（A 最大），value 为入狱时的计分值。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub color: CardColor,
    pub suit: Suit,
    pub rank: u8,
    pub value: u32,
    #[serde(default)]
    pub played: bool,
}

impl Card {
    pub fn new(id: CardId, suit: Suit, rank: u8) -> Self {
        Self {
            id,
            color: suit.color(),
            suit,
            rank,
            value: Card::point_value(suit, rank),
            played: false,
        }
    }

    /// 按牌面取标准牌堆中的那一张（标识固定，便于测试与采样）。
    pub fn standard(suit: Suit, rank: u8) -> Self {
        Card::new(standard_card_id(suit, rank), suit, rank)
    }

    pub fn point_value(suit: Suit, rank: u8) -> u32 {
        if suit == POISON_SUIT && rank == POISON_RANK {
            POISON_VALUE
        } else if rank == MAX_RANK {
            ACE_VALUE
        } else if rank >= 11 {
            FACE_VALUE
        } else {
            1
        }
    }

    pub fn is_poison(&self) -> bool {
        self.suit == POISON_SUIT && self.rank == POISON_RANK
    }
}

static DECK_BLUEPRINT: Lazy<Vec<Card>> = Lazy::new(|| {
    let suits = [Suit::Spades, Suit::Clubs, Suit::Hearts, Suit::Diamonds];
    let mut cards = Vec::with_capacity(52);
    for suit in suits {
        for rank in MIN_RANK..=MAX_RANK {
            cards.push(Card::new(standard_card_id(suit, rank), suit, rank));
        }
    }
    cards
});

fn standard_card_id(suit: Suit, rank: u8) -> CardId {
    let suit_index = match suit {
        Suit::Spades => 0,
        Suit::Clubs => 1,
        Suit::Hearts => 2,
        Suit::Diamonds => 3,
    };
    suit_index * 13 + (rank - MIN_RANK) as CardId + 1
}

/// 返回某一阵营的整副标准牌（黑桃+梅花为黑方，红心+方块为红方）。
pub fn standard_deck(color: CardColor) -> Vec<Card> {
    DECK_BLUEPRINT
        .iter()
        .filter(|card| card.color == color)
        .cloned()
        .collect()
}

/// 玩家状态：手牌、监狱、抽牌堆、累计分数与可下注列。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub color: CardColor,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hand: Vec<Card>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jail: Vec<Card>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub draw_pile: Vec<Card>,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub available_stakes: Vec<usize>,
    pub edge_sign: i8,
}

impl Player {
    pub fn new(color: CardColor, hand: Vec<Card>, draw_pile: Vec<Card>) -> Self {
        let available_stakes = match color {
            CardColor::Black => (0..BOARD_COLUMNS).collect(),
            CardColor::Red => (0..BOARD_COLUMNS).rev().collect(),
        };
        Self {
            color,
            hand,
            jail: Vec::new(),
            draw_pile,
            score: 0,
            available_stakes,
            edge_sign: color.edge_sign(),
        }
    }

    pub fn find_card_in_hand_index(&self, card_id: CardId) -> Option<usize> {
        self.hand.iter().position(|card| card.id == card_id)
    }

    pub fn remove_card_from_hand(&mut self, card_id: CardId) -> Option<Card> {
        let idx = self.find_card_in_hand_index(card_id)?;
        Some(self.hand.remove(idx))
    }

    /// 整组取出手牌；只要有一张缺失则全部放回并返回 None。
    pub fn take_cards_from_hand(&mut self, card_ids: &[CardId]) -> Option<Vec<Card>> {
        let mut taken = Vec::with_capacity(card_ids.len());
        for card_id in card_ids {
            match self.remove_card_from_hand(*card_id) {
                Some(card) => taken.push(card),
                None => {
                    self.hand.append(&mut taken);
                    return None;
                }
            }
        }
        Some(taken)
    }

    pub fn draw_to_hand_size(&mut self) -> Vec<CardId> {
        let mut drawn = Vec::new();
        while self.hand.len() < HAND_SIZE {
            match self.draw_pile.pop() {
                Some(card) => {
                    drawn.push(card.id);
                    self.hand.push(card);
                }
                None => break,
            }
        }
        drawn
    }

    /// 没收卡牌入狱，返回由此获得的分数。
    pub fn jail_cards(&mut self, cards: Vec<Card>) -> u32 {
        let gained: u32 = cards.iter().map(|card| card.value).sum();
        self.score += gained;
        self.jail.extend(cards);
        gained
    }

    pub fn remove_stake_column(&mut self, column: usize) {
        self.available_stakes.retain(|&index| index != column);
    }

    pub fn hand_ranks(&self) -> Vec<u8> {
        self.hand.iter().map(|card| card.rank).collect()
    }

    pub fn rank_count_in_hand(&self, rank: u8) -> usize {
        self.hand.iter().filter(|card| card.rank == rank).count()
    }
}

/// 单个棋盘格：所属阵营、线性索引、(row, column) 坐标与可选占位卡。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Position {
    pub owner: CardColor,
    pub index: usize,
    pub row: usize,
    pub column: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
}

/// 一列棋盘格加一个可选的赌注卡槽。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    pub index: usize,
    pub positions: Vec<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake: Option<Card>,
}

impl Column {
    pub fn new(index: usize) -> Self {
        let mut positions = Vec::with_capacity(COLUMN_DEPTH * 2);
        for slot in 0..COLUMN_DEPTH {
            let row = slot;
            positions.push(Position {
                owner: CardColor::Black,
                index: row * BOARD_COLUMNS + index,
                row,
                column: index,
                card: None,
            });
        }
        for slot in 0..COLUMN_DEPTH {
            let row = COLUMN_DEPTH * 2 - 1 - slot;
            positions.push(Position {
                owner: CardColor::Red,
                index: row * BOARD_COLUMNS + index,
                row,
                column: index,
                card: None,
            });
        }
        Self {
            index,
            positions,
            stake: None,
        }
    }

    pub fn wagered_cards(&self, side: CardColor) -> Vec<&Card> {
        self.positions
            .iter()
            .filter(|position| position.owner == side)
            .filter_map(|position| position.card.as_ref())
            .collect()
    }

    pub fn wager_count(&self, side: CardColor) -> usize {
        self.wagered_cards(side).len()
    }

    pub fn wager_ranks(&self, side: CardColor) -> Vec<u8> {
        self.wagered_cards(side)
            .iter()
            .map(|card| card.rank)
            .collect()
    }

    fn open_slot_for(&self, side: CardColor) -> Option<usize> {
        self.positions
            .iter()
            .position(|position| position.owner == side && position.card.is_none())
    }

    pub fn place_wager(&mut self, mut card: Card) -> Result<(), Card> {
        match self.open_slot_for(card.color) {
            Some(slot) => {
                card.played = true;
                self.positions[slot].card = Some(card);
                Ok(())
            }
            None => Err(card),
        }
    }

    /// 双方都至少放入一张牌（赌注算作其颜色一方放入的牌）后即进入争夺状态。
    pub fn is_contested(&self) -> bool {
        let placed = |side: CardColor| {
            self.wager_count(side) > 0
                || self
                    .stake
                    .as_ref()
                    .map(|stake| stake.color == side)
                    .unwrap_or(false)
        };
        placed(CardColor::Black) && placed(CardColor::Red)
    }

    pub(crate) fn take_wagered_cards(&mut self, side: CardColor) -> Vec<Card> {
        let mut cards = Vec::new();
        for position in &mut self.positions {
            if position.owner == side {
                if let Some(card) = position.card.take() {
                    cards.push(card);
                }
            }
        }
        cards
    }
}

/// 回合阶段。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoundState {
    Running,
    LastPlay,
    Complete,
}

impl Default for RoundState {
    fn default() -> Self {
        RoundState::Running
    }
}

/// 回合事件流，供宿主框架回放与动画展示。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RoundEvent {
    CardStaked {
        side: CardColor,
        card_id: CardId,
        column: usize,
    },
    CardsWagered {
        side: CardColor,
        card_ids: Vec<CardId>,
        column: usize,
    },
    CardDrawn {
        side: CardColor,
        card_id: CardId,
    },
    TurnEnded {
        side: CardColor,
    },
    ColumnResolved {
        column: usize,
        winner: CardColor,
        jailed_card_ids: Vec<CardId>,
        stake_jailed: bool,
    },
    ColumnTied {
        column: usize,
    },
    RoundCompleted {
        black_score: u32,
        red_score: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    MissingPlayer { color: CardColor },
    DuplicateCardId { card_id: CardId },
    HandOverflow { color: CardColor, count: usize },
    ColumnCountMismatch { expected: usize, actual: usize },
    StakeStillListed { color: CardColor, column: usize },
    ForeignCard { card_id: CardId, column: usize },
}

/// 回合整体状态。搜索期间的快照一律深拷贝，互不共享。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Round {
    pub players: Vec<Player>,
    pub active: CardColor,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub state: RoundState,
    #[serde(default)]
    pub turn: u32,
    #[serde(default)]
    pub jailed_this_round: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_stake: Option<CardColor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<RoundEvent>,
}

impl Round {
    pub fn new(players: Vec<Player>, active: CardColor) -> Self {
        Self {
            players,
            active,
            columns: (0..BOARD_COLUMNS).map(Column::new).collect(),
            state: RoundState::default(),
            turn: 0,
            jailed_this_round: 0,
            first_stake: None,
            event_log: Vec::new(),
        }
    }

    /// 铺设开局赌注；仅用于构造阶段，列已占用时不做任何事。
    pub fn with_opening_stake(mut self, mut card: Card, column: usize) -> Self {
        if column < self.columns.len() && self.columns[column].stake.is_none() {
            let side = card.color;
            card.played = true;
            self.columns[column].stake = Some(card);
            for player in &mut self.players {
                player.remove_stake_column(column);
            }
            if self.first_stake.is_none() {
                self.first_stake = Some(side);
            }
        }
        self
    }

    pub fn get_player(&self, color: CardColor) -> Option<&Player> {
        self.players.iter().find(|player| player.color == color)
    }

    pub fn get_player_mut(&mut self, color: CardColor) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.color == color)
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// 展开成棋盘格视图（按线性索引排序）。
    pub fn positions(&self) -> Vec<&Position> {
        let mut grid: Vec<&Position> = self
            .columns
            .iter()
            .flat_map(|column| column.positions.iter())
            .collect();
        grid.sort_by_key(|position| position.index);
        grid
    }

    pub fn is_finished(&self) -> bool {
        self.state == RoundState::Complete
    }

    pub fn scores(&self) -> (u32, u32) {
        let score_of = |color| {
            self.get_player(color)
                .map(|player| player.score)
                .unwrap_or(0)
        };
        (score_of(CardColor::Black), score_of(CardColor::Red))
    }

    pub fn record_event(&mut self, event: RoundEvent) {
        self.event_log.push(event);
    }

    pub fn swap_active(&mut self) {
        self.active = self.active.opponent();
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        for color in [CardColor::Black, CardColor::Red] {
            if self.get_player(color).is_none() {
                return Err(IntegrityError::MissingPlayer { color });
            }
        }
        if self.columns.len() != BOARD_COLUMNS {
            return Err(IntegrityError::ColumnCountMismatch {
                expected: BOARD_COLUMNS,
                actual: self.columns.len(),
            });
        }

        let mut seen = HashSet::new();
        for player in &self.players {
            if player.hand.len() > HAND_SIZE {
                return Err(IntegrityError::HandOverflow {
                    color: player.color,
                    count: player.hand.len(),
                });
            }
            for card in player
                .hand
                .iter()
                .chain(player.jail.iter())
                .chain(player.draw_pile.iter())
            {
                if !seen.insert(card.id) {
                    return Err(IntegrityError::DuplicateCardId { card_id: card.id });
                }
            }
        }
        for column in &self.columns {
            if let Some(stake) = &column.stake {
                if !seen.insert(stake.id) {
                    return Err(IntegrityError::DuplicateCardId { card_id: stake.id });
                }
                for player in &self.players {
                    if player.available_stakes.contains(&column.index) {
                        return Err(IntegrityError::StakeStillListed {
                            color: player.color,
                            column: column.index,
                        });
                    }
                }
            }
            for position in &column.positions {
                if let Some(card) = &position.card {
                    if !seen.insert(card.id) {
                        return Err(IntegrityError::DuplicateCardId { card_id: card.id });
                    }
                    if card.color != position.owner {
                        return Err(IntegrityError::ForeignCard {
                            card_id: card.id,
                            column: column.index,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// 构造一个进行中的示例回合，方便前端调试或初始化。
    pub fn sample() -> Self {
        let sp = |rank| Card::standard(Suit::Spades, rank);
        let cl = |rank| Card::standard(Suit::Clubs, rank);
        let he = |rank| Card::standard(Suit::Hearts, rank);
        let di = |rank| Card::standard(Suit::Diamonds, rank);

        let black_hand = vec![sp(4), sp(5), sp(6), sp(9), cl(9)];
        let black_pile = vec![sp(10), sp(11), sp(12), sp(13), sp(14)];
        let red_hand = vec![he(4), he(5), he(9), di(9), di(2)];
        let red_pile = vec![he(10), he(11), he(12), he(13)];

        let black = Player::new(CardColor::Black, black_hand, black_pile);
        let red = Player::new(CardColor::Red, red_hand, red_pile);

        let mut round = Round::new(vec![black, red], CardColor::Black)
            .with_opening_stake(sp(7), 3)
            .with_opening_stake(he(7), 5);

        let _ = round.columns[3].place_wager(sp(2));
        let _ = round.columns[3].place_wager(sp(3));
        let _ = round.columns[3].place_wager(he(2));
        let _ = round.columns[5].place_wager(he(3));

        round.turn = 3;
        round.record_event(RoundEvent::CardStaked {
            side: CardColor::Black,
            card_id: sp(7).id,
            column: 3,
        });
        round.record_event(RoundEvent::CardStaked {
            side: CardColor::Red,
            card_id: he(7).id,
            column: 5,
        });
        round
    }
}

impl Default for Round {
    fn default() -> Self {
        Round::new(
            vec![
                Player::new(CardColor::Black, Vec::new(), Vec::new()),
                Player::new(CardColor::Red, Vec::new(), Vec::new()),
            ],
            CardColor::Black,
        )
    }
}
