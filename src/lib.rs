pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_json;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{
    AiAgent, AiConfig, AiDecision, Difficulty, RoundMove, ScoredMove, SearchObserver, SearchStats,
    Searcher,
};
pub use game::{
    Card, CardColor, CardId, CardValueMask, Column, HandComparison, HandScore, IntegrityError,
    MoveError, MoveResolution, Player, Position, Round, RoundEngine, RoundEvent, RoundOutcome,
    RoundState, StakeMove, Suit, WagerMove,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
}

fn make_resolution(round: Round, events: Vec<RoundEvent>) -> MoveResolution {
    MoveResolution::new(round, events)
}

fn to_js_error(error: MoveError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution_json(resolution: MoveResolution) -> Result<String, JsValue> {
    serde_json::to_string(&resolution).map_err(serde_to_js_error)
}

fn resolution_from_events(round: &Round, events: Vec<RoundEvent>) -> MoveResolution {
    MoveResolution::new(round.clone(), events)
}

fn execute_with_engine<F>(round: &mut Round, op: F) -> Result<Vec<RoundEvent>, JsValue>
where
    F: FnOnce(&RoundEngine, &mut Round) -> Result<Vec<RoundEvent>, MoveError>,
{
    let engine = RoundEngine::new();
    op(&engine, round).map_err(to_js_error)
}

fn parse_side(value: &str) -> Result<CardColor, JsValue> {
    CardColor::from_str(value)
        .map_err(|_| JsValue::from_str(&format!("unknown side: {value}")))
}

fn build_agent(difficulty: Option<&str>, seed: Option<u64>) -> AiAgent {
    let difficulty = difficulty
        .and_then(|value| Difficulty::from_str(value).ok())
        .unwrap_or(Difficulty::Normal);
    let config = AiConfig::from_difficulty(difficulty);
    match seed {
        Some(seed) => AiAgent::with_seed(config, seed),
        None => AiAgent::new(config),
    }
}

#[derive(Serialize)]
struct AiMoveResponse {
    decision: AiDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<MoveResolution>,
}

#[derive(Serialize)]
struct TraceNode {
    parent: u64,
    id: u64,
    depth: u8,
    score: f64,
    pruned: bool,
}

#[derive(Serialize)]
struct TracedAiMove {
    decision: AiDecision,
    trace: Vec<TraceNode>,
}

struct TraceCollector {
    nodes: Vec<TraceNode>,
}

impl SearchObserver for TraceCollector {
    fn node_expanded(&mut self, parent_id: u64, node_id: u64, depth: u8, score: f64, pruned: bool) {
        self.nodes.push(TraceNode {
            parent: parent_id,
            id: node_id,
            depth,
            score,
            pruned,
        });
    }
}

#[wasm_bindgen]
pub struct RoundSession {
    round: Round,
}

#[wasm_bindgen]
impl RoundSession {
    #[wasm_bindgen(constructor)]
    pub fn new(initial_round_json: Option<String>) -> Result<RoundSession, JsValue> {
        let round = if let Some(json) = initial_round_json {
            serde_json::from_str(&json).map_err(serde_to_js_error)?
        } else {
            Round::sample()
        };
        Ok(RoundSession { round })
    }

    pub fn round_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.round).map_err(serde_to_js_error)
    }

    pub fn set_round_json(&mut self, json: &str) -> Result<(), JsValue> {
        let round: Round = serde_json::from_str(json).map_err(serde_to_js_error)?;
        self.round = round;
        Ok(())
    }

    pub fn stake_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: StakeMove = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        let events = execute_with_engine(&mut self.round, |engine, round| {
            engine.stake(round, action.clone())
        })?;
        make_resolution_json(resolution_from_events(&self.round, events))
    }

    pub fn wager_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: WagerMove = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        let events = execute_with_engine(&mut self.round, |engine, round| {
            engine.wager(round, action.clone())
        })?;
        make_resolution_json(resolution_from_events(&self.round, events))
    }

    pub fn finalize_json(&mut self) -> Result<String, JsValue> {
        let events = execute_with_engine(&mut self.round, |engine, round| engine.finalize(round))?;
        make_resolution_json(resolution_from_events(&self.round, events))
    }

    pub fn outcome_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&RoundEngine::outcome(&self.round)).map_err(serde_to_js_error)
    }

    pub fn apply_ai_move(
        &mut self,
        side: &str,
        difficulty: Option<String>,
        seed: Option<u64>,
    ) -> Result<String, JsValue> {
        let side = parse_side(side)?;
        let mut agent = build_agent(difficulty.as_deref(), seed);

        // 先克隆局面用于 AI 决策
        let round_for_ai = self.round.clone();
        let decision = agent.decide(&round_for_ai, side);

        // 然后应用决策
        let applied = if let Some(action) = decision.action.clone() {
            Some(self.apply_round_move(action)?)
        } else {
            None
        };

        let response = AiMoveResponse { decision, applied };
        serde_json::to_string(&response).map_err(serde_to_js_error)
    }

    pub fn think_ai(
        &self,
        side: String,
        difficulty: Option<String>,
        seed: Option<u64>,
        delay_ms: Option<u32>,
    ) -> Promise {
        let round = self.round.clone();
        let delay = delay_ms.unwrap_or(0);

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let side = parse_side(&side)?;
            let mut agent = build_agent(difficulty.as_deref(), seed);
            let decision = agent.decide(&round, side);
            let json = serde_json::to_string(&decision).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }

    fn apply_round_move(&mut self, action: RoundMove) -> Result<MoveResolution, JsValue> {
        match action {
            RoundMove::Stake { action } => {
                let events = execute_with_engine(&mut self.round, |engine, round| {
                    engine.stake(round, action.clone())
                })?;
                Ok(resolution_from_events(&self.round, events))
            }
            RoundMove::Wager { action } => {
                let events = execute_with_engine(&mut self.round, |engine, round| {
                    engine.wager(round, action.clone())
                })?;
                Ok(resolution_from_events(&self.round, events))
            }
        }
    }
}

/// 返回一个示例牌局，方便前端调试或初始化。
#[wasm_bindgen(js_name = "createRound")]
pub fn create_round() -> Result<JsValue, JsValue> {
    to_value(&Round::sample()).map_err(JsValue::from)
}

/// 将传入的牌局进行深拷贝后返回。
#[wasm_bindgen(js_name = "cloneRound")]
pub fn clone_round(round: JsValue) -> Result<JsValue, JsValue> {
    let round: Round = from_value(round).map_err(JsValue::from)?;
    let cloned = round.clone();
    to_value(&cloned).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "stakeCard")]
pub fn stake_card(round: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let mut round: Round = from_value(round).map_err(JsValue::from)?;
    let action: StakeMove = from_value(action).map_err(JsValue::from)?;
    let engine = RoundEngine::new();
    match engine.stake(&mut round, action) {
        Ok(events) => to_value(&make_resolution(round, events)).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "wagerCards")]
pub fn wager_cards(round: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let mut round: Round = from_value(round).map_err(JsValue::from)?;
    let action: WagerMove = from_value(action).map_err(JsValue::from)?;
    let engine = RoundEngine::new();
    match engine.wager(&mut round, action) {
        Ok(events) => to_value(&make_resolution(round, events)).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "finalizeRound")]
pub fn finalize_round(round: JsValue) -> Result<JsValue, JsValue> {
    let mut round: Round = from_value(round).map_err(JsValue::from)?;
    let engine = RoundEngine::new();
    match engine.finalize(&mut round) {
        Ok(events) => to_value(&make_resolution(round, events)).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "roundOutcome")]
pub fn round_outcome(round: JsValue) -> Result<JsValue, JsValue> {
    let round: Round = from_value(round).map_err(JsValue::from)?;
    let outcome = RoundEngine::outcome(&round);
    to_value(&outcome).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateRound")]
pub fn validate_round(round: JsValue) -> Result<(), JsValue> {
    let round: Round = from_value(round).map_err(JsValue::from)?;
    round
        .integrity_check()
        .map_err(|error| to_js_error(MoveError::IntegrityViolation { error }))?;
    Ok(())
}

#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(
    round: JsValue,
    side: &str,
    difficulty: Option<String>,
    seed: Option<u64>,
) -> Result<JsValue, JsValue> {
    let round: Round = from_value(round).map_err(JsValue::from)?;
    let side = parse_side(side)?;
    let mut agent = build_agent(difficulty.as_deref(), seed);
    let decision = agent.decide(&round, side);
    to_value(&decision).map_err(JsValue::from)
}

/// 带搜索树轨迹的决策入口，供前端可视化每个展开节点。
#[wasm_bindgen(js_name = "computeAiMoveTraced")]
pub fn compute_ai_move_traced(
    round: JsValue,
    side: &str,
    difficulty: Option<String>,
    seed: Option<u64>,
) -> Result<JsValue, JsValue> {
    let round: Round = from_value(round).map_err(JsValue::from)?;
    let side = parse_side(side)?;
    let mut agent = build_agent(difficulty.as_deref(), seed);
    let mut collector = TraceCollector { nodes: Vec::new() };
    let decision = agent.decide_with_observer(&round, side, &mut collector);
    let traced = TracedAiMove {
        decision,
        trace: collector.nodes,
    };
    to_value(&traced).map_err(JsValue::from)
}
