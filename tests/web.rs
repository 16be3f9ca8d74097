//! Test suite for the Web and headless browsers.

#![cfg(target_arch = "wasm32")]

extern crate wasm_bindgen_test;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

use stakes_core::{compute_ai_move, create_round, validate_round, RoundSession};

#[wasm_bindgen_test]
fn sample_round_passes_validation() {
    let round = create_round().expect("sample round serializes");
    assert!(validate_round(round).is_ok());
}

#[wasm_bindgen_test]
fn ai_decision_reaches_the_boundary() {
    let round = create_round().expect("sample round serializes");
    let decision = compute_ai_move(round, "black", Some("easy".to_string()), Some(7))
        .expect("decision serializes");
    assert!(!decision.is_null());
    assert!(!decision.is_undefined());
}

#[wasm_bindgen_test]
fn session_applies_an_ai_move() {
    let mut session = RoundSession::new(None).expect("default session builds");
    let response = session
        .apply_ai_move("black", Some("easy".to_string()), Some(3))
        .expect("ai move applies");
    assert!(response.contains("\"decision\""));
}
