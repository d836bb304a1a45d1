#![cfg(feature = "serde")]

use agrad::{Tape, TapeConfig, TapeGuard, Var};

#[test]
fn config_roundtrip_json() {
    let config = TapeConfig::default()
        .node_block_len(1024)
        .operand_block_len(256)
        .stack_capacity(4096);
    let json = serde_json::to_string(&config).unwrap();
    let back: TapeConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn missing_fields_take_defaults() {
    let config: TapeConfig = serde_json::from_str(r#"{ "node_block_len": 64 }"#).unwrap();
    assert_eq!(config.node_block_len, 64);
    assert_eq!(config.operand_block_len, TapeConfig::default().operand_block_len);
}

#[test]
fn deserialized_config_drives_a_tape() {
    let config: TapeConfig = serde_json::from_str(r#"{ "node_block_len": 4 }"#).unwrap();
    let mut tape = Tape::<f64>::with_config(config);
    let guard = TapeGuard::new(&mut tape);
    let mut y = Var::new(1.0);
    for _ in 0..9 {
        y = y * 2.0;
    }
    assert_eq!(y.val(), 512.0);
    assert_eq!(guard.stats().node_blocks, 3);
}
