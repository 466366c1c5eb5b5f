//! Determinism tests: the same contract, host state and message must give
//! the same result and the same world on every backend and on every run.

mod common;

use std::sync::Arc;

use eei_hostapi::{Account, LogRecord, MemHost, TxContext};
use eei_sandbox::{from_config, EngineConfig, EngineKind, ExecutionError, ExecutionResult};

use common::*;

/// Touches storage, logs, block data, a nested call and a create.
fn busy_contract() -> Vec<u8> {
    let init = finishing_with(&finishing_with(b"child"));
    wasm(&format!(
        r#"(module
            (import "ethereum" "storageStore" (func $store (param i32 i32)))
            (import "ethereum" "getBlockNumber" (func $number (result i64)))
            (import "ethereum" "log" (func $log (param i32 i32 i32 i32 i32 i32 i32)))
            (import "ethereum" "call" (func $call (param i64 i32 i32 i32 i32) (result i32)))
            (import "ethereum" "create" (func $create (param i32 i32 i32 i32) (result i32)))
            (import "ethereum" "useGas" (func $use (param i64)))
            (import "ethereum" "getGasLeft" (func $left (result i64)))
            (import "ethereum" "finish" (func $finish (param i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "{other}")
            (data (i32.const 64) "\01")
            (data (i32.const 1024) "{init}")
            (func (export "main")
                (call $use (i64.const 321))
                (i64.store (i32.const 96) (call $number))
                (call $store (i32.const 64) (i32.const 96))
                (call $log (i32.const 96) (i32.const 8) (i32.const 1)
                    (i32.const 64) (i32.const 0) (i32.const 0) (i32.const 0))
                (i32.store (i32.const 200)
                    (call $call (i64.const 20000) (i32.const 0) (i32.const 32) (i32.const 0) (i32.const 0)))
                (i32.store (i32.const 204)
                    (call $create (i32.const 32) (i32.const 1024) (i32.const {init_len}) (i32.const 208)))
                (i64.store (i32.const 228) (call $left))
                (call $finish (i32.const 200) (i32.const 36))))"#,
        other = data_string(&OTHER),
        init = data_string(&init),
        init_len = init.len(),
    ))
}

fn prepared_host(kind: EngineKind) -> Arc<MemHost> {
    let host = host(kind);
    host.set_code(OTHER, finishing_with(b"pong"));
    host.set_balance(CONTRACT, 1_000);
    host.set_tx_context(TxContext {
        number: 99,
        timestamp: 1_700_000_000,
        ..TxContext::default()
    });
    host
}

type Observation = (
    Result<ExecutionResult, ExecutionError>,
    Option<Account>,
    Vec<LogRecord>,
);

fn observe(kind: EngineKind, metered: bool) -> Observation {
    let code = busy_contract();
    let host = prepared_host(kind);
    let result = engine(kind).execute(host.clone(), &code, &code, &message(GAS), metered);
    (result, host.account(&CONTRACT), host.logs())
}

// ── Test: backends agree ──

#[test]
fn test_backends_agree_unmetered() {
    let wasmtime = observe(EngineKind::Wasmtime, false);
    let wasmi = observe(EngineKind::Wasmi, false);

    let result = wasmtime.0.as_ref().unwrap();
    assert!(result.success);
    assert_eq!(&result.return_data[0..4], &0i32.to_le_bytes());
    assert_eq!(&result.return_data[4..8], &0i32.to_le_bytes());
    assert!(result.created_address.is_some());
    assert_eq!(wasmtime, wasmi);
}

#[test]
fn test_backends_agree_metered() {
    let wasmtime = observe(EngineKind::Wasmtime, true);
    let wasmi = observe(EngineKind::Wasmi, true);
    assert!(wasmtime.0.as_ref().unwrap().gas_used > 321);
    assert_eq!(wasmtime, wasmi);
}

#[test]
fn test_backends_agree_on_failure() {
    for source in [
        r#"(module (memory (export "memory") 1) (func (export "main") unreachable))"#,
        r#"(module (memory (export "memory") 1) (func (export "main")
            (drop (i32.div_u (i32.const 1) (i32.const 0)))))"#,
        r#"(module (memory (export "memory") 1) (func (export "main")
            (drop (i32.load (i32.const 70000)))))"#,
    ] {
        let code = wasm(source);
        let results: Vec<_> = ENGINES.iter().map(|kind| run_fresh(*kind, &code)).collect();
        assert_eq!(results[0], Err(ExecutionError::VmTrap), "{source}");
        assert_eq!(results[0], results[1], "{source}");
    }
}

#[test]
fn test_backends_agree_on_compute_loop_by_default() {
    // Sums 1..=300 in a loop; fuel is off by default, so neither backend
    // stops it early.
    let code = wasm(
        r#"(module
            (import "ethereum" "finish" (func $finish (param i32 i32)))
            (memory (export "memory") 1)
            (func (export "main")
                (local $i i32)
                (local $sum i32)
                (loop $count
                    (local.set $i (i32.add (local.get $i) (i32.const 1)))
                    (local.set $sum (i32.add (local.get $sum) (local.get $i)))
                    (br_if $count (i32.lt_u (local.get $i) (i32.const 300))))
                (i32.store (i32.const 0) (local.get $sum))
                (call $finish (i32.const 0) (i32.const 4))))"#,
    );
    assert_eq!(EngineConfig::default().fuel_limit, None);
    let results: Vec<_> = ENGINES.iter().map(|kind| run_fresh(*kind, &code)).collect();
    assert_eq!(results[0].as_ref().unwrap().return_data, 45_150i32.to_le_bytes());
    assert_eq!(results[0], results[1]);
}

// ── Test: repeated runs ──

#[test]
fn test_repeated_runs_identical() {
    for kind in ENGINES {
        let first = observe(kind, true);
        for _ in 0..3 {
            assert_eq!(observe(kind, true), first, "{kind}");
        }
    }
}

// ── Test: engine selected from configuration ──

#[test]
fn test_engine_from_toml_config() {
    init_tracing();
    let code = finishing_with(b"configured");
    let cases = [
        ("engine = \"wasmi\"", "wasmi"),
        ("engine = \"wasmtime\"", "wasmtime"),
        ("", "wasmtime"),
    ];
    for (source, name) in cases {
        let engine = from_config(EngineConfig::from_toml_str(source).unwrap());
        assert_eq!(engine.name(), name);

        let result = engine
            .execute(MemHost::new(), &code, &code, &message(GAS), false)
            .unwrap();
        assert_eq!(result.return_data, b"configured");
    }
}
