//! Resource limit tests: fuel exhaustion, memory limits, bounds checks.
//!
//! These tests verify that the sandbox enforces its limits and that host
//! operations never read or write outside the caller's linear memory.

mod common;

use eei_sandbox::{EngineConfig, ExecutionError};

use common::*;

const INFINITE_LOOP: &str = r#"(module
    (memory (export "memory") 1)
    (func (export "main")
        (loop $spin (br $spin))))"#;

// ── Test: fuel ──

#[test]
fn test_fuel_exhaustion_traps() {
    let code = wasm(INFINITE_LOOP);
    let config = EngineConfig {
        fuel_limit: Some(10_000),
        ..EngineConfig::default()
    };
    for kind in ENGINES {
        let result = engine_with(kind, config.clone())
            .execute(host(kind), &code, &code, &message(GAS), false);
        assert_eq!(result, Err(ExecutionError::VmTrap), "{kind}");
    }
}

#[test]
fn test_sufficient_fuel_completes() {
    let code = wasm(
        r#"(module
            (memory (export "memory") 1)
            (func (export "main")
                (local $i i32)
                (loop $count
                    (local.set $i (i32.add (local.get $i) (i32.const 1)))
                    (br_if $count (i32.lt_u (local.get $i) (i32.const 100))))))"#,
    );
    let config = EngineConfig {
        fuel_limit: Some(1_000_000),
        ..EngineConfig::default()
    };
    for kind in ENGINES {
        let result = engine_with(kind, config.clone())
            .execute(host(kind), &code, &code, &message(GAS), false);
        assert!(result.unwrap().success, "{kind}");
    }
}

// ── Test: memory bounds ──

#[test]
fn test_finish_past_memory_end() {
    let code = wasm(
        r#"(module
            (import "ethereum" "finish" (func $finish (param i32 i32)))
            (memory (export "memory") 1)
            (func (export "main")
                (call $finish (i32.const 65530) (i32.const 100))))"#,
    );
    for kind in ENGINES {
        assert_eq!(
            run_fresh(kind, &code),
            Err(ExecutionError::InvalidMemoryAccess {
                offset: 65_530,
                length: 100,
                size: 65_536,
            }),
            "{kind}"
        );
    }
}

#[test]
fn test_offset_wraparound_is_rejected() {
    // 0xffffffff + 2 must not wrap to 1.
    let code = wasm(
        r#"(module
            (import "ethereum" "getCaller" (func $caller (param i32)))
            (memory (export "memory") 1)
            (func (export "main")
                (call $caller (i32.const -1))))"#,
    );
    for kind in ENGINES {
        assert!(
            matches!(run_fresh(kind, &code), Err(ExecutionError::InvalidMemoryAccess { .. })),
            "{kind}"
        );
    }
}

#[test]
fn test_call_data_copy_past_input_end() {
    let code = wasm(
        r#"(module
            (import "ethereum" "callDataCopy" (func $copy (param i32 i32 i32)))
            (memory (export "memory") 1)
            (func (export "main")
                (call $copy (i32.const 0) (i32.const 0) (i32.const 10))))"#,
    );
    for kind in ENGINES {
        let host = host(kind);
        let msg = message(GAS).with_input(b"abc".to_vec());
        assert_eq!(
            run(kind, &host, &code, &msg),
            Err(ExecutionError::InvalidMemoryAccess {
                offset: 0,
                length: 10,
                size: 3,
            }),
            "{kind}"
        );
    }
}

#[test]
fn test_storage_store_value_out_of_bounds_has_no_effect() {
    let code = wasm(
        r#"(module
            (import "ethereum" "storageStore" (func $store (param i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "\01")
            (func (export "main")
                (call $store (i32.const 0) (i32.const 65520))))"#,
    );
    for kind in ENGINES {
        let host = host(kind);
        let result = run(kind, &host, &code, &message(GAS));
        assert!(matches!(result, Err(ExecutionError::InvalidMemoryAccess { .. })), "{kind}");
        assert!(host.account(&CONTRACT).is_none());
    }
}

// ── Test: memory growth ──

#[test]
fn test_grown_memory_is_visible_to_host() {
    let code = wasm(
        r#"(module
            (import "ethereum" "finish" (func $finish (param i32 i32)))
            (memory (export "memory") 1)
            (func (export "main")
                (drop (memory.grow (i32.const 1)))
                (i32.store (i32.const 70000) (i32.const 7))
                (call $finish (i32.const 70000) (i32.const 4))))"#,
    );
    for kind in ENGINES {
        let result = run_fresh(kind, &code).unwrap();
        assert_eq!(result.return_data, 7i32.to_le_bytes(), "{kind}");
    }
}

#[test]
fn test_memory_growth_capped_by_config() {
    let code = wasm(
        r#"(module
            (import "ethereum" "finish" (func $finish (param i32 i32)))
            (memory (export "memory") 1)
            (func (export "main")
                (i32.store (i32.const 0) (memory.grow (i32.const 10)))
                (call $finish (i32.const 0) (i32.const 4))))"#,
    );
    let config = EngineConfig {
        max_memory_pages: 2,
        ..EngineConfig::default()
    };
    for kind in ENGINES {
        let result = engine_with(kind, config.clone())
            .execute(host(kind), &code, &code, &message(GAS), false)
            .unwrap();
        assert_eq!(result.return_data, (-1i32).to_le_bytes(), "{kind}");
    }
}

#[test]
fn test_initial_memory_over_limit_fails() {
    let code = wasm(r#"(module (memory (export "memory") 4) (func (export "main")))"#);
    let config = EngineConfig {
        max_memory_pages: 2,
        ..EngineConfig::default()
    };
    for kind in ENGINES {
        let result = engine_with(kind, config.clone())
            .execute(host(kind), &code, &code, &message(GAS), false);
        assert_eq!(result, Err(ExecutionError::VmTrap), "{kind}");
    }
}
