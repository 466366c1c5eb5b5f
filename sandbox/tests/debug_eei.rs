//! Debug host functions, available with the `debug-eei` feature.

#![cfg(feature = "debug-eei")]

mod common;

use common::*;

// ── Test: print functions link and run ──

#[test]
fn test_debug_prints_do_not_disturb_execution() {
    let code = wasm(
        r#"(module
            (import "debug" "print" (func $print (param i32 i32)))
            (import "debug" "print32" (func $print32 (param i32)))
            (import "debug" "print64" (func $print64 (param i64)))
            (import "debug" "printMemHex" (func $hex (param i32 i32)))
            (import "debug" "printStorageHex" (func $storage (param i32)))
            (import "ethereum" "finish" (func $finish (param i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "trace")
            (func (export "main")
                (call $print (i32.const 0) (i32.const 5))
                (call $print32 (i32.const 7))
                (call $print64 (i64.const -7))
                (call $hex (i32.const 0) (i32.const 5))
                (call $storage (i32.const 32))
                (call $finish (i32.const 0) (i32.const 5))))"#,
    );
    for kind in ENGINES {
        let result = run_fresh(kind, &code).unwrap();
        assert_eq!(result.return_data, b"trace", "{kind}");
        assert_eq!(result.gas_used, 0);
    }
}

#[test]
fn test_debug_print_out_of_bounds() {
    let code = wasm(
        r#"(module
            (import "debug" "printMem" (func $print (param i32 i32)))
            (memory (export "memory") 1)
            (func (export "main")
                (call $print (i32.const 65535) (i32.const 2))))"#,
    );
    for kind in ENGINES {
        assert!(
            matches!(
                run_fresh(kind, &code),
                Err(eei_sandbox::ExecutionError::InvalidMemoryAccess { .. })
            ),
            "{kind}"
        );
    }
}
