//! Shared test helpers for integration tests.
//!
//! Provides fixed addresses, WAT compilation, host setup and engine
//! factories used across all integration test files. Every scenario runs
//! on both backends through [`ENGINES`].

#![allow(dead_code)]

use std::sync::Arc;

use eei_sandbox::{
    create, Address, EngineConfig, EngineKind, ExecutionError, ExecutionResult, MemHost, Message,
    NestedExecutor, WasmEngine,
};
use tracing_subscriber::EnvFilter;

/// Address the contract under test runs as.
pub const CONTRACT: Address = [0x11; 20];
/// Sender of the outer message.
pub const CALLER: Address = [0x22; 20];
/// A second account, used as call target or beneficiary.
pub const OTHER: Address = [0x33; 20];

/// Gas given to the outer message unless a test says otherwise.
pub const GAS: i64 = 1_000_000;

pub const ENGINES: [EngineKind; 2] = [EngineKind::Wasmtime, EngineKind::Wasmi];

// ── Logging ──

/// Route `tracing` output through the test harness. `RUST_LOG` selects
/// the level; repeated calls are harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Modules ──

/// Compile a WAT module to binary.
pub fn wasm(source: &str) -> Vec<u8> {
    wat::parse_str(source).expect("test module should be valid WAT")
}

/// Render bytes as the body of a WAT data string (`\xx` escapes).
pub fn data_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{b:02x}")).collect()
}

/// A contract whose `main` finishes with `bytes`.
pub fn finishing_with(bytes: &[u8]) -> Vec<u8> {
    wasm(&format!(
        r#"(module
            (import "ethereum" "finish" (func $finish (param i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "{}")
            (func (export "main")
                (call $finish (i32.const 0) (i32.const {}))))"#,
        data_string(bytes),
        bytes.len()
    ))
}

// ── Engines & hosts ──

pub fn engine(kind: EngineKind) -> Box<dyn WasmEngine> {
    engine_with(kind, EngineConfig::default())
}

pub fn engine_with(kind: EngineKind, config: EngineConfig) -> Box<dyn WasmEngine> {
    init_tracing();
    create(kind, config)
}

/// An empty host whose sub-messages run on `kind`, without interface
/// metering.
pub fn host(kind: EngineKind) -> Arc<MemHost> {
    let host = MemHost::new();
    host.set_executor(Arc::new(NestedExecutor::new(engine(kind), false)));
    host
}

/// Like [`host`], with sub-messages run under `config`.
pub fn host_with(kind: EngineKind, config: EngineConfig) -> Arc<MemHost> {
    let host = MemHost::new();
    host.set_executor(Arc::new(NestedExecutor::new(engine_with(kind, config), false)));
    host
}

/// A call from [`CALLER`] to [`CONTRACT`].
pub fn message(gas: i64) -> Message {
    Message::call(CALLER, CONTRACT, gas)
}

/// Run `code` as [`CONTRACT`] without interface metering.
pub fn run(
    kind: EngineKind,
    host: &Arc<MemHost>,
    code: &[u8],
    msg: &Message,
) -> Result<ExecutionResult, ExecutionError> {
    engine(kind).execute(host.clone(), code, code, msg, false)
}

/// Run `code` as [`CONTRACT`] with interface metering.
pub fn run_metered(
    kind: EngineKind,
    host: &Arc<MemHost>,
    code: &[u8],
    msg: &Message,
) -> Result<ExecutionResult, ExecutionError> {
    engine(kind).execute(host.clone(), code, code, msg, true)
}

/// Run `code` on a fresh host with a default message.
pub fn run_fresh(kind: EngineKind, code: &[u8]) -> Result<ExecutionResult, ExecutionError> {
    run(kind, &host(kind), code, &message(GAS))
}

/// A 32-byte word with `byte` first and zeros after it.
pub fn word(byte: u8) -> [u8; 32] {
    let mut w = [0u8; 32];
    w[0] = byte;
    w
}
