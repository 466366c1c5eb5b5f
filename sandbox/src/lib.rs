//! `eei-sandbox`: engine-agnostic WASM sandbox for EEI smart contracts.
//!
//! This crate loads, validates, links and runs an EEI contract module on
//! either Wasmtime or wasmi behind one interface. It enforces:
//!
//! - **Module shape:** exactly one exported `memory`, a `main: () -> ()`
//!   export, no start function
//! - **Import whitelisting:** only the `ethereum` (and, with the
//!   `debug-eei` feature, `debug`) host functions with matching signatures
//! - **Memory safety:** every host access is bounds-checked against the
//!   caller's linear memory
//! - **Gas metering:** `useGas` always, interface costs when requested
//! - **Resource limits:** bounded memory growth and optional fuel
//!
//! The primary entry point is [`WasmEngine::execute`], reached through
//! [`create`] or [`from_config`].

pub mod backends;
pub mod config;
pub mod error;
pub mod host_impl;
pub mod linker;
pub mod memory;
pub mod runtime;
pub mod validation;

pub use backends::{WasmiEngine, WasmtimeEngine};
pub use config::{EngineConfig, EngineKind};
pub use error::{ConfigError, ExecutionError};
pub use runtime::{create, from_config, NestedExecutor, WasmEngine};

// Host-side types callers need alongside the engine.
pub use eei_hostapi::{
    Address, CallKind, CallOutcome, CallStatus, ExecutionResult, HostContext, MemHost, Message,
    MessageKind, SubExecutor, TxContext,
};
