//! `eei-hostapi`: host-side types and traits for the EEI contract sandbox.
//!
//! This crate defines what a contract execution needs from its host,
//! independent of any WASM engine:
//!
//! - `HostContext` trait: world state, block data, sub-messages and logs
//! - `SubExecutor` trait: the hook a host uses to run nested contract code
//! - `HostGasMeter` and `GasSchedule`: gas enforcement and interface costs
//! - `MemHost`: in-memory `HostContext` for tests and embedding
//! - `HostError`: faults raised while servicing a host call
//! - value types: `Message`, `ExecutionResult`, `CallOutcome`, `TxContext`

pub mod error;
pub mod gas_meter;
pub mod mem_host;
pub mod traits;
pub mod types;

// Re-export commonly used types at the crate root.
pub use error::HostError;
pub use gas_meter::{GasSchedule, HostGasMeter};
pub use mem_host::{derive_address, Account, LogRecord, MemHost};
pub use traits::{HostContext, SubExecutor};
pub use types::{
    Address, Bytes32, CallKind, CallOutcome, CallStatus, ExecutionResult, Message, MessageKind,
    TxContext,
};
