//! Sandbox error types.
//!
//! `ExecutionError` is the only error an embedder sees. Backend error types
//! (wasmtime's `anyhow::Error`, `wasmi::Error`) never cross the
//! `WasmEngine` boundary: their detail is logged and dropped.

use eei_hostapi::HostError;

/// Why an execution did not produce an `ExecutionResult`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// The module was rejected before any contract code ran.
    #[error("contract validation failed: {0}")]
    ContractValidationFailure(String),

    /// A host operation addressed bytes outside linear memory or outside a
    /// host-side source buffer.
    #[error("invalid memory access: offset {offset} length {length} exceeds size {size}")]
    InvalidMemoryAccess { offset: u64, length: u64, size: u64 },

    /// Any other abnormal termination.
    #[error("vm trap")]
    VmTrap,
}

impl ExecutionError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::ContractValidationFailure(msg.into())
    }
}

impl From<HostError> for ExecutionError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::InvalidMemoryAccess {
                offset,
                length,
                size,
            } => Self::InvalidMemoryAccess {
                offset,
                length,
                size,
            },
            _ => Self::VmTrap,
        }
    }
}

/// Configuration loading failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown engine {0:?} (expected \"wasmtime\" or \"wasmi\")")]
    UnknownEngine(String),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

// ── Termination sentinel ──

/// How a contract deliberately ended its own execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Finish,
    Revert,
    SelfDestruct,
}

/// Why a host operation stopped the guest.
///
/// The bridge records one of these before unwinding; the adapter reads it
/// back after `main` returns an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    /// The contract asked to stop. Not an error.
    Terminated(Termination),
    /// A host operation faulted.
    Failed(HostError),
}

impl From<HostError> for Interrupt {
    fn from(err: HostError) -> Self {
        Self::Failed(err)
    }
}

/// Opaque marker handed to the backend to unwind the guest stack after a
/// host operation recorded an [`Interrupt`].
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("host interrupt")]
pub struct HostInterrupt;

impl wasmi::core::HostError for HostInterrupt {}
