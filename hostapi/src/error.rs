//! Host-side error types for the EEI sandbox.
//!
//! `HostError` is the fault type raised by EEI operations. It never reaches
//! the embedder directly: the sandbox maps it onto its own `ExecutionError`
//! (`InvalidMemoryAccess` keeps its coordinates, everything else becomes a
//! VM trap).

/// A fault raised while servicing a host call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The gas meter would exceed its limit.
    #[error("out of gas")]
    OutOfGas,

    /// A byte range fell outside linear memory or a host-side source buffer.
    #[error("invalid memory access: offset {offset} length {length} exceeds size {size}")]
    InvalidMemoryAccess { offset: u64, length: u64, size: u64 },

    /// A state-modifying operation was issued from a static context.
    #[error("static mode violation: {0}")]
    StaticModeViolation(&'static str),

    /// The guest passed an argument outside the operation's domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A host call needed linear memory but the caller exports none.
    #[error("module exports no linear memory")]
    MissingMemory,
}

impl HostError {
    /// Shorthand for an out-of-range access.
    pub fn out_of_bounds(offset: u64, length: u64, size: u64) -> Self {
        Self::InvalidMemoryAccess {
            offset,
            length,
            size,
        }
    }
}
