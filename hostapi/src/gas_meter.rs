//! Host-side gas meter and the interface gas schedule.
//!
//! The `HostGasMeter` is the authoritative gas counter for one execution.
//! Every charge is checked before it is applied, so a failed charge leaves
//! the meter untouched and the host operation that asked for it never runs.

use serde::Deserialize;

use crate::error::HostError;

/// Host-side gas meter for one execution.
#[derive(Debug, Clone)]
pub struct HostGasMeter {
    limit: u64,
    consumed: u64,
}

impl HostGasMeter {
    /// Create a new gas meter with the given limit.
    pub fn new(limit: u64) -> Self {
        Self { limit, consumed: 0 }
    }

    /// Charge gas. Returns `Err(OutOfGas)` if the limit would be exceeded.
    ///
    /// On error the consumed count is not modified.
    pub fn charge(&mut self, amount: u64) -> Result<(), HostError> {
        let new_consumed = match self.consumed.checked_add(amount) {
            Some(v) if v <= self.limit => v,
            _ => return Err(HostError::OutOfGas),
        };
        self.consumed = new_consumed;
        Ok(())
    }

    /// Give back gas that was charged up front but not used (sub-call
    /// forwarding). Never refunds more than was consumed.
    pub fn refund(&mut self, amount: u64) {
        self.consumed = self.consumed.saturating_sub(amount);
    }

    /// Returns the total gas consumed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Returns the remaining gas before the limit is reached.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }
}

/// Interface gas costs charged by EEI operations when metering is enabled.
///
/// The defaults follow the Ethereum fee schedule the EEI was designed
/// against; embedders override individual entries from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    pub base: u64,
    pub verylow: u64,
    /// Per 32-byte word copied.
    pub copy: u64,
    pub balance: u64,
    pub extcode: u64,
    pub blockhash: u64,
    pub storage_load: u64,
    pub storage_store_create: u64,
    pub storage_store_change: u64,
    pub log: u64,
    /// Per byte of log data.
    pub log_data: u64,
    pub log_topic: u64,
    pub call: u64,
    pub value_transfer: u64,
    pub call_new_account: u64,
    pub call_stipend: u64,
    pub create: u64,
    pub selfdestruct: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            base: 2,
            verylow: 3,
            copy: 3,
            balance: 400,
            extcode: 700,
            blockhash: 800,
            storage_load: 200,
            storage_store_create: 20_000,
            storage_store_change: 5_000,
            log: 375,
            log_data: 8,
            log_topic: 375,
            call: 700,
            value_transfer: 9_000,
            call_new_account: 25_000,
            call_stipend: 2_300,
            create: 32_000,
            selfdestruct: 5_000,
        }
    }
}

impl GasSchedule {
    /// Per-word part of a copy: `copy * ceil(length / 32)`.
    pub fn word_cost(&self, length: u32) -> u64 {
        self.copy.saturating_mul((length as u64).div_ceil(32))
    }

    /// Cost of copying `length` bytes: `verylow + copy * ceil(length / 32)`.
    pub fn copy_cost(&self, length: u32) -> u64 {
        self.verylow.saturating_add(self.word_cost(length))
    }

    /// Cost of a log record with `data_len` bytes and `topics` topics.
    pub fn log_cost(&self, data_len: u32, topics: usize) -> u64 {
        self.log
            .saturating_add(self.log_data.saturating_mul(data_len as u64))
            .saturating_add(self.log_topic.saturating_mul(topics as u64))
    }
}
