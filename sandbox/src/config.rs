//! Sandbox configuration.
//!
//! `EngineConfig` is plain data: every execution builds its backend objects
//! from it and nothing in it is mutated during a run. It can be built in
//! code (`Default` plus field updates) or parsed from TOML:
//!
//! ```toml
//! engine = "wasmi"
//! max_memory_pages = 64
//! fuel_limit = 5000000
//!
//! [gas_schedule]
//! storage_load = 800
//! ```

use std::fmt;
use std::str::FromStr;

use eei_hostapi::GasSchedule;
use serde::Deserialize;

use crate::error::ConfigError;

/// Size of one WebAssembly page in bytes.
pub const WASM_PAGE_SIZE: u64 = 65_536;

/// Which WebAssembly backend runs the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Cranelift-compiled execution.
    #[default]
    Wasmtime,
    /// Interpreted execution.
    Wasmi,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wasmtime => "wasmtime",
            Self::Wasmi => "wasmi",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wasmtime" => Ok(Self::Wasmtime),
            "wasmi" => Ok(Self::Wasmi),
            _ => Err(ConfigError::UnknownEngine(s.to_string())),
        }
    }
}

/// Configuration for contract execution.
///
/// Controls the backend, memory limits, instruction fuel, call depth and
/// the interface gas schedule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Backend used by [`crate::runtime::from_config`].
    pub engine: EngineKind,

    /// Maximum linear memory pages (1 page = 64 KiB).
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Backend instruction fuel, off by default.
    ///
    /// Wasmtime and wasmi count fuel on different scales, so a run that
    /// fits on one backend may trap on the other. Results are only
    /// guaranteed identical across backends with fuel disabled; gas is
    /// the cancellation mechanism contracts see.
    pub fuel_limit: Option<u64>,

    /// Sub-calls and creations at this depth or deeper fail with status 1.
    pub max_call_depth: i32,

    /// Interface gas costs charged when metering is enabled.
    pub gas_schedule: GasSchedule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            max_memory_pages: 256, // 16 MiB
            fuel_limit: None,
            max_call_depth: 1024,
            gas_schedule: GasSchedule::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_memory_pages == 0 {
            return Err(ConfigError::Invalid("max_memory_pages must be at least 1"));
        }
        // 65536 pages is the whole 32-bit address space.
        if self.max_memory_pages > 65_536 {
            return Err(ConfigError::Invalid("max_memory_pages exceeds 65536"));
        }
        if self.max_call_depth < 0 {
            return Err(ConfigError::Invalid("max_call_depth must not be negative"));
        }
        Ok(())
    }

    /// Memory limit in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        (self.max_memory_pages as u64 * WASM_PAGE_SIZE) as usize
    }
}
