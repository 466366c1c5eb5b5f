//! Engine-agnostic execution: the `WasmEngine` interface, the lifecycle
//! driver shared by every backend, and the engine factory.
//!
//! One call to [`WasmEngine::execute`] walks a fixed state machine:
//!
//! ```text
//! Created → Loading → Validated → Linked → Instantiated → Running → Finished
//!                                  (any phase) → Failed
//! ```
//!
//! The walk is implemented once, in [`drive`], over the [`Backend`] trait.
//! Each adapter only supplies the backend-specific steps (parse, describe,
//! link, instantiate, call `main`). Backend objects are created inside
//! `execute` and dropped on every exit path.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use eei_hostapi::{CallOutcome, CallStatus, ExecutionResult, HostContext, Message, SubExecutor};

use crate::backends::{WasmiEngine, WasmtimeEngine};
use crate::config::{EngineConfig, EngineKind};
use crate::error::{ExecutionError, Interrupt};
use crate::host_impl::EeiHost;
use crate::linker;
use crate::validation::{self, ModuleShape};

/// The uniform entry point for running a contract.
///
/// Implementations are stateless selectors: they hold configuration only
/// and allocate backend resources per call.
pub trait WasmEngine: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Run `code` for `msg` against `host`.
    ///
    /// `state_code` is what the contract sees through `getCodeSize` and
    /// `codeCopy`. With `meter_interface_gas` set, host operations charge
    /// their interface cost on top of `useGas`.
    fn execute(
        &self,
        host: Arc<dyn HostContext>,
        code: &[u8],
        state_code: &[u8],
        msg: &Message,
        meter_interface_gas: bool,
    ) -> Result<ExecutionResult, ExecutionError>;
}

/// Build the engine for `kind`.
pub fn create(kind: EngineKind, config: EngineConfig) -> Box<dyn WasmEngine> {
    match kind {
        EngineKind::Wasmtime => Box::new(WasmtimeEngine::with_config(config)),
        EngineKind::Wasmi => Box::new(WasmiEngine::with_config(config)),
    }
}

/// Build the engine named by `config.engine`.
pub fn from_config(config: EngineConfig) -> Box<dyn WasmEngine> {
    create(config.engine, config)
}

/// Native stack reserved for each nested execution.
///
/// One level needs room for the guest's own wasm stack plus backend
/// compilation and the host call path.
pub const NESTED_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Runs sub-calls and creations through a [`WasmEngine`].
///
/// Installed into a host (for example `MemHost::set_executor`) so nested
/// messages execute through the same machinery as the outer one. Each
/// nested execution gets its own thread with a [`NESTED_STACK_SIZE`] stack,
/// so call depth never accumulates on a single native stack. The calling
/// thread blocks until the callee returns; execution stays sequential.
pub struct NestedExecutor {
    engine: Box<dyn WasmEngine>,
    meter_interface_gas: bool,
}

impl NestedExecutor {
    pub fn new(engine: Box<dyn WasmEngine>, meter_interface_gas: bool) -> Self {
        Self {
            engine,
            meter_interface_gas,
        }
    }

    fn run(&self, host: Arc<dyn HostContext>, code: &[u8], msg: &Message) -> CallOutcome {
        match self
            .engine
            .execute(host, code, code, msg, self.meter_interface_gas)
        {
            Ok(result) => result.into_outcome(msg.gas),
            Err(err) => {
                tracing::debug!(engine = self.engine.name(), depth = msg.depth, error = %err, "nested execution failed");
                trapped(msg)
            }
        }
    }
}

/// A trapped callee keeps no output and burns everything it was given.
fn trapped(msg: &Message) -> CallOutcome {
    let result = ExecutionResult::failure(u64::try_from(msg.gas).unwrap_or(0));
    CallOutcome {
        status: CallStatus::Failure,
        ..result.into_outcome(msg.gas)
    }
}

impl SubExecutor for NestedExecutor {
    fn execute(&self, host: Arc<dyn HostContext>, code: &[u8], msg: &Message) -> CallOutcome {
        let joined = thread::scope(|scope| {
            thread::Builder::new()
                .name(format!("eei-depth-{}", msg.depth))
                .stack_size(NESTED_STACK_SIZE)
                .spawn_scoped(scope, move || self.run(host, code, msg))
                .map(|handle| handle.join())
        });
        match joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                tracing::warn!(engine = self.engine.name(), depth = msg.depth, "nested execution panicked");
                trapped(msg)
            }
            Err(err) => {
                tracing::warn!(engine = self.engine.name(), depth = msg.depth, error = %err, "nested execution thread not started");
                trapped(msg)
            }
        }
    }
}

// ── Lifecycle ──

/// Phases of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Loading,
    Validated,
    Linked,
    Instantiated,
    Running,
    Finished,
    Failed,
}

impl Phase {
    fn successor(self) -> Option<Phase> {
        match self {
            Self::Created => Some(Self::Loading),
            Self::Loading => Some(Self::Validated),
            Self::Validated => Some(Self::Linked),
            Self::Linked => Some(Self::Instantiated),
            Self::Instantiated => Some(Self::Running),
            Self::Running => Some(Self::Finished),
            Self::Finished | Self::Failed => None,
        }
    }
}

/// Tracks and logs the phase of one execution.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    engine: &'static str,
    phase: Phase,
}

impl Lifecycle {
    pub(crate) fn new(engine: &'static str) -> Self {
        Self {
            engine,
            phase: Phase::Created,
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to the next phase. Phases are never skipped.
    pub(crate) fn advance(&mut self) {
        if let Some(next) = self.phase.successor() {
            tracing::trace!(engine = self.engine, from = ?self.phase, to = ?next, "phase transition");
            self.phase = next;
        }
    }

    /// Enter `Failed`, logging the backend detail, and hand back `err`.
    pub(crate) fn fail(&mut self, err: ExecutionError, detail: &dyn fmt::Display) -> ExecutionError {
        tracing::debug!(engine = self.engine, phase = ?self.phase, error = %err, %detail, "execution failed");
        self.phase = Phase::Failed;
        err
    }
}

/// The backend-specific steps of an execution.
///
/// Errors are backend values; [`drive`] decides what each one means and
/// only logs their detail.
pub(crate) trait Backend {
    /// Compilation/interpretation engine.
    type Engine;
    type Module;
    /// Linker with the host catalogue registered.
    type Linked;
    /// Store plus instance, ready to run `main`.
    type Instance;
    type Error: fmt::Display;

    const NAME: &'static str;

    fn new_engine(config: &EngineConfig) -> Result<Self::Engine, Self::Error>;

    /// Parse a binary module. Text format is not accepted.
    fn load(engine: &Self::Engine, code: &[u8]) -> Result<Self::Module, Self::Error>;

    /// Describe the module's exports and imports.
    fn shape(module: &Self::Module) -> ModuleShape;

    fn link(engine: &Self::Engine) -> Result<Self::Linked, Self::Error>;

    /// Allocate the store and memory. Never runs contract code.
    fn instantiate(
        engine: &Self::Engine,
        linked: &Self::Linked,
        module: &Self::Module,
        host: EeiHost,
        config: &EngineConfig,
    ) -> Result<Self::Instance, Self::Error>;

    fn call_main(instance: &mut Self::Instance) -> Result<(), Self::Error>;

    /// Tear down the store and recover the bridge state.
    fn into_host(instance: Self::Instance) -> EeiHost;
}

/// Run one execution through backend `B`.
pub(crate) fn drive<B: Backend>(
    config: &EngineConfig,
    host: Arc<dyn HostContext>,
    code: &[u8],
    state_code: &[u8],
    msg: &Message,
    meter_interface_gas: bool,
) -> Result<ExecutionResult, ExecutionError> {
    let mut lifecycle = Lifecycle::new(B::NAME);

    let engine = B::new_engine(config).map_err(|e| lifecycle.fail(ExecutionError::VmTrap, &e))?;

    // ── Loading → Validated ──
    lifecycle.advance();
    let module = B::load(&engine, code).map_err(|e| {
        lifecycle.fail(ExecutionError::validation(format!("malformed module: {e}")), &e)
    })?;
    let mut shape = B::shape(&module);
    shape.has_start = validation::has_start_section(code);
    validation::validate_shape(&shape).map_err(|e| lifecycle.fail(e, &"module shape rejected"))?;
    lifecycle.advance();

    // ── Validated → Linked ──
    linker::resolve_imports(&shape.imports).map_err(|e| lifecycle.fail(e, &"import resolution"))?;
    let linked = B::link(&engine).map_err(|e| lifecycle.fail(ExecutionError::VmTrap, &e))?;
    lifecycle.advance();

    // ── Linked → Instantiated ──
    let started = Instant::now();
    tracing::debug!(engine = B::NAME, depth = msg.depth, gas = msg.gas, "instantiation start");
    let bridge = EeiHost::new(host, state_code, msg, meter_interface_gas, config);
    let mut instance = B::instantiate(&engine, &linked, &module, bridge, config)
        .map_err(|e| lifecycle.fail(ExecutionError::VmTrap, &e))?;
    lifecycle.advance();

    // ── Running ──
    lifecycle.advance();
    tracing::debug!(engine = B::NAME, elapsed_us = started.elapsed().as_micros() as u64, "execution start");
    let outcome = B::call_main(&mut instance);
    let mut bridge = B::into_host(instance);
    tracing::debug!(
        engine = B::NAME,
        elapsed_us = started.elapsed().as_micros() as u64,
        gas_used = bridge.gas_used(),
        "execution end"
    );

    match (outcome, bridge.take_interrupt()) {
        (Ok(()), _) => {
            lifecycle.advance();
            Ok(bridge.into_result(None))
        }
        (Err(_), Some(Interrupt::Terminated(termination))) => {
            lifecycle.advance();
            tracing::debug!(engine = B::NAME, ?termination, "contract terminated");
            Ok(bridge.into_result(Some(termination)))
        }
        (Err(e), Some(Interrupt::Failed(fault))) => Err(lifecycle.fail(fault.into(), &e)),
        (Err(e), None) => Err(lifecycle.fail(ExecutionError::VmTrap, &e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        let mut lifecycle = Lifecycle::new("test");
        let expected = [
            Phase::Loading,
            Phase::Validated,
            Phase::Linked,
            Phase::Instantiated,
            Phase::Running,
            Phase::Finished,
        ];
        for phase in expected {
            lifecycle.advance();
            assert_eq!(lifecycle.phase(), phase);
        }
        // Terminal.
        lifecycle.advance();
        assert_eq!(lifecycle.phase(), Phase::Finished);
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut lifecycle = Lifecycle::new("test");
        lifecycle.advance();
        let err = lifecycle.fail(ExecutionError::VmTrap, &"boom");
        assert_eq!(err, ExecutionError::VmTrap);
        assert_eq!(lifecycle.phase(), Phase::Failed);
        lifecycle.advance();
        assert_eq!(lifecycle.phase(), Phase::Failed);
    }

    #[test]
    fn test_trapped_callee_burns_forwarded_gas() {
        let outcome = trapped(&Message::call([1; 20], [2; 20], 5_000));
        assert_eq!(outcome.status, CallStatus::Failure);
        assert_eq!(outcome.gas_left, 0);
        assert!(outcome.output.is_empty());
        assert_eq!(outcome.created_address, None);
    }

    #[test]
    fn test_factory_selects_backend() {
        assert_eq!(create(EngineKind::Wasmtime, EngineConfig::default()).name(), "wasmtime");
        assert_eq!(create(EngineKind::Wasmi, EngineConfig::default()).name(), "wasmi");

        let config = EngineConfig {
            engine: EngineKind::Wasmi,
            ..EngineConfig::default()
        };
        assert_eq!(from_config(config).name(), "wasmi");
    }
}
