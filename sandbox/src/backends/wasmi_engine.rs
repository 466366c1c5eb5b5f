//! Wasmi adapter.
//!
//! An interpreter needs no determinism switches beyond what it supports;
//! fuel is enabled when the configuration sets a limit. Start functions are
//! rejected before instantiation, and `ensure_no_start` holds the line.

use std::sync::Arc;

use eei_hostapi::{ExecutionResult, HostContext, HostError, Message};
use wasmi::core::ValType;
use wasmi::{
    Caller, Config, Engine, Extern, ExternType, FuncType, Instance, Linker, Module, Store,
    StoreLimits, StoreLimitsBuilder, Val,
};

use super::{collect_args, signature};
use crate::config::EngineConfig;
use crate::error::ExecutionError;
use crate::host_impl::EeiHost;
use crate::linker::{catalogue, HostOp, Signature, WasmType, WasmValue};
use crate::memory::{checked_range, MemoryAccessor};
use crate::runtime::{drive, Backend, WasmEngine};
use crate::validation::{ExportKind, ExportShape, ImportShape, ModuleShape};

/// Runs contracts on the wasmi interpreter.
#[derive(Debug, Clone, Default)]
pub struct WasmiEngine {
    config: EngineConfig,
}

impl WasmiEngine {
    /// A wasmi engine with default configuration.
    pub fn create() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl WasmEngine for WasmiEngine {
    fn name(&self) -> &'static str {
        Wasmi::NAME
    }

    fn execute(
        &self,
        host: Arc<dyn HostContext>,
        code: &[u8],
        state_code: &[u8],
        msg: &Message,
        meter_interface_gas: bool,
    ) -> Result<ExecutionResult, ExecutionError> {
        drive::<Wasmi>(&self.config, host, code, state_code, msg, meter_interface_gas)
    }
}

struct WasmiMemory<'a> {
    data: &'a mut [u8],
}

impl MemoryAccessor for WasmiMemory<'_> {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn range(&self, offset: u32, length: u32) -> Result<&[u8], HostError> {
        let r = checked_range(offset, length, self.data.len())?;
        Ok(&self.data[r])
    }

    fn range_mut(&mut self, offset: u32, length: u32) -> Result<&mut [u8], HostError> {
        let r = checked_range(offset, length, self.data.len())?;
        Ok(&mut self.data[r])
    }
}

struct StoreData {
    host: EeiHost,
    limits: StoreLimits,
}

struct Running {
    store: Store<StoreData>,
    instance: Instance,
}

struct Wasmi;

impl Backend for Wasmi {
    type Engine = Engine;
    type Module = Module;
    type Linked = Linker<StoreData>;
    type Instance = Running;
    type Error = wasmi::Error;

    const NAME: &'static str = "wasmi";

    fn new_engine(config: &EngineConfig) -> Result<Engine, wasmi::Error> {
        let mut wasm_config = Config::default();
        wasm_config.consume_fuel(config.fuel_limit.is_some());
        Ok(Engine::new(&wasm_config))
    }

    fn load(engine: &Engine, code: &[u8]) -> Result<Module, wasmi::Error> {
        Module::new(engine, code)
    }

    fn shape(module: &Module) -> ModuleShape {
        ModuleShape {
            exports: module
                .exports()
                .map(|export| ExportShape {
                    name: export.name().to_string(),
                    kind: match export.ty().clone() {
                        ExternType::Func(f) => ExportKind::Func(func_signature(&f)),
                        ExternType::Memory(_) => ExportKind::Memory,
                        _ => ExportKind::Other,
                    },
                })
                .collect(),
            imports: module
                .imports()
                .map(|import| ImportShape {
                    module: import.module().to_string(),
                    name: import.name().to_string(),
                    signature: match import.ty().clone() {
                        ExternType::Func(f) => func_signature(&f),
                        _ => None,
                    },
                })
                .collect(),
            has_start: false,
        }
    }

    fn link(engine: &Engine) -> Result<Linker<StoreData>, wasmi::Error> {
        let mut linker = Linker::<StoreData>::new(engine);
        for function in catalogue() {
            let ty = FuncType::new(
                function.params.iter().copied().map(val_type),
                function.results.iter().copied().map(val_type),
            );
            let op = function.op;
            linker.func_new(function.module, function.name, ty, move |caller, params, results| {
                call_host(caller, op, params, results)
            })?;
        }
        Ok(linker)
    }

    fn instantiate(
        engine: &Engine,
        linked: &Linker<StoreData>,
        module: &Module,
        host: EeiHost,
        config: &EngineConfig,
    ) -> Result<Running, wasmi::Error> {
        let data = StoreData {
            host,
            limits: StoreLimitsBuilder::new()
                .memory_size(config.max_memory_bytes())
                .build(),
        };
        let mut store = Store::new(engine, data);
        store.limiter(|data| &mut data.limits);
        if let Some(fuel) = config.fuel_limit {
            store.set_fuel(fuel)?;
        }
        let instance = linked
            .instantiate(&mut store, module)?
            .ensure_no_start(&mut store)?;
        Ok(Running { store, instance })
    }

    fn call_main(running: &mut Running) -> Result<(), wasmi::Error> {
        let main = running
            .instance
            .get_typed_func::<(), ()>(&running.store, "main")?;
        main.call(&mut running.store, ())
    }

    fn into_host(running: Running) -> EeiHost {
        running.store.into_data().host
    }
}

fn call_host(
    mut caller: Caller<'_, StoreData>,
    op: HostOp,
    params: &[Val],
    results: &mut [Val],
) -> Result<(), wasmi::Error> {
    let args = collect_args(params, |v| match v {
        Val::I32(x) => Some(WasmValue::I32(*x)),
        Val::I64(x) => Some(WasmValue::I64(*x)),
        _ => None,
    });

    let Some(memory) = caller.get_export("memory").and_then(Extern::into_memory) else {
        let interrupt = caller.data_mut().host.fail(HostError::MissingMemory);
        return Err(wasmi::Error::host(interrupt));
    };
    let (data, store) = memory.data_and_store_mut(&mut caller);
    let value = store
        .host
        .invoke(op, &args, &mut WasmiMemory { data })
        .map_err(wasmi::Error::host)?;

    if let (Some(value), Some(slot)) = (value, results.first_mut()) {
        *slot = match value {
            WasmValue::I32(x) => Val::I32(x),
            WasmValue::I64(x) => Val::I64(x),
        };
    }
    Ok(())
}

fn val_type(ty: WasmType) -> ValType {
    match ty {
        WasmType::I32 => ValType::I32,
        WasmType::I64 => ValType::I64,
    }
}

fn wasm_type(ty: &ValType) -> Option<WasmType> {
    match ty {
        ValType::I32 => Some(WasmType::I32),
        ValType::I64 => Some(WasmType::I64),
        _ => None,
    }
}

fn func_signature(ty: &FuncType) -> Option<Signature> {
    signature(
        ty.params().iter().map(wasm_type),
        ty.results().iter().map(wasm_type),
    )
}
