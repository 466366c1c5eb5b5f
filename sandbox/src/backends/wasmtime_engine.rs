//! Wasmtime adapter.
//!
//! Engine configuration keeps execution deterministic: no threads, no SIMD,
//! no multi-memory, canonical NaNs. Fuel is enabled when the configuration
//! sets a limit.

use std::sync::Arc;

use eei_hostapi::{ExecutionResult, HostContext, HostError, Message};
use wasmtime::{
    Caller, Config, Engine, Extern, ExternType, FuncType, Instance, Linker, Module, Store,
    StoreLimits, StoreLimitsBuilder, Val, ValType,
};

use super::{collect_args, signature};
use crate::config::EngineConfig;
use crate::error::ExecutionError;
use crate::host_impl::EeiHost;
use crate::linker::{catalogue, HostOp, WasmType, WasmValue};
use crate::memory::{checked_range, MemoryAccessor};
use crate::runtime::{drive, Backend, WasmEngine};
use crate::validation::{ExportKind, ExportShape, ImportShape, ModuleShape};

/// Runs contracts on Wasmtime.
#[derive(Debug, Clone, Default)]
pub struct WasmtimeEngine {
    config: EngineConfig,
}

impl WasmtimeEngine {
    /// A Wasmtime engine with default configuration.
    pub fn create() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl WasmEngine for WasmtimeEngine {
    fn name(&self) -> &'static str {
        Wasmtime::NAME
    }

    fn execute(
        &self,
        host: Arc<dyn HostContext>,
        code: &[u8],
        state_code: &[u8],
        msg: &Message,
        meter_interface_gas: bool,
    ) -> Result<ExecutionResult, ExecutionError> {
        drive::<Wasmtime>(&self.config, host, code, state_code, msg, meter_interface_gas)
    }
}

// ── Memory ──

/// Linear memory of the calling instance, borrowed for one host call.
struct WasmtimeMemory<'a> {
    data: &'a mut [u8],
}

impl MemoryAccessor for WasmtimeMemory<'_> {
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

// ── Backend ──

/// Per-store data: the bridge plus the memory limiter.
struct StoreData {
    host: EeiHost,
    limits: StoreLimits,
}

struct Running {
    store: Store<StoreData>,
    instance: Instance,
}

struct Wasmtime;

impl Backend for Wasmtime {
    type Engine = Engine;
    type Module = Module;
    type Linked = Linker<StoreData>;
    type Instance = Running;
    type Error = anyhow::Error;

    const NAME: &'static str = "wasmtime";

    fn new_engine(config: &EngineConfig) -> anyhow::Result<Engine> {
        let mut wasm_config = Config::new();

        // Fuel metering, a safety net against runaway loops
        wasm_config.consume_fuel(config.fuel_limit.is_some());

        // Determinism enforcement
        wasm_config.wasm_threads(false);
        wasm_config.wasm_simd(false);
        wasm_config.wasm_relaxed_simd(false);
        wasm_config.wasm_multi_memory(false);
        wasm_config.cranelift_nan_canonicalization(true);

        Engine::new(&wasm_config)
    }

    fn load(engine: &Engine, code: &[u8]) -> anyhow::Result<Module> {
        Module::from_binary(engine, code)
    }

    fn shape(module: &Module) -> ModuleShape {
        let exports = module
            .exports()
            .map(|export| ExportShape {
                name: export.name().to_string(),
                kind: match export.ty() {
                    ExternType::Func(f) => ExportKind::Func(func_signature(&f)),
                    ExternType::Memory(_) => ExportKind::Memory,
                    _ => ExportKind::Other,
                },
            })
            .collect();
        let imports = module
            .imports()
            .map(|import| ImportShape {
                module: import.module().to_string(),
                name: import.name().to_string(),
                signature: match import.ty() {
                    ExternType::Func(f) => func_signature(&f),
                    _ => None,
                },
            })
            .collect();
        ModuleShape {
            exports,
            imports,
            has_start: false,
        }
    }

    fn link(engine: &Engine) -> anyhow::Result<Linker<StoreData>> {
        let mut linker = Linker::new(engine);
        for function in catalogue() {
            let ty = FuncType::new(
                engine,
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
    ) -> anyhow::Result<Running> {
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
        let instance = linked.instantiate(&mut store, module)?;
        Ok(Running { store, instance })
    }

    fn call_main(running: &mut Running) -> anyhow::Result<()> {
        let main = running
            .instance
            .get_typed_func::<(), ()>(&mut running.store, "main")?;
        main.call(&mut running.store, ())
    }

    fn into_host(running: Running) -> EeiHost {
        running.store.into_data().host
    }
}

/// Entry point of every registered host function.
fn call_host(
    mut caller: Caller<'_, StoreData>,
    op: HostOp,
    params: &[Val],
    results: &mut [Val],
) -> anyhow::Result<()> {
    let args = collect_args(params, |v| match v {
        Val::I32(x) => Some(WasmValue::I32(*x)),
        Val::I64(x) => Some(WasmValue::I64(*x)),
        _ => None,
    });

    let Some(memory) = caller.get_export("memory").and_then(Extern::into_memory) else {
        return Err(caller.data_mut().host.fail(HostError::MissingMemory).into());
    };
    let (data, store) = memory.data_and_store_mut(&mut caller);
    let value = store.host.invoke(op, &args, &mut WasmtimeMemory { data })?;

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

fn wasm_type(ty: ValType) -> Option<WasmType> {
    match ty {
        ValType::I32 => Some(WasmType::I32),
        ValType::I64 => Some(WasmType::I64),
        _ => None,
    }
}

fn func_signature(ty: &FuncType) -> Option<crate::linker::Signature> {
    signature(ty.params().map(wasm_type), ty.results().map(wasm_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_engine() {
        assert!(Wasmtime::new_engine(&EngineConfig::default()).is_ok());
        let no_fuel = EngineConfig {
            fuel_limit: None,
            ..EngineConfig::default()
        };
        assert!(Wasmtime::new_engine(&no_fuel).is_ok());
    }

    #[test]
    fn test_rejects_text_format() {
        let engine = Wasmtime::new_engine(&EngineConfig::default()).unwrap();
        assert!(Wasmtime::load(&engine, br#"(module)"#).is_err());
        assert!(Wasmtime::load(&engine, &[]).is_err());
    }

    #[test]
    fn test_catalogue_links() {
        let engine = Wasmtime::new_engine(&EngineConfig::default()).unwrap();
        assert!(Wasmtime::link(&engine).is_ok());
    }

    #[test]
    fn test_shape_describes_module() {
        let engine = Wasmtime::new_engine(&EngineConfig::default()).unwrap();
        let code = wat::parse_str(
            r#"(module
                (import "ethereum" "useGas" (func (param i64)))
                (memory (export "memory") 1)
                (func (export "main")))"#,
        )
        .unwrap();
        let module = Wasmtime::load(&engine, &code).unwrap();
        let shape = Wasmtime::shape(&module);

        assert_eq!(shape.imports.len(), 1);
        assert_eq!(shape.imports[0].name, "useGas");
        assert_eq!(
            shape.imports[0].signature.as_ref().map(|s| s.params.clone()),
            Some(vec![WasmType::I64])
        );
        assert!(shape
            .exports
            .iter()
            .any(|e| e.name == "memory" && e.kind == ExportKind::Memory));
    }
}
