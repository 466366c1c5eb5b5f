//! The host function catalogue.
//!
//! Every function a contract may import is listed here once, as data:
//! module, name, parameter and result types, and the [`HostOp`] the bridge
//! dispatches on. Backends register the catalogue by looping over it, so the
//! linking contract is identical for every engine.
//!
//! Module `ethereum` is always present. Module `debug` is compiled in with
//! the `debug-eei` feature; without it, importing a debug function is an
//! unresolved import.

use eei_hostapi::CallKind;

use crate::error::ExecutionError;
use crate::validation::ImportShape;

/// Import module of the EEI proper.
pub const ETHEREUM_MODULE: &str = "ethereum";

/// Import module of the diagnostic functions.
pub const DEBUG_MODULE: &str = "debug";

/// Value types that appear in host function signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WasmType {
    I32,
    I64,
}

/// A value crossing the host boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmValue {
    I32(i32),
    I64(i64),
}

/// A function signature made of [`WasmType`]s only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub params: Vec<WasmType>,
    pub results: Vec<WasmType>,
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} -> {:?}", self.params, self.results)
    }
}

/// The operation a catalogue entry dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOp {
    UseGas,
    GetGasLeft,
    GetAddress,
    GetExternalBalance,
    GetBlockHash,
    Call(CallKind),
    CallDataCopy,
    GetCallDataSize,
    StorageStore,
    StorageLoad,
    GetCaller,
    GetCallValue,
    CodeCopy,
    GetCodeSize,
    GetBlockCoinbase,
    Create,
    GetBlockDifficulty,
    ExternalCodeCopy,
    GetExternalCodeSize,
    GetBlockGasLimit,
    GetTxGasPrice,
    Log,
    GetBlockNumber,
    GetTxOrigin,
    Finish,
    Revert,
    GetReturnDataSize,
    ReturnDataCopy,
    SelfDestruct,
    GetBlockTimestamp,
    #[cfg(feature = "debug-eei")]
    Print,
    #[cfg(feature = "debug-eei")]
    Print32,
    #[cfg(feature = "debug-eei")]
    Print64,
    #[cfg(feature = "debug-eei")]
    PrintMem,
    #[cfg(feature = "debug-eei")]
    PrintMemHex,
    #[cfg(feature = "debug-eei")]
    PrintStorage,
    #[cfg(feature = "debug-eei")]
    PrintStorageHex,
}

/// One catalogue entry.
#[derive(Debug, Clone, Copy)]
pub struct HostFunction {
    pub module: &'static str,
    pub name: &'static str,
    pub params: &'static [WasmType],
    pub results: &'static [WasmType],
    pub op: HostOp,
}

impl HostFunction {
    pub fn signature(&self) -> Signature {
        Signature {
            params: self.params.to_vec(),
            results: self.results.to_vec(),
        }
    }
}

use WasmType::{I32, I64};

const fn eth(
    name: &'static str,
    params: &'static [WasmType],
    results: &'static [WasmType],
    op: HostOp,
) -> HostFunction {
    HostFunction {
        module: ETHEREUM_MODULE,
        name,
        params,
        results,
        op,
    }
}

static ETHEREUM_FUNCTIONS: &[HostFunction] = &[
    eth("useGas", &[I64], &[], HostOp::UseGas),
    eth("getGasLeft", &[], &[I64], HostOp::GetGasLeft),
    eth("getAddress", &[I32], &[], HostOp::GetAddress),
    eth("getExternalBalance", &[I32, I32], &[], HostOp::GetExternalBalance),
    eth("getBlockHash", &[I64, I32], &[I32], HostOp::GetBlockHash),
    eth("call", &[I64, I32, I32, I32, I32], &[I32], HostOp::Call(CallKind::Call)),
    eth("callCode", &[I64, I32, I32, I32, I32], &[I32], HostOp::Call(CallKind::CallCode)),
    eth("callDelegate", &[I64, I32, I32, I32], &[I32], HostOp::Call(CallKind::CallDelegate)),
    eth("callStatic", &[I64, I32, I32, I32], &[I32], HostOp::Call(CallKind::CallStatic)),
    eth("callDataCopy", &[I32, I32, I32], &[], HostOp::CallDataCopy),
    eth("getCallDataSize", &[], &[I32], HostOp::GetCallDataSize),
    eth("storageStore", &[I32, I32], &[], HostOp::StorageStore),
    eth("storageLoad", &[I32, I32], &[], HostOp::StorageLoad),
    eth("getCaller", &[I32], &[], HostOp::GetCaller),
    eth("getCallValue", &[I32], &[], HostOp::GetCallValue),
    eth("codeCopy", &[I32, I32, I32], &[], HostOp::CodeCopy),
    eth("getCodeSize", &[], &[I32], HostOp::GetCodeSize),
    eth("getBlockCoinbase", &[I32], &[], HostOp::GetBlockCoinbase),
    eth("create", &[I32, I32, I32, I32], &[I32], HostOp::Create),
    eth("getBlockDifficulty", &[I32], &[], HostOp::GetBlockDifficulty),
    eth("externalCodeCopy", &[I32, I32, I32, I32], &[], HostOp::ExternalCodeCopy),
    eth("getExternalCodeSize", &[I32], &[I32], HostOp::GetExternalCodeSize),
    eth("getBlockGasLimit", &[], &[I64], HostOp::GetBlockGasLimit),
    eth("getTxGasPrice", &[I32], &[], HostOp::GetTxGasPrice),
    eth("log", &[I32, I32, I32, I32, I32, I32, I32], &[], HostOp::Log),
    eth("getBlockNumber", &[], &[I64], HostOp::GetBlockNumber),
    eth("getTxOrigin", &[I32], &[], HostOp::GetTxOrigin),
    eth("finish", &[I32, I32], &[], HostOp::Finish),
    eth("revert", &[I32, I32], &[], HostOp::Revert),
    eth("getReturnDataSize", &[], &[I32], HostOp::GetReturnDataSize),
    eth("returnDataCopy", &[I32, I32, I32], &[], HostOp::ReturnDataCopy),
    eth("selfDestruct", &[I32], &[], HostOp::SelfDestruct),
    eth("getBlockTimestamp", &[], &[I64], HostOp::GetBlockTimestamp),
];

#[cfg(feature = "debug-eei")]
const fn dbg(name: &'static str, params: &'static [WasmType], op: HostOp) -> HostFunction {
    HostFunction {
        module: DEBUG_MODULE,
        name,
        params,
        results: &[],
        op,
    }
}

#[cfg(feature = "debug-eei")]
static DEBUG_FUNCTIONS: &[HostFunction] = &[
    dbg("print", &[I32, I32], HostOp::Print),
    dbg("print32", &[I32], HostOp::Print32),
    dbg("print64", &[I64], HostOp::Print64),
    dbg("printMem", &[I32, I32], HostOp::PrintMem),
    dbg("printMemHex", &[I32, I32], HostOp::PrintMemHex),
    dbg("printStorage", &[I32], HostOp::PrintStorage),
    dbg("printStorageHex", &[I32], HostOp::PrintStorageHex),
];

#[cfg(feature = "debug-eei")]
fn debug_functions() -> &'static [HostFunction] {
    DEBUG_FUNCTIONS
}

#[cfg(not(feature = "debug-eei"))]
fn debug_functions() -> &'static [HostFunction] {
    &[]
}

/// Every host function available to contracts in this build.
pub fn catalogue() -> impl Iterator<Item = &'static HostFunction> {
    ETHEREUM_FUNCTIONS.iter().chain(debug_functions())
}

/// Find the catalogue entry for `module::name`.
pub fn lookup(module: &str, name: &str) -> Option<&'static HostFunction> {
    catalogue().find(|f| f.module == module && f.name == name)
}

/// Check that every import of a module resolves to a catalogue entry with
/// the same kind and signature.
pub fn resolve_imports(imports: &[ImportShape]) -> Result<(), ExecutionError> {
    for import in imports {
        let Some(entry) = lookup(&import.module, &import.name) else {
            return Err(ExecutionError::validation(format!(
                "unresolved import {}::{}",
                import.module, import.name
            )));
        };
        let Some(signature) = &import.signature else {
            return Err(ExecutionError::validation(format!(
                "import {}::{} must be a function over i32/i64",
                import.module, import.name
            )));
        };
        if entry.params != signature.params.as_slice()
            || entry.results != signature.results.as_slice()
        {
            return Err(ExecutionError::validation(format!(
                "import {}::{} has signature {}, expected {}",
                import.module,
                import.name,
                signature,
                entry.signature()
            )));
        }
    }
    Ok(())
}
