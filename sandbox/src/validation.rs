//! Contract module validation.
//!
//! Each backend describes a parsed module as a [`ModuleShape`]: its exports,
//! its imports and whether it declares a start function. The checks below
//! run on that shape, so both backends enforce exactly the same gate:
//!
//! 1. Exactly one memory export, named `memory`
//! 2. No start function
//! 3. An export `main` that is a function `() -> ()`
//!
//! Import resolution against the host catalogue lives in
//! [`crate::linker::resolve_imports`].

use wasmparser::{Parser, Payload};

use crate::error::ExecutionError;
use crate::linker::Signature;

/// Name of the required memory export.
pub const MEMORY_EXPORT: &str = "memory";

/// Name of the contract entry point.
pub const MAIN_EXPORT: &str = "main";

/// What an export refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    /// A function; `None` if its signature uses types other than i32/i64.
    Func(Option<Signature>),
    Memory,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportShape {
    pub name: String,
    pub kind: ExportKind,
}

/// One import. `signature` is `None` for non-function imports and for
/// functions whose signature uses types other than i32/i64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportShape {
    pub module: String,
    pub name: String,
    pub signature: Option<Signature>,
}

/// Backend-independent description of a parsed module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleShape {
    pub exports: Vec<ExportShape>,
    pub imports: Vec<ImportShape>,
    pub has_start: bool,
}

/// Whether the binary declares a start function.
///
/// Neither backend exposes this on its module type, so the section list is
/// scanned directly. Parse errors end the scan; the backend has already
/// rejected malformed binaries by the time this runs.
pub fn has_start_section(code: &[u8]) -> bool {
    Parser::new(0)
        .parse_all(code)
        .map_while(Result::ok)
        .any(|payload| matches!(payload, Payload::StartSection { .. }))
}

/// Run the structural gate over a module shape.
pub fn validate_shape(shape: &ModuleShape) -> Result<(), ExecutionError> {
    validate_memory(shape)?;
    if shape.has_start {
        return Err(ExecutionError::validation("start function is not allowed"));
    }
    validate_main(shape)
}

fn validate_memory(shape: &ModuleShape) -> Result<(), ExecutionError> {
    let memories: Vec<&ExportShape> = shape
        .exports
        .iter()
        .filter(|e| e.kind == ExportKind::Memory)
        .collect();

    match memories.as_slice() {
        [only] if only.name == MEMORY_EXPORT => Ok(()),
        [only] => Err(ExecutionError::validation(format!(
            "memory must be exported as '{}', found '{}'",
            MEMORY_EXPORT, only.name
        ))),
        other => Err(ExecutionError::validation(format!(
            "module must export exactly one memory, found {}",
            other.len()
        ))),
    }
}

fn validate_main(shape: &ModuleShape) -> Result<(), ExecutionError> {
    let export = shape
        .exports
        .iter()
        .find(|e| e.name == MAIN_EXPORT)
        .ok_or_else(|| ExecutionError::validation("missing required export: main"))?;

    match &export.kind {
        ExportKind::Func(Some(sig)) if sig.params.is_empty() && sig.results.is_empty() => Ok(()),
        ExportKind::Func(_) => Err(ExecutionError::validation(
            "export 'main' must take no parameters and return nothing",
        )),
        _ => Err(ExecutionError::validation("export 'main' must be a function")),
    }
}
