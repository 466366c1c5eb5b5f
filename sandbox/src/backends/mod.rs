//! Engine adapters.
//!
//! Each adapter is a public, stateless `WasmEngine` plus a crate-private
//! `Backend` implementation that the lifecycle driver runs. The two share
//! nothing but the catalogue, the bridge and the driver.

mod wasmi_engine;
mod wasmtime_engine;

pub use wasmi_engine::WasmiEngine;
pub use wasmtime_engine::WasmtimeEngine;

use crate::linker::{Signature, WasmType, WasmValue};

/// Build a catalogue signature from backend value types; `None` if any type
/// is not i32/i64.
fn signature<P, R>(params: P, results: R) -> Option<Signature>
where
    P: IntoIterator<Item = Option<WasmType>>,
    R: IntoIterator<Item = Option<WasmType>>,
{
    Some(Signature {
        params: params.into_iter().collect::<Option<Vec<_>>>()?,
        results: results.into_iter().collect::<Option<Vec<_>>>()?,
    })
}

/// Host call arguments in catalogue form. Entries of other types are
/// dropped; the backend has already checked them against the signature.
fn collect_args<V>(params: &[V], convert: impl Fn(&V) -> Option<WasmValue>) -> Vec<WasmValue> {
    params.iter().filter_map(convert).collect()
}
