//! The `HostContext` trait: the blockchain-side capabilities behind the EEI.
//!
//! The sandbox holds an `Arc<dyn HostContext>` for the duration of a single
//! execution and drops it on every exit path. Every method takes `&self`;
//! implementations that mutate state use interior mutability.
//!
//! Gas is not this trait's concern. The EEI bridge charges before it calls
//! into the host, so a host method only runs once its cost has been paid.

use std::sync::Arc;

use crate::types::{Address, Bytes32, CallOutcome, Message, TxContext};

/// World-state and block access for a running contract.
pub trait HostContext: Send + Sync {
    // ── Accounts ──

    /// Whether `address` names an existing account.
    fn account_exists(&self, address: &Address) -> bool;

    /// Balance of `address`; zero for unknown accounts.
    fn get_balance(&self, address: &Address) -> u128;

    /// Size of the code deployed at `address`.
    fn get_code_size(&self, address: &Address) -> usize;

    /// Copy code of `address` starting at `offset` into `buffer`.
    ///
    /// Returns the number of bytes copied; bytes past the end of the code are
    /// left untouched.
    fn copy_code(&self, address: &Address, offset: usize, buffer: &mut [u8]) -> usize;

    /// Schedule `address` for destruction, crediting its balance to
    /// `beneficiary`.
    fn selfdestruct(&self, address: &Address, beneficiary: &Address);

    // ── Storage ──

    /// Read a storage slot. Unset slots read as zero.
    fn get_storage(&self, address: &Address, key: &Bytes32) -> Bytes32;

    /// Write a storage slot.
    fn set_storage(&self, address: &Address, key: &Bytes32, value: &Bytes32);

    // ── Messages ──

    /// Execute a sub-message (call or creation) and report its outcome.
    fn call(&self, msg: &Message) -> CallOutcome;

    // ── Block & transaction ──

    fn get_tx_context(&self) -> TxContext;

    /// Hash of block `number`, or `None` if it is not available.
    fn get_block_hash(&self, number: i64) -> Option<Bytes32>;

    /// Append a log record emitted by `address`.
    fn emit_log(&self, address: &Address, data: &[u8], topics: &[Bytes32]);
}

/// Runs contract code on behalf of a host that services sub-messages.
///
/// The sandbox provides an implementation backed by its WASM engines; a host
/// that wants nested calls to execute code holds one of these.
pub trait SubExecutor: Send + Sync {
    /// Execute `code` for `msg` against `host`. Traps are reported as a
    /// `Failure` outcome, never as a panic.
    fn execute(&self, host: Arc<dyn HostContext>, code: &[u8], msg: &Message) -> CallOutcome;
}
