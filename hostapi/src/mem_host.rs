//! In-memory `HostContext` for tests and embedding.
//!
//! `MemHost` keeps a small world state (accounts with balance, nonce, code
//! and storage), the emitted logs and self-destruct records, all behind a
//! single `parking_lot::Mutex`. `BTreeMap` keeps iteration deterministic.
//!
//! Sub-messages run through an optional [`SubExecutor`]. Without one, calls
//! succeed without running code. The world is snapshotted before a
//! sub-message and restored if it does not succeed; the lock is never held
//! while code executes, so nested executions can re-enter the host.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::traits::{HostContext, SubExecutor};
use crate::types::{
    is_zero, Address, Bytes32, CallOutcome, CallStatus, Message, MessageKind, TxContext, ZERO_WORD,
};

/// One account in the in-memory world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: u128,
    pub nonce: u64,
    pub code: Vec<u8>,
    pub storage: BTreeMap<Bytes32, Bytes32>,
}

/// A log record as emitted by a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub address: Address,
    pub data: Vec<u8>,
    pub topics: Vec<Bytes32>,
}

#[derive(Debug, Clone, Default)]
struct World {
    accounts: BTreeMap<Address, Account>,
    logs: Vec<LogRecord>,
    /// `(destructed, beneficiary)` pairs in call order.
    destructed: Vec<(Address, Address)>,
}

/// In-memory host backed by `BTreeMap` world state.
pub struct MemHost {
    this: Weak<MemHost>,
    world: Mutex<World>,
    tx: Mutex<TxContext>,
    block_hashes: Mutex<BTreeMap<i64, Bytes32>>,
    executor: Mutex<Option<Arc<dyn SubExecutor>>>,
}

impl std::fmt::Debug for MemHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemHost")
            .field("world", &*self.world.lock())
            .field("tx", &*self.tx.lock())
            .finish_non_exhaustive()
    }
}

impl MemHost {
    /// Create an empty host.
    ///
    /// Returned as an `Arc` because sub-message execution hands the host
    /// itself back to the executor.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            world: Mutex::new(World::default()),
            tx: Mutex::new(TxContext::default()),
            block_hashes: Mutex::new(BTreeMap::new()),
            executor: Mutex::new(None),
        })
    }

    /// Install the executor used for sub-calls and creations.
    pub fn set_executor(&self, executor: Arc<dyn SubExecutor>) {
        *self.executor.lock() = Some(executor);
    }

    // ── Setup ──

    pub fn set_balance(&self, address: Address, balance: u128) {
        self.world.lock().accounts.entry(address).or_default().balance = balance;
    }

    pub fn set_code(&self, address: Address, code: impl Into<Vec<u8>>) {
        self.world.lock().accounts.entry(address).or_default().code = code.into();
    }

    pub fn set_tx_context(&self, tx: TxContext) {
        *self.tx.lock() = tx;
    }

    pub fn set_block_hash(&self, number: i64, hash: Bytes32) {
        self.block_hashes.lock().insert(number, hash);
    }

    // ── Inspection ──

    /// Snapshot of the account at `address`, if it exists.
    pub fn account(&self, address: &Address) -> Option<Account> {
        self.world.lock().accounts.get(address).cloned()
    }

    /// Code deployed at `address` (empty for unknown accounts).
    pub fn code(&self, address: &Address) -> Vec<u8> {
        self.account(address).map(|a| a.code).unwrap_or_default()
    }

    pub fn logs(&self) -> Vec<LogRecord> {
        self.world.lock().logs.clone()
    }

    pub fn destructed(&self) -> Vec<(Address, Address)> {
        self.world.lock().destructed.clone()
    }

    // ── Sub-messages ──

    fn executor(&self) -> Option<Arc<dyn SubExecutor>> {
        self.executor.lock().clone()
    }

    fn as_context(&self) -> Option<Arc<dyn HostContext>> {
        self.this.upgrade().map(|host| host as Arc<dyn HostContext>)
    }

    /// Run `code` for `msg`, restoring the world from `snapshot` unless the
    /// execution succeeds.
    fn run(&self, code: &[u8], msg: &Message, snapshot: World) -> CallOutcome {
        let outcome = match (self.executor(), self.as_context()) {
            (Some(executor), Some(host)) if !code.is_empty() => executor.execute(host, code, msg),
            _ => CallOutcome::empty_success(msg.gas),
        };
        if outcome.status != CallStatus::Success {
            tracing::debug!(status = ?outcome.status, depth = msg.depth, "sub-message rolled back");
            *self.world.lock() = snapshot;
        }
        outcome
    }

    fn call_message(&self, msg: &Message) -> CallOutcome {
        let destination = msg.recipient();
        let (code, snapshot) = {
            let mut world = self.world.lock();
            let snapshot = world.clone();
            if msg.kind == MessageKind::Call && msg.value > 0 {
                let balance = world.accounts.get(&msg.sender).map_or(0, |a| a.balance);
                if balance < msg.value {
                    return CallOutcome::failure();
                }
                world.accounts.entry(msg.sender).or_default().balance -= msg.value;
                credit(&mut world, destination, msg.value);
            }
            let code = world
                .accounts
                .get(&msg.code_owner())
                .map(|a| a.code.clone())
                .unwrap_or_default();
            (code, snapshot)
        };
        tracing::debug!(kind = ?msg.kind, depth = msg.depth, code_len = code.len(), "sub-call");
        self.run(&code, msg, snapshot)
    }

    fn create_message(&self, msg: &Message) -> CallOutcome {
        let (address, snapshot) = {
            let mut world = self.world.lock();
            let sender = world.accounts.entry(msg.sender).or_default();
            if sender.balance < msg.value {
                return CallOutcome::failure();
            }
            let address = derive_address(&msg.sender, sender.nonce);
            sender.nonce += 1;
            let snapshot = world.clone();

            let sender = world.accounts.entry(msg.sender).or_default();
            sender.balance -= msg.value;
            credit(&mut world, address, msg.value);
            (address, snapshot)
        };
        tracing::debug!(depth = msg.depth, address = ?address, "create");

        let init = Message {
            destination: Some(address),
            code_address: None,
            input: Vec::new(),
            ..msg.clone()
        };
        let mut outcome = self.run(&msg.input, &init, snapshot);
        if outcome.status == CallStatus::Success {
            self.world.lock().accounts.entry(address).or_default().code =
                std::mem::take(&mut outcome.output);
            outcome.created_address = Some(address);
        }
        outcome
    }
}

fn credit(world: &mut World, address: Address, amount: u128) {
    let account = world.accounts.entry(address).or_default();
    account.balance = account.balance.saturating_add(amount);
}

/// Address of the contract created by `sender` at `nonce`: the first 20
/// bytes of `blake3(sender || nonce_le)`.
pub fn derive_address(sender: &Address, nonce: u64) -> Address {
    let mut hasher = blake3::Hasher::new();
    hasher.update(sender);
    hasher.update(&nonce.to_le_bytes());
    let hash = hasher.finalize();
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash.as_bytes()[..20]);
    address
}

impl HostContext for MemHost {
    fn account_exists(&self, address: &Address) -> bool {
        self.world.lock().accounts.contains_key(address)
    }

    fn get_balance(&self, address: &Address) -> u128 {
        self.world
            .lock()
            .accounts
            .get(address)
            .map_or(0, |a| a.balance)
    }

    fn get_code_size(&self, address: &Address) -> usize {
        self.world
            .lock()
            .accounts
            .get(address)
            .map_or(0, |a| a.code.len())
    }

    fn copy_code(&self, address: &Address, offset: usize, buffer: &mut [u8]) -> usize {
        let world = self.world.lock();
        let Some(code) = world.accounts.get(address).map(|a| &a.code) else {
            return 0;
        };
        let start = offset.min(code.len());
        let n = buffer.len().min(code.len() - start);
        buffer[..n].copy_from_slice(&code[start..start + n]);
        n
    }

    fn selfdestruct(&self, address: &Address, beneficiary: &Address) {
        let mut world = self.world.lock();
        let balance = world
            .accounts
            .get_mut(address)
            .map_or(0, |a| std::mem::take(&mut a.balance));
        credit(&mut world, *beneficiary, balance);
        world.destructed.push((*address, *beneficiary));
    }

    fn get_storage(&self, address: &Address, key: &Bytes32) -> Bytes32 {
        self.world
            .lock()
            .accounts
            .get(address)
            .and_then(|a| a.storage.get(key).copied())
            .unwrap_or(ZERO_WORD)
    }

    fn set_storage(&self, address: &Address, key: &Bytes32, value: &Bytes32) {
        let mut world = self.world.lock();
        let storage = &mut world.accounts.entry(*address).or_default().storage;
        if is_zero(value) {
            storage.remove(key);
        } else {
            storage.insert(*key, *value);
        }
    }

    fn call(&self, msg: &Message) -> CallOutcome {
        match msg.kind {
            MessageKind::Create => self.create_message(msg),
            _ => self.call_message(msg),
        }
    }

    fn get_tx_context(&self) -> TxContext {
        self.tx.lock().clone()
    }

    fn get_block_hash(&self, number: i64) -> Option<Bytes32> {
        self.block_hashes.lock().get(&number).copied()
    }

    fn emit_log(&self, address: &Address, data: &[u8], topics: &[Bytes32]) {
        self.world.lock().logs.push(LogRecord {
            address: *address,
            data: data.to_vec(),
            topics: topics.to_vec(),
        });
    }
}
