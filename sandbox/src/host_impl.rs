//! The EEI bridge: per-execution host state and every environment operation.
//!
//! `EeiHost` lives inside the backend's store for the duration of one
//! execution. Backends call [`EeiHost::invoke`] with the catalogue's
//! [`HostOp`], the raw arguments and a [`MemoryAccessor`] over the caller's
//! linear memory. Nothing in here knows which backend is running.
//!
//! An operation that must stop the guest (a deliberate `finish`, `revert`
//! or `selfDestruct`, or a fault) records an [`Interrupt`] and hands the
//! backend an opaque [`HostInterrupt`]. The adapter reads the recorded
//! interrupt once `main` has unwound.
//!
//! Gas: `useGas` and the gas forwarded to sub-calls are always charged.
//! Interface costs from the [`GasSchedule`] are charged only when metering
//! is enabled. Every charge happens before the operation's side effect.

use std::sync::Arc;

use eei_hostapi::types::{is_zero, MAX_LOG_TOPICS, ZERO_WORD};
use eei_hostapi::{
    Address, Bytes32, CallKind, CallStatus, ExecutionResult, GasSchedule, HostContext, HostError,
    HostGasMeter, Message, MessageKind,
};

use crate::config::EngineConfig;
use crate::error::{HostInterrupt, Interrupt, Termination};
use crate::linker::{HostOp, WasmValue};
use crate::memory::{checked_range, MemoryAccessor};

type HostResult<T> = Result<T, HostError>;

/// Positional access to a host call's arguments.
#[derive(Clone, Copy)]
struct Args<'a>(&'a [WasmValue]);

impl Args<'_> {
    fn i32(&self, index: usize) -> HostResult<i32> {
        match self.0.get(index) {
            Some(WasmValue::I32(v)) => Ok(*v),
            _ => Err(HostError::InvalidArgument("expected i32 argument")),
        }
    }

    fn i64(&self, index: usize) -> HostResult<i64> {
        match self.0.get(index) {
            Some(WasmValue::I64(v)) => Ok(*v),
            _ => Err(HostError::InvalidArgument("expected i64 argument")),
        }
    }

    /// Offsets and lengths are unsigned 32-bit.
    fn offset(&self, index: usize) -> HostResult<u32> {
        self.i32(index).map(|v| v as u32)
    }
}

/// Guest arguments of a sub-call.
#[derive(Debug, Clone, Copy)]
struct CallArgs {
    gas: i64,
    address_offset: u32,
    value_offset: Option<u32>,
    data_offset: u32,
    data_length: u32,
}

/// Per-execution state of the EEI bridge.
pub struct EeiHost {
    host: Arc<dyn HostContext>,
    message: Message,
    /// Code reported by `getCodeSize` / `codeCopy`.
    state_code: Vec<u8>,
    meter: HostGasMeter,
    schedule: GasSchedule,
    meter_interface_gas: bool,
    max_call_depth: i32,
    /// Output set by `finish` or `revert`.
    return_data: Vec<u8>,
    /// Output of the most recent sub-call, read by `returnDataCopy`.
    return_buffer: Vec<u8>,
    created_address: Option<Address>,
    interrupt: Option<Interrupt>,
}

impl EeiHost {
    pub fn new(
        host: Arc<dyn HostContext>,
        state_code: &[u8],
        message: &Message,
        meter_interface_gas: bool,
        config: &EngineConfig,
    ) -> Self {
        Self {
            host,
            message: message.clone(),
            state_code: state_code.to_vec(),
            meter: HostGasMeter::new(message.gas.max(0) as u64),
            schedule: config.gas_schedule.clone(),
            meter_interface_gas,
            max_call_depth: config.max_call_depth,
            return_data: Vec::new(),
            return_buffer: Vec::new(),
            created_address: None,
            interrupt: None,
        }
    }

    /// Run one host operation.
    ///
    /// On `Err` the reason has been recorded and can be read back with
    /// [`take_interrupt`](Self::take_interrupt).
    pub fn invoke<M: MemoryAccessor>(
        &mut self,
        op: HostOp,
        args: &[WasmValue],
        mem: &mut M,
    ) -> Result<Option<WasmValue>, HostInterrupt> {
        match self.dispatch(op, Args(args), mem) {
            Ok(value) => Ok(value),
            Err(interrupt) => {
                tracing::trace!(?op, ?interrupt, "host call interrupted guest");
                self.interrupt = Some(interrupt);
                Err(HostInterrupt)
            }
        }
    }

    /// Record a fault raised outside an operation (for example a caller
    /// without linear memory) and return the marker to unwind with.
    pub fn fail(&mut self, err: HostError) -> HostInterrupt {
        self.interrupt = Some(Interrupt::Failed(err));
        HostInterrupt
    }

    pub fn take_interrupt(&mut self) -> Option<Interrupt> {
        self.interrupt.take()
    }

    pub fn gas_used(&self) -> u64 {
        self.meter.consumed()
    }

    /// Final result of an execution that returned from `main` (`None`) or
    /// terminated deliberately.
    pub fn into_result(self, termination: Option<Termination>) -> ExecutionResult {
        ExecutionResult {
            success: termination != Some(Termination::Revert),
            gas_used: self.meter.consumed(),
            return_data: self.return_data,
            created_address: self.created_address,
        }
    }

    fn dispatch<M: MemoryAccessor>(
        &mut self,
        op: HostOp,
        args: Args<'_>,
        mem: &mut M,
    ) -> Result<Option<WasmValue>, Interrupt> {
        let i32_result = |v: i32| Ok(Some(WasmValue::I32(v)));
        let i64_result = |v: i64| Ok(Some(WasmValue::I64(v)));

        match op {
            // ── Gas ──
            HostOp::UseGas => self.use_gas(args.i64(0)?)?,
            HostOp::GetGasLeft => return i64_result(self.gas_left()?),

            // ── Current message ──
            HostOp::GetAddress => {
                self.charge_base()?;
                mem.write(args.offset(0)?, &self.message.recipient())?;
            }
            HostOp::GetCaller => {
                self.charge_base()?;
                mem.write(args.offset(0)?, &self.message.sender)?;
            }
            HostOp::GetCallValue => {
                self.charge_base()?;
                mem.write(args.offset(0)?, &self.message.value.to_le_bytes())?;
            }
            HostOp::GetCallDataSize => {
                self.charge_base()?;
                return i32_result(self.message.input.len() as i32);
            }
            HostOp::CallDataCopy => {
                let (dst, src, len) = (args.offset(0)?, args.offset(1)?, args.offset(2)?);
                self.take_interface_gas(self.schedule.copy_cost(len))?;
                copy_out(mem, dst, &self.message.input, src, len)?;
            }
            HostOp::GetCodeSize => {
                self.charge_base()?;
                return i32_result(self.state_code.len() as i32);
            }
            HostOp::CodeCopy => {
                let (dst, src, len) = (args.offset(0)?, args.offset(1)?, args.offset(2)?);
                self.take_interface_gas(self.schedule.copy_cost(len))?;
                copy_out(mem, dst, &self.state_code, src, len)?;
            }

            // ── Accounts ──
            HostOp::GetExternalBalance => {
                self.take_interface_gas(self.schedule.balance)?;
                let address: Address = mem.read_array(args.offset(0)?)?;
                let balance = self.host.get_balance(&address);
                mem.write(args.offset(1)?, &balance.to_le_bytes())?;
            }
            HostOp::GetExternalCodeSize => {
                self.take_interface_gas(self.schedule.extcode)?;
                let address: Address = mem.read_array(args.offset(0)?)?;
                return i32_result(self.host.get_code_size(&address) as i32);
            }
            HostOp::ExternalCodeCopy => self.external_code_copy(args, mem)?,

            // ── Storage ──
            HostOp::StorageStore => self.storage_store(args.offset(0)?, args.offset(1)?, mem)?,
            HostOp::StorageLoad => {
                self.take_interface_gas(self.schedule.storage_load)?;
                let key: Bytes32 = mem.read_array(args.offset(0)?)?;
                let value = self.host.get_storage(&self.message.recipient(), &key);
                mem.write(args.offset(1)?, &value)?;
            }

            // ── Block & transaction ──
            HostOp::GetBlockHash => {
                self.take_interface_gas(self.schedule.blockhash)?;
                let hash = self.host.get_block_hash(args.i64(0)?);
                mem.write(args.offset(1)?, &hash.unwrap_or(ZERO_WORD))?;
                return i32_result(if hash.is_some() { 0 } else { 1 });
            }
            HostOp::GetBlockCoinbase => {
                self.charge_base()?;
                mem.write(args.offset(0)?, &self.host.get_tx_context().coinbase)?;
            }
            HostOp::GetBlockDifficulty => {
                self.charge_base()?;
                // Supplied big-endian, handed to the guest little-endian.
                let mut difficulty = self.host.get_tx_context().difficulty;
                difficulty.reverse();
                mem.write(args.offset(0)?, &difficulty)?;
            }
            HostOp::GetBlockGasLimit => {
                self.charge_base()?;
                return i64_result(self.host.get_tx_context().gas_limit);
            }
            HostOp::GetBlockNumber => {
                self.charge_base()?;
                return i64_result(self.host.get_tx_context().number);
            }
            HostOp::GetBlockTimestamp => {
                self.charge_base()?;
                return i64_result(self.host.get_tx_context().timestamp);
            }
            HostOp::GetTxGasPrice => {
                self.charge_base()?;
                mem.write(args.offset(0)?, &self.host.get_tx_context().gas_price.to_le_bytes())?;
            }
            HostOp::GetTxOrigin => {
                self.charge_base()?;
                mem.write(args.offset(0)?, &self.host.get_tx_context().origin)?;
            }
            HostOp::Log => self.log(args, mem)?,

            // ── Sub-messages ──
            HostOp::Call(kind) => {
                let call = if kind.takes_value() {
                    CallArgs {
                        gas: args.i64(0)?,
                        address_offset: args.offset(1)?,
                        value_offset: Some(args.offset(2)?),
                        data_offset: args.offset(3)?,
                        data_length: args.offset(4)?,
                    }
                } else {
                    CallArgs {
                        gas: args.i64(0)?,
                        address_offset: args.offset(1)?,
                        value_offset: None,
                        data_offset: args.offset(2)?,
                        data_length: args.offset(3)?,
                    }
                };
                return i32_result(self.call(kind, call, mem)?);
            }
            HostOp::Create => return i32_result(self.create(args, mem)?),
            HostOp::GetReturnDataSize => {
                self.charge_base()?;
                return i32_result(self.return_buffer.len() as i32);
            }
            HostOp::ReturnDataCopy => {
                let (dst, src, len) = (args.offset(0)?, args.offset(1)?, args.offset(2)?);
                self.take_interface_gas(self.schedule.copy_cost(len))?;
                copy_out(mem, dst, &self.return_buffer, src, len)?;
            }

            // ── Termination ──
            HostOp::Finish => {
                self.return_data = mem.read_vec(args.offset(0)?, args.offset(1)?)?;
                return Err(Interrupt::Terminated(Termination::Finish));
            }
            HostOp::Revert => {
                self.return_data = mem.read_vec(args.offset(0)?, args.offset(1)?)?;
                return Err(Interrupt::Terminated(Termination::Revert));
            }
            HostOp::SelfDestruct => {
                self.self_destruct(args.offset(0)?, mem)?;
                return Err(Interrupt::Terminated(Termination::SelfDestruct));
            }

            #[cfg(feature = "debug-eei")]
            HostOp::Print
            | HostOp::Print32
            | HostOp::Print64
            | HostOp::PrintMem
            | HostOp::PrintMemHex
            | HostOp::PrintStorage
            | HostOp::PrintStorageHex => self.debug_print(op, args, mem)?,
        }
        Ok(None)
    }

    // ── Gas ──

    fn take_interface_gas(&mut self, cost: u64) -> HostResult<()> {
        if self.meter_interface_gas {
            self.meter.charge(cost)
        } else {
            Ok(())
        }
    }

    fn charge_base(&mut self) -> HostResult<()> {
        self.take_interface_gas(self.schedule.base)
    }

    fn use_gas(&mut self, amount: i64) -> HostResult<()> {
        let amount = u64::try_from(amount).map_err(|_| HostError::InvalidArgument("negative gas"))?;
        self.meter.charge(amount)
    }

    fn gas_left(&mut self) -> HostResult<i64> {
        self.charge_base()?;
        Ok(self.meter.remaining() as i64)
    }

    fn ensure_not_static(&self, operation: &'static str) -> HostResult<()> {
        if self.message.is_static {
            return Err(HostError::StaticModeViolation(operation));
        }
        Ok(())
    }

    /// All but one 64th of the gas left, the most a sub-message may receive.
    fn forwardable_gas(&self) -> u64 {
        let left = self.meter.remaining();
        left - left / 64
    }

    // ── Operations ──

    fn external_code_copy<M: MemoryAccessor>(&mut self, args: Args<'_>, mem: &mut M) -> HostResult<()> {
        let (address_offset, dst, src, len) = (
            args.offset(0)?,
            args.offset(1)?,
            args.offset(2)?,
            args.offset(3)?,
        );
        self.take_interface_gas(self.schedule.extcode.saturating_add(self.schedule.word_cost(len)))?;
        let address: Address = mem.read_array(address_offset)?;
        let code_size = self.host.get_code_size(&address);
        let src_range = checked_range(src, len, code_size)?;
        let dest = mem.range_mut(dst, len)?;
        self.host.copy_code(&address, src_range.start, dest);
        Ok(())
    }

    fn storage_store<M: MemoryAccessor>(&mut self, key_offset: u32, value_offset: u32, mem: &mut M) -> HostResult<()> {
        self.ensure_not_static("storageStore")?;
        let key: Bytes32 = mem.read_array(key_offset)?;
        let value: Bytes32 = mem.read_array(value_offset)?;
        let address = self.message.recipient();

        let current = self.host.get_storage(&address, &key);
        let cost = if is_zero(&current) && !is_zero(&value) {
            self.schedule.storage_store_create
        } else {
            self.schedule.storage_store_change
        };
        self.take_interface_gas(cost)?;
        self.host.set_storage(&address, &key, &value);
        Ok(())
    }

    fn log<M: MemoryAccessor>(&mut self, args: Args<'_>, mem: &mut M) -> HostResult<()> {
        self.ensure_not_static("log")?;
        let (data_offset, data_length) = (args.offset(0)?, args.offset(1)?);
        let topic_count = args.offset(2)? as usize;
        if topic_count > MAX_LOG_TOPICS {
            return Err(HostError::InvalidArgument("more than 4 log topics"));
        }
        self.take_interface_gas(self.schedule.log_cost(data_length, topic_count))?;

        let data = mem.read_vec(data_offset, data_length)?;
        let mut topics = Vec::with_capacity(topic_count);
        for i in 0..topic_count {
            topics.push(mem.read_array::<32>(args.offset(3 + i)?)?);
        }
        self.host.emit_log(&self.message.recipient(), &data, &topics);
        Ok(())
    }

    fn self_destruct<M: MemoryAccessor>(&mut self, beneficiary_offset: u32, mem: &mut M) -> HostResult<()> {
        self.ensure_not_static("selfDestruct")?;
        let beneficiary: Address = mem.read_array(beneficiary_offset)?;
        let address = self.message.recipient();

        let mut cost = self.schedule.selfdestruct;
        if !self.host.account_exists(&beneficiary) && self.host.get_balance(&address) > 0 {
            cost = cost.saturating_add(self.schedule.call_new_account);
        }
        self.take_interface_gas(cost)?;
        self.host.selfdestruct(&address, &beneficiary);
        Ok(())
    }

    fn call<M: MemoryAccessor>(&mut self, kind: CallKind, args: CallArgs, mem: &mut M) -> HostResult<i32> {
        self.take_interface_gas(self.schedule.call)?;

        let target: Address = mem.read_array(args.address_offset)?;
        let value = match args.value_offset {
            Some(offset) => u128::from_le_bytes(mem.read_array(offset)?),
            None if kind == CallKind::CallDelegate => self.message.value,
            None => 0,
        };
        let input = mem.read_vec(args.data_offset, args.data_length)?;

        if kind == CallKind::Call && value != 0 {
            self.ensure_not_static("call with value")?;
        }
        let transfers_value = kind.takes_value() && value != 0;
        if transfers_value {
            self.take_interface_gas(self.schedule.value_transfer)?;
            if kind == CallKind::Call && !self.host.account_exists(&target) {
                self.take_interface_gas(self.schedule.call_new_account)?;
            }
        }
        let requested = u64::try_from(args.gas).map_err(|_| HostError::InvalidArgument("negative call gas"))?;

        let recipient = self.message.recipient();
        if self.message.depth >= self.max_call_depth {
            tracing::debug!(depth = self.message.depth, "call depth limit reached");
            return Ok(CallStatus::Failure.as_i32());
        }
        if transfers_value && self.host.get_balance(&recipient) < value {
            tracing::debug!(?kind, "insufficient balance for call value");
            return Ok(CallStatus::Failure.as_i32());
        }

        let forwarded = requested.min(self.forwardable_gas());
        self.meter.charge(forwarded)?;
        let stipend = if transfers_value {
            self.schedule.call_stipend
        } else {
            0
        };

        let msg = Message {
            kind: MessageKind::from(kind),
            is_static: self.message.is_static || kind == CallKind::CallStatic,
            depth: self.message.depth + 1,
            gas: i64::try_from(forwarded.saturating_add(stipend)).unwrap_or(i64::MAX),
            destination: Some(if kind.borrows_code() { recipient } else { target }),
            code_address: kind.borrows_code().then_some(target),
            sender: if kind == CallKind::CallDelegate {
                self.message.sender
            } else {
                recipient
            },
            value,
            input,
        };
        let outcome = self.host.call(&msg);
        self.meter.refund(outcome.gas_left.clamp(0, forwarded as i64) as u64);
        tracing::trace!(?kind, status = ?outcome.status, gas_left = outcome.gas_left, "sub-call returned");

        self.return_buffer = outcome.output;
        Ok(outcome.status.as_i32())
    }

    fn create<M: MemoryAccessor>(&mut self, args: Args<'_>, mem: &mut M) -> HostResult<i32> {
        self.ensure_not_static("create")?;
        self.take_interface_gas(self.schedule.create)?;

        let value = u128::from_le_bytes(mem.read_array(args.offset(0)?)?);
        let init_code = mem.read_vec(args.offset(1)?, args.offset(2)?)?;
        let result_offset = args.offset(3)?;
        mem.range_mut(result_offset, 20)?;

        let sender = self.message.recipient();
        if self.message.depth >= self.max_call_depth {
            tracing::debug!(depth = self.message.depth, "create depth limit reached");
            return Ok(CallStatus::Failure.as_i32());
        }
        if self.host.get_balance(&sender) < value {
            tracing::debug!("insufficient balance for create value");
            return Ok(CallStatus::Failure.as_i32());
        }

        let forwarded = self.forwardable_gas();
        self.meter.charge(forwarded)?;
        let msg = Message {
            kind: MessageKind::Create,
            is_static: false,
            depth: self.message.depth + 1,
            gas: forwarded as i64,
            destination: None,
            code_address: None,
            sender,
            value,
            input: init_code,
        };
        let outcome = self.host.call(&msg);
        self.meter.refund(outcome.gas_left.clamp(0, forwarded as i64) as u64);

        match (outcome.status, outcome.created_address) {
            (CallStatus::Success, Some(address)) => {
                mem.write(result_offset, &address)?;
                self.created_address = Some(address);
                self.return_buffer.clear();
            }
            _ => self.return_buffer = outcome.output,
        }
        Ok(outcome.status.as_i32())
    }

    #[cfg(feature = "debug-eei")]
    fn debug_print<M: MemoryAccessor>(&mut self, op: HostOp, args: Args<'_>, mem: &mut M) -> HostResult<()> {
        match op {
            HostOp::Print | HostOp::PrintMem => {
                let bytes = mem.read_vec(args.offset(0)?, args.offset(1)?)?;
                tracing::info!(target: "eei::debug", "{}", String::from_utf8_lossy(&bytes));
            }
            HostOp::PrintMemHex => {
                let bytes = mem.read_vec(args.offset(0)?, args.offset(1)?)?;
                tracing::info!(target: "eei::debug", "{}", hex::encode(bytes));
            }
            HostOp::Print32 => tracing::info!(target: "eei::debug", "{}", args.i32(0)?),
            HostOp::Print64 => tracing::info!(target: "eei::debug", "{}", args.i64(0)?),
            HostOp::PrintStorage | HostOp::PrintStorageHex => {
                let key: Bytes32 = mem.read_array(args.offset(0)?)?;
                let value = self.host.get_storage(&self.message.recipient(), &key);
                if op == HostOp::PrintStorage {
                    tracing::info!(target: "eei::debug", "{}", String::from_utf8_lossy(&value));
                } else {
                    tracing::info!(target: "eei::debug", "{}", hex::encode(value));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Copy `[src, src + len)` of `source` into memory at `dst`. Both ranges are
/// checked before anything is written.
fn copy_out<M: MemoryAccessor>(mem: &mut M, dst: u32, source: &[u8], src: u32, len: u32) -> HostResult<()> {
    let range = checked_range(src, len, source.len())?;
    mem.range_mut(dst, len)?.copy_from_slice(&source[range]);
    Ok(())
}
