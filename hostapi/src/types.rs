//! Value types shared between the host and the sandbox.
//!
//! Addresses are 20 raw bytes, storage words are 32 raw bytes. Quantities
//! (value, balance, gas price) are `u128`; the EEI writes them into guest
//! memory as 16 little-endian bytes.

/// A 20-byte account address.
pub type Address = [u8; 20];

/// A 32-byte word: storage keys and values, hashes, log topics.
pub type Bytes32 = [u8; 32];

/// The all-zero address.
pub const ZERO_ADDRESS: Address = [0u8; 20];

/// The all-zero word.
pub const ZERO_WORD: Bytes32 = [0u8; 32];

/// Maximum number of topics a single `log` call may carry.
pub const MAX_LOG_TOPICS: usize = 4;

/// Returns true if every byte of `bytes` is zero.
pub fn is_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0)
}

/// How a message is executed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageKind {
    #[default]
    Call,
    CallCode,
    CallDelegate,
    CallStatic,
    Create,
}

/// The sub-call flavours a contract can issue through the EEI.
///
/// `Create` is not a call kind: creation has its own host operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Call,
    CallCode,
    CallDelegate,
    CallStatic,
}

impl CallKind {
    /// Whether the guest passes a value offset for this kind.
    pub fn takes_value(self) -> bool {
        matches!(self, Self::Call | Self::CallCode)
    }

    /// Whether the callee runs the target's code in the caller's context.
    pub fn borrows_code(self) -> bool {
        matches!(self, Self::CallCode | Self::CallDelegate)
    }
}

impl From<CallKind> for MessageKind {
    fn from(kind: CallKind) -> Self {
        match kind {
            CallKind::Call => Self::Call,
            CallKind::CallCode => Self::CallCode,
            CallKind::CallDelegate => Self::CallDelegate,
            CallKind::CallStatic => Self::CallStatic,
        }
    }
}

/// The input of one execution.
///
/// `destination` is `None` for `Create` messages until the host assigns the
/// new account. `code_address` names the account whose code runs when it is
/// not `destination` (CallCode and CallDelegate).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub kind: MessageKind,
    /// Static context: no state modification allowed, inherited by sub-calls.
    pub is_static: bool,
    pub depth: i32,
    pub gas: i64,
    pub destination: Option<Address>,
    pub code_address: Option<Address>,
    pub sender: Address,
    pub value: u128,
    pub input: Vec<u8>,
}

impl Message {
    /// A plain call from `sender` to `destination`.
    pub fn call(sender: Address, destination: Address, gas: i64) -> Self {
        Self {
            kind: MessageKind::Call,
            gas,
            destination: Some(destination),
            sender,
            ..Self::default()
        }
    }

    /// Builder-style setter for the call data.
    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = input.into();
        self
    }

    /// Builder-style setter for the transferred value.
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    /// The account whose storage and balance this execution acts on.
    pub fn recipient(&self) -> Address {
        self.destination.unwrap_or(ZERO_ADDRESS)
    }

    /// The account whose code is executed.
    pub fn code_owner(&self) -> Address {
        self.code_address.unwrap_or_else(|| self.recipient())
    }
}

/// Transaction and block metadata visible to contracts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxContext {
    pub gas_price: u128,
    pub origin: Address,
    pub coinbase: Address,
    pub number: i64,
    pub timestamp: i64,
    pub gas_limit: i64,
    /// Big-endian 256-bit difficulty.
    pub difficulty: Bytes32,
}

/// Status of a sub-call or creation as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Revert,
    Failure,
}

impl CallStatus {
    /// The status code returned to the guest (0 success, 1 failure, 2 revert).
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Revert => 2,
        }
    }
}

/// What the host hands back after running a sub-message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub status: CallStatus,
    pub gas_left: i64,
    pub output: Vec<u8>,
    pub created_address: Option<Address>,
}

impl CallOutcome {
    /// A successful outcome that consumed nothing and produced no output.
    pub fn empty_success(gas_left: i64) -> Self {
        Self {
            status: CallStatus::Success,
            gas_left,
            output: Vec::new(),
            created_address: None,
        }
    }

    /// A failed outcome that consumed all forwarded gas.
    pub fn failure() -> Self {
        Self {
            status: CallStatus::Failure,
            gas_left: 0,
            output: Vec::new(),
            created_address: None,
        }
    }
}

/// The result of one execution.
///
/// Starts empty, is filled in by the EEI bridge (`finish`, `revert`,
/// `create`, gas accounting) and is immutable once handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionResult {
    pub success: bool,
    pub gas_used: u64,
    pub return_data: Vec<u8>,
    pub created_address: Option<Address>,
}

impl ExecutionResult {
    /// The result recorded for an execution that trapped: nothing returned,
    /// every unit of gas consumed.
    pub fn failure(gas_limit: u64) -> Self {
        Self {
            success: false,
            gas_used: gas_limit,
            return_data: Vec::new(),
            created_address: None,
        }
    }

    /// Whether the execution ended through `revert`.
    ///
    /// A trapped execution never produces an `ExecutionResult`, so a
    /// non-successful result here always carries revert data semantics.
    pub fn is_revert(&self) -> bool {
        !self.success
    }

    /// Convert into the host-facing outcome of a sub-call with `gas` forwarded.
    pub fn into_outcome(self, gas: i64) -> CallOutcome {
        let gas_left = gas.saturating_sub(self.gas_used as i64).max(0);
        CallOutcome {
            status: if self.success {
                CallStatus::Success
            } else {
                CallStatus::Revert
            },
            gas_left,
            output: self.return_data,
            created_address: self.created_address,
        }
    }
}
