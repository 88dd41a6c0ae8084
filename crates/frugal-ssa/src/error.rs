//! IR errors
//!
//! Every construction-invariant violation surfaces as an [`IrError`]. These are
//! internal compiler errors: they indicate a bug in the front-end or in a pass,
//! never bad user input. The owning pipeline decides whether to abort or to
//! fall back to the reflective encoder for the offending type.

use thiserror::Error;

use crate::ir::CallKind;

/// Result alias used throughout the IR layer
pub type IrResult<T> = Result<T, IrError>;

/// Errors raised while building or transforming IR
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    /// Kind bits outside the assigned range
    #[error("invalid register kind: {0}")]
    InvalidRegisterKind(u8),

    /// Zero register with a non-zero index
    #[error("zero register cannot carry index {0}")]
    InvalidZeroIndex(usize),

    /// Index outside the arch register table
    #[error("invalid arch-specific register index: {0}")]
    InvalidArchRegister(usize),

    /// Front-end register number outside 0..=7
    #[error("invalid front-end register number: {0}")]
    InvalidHirRegister(u8),

    /// Receiver present on a non-dynamic call, or missing on a dynamic one
    #[error("invalid receiver value: {kind} {}", receiver_note(.present))]
    ReceiverMismatch {
        /// Callee kind
        kind: CallKind,
        /// Whether a receiver was supplied
        present: bool,
    },

    /// Call handle whose target does not match its kind
    #[error("invalid call target for {kind} call `{name}`")]
    InvalidCallTarget {
        /// Callee kind
        kind: CallKind,
        /// Callee name
        name: String,
    },

    /// Load or store width other than 1, 2, 4 or 8 bytes
    #[error("invalid memory access size: {0}")]
    InvalidAccessSize(usize),

    /// Pointer register where a scalar was expected, or the reverse
    #[error("pointer-ness mismatch: {0}")]
    PointerMismatch(String),

    /// Phi with a zero target, conflicting sources or keys that do not match the predecessors
    #[error("malformed phi: {0}")]
    MalformedPhi(String),

    /// Switch with duplicate cases or a pointer discriminant
    #[error("malformed switch: {0}")]
    MalformedSwitch(String),

    /// Node used where a terminator is required
    #[error("not a terminator: {0}")]
    NotATerminator(String),

    /// Block id not present in the function
    #[error("unknown basic block: bb_{0}")]
    UnknownBlock(u32),

    /// Register read with no reaching definition
    #[error("register {0} used before definition")]
    UndefinedRegister(String),

    /// More registers than the index field can hold
    #[error("register index space exhausted ({0} registers)")]
    RegisterSpaceExhausted(usize),

    /// Function-level invariant violated
    #[error("verification failed: {0}")]
    Verification(String),

    /// The input is valid but cannot be handled
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Error raised inside a named pass
    #[error("pass `{pass}` failed: {source}")]
    Pass {
        /// Name of the failing pass
        pass: String,
        /// Underlying error
        #[source]
        source: Box<IrError>,
    },
}

fn receiver_note(present: &bool) -> &'static str {
    if *present {
        "must not have a receiver"
    } else {
        "requires a receiver"
    }
}

impl IrError {
    /// Whether this error is an internal compiler error (a broken invariant)
    /// rather than an ordinary refusal to compile.
    ///
    /// Callers typically abort the compilation on internal errors and fall
    /// back to the reflective path on ordinary ones.
    pub fn is_internal(&self) -> bool {
        match self {
            IrError::Unsupported(_) => false,
            IrError::Pass { source, .. } => source.is_internal(),
            _ => true,
        }
    }

    /// Wrap this error with the name of the pass that produced it
    pub fn in_pass(self, pass: &str) -> IrError {
        IrError::Pass {
            pass: pass.to_string(),
            source: Box::new(self),
        }
    }
}
