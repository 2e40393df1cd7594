//! Install-time error taxonomy.
//!
//! Packet-path failures are never raised as errors; they are represented by
//! the action state of the returned buffer. Everything here surfaces at
//! install or teardown.

use pktq_lang::SignatureError;

const EPERM: i32 = 1;
const ENOMEM: i32 = 12;
const EINVAL: i32 = 22;

/// Engine runtime error variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The descriptor graph failed validation.
    #[error("node {index}: {reason}")]
    Validation {
        /// Offending node index.
        index: usize,
        /// Violated rule.
        reason: &'static str,
    },
    /// A symbol is not present in the symbol table.
    #[error("no such function: '{0}'")]
    Symbol(String),
    /// A node references an index outside the computation.
    #[error("node {index}: reference out of range")]
    BadIndex {
        /// Offending node index.
        index: usize,
    },
    /// The size word at the arena cursor does not match the declared size.
    #[error("pod arena: declared {declared} but slot holds {found}")]
    PodSlotMismatch {
        /// Size the caller declared.
        declared: usize,
        /// Size recorded in the slot.
        found: usize,
    },
    /// The user-supplied argument blob is shorter than its declared size.
    #[error("node {index}: argument copy failed")]
    CopyFailed {
        /// Offending node index.
        index: usize,
    },
    /// A node's init hook returned nonzero.
    #[error("node {index}: init hook failed")]
    InitHook {
        /// Offending node index.
        index: usize,
    },
    /// The queue configuration is unusable.
    #[error("queue config: {0}")]
    Config(&'static str),
    /// The allocator could not satisfy the request.
    #[error("out of memory")]
    NoMemory,
    /// A signature failed to parse.
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

impl EngineError {
    /// The negated errno an install caller receives.
    pub fn os_error(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::Symbol(_) | Self::InitHook { .. } | Self::Signature(_) => -EPERM,
            Self::BadIndex { .. } | Self::Config(_) => -EINVAL,
            Self::PodSlotMismatch { .. } | Self::CopyFailed { .. } | Self::NoMemory => -ENOMEM,
        }
    }

    /// Whether this is a validation (permission-denied class) failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
