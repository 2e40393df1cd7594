//! User-facing surface of the pktq pipeline language: functional node
//! descriptors submitted at install time, and the textual type signatures
//! the engine validates them against.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod descr;
mod sig;

pub use descr::{ComputationDescr, FunKind, FunctionalDescr, NO_INDEX};
pub use sig::{Signature, SignatureError};

/// Signature every pipeline entry point must bind to.
pub const MONADIC_SIG: &str = "Buf -> Action Buf";

/// Signature required of referenced predicate nodes.
pub const PREDICATE_SIG: &str = "Buf -> Bool";

/// Signature required of referenced property nodes: any return type.
pub const PROPERTY_SIG: &str = "Buf -> a";
