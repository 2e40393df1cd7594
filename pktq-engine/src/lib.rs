//! Runtime of the pktq packet pipeline.
//!
//! User space submits a [`pktq_lang::ComputationDescr`] graph; the engine
//! validates it, links it into an evaluable [`Computation`] and runs it once
//! per packet. Captured packets are delivered through the [`queue::MpdbQueue`],
//! a double-buffered multi-producer ring a single consumer drains.

#![warn(missing_docs)]
#![deny(unused_must_use)]

pub mod arena;
pub mod computation;
pub mod error;
pub mod eval;
pub mod functional;
pub mod group;
pub mod link;
pub mod queue;
mod ratelimit;
pub mod symtable;
pub mod validate;

pub use computation::{ArgSlot, Args, CallTarget, Computation, FunctionRef, FunctionalNode};
pub use error::EngineError;

/// Commonly used engine, language and type items.
pub mod prelude {
    pub use crate::computation::{ArgSlot, Args, CallTarget, Computation, FunctionRef};
    pub use crate::error::EngineError;
    pub use crate::eval::run;
    pub use crate::group::{Group, GroupTable};
    pub use crate::link::link;
    pub use crate::queue::{MpdbQueue, QueueConfig};
    pub use crate::symtable::SymbolTable;
    pub use pktq_lang::{ComputationDescr, FunKind, FunctionalDescr, NO_INDEX};
    pub use pktq_types::{Buf, ClassMask, Fanout, FanoutKind, Metadata, Word};
}
