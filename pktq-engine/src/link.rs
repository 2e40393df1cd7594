//! Runtime linking of descriptor graphs.
//!
//! Translates a validated descriptor array into the in-memory computation:
//! symbols resolve to function pointers, arguments materialize inline or in
//! the arena, and successor indices are bounds-checked into `Option`s. The
//! init hooks run last, in node order.

use pktq_lang::{ComputationDescr, FunKind, FunctionalDescr};

use crate::arena::{PodArena, INLINE_ARG_MAX};
use crate::computation::{ArgSlot, CallTarget, Computation, FunctionalNode, MonadicFn, PredicateFn, PropertyFn};
use crate::error::EngineError;
use crate::symtable::{FunctionPtr, SymbolEntry, SymbolTable};
use crate::validate::validate;

fn resolve<'t>(table: &'t SymbolTable, descr: &FunctionalDescr, index: usize) -> Result<&'t SymbolEntry, EngineError> {
    table.lookup(&descr.symbol).ok_or_else(|| {
        tracing::info!(index, symbol = %descr.symbol, "bad descriptor");
        EngineError::Symbol(descr.symbol.clone())
    })
}

fn as_monadic(entry: &SymbolEntry, index: usize) -> Result<MonadicFn, EngineError> {
    match entry.fun {
        FunctionPtr::Monadic(f) => Ok(f),
        _ => Err(EngineError::Validation {
            index,
            reason: "symbol is not monadic",
        }),
    }
}

fn as_predicate(entry: &SymbolEntry, index: usize) -> Result<PredicateFn, EngineError> {
    match entry.fun {
        FunctionPtr::Predicate(f) => Ok(f),
        _ => Err(EngineError::Validation {
            index,
            reason: "symbol is not a predicate",
        }),
    }
}

fn as_property(entry: &SymbolEntry, index: usize) -> Result<PropertyFn, EngineError> {
    match entry.fun {
        FunctionPtr::Property(f) => Ok(f),
        _ => Err(EngineError::Validation {
            index,
            reason: "symbol is not a property",
        }),
    }
}

/// Materialize a node's POD argument: wide blobs go through the arena,
/// narrow ones are read into an inline word, zero-extended.
fn materialize_arg(
    arena: &mut PodArena,
    descr: &FunctionalDescr,
    index: usize,
) -> Result<ArgSlot, EngineError> {
    let Some(blob) = descr.arg.as_deref() else {
        return Ok(ArgSlot::None);
    };

    if descr.arg_size > INLINE_ARG_MAX {
        let (offset, len) = arena.take_from(blob, descr.arg_size, index)?;
        Ok(ArgSlot::Pod { offset, len })
    } else {
        let src = blob
            .get(..descr.arg_size)
            .ok_or(EngineError::CopyFailed { index })?;
        let mut word = [0u8; 8];
        word[..src.len()].copy_from_slice(src);
        Ok(ArgSlot::Inline(u64::from_ne_bytes(word)))
    }
}

/// An out-of-range successor index denotes "none".
fn successor(descr: &ComputationDescr, index: isize) -> Option<usize> {
    (index >= 0 && (index as usize) < descr.size()).then_some(index as usize)
}

/// Validate `descr` and link it into an evaluable [`Computation`].
///
/// On success every init hook has run; the returned computation runs fini
/// hooks when dropped.
pub fn link(descr: &ComputationDescr, table: &SymbolTable) -> Result<Computation, EngineError> {
    validate(descr, table)?;

    let mut arena = PodArena::for_descr(descr);
    let mut nodes = Vec::with_capacity(descr.size());

    for (n, d) in descr.fun.iter().enumerate() {
        let entry = resolve(table, d, n)?;
        let arg = materialize_arg(&mut arena, d, n)?;

        let call = match d.kind {
            FunKind::Monadic => {
                let fun = as_monadic(entry, n)?;
                let arg = match successor(descr, d.fun) {
                    Some(f) => ArgSlot::Fun(f),
                    None => arg,
                };
                CallTarget::Monadic { fun, arg }
            }
            FunKind::HighOrder => CallTarget::HighOrder {
                fun: as_monadic(entry, n)?,
                pred: d.fun as usize,
            },
            FunKind::Predicate => CallTarget::Predicate {
                fun: as_predicate(entry, n)?,
                arg,
                pred: successor(descr, d.fun),
            },
            FunKind::Combinator => CallTarget::Combinator {
                fun: as_predicate(entry, n)?,
                left: d.left as usize,
                right: d.right as usize,
            },
            FunKind::Property => CallTarget::Property {
                fun: as_property(entry, n)?,
                arg,
            },
        };

        let (left, right) = match d.kind {
            FunKind::Monadic | FunKind::HighOrder => {
                (successor(descr, d.left), successor(descr, d.right))
            }
            _ => (None, None),
        };

        let mut node = FunctionalNode::new(call).with_links(left, right);
        node.init = entry.init;
        node.fini = entry.fini;
        nodes.push(node);
    }

    let mut comp = Computation::from_parts(descr.entry_point, nodes, arena);
    comp.run_init()?;
    Ok(comp)
}
