//! Descriptor graph validation.
//!
//! Runs before any allocation or linking, with no side effects. Signature
//! rules surface as [`EngineError::Validation`]; structural index errors as
//! [`EngineError::BadIndex`].

use pktq_lang::{ComputationDescr, FunKind, Signature, MONADIC_SIG, PREDICATE_SIG, PROPERTY_SIG};

use crate::error::EngineError;
use crate::symtable::SymbolTable;

fn in_range(descr: &ComputationDescr, index: isize) -> bool {
    index >= 0 && (index as usize) < descr.size()
}

/// Check that node `index`'s signature, bound to its `nargs`, equals
/// `expected`.
fn check_signature(
    descr: &ComputationDescr,
    table: &SymbolTable,
    index: usize,
    expected: &str,
) -> Result<(), EngineError> {
    let node = &descr.fun[index];
    let entry = table.lookup(&node.symbol).ok_or(EngineError::Validation {
        index,
        reason: "unknown symbol",
    })?;

    let sig = Signature::parse(entry.signature)?;
    let bound = sig.bind(node.nargs).ok_or(EngineError::Validation {
        index,
        reason: "signature bound past its arity",
    })?;

    let expected = Signature::parse(expected)?;
    if !bound.equal(&expected) {
        tracing::debug!(index, nargs = node.nargs, "invalid function signature");
        return Err(EngineError::Validation {
            index,
            reason: "bound signature mismatch",
        });
    }
    Ok(())
}

/// A referenced node must exist and bind to `expected`.
fn check_reference(
    descr: &ComputationDescr,
    table: &SymbolTable,
    at: usize,
    reference: isize,
    expected: &str,
) -> Result<(), EngineError> {
    if !in_range(descr, reference) {
        return Err(EngineError::BadIndex { index: at });
    }
    check_signature(descr, table, reference as usize, expected)
}

/// `arg` and `arg_size` must be both present or both absent.
fn check_argument(descr: &ComputationDescr, index: usize) -> Result<(), EngineError> {
    let node = &descr.fun[index];
    if node.arg.is_none() != (node.arg_size == 0) {
        return Err(EngineError::Validation {
            index,
            reason: "argument ptr/size mismatch",
        });
    }
    Ok(())
}

/// Validate a computation descriptor against the symbol table.
pub fn validate(descr: &ComputationDescr, table: &SymbolTable) -> Result<(), EngineError> {
    let entry = descr.entry_point;
    if entry >= descr.size() {
        return Err(EngineError::Validation {
            index: entry,
            reason: "entry point out of range",
        });
    }
    check_signature(descr, table, entry, MONADIC_SIG)?;

    for (n, node) in descr.fun.iter().enumerate() {
        if node.symbol.is_empty() {
            return Err(EngineError::Validation {
                index: n,
                reason: "empty symbol",
            });
        }

        match node.kind {
            FunKind::Monadic => {
                check_signature(descr, table, n, MONADIC_SIG)?;
                if node.fun != pktq_lang::NO_INDEX {
                    // Function-valued argument, e.g. `inv`.
                    check_reference(descr, table, n, node.fun, MONADIC_SIG)?;
                }
            }
            FunKind::HighOrder => {
                check_signature(descr, table, n, MONADIC_SIG)?;
                check_reference(descr, table, n, node.fun, PREDICATE_SIG)?;
            }
            FunKind::Predicate => {
                check_argument(descr, n)?;
                check_successors_absent(descr, n)?;
                if node.fun != pktq_lang::NO_INDEX {
                    check_reference(descr, table, n, node.fun, PREDICATE_SIG)?;
                }
            }
            FunKind::Combinator => {
                check_reference(descr, table, n, node.left, PREDICATE_SIG)?;
                check_reference(descr, table, n, node.right, PREDICATE_SIG)?;
            }
            FunKind::Property => {
                check_argument(descr, n)?;
                check_successors_absent(descr, n)?;
                if node.fun != pktq_lang::NO_INDEX {
                    check_reference(descr, table, n, node.fun, PROPERTY_SIG)?;
                }
            }
        }
    }

    Ok(())
}

/// Predicate and property nodes have no successors.
fn check_successors_absent(descr: &ComputationDescr, index: usize) -> Result<(), EngineError> {
    let node = &descr.fun[index];
    if node.left != pktq_lang::NO_INDEX || node.right != pktq_lang::NO_INDEX {
        return Err(EngineError::Validation {
            index,
            reason: "boolean node with successor links",
        });
    }
    Ok(())
}
