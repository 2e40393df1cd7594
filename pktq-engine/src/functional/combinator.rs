//! Boolean composition of predicate nodes.

use pktq_types::Buf;

use crate::computation::Args;
use crate::symtable::{FunctionPtr, SymbolTable};

fn and(args: Args<'_>, b: &Buf<'_>) -> bool {
    let Some((l, r)) = args.operands() else {
        return false;
    };
    l.eval_predicate(b) && r.eval_predicate(b)
}

fn or(args: Args<'_>, b: &Buf<'_>) -> bool {
    let Some((l, r)) = args.operands() else {
        return false;
    };
    l.eval_predicate(b) || r.eval_predicate(b)
}

fn xor(args: Args<'_>, b: &Buf<'_>) -> bool {
    let Some((l, r)) = args.operands() else {
        return false;
    };
    l.eval_predicate(b) ^ r.eval_predicate(b)
}

pub(super) fn install(table: &mut SymbolTable) {
    use FunctionPtr::Predicate;

    table.register("and", "(Buf -> Bool) -> (Buf -> Bool) -> Buf -> Bool", Predicate(and), None, None);
    table.register("or", "(Buf -> Bool) -> (Buf -> Bool) -> Buf -> Bool", Predicate(or), None, None);
    table.register("xor", "(Buf -> Bool) -> (Buf -> Bool) -> Buf -> Bool", Predicate(xor), None, None);
}
