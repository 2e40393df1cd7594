//! Scalar extractors.

use pktq_types::{Buf, Word};

use crate::computation::Args;
use crate::symtable::{FunctionPtr, SymbolTable};

fn get_state(_args: Args<'_>, b: &Buf<'_>) -> Word {
    Word::from(b.meta.state)
}

fn get_mark(_args: Args<'_>, b: &Buf<'_>) -> Word {
    b.meta.fanout.mark
}

pub(super) fn install(table: &mut SymbolTable) {
    use FunctionPtr::Property;

    table.register("get_state", "Buf -> UInt64", Property(get_state), None, None);
    table.register("get_mark", "Buf -> UInt64", Property(get_mark), None, None);
}
