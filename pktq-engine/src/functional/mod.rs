//! Built-in functional library.
//!
//! Every function here is registered in [`SymbolTable::default_table`] with
//! its textual signature; user space composes them by name.

use crate::symtable::SymbolTable;

mod combinator;
mod headers;
mod misc;
mod predicate;
mod property;

/// Register the whole library into `table`.
pub fn install(table: &mut SymbolTable) {
    misc::install(table);
    predicate::install(table);
    combinator::install(table);
    property::install(table);
}
