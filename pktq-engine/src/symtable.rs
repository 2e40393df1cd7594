//! Name to function resolution.
//!
//! Every installable function is registered here with its textual signature
//! and optional init/fini hooks; the validator and the linker only ever
//! query the table.

use std::collections::HashMap;

use crate::computation::{MonadicFn, NodeHook, PredicateFn, PropertyFn};

/// A registered function pointer, tagged by calling shape.
#[derive(Debug, Clone, Copy)]
pub enum FunctionPtr {
    /// `Args -> Buf -> Action Buf`, also used by higher-order nodes.
    Monadic(MonadicFn),
    /// `Args -> Buf -> Bool`, also used by combinator nodes.
    Predicate(PredicateFn),
    /// `Args -> Buf -> a`.
    Property(PropertyFn),
}

/// One symbol table entry.
#[derive(Debug, Clone, Copy)]
pub struct SymbolEntry {
    /// Resolved function pointer.
    pub fun: FunctionPtr,
    /// Full textual signature, before binding.
    pub signature: &'static str,
    /// Hook run once after linking.
    pub init: Option<NodeHook>,
    /// Hook run once at teardown.
    pub fini: Option<NodeHook>,
}

/// The per-group symbol table.
#[derive(Debug, Default)]
pub struct SymbolTable {
    map: HashMap<String, SymbolEntry>,
}

impl SymbolTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in functional library registered.
    pub fn default_table() -> Self {
        let mut table = Self::new();
        crate::functional::install(&mut table);
        table
    }

    /// Register `name`; a previous entry under the same name is replaced.
    pub fn register(
        &mut self,
        name: &str,
        signature: &'static str,
        fun: FunctionPtr,
        init: Option<NodeHook>,
        fini: Option<NodeHook>,
    ) {
        self.map.insert(
            name.to_owned(),
            SymbolEntry {
                fun,
                signature,
                init,
                fini,
            },
        );
    }

    /// Look `name` up.
    pub fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        self.map.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_the_builtin_library() {
        let table = SymbolTable::default_table();
        for name in [
            "dummy", "vdummy", "inc", "dec", "mark", "crc16", "log_msg", "log_buff",
            "log_packet", "inv", "par", "filter", "is_ip", "is_udp", "is_tcp", "is_icmp",
            "state_is", "and", "or", "xor", "get_state", "get_mark",
        ] {
            assert!(table.lookup(name).is_some(), "missing builtin: {name}");
        }
        assert!(table.lookup("no_such_fun").is_none());
    }
}
