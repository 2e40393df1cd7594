//! Group membership, reduced to what the evaluator needs: a gid keyed map
//! owning each group's shared context. Administrative contexts mutate the
//! table; the packet path only reads it.

use std::collections::HashMap;

use pktq_types::GroupContext;

/// One capture group.
#[derive(Debug, Default)]
pub struct Group {
    ctx: GroupContext,
}

impl Group {
    /// Group with a fresh context.
    pub fn new() -> Self {
        Self::default()
    }

    /// The group's shared context.
    pub fn ctx(&self) -> &GroupContext {
        &self.ctx
    }
}

/// gid to group map.
#[derive(Debug, Default)]
pub struct GroupTable {
    groups: HashMap<usize, Group>,
}

impl GroupTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create group `gid` if absent.
    pub fn join(&mut self, gid: usize) -> &mut Group {
        self.groups.entry(gid).or_default()
    }

    /// Remove group `gid`.
    pub fn leave(&mut self, gid: usize) {
        self.groups.remove(&gid);
    }

    /// Group `gid`, if present.
    pub fn get(&self, gid: usize) -> Option<&Group> {
        self.groups.get(&gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_get_leave() {
        let mut table = GroupTable::new();
        table.join(3);
        assert!(table.get(3).is_some());
        assert!(table.get(4).is_none());
        table.leave(3);
        assert!(table.get(3).is_none());
    }
}
