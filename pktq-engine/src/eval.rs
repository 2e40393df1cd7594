//! Per-packet dispatch.
//!
//! Branching is carried inside the packet: every application first sets the
//! branch bit to "right", the node may flip it, and the loop follows the
//! corresponding successor. A drop disposition or a vanished buffer ends the
//! walk.

use pktq_types::{ActionAttrs, Buf, ClassMask, FanoutKind};

use crate::computation::{Args, CallTarget, Computation};
use crate::group::GroupTable;

/// Apply the node at `index` to `buf`.
pub fn apply<'a>(comp: &Computation, index: usize, mut buf: Buf<'a>) -> Option<Buf<'a>> {
    buf.meta.right = true;
    match comp.node(index).call {
        CallTarget::Monadic { fun, .. } | CallTarget::HighOrder { fun, .. } => {
            fun(Args::new(comp, index), buf)
        }
        _ => Some(buf),
    }
}

/// Thread `buf` through the computation starting at its entry point.
pub fn bind<'a>(mut buf: Buf<'a>, comp: &Computation) -> Option<Buf<'a>> {
    let mut next = Some(comp.entry_point());

    while let Some(index) = next {
        buf = apply(comp, index, buf)?;

        if buf.meta.fanout.is_drop() {
            return Some(buf);
        }

        let node = comp.node(index);
        next = if buf.meta.right { node.right } else { node.left };
    }

    Some(buf)
}

/// Run the computation installed for group `gid` on one packet.
///
/// Returns `None` when the group does not exist or a node consumed the
/// buffer; the caller drops the packet in both cases.
pub fn run<'a>(
    gid: usize,
    groups: &'a GroupTable,
    comp: &Computation,
    mut buf: Buf<'a>,
) -> Option<Buf<'a>> {
    let group = groups.get(gid)?;

    buf.set_ctx(group.ctx());
    buf.meta.fanout.kind = FanoutKind::Copy;
    buf.meta.class_mask = ClassMask::DEFAULT;
    buf.meta.attrs = ActionAttrs::empty();

    bind(buf, comp)
}
