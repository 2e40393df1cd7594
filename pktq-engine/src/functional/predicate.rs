//! Protocol and state predicates.

use pktq_types::Buf;

use super::headers::{self, IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP};
use crate::computation::Args;
use crate::symtable::{FunctionPtr, SymbolTable};

fn is_ip(_args: Args<'_>, b: &Buf<'_>) -> bool {
    headers::ethertype(b.data()) == Some(headers::ETH_P_IP)
}

fn is_udp(_args: Args<'_>, b: &Buf<'_>) -> bool {
    headers::ipv4_proto(b.data()) == Some(IPPROTO_UDP)
}

fn is_tcp(_args: Args<'_>, b: &Buf<'_>) -> bool {
    headers::ipv4_proto(b.data()) == Some(IPPROTO_TCP)
}

fn is_icmp(_args: Args<'_>, b: &Buf<'_>) -> bool {
    headers::ipv4_proto(b.data()) == Some(IPPROTO_ICMP)
}

/// The packet's scratch state equals the bound argument.
fn state_is(args: Args<'_>, b: &Buf<'_>) -> bool {
    u64::from(b.meta.state) == args.word()
}

pub(super) fn install(table: &mut SymbolTable) {
    use FunctionPtr::Predicate;

    table.register("is_ip", "Buf -> Bool", Predicate(is_ip), None, None);
    table.register("is_udp", "Buf -> Bool", Predicate(is_udp), None, None);
    table.register("is_tcp", "Buf -> Bool", Predicate(is_tcp), None, None);
    table.register("is_icmp", "Buf -> Bool", Predicate(is_icmp), None, None);
    table.register("state_is", "UInt64 -> Buf -> Bool", Predicate(state_is), None, None);
}
