//! Miscellaneous monadic combinators: counters, CRC, logging, inversion and
//! the parallel fallback.

use pktq_types::{Buf, FanoutKind};

use super::headers::{self, IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP};
use crate::computation::{Args, CallTarget};
use crate::ratelimit::RateLimit;
use crate::symtable::{FunctionPtr, SymbolTable};

const CRC16: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_ARC);

fn dummy<'r, 'a>(args: Args<'r>, b: Buf<'a>) -> Option<Buf<'a>> {
    tracing::debug!(arg = args.word(), "dummy");
    Some(b)
}

fn vdummy<'r, 'a>(args: Args<'r>, b: Buf<'a>) -> Option<Buf<'a>> {
    match args.bytes() {
        Some(bytes) => {
            let data: Vec<i32> = bytes
                .chunks_exact(4)
                .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            tracing::debug!(len = data.len(), ?data, "vdummy");
        }
        None => tracing::debug!(arg = args.word(), "vdummy"),
    }
    Some(b)
}

fn dummy_init(_call: &CallTarget) -> i32 {
    tracing::debug!("dummy: init");
    0
}

fn dummy_fini(_call: &CallTarget) -> i32 {
    tracing::debug!("dummy: fini");
    0
}

fn inc_counter<'r, 'a>(args: Args<'r>, b: Buf<'a>) -> Option<Buf<'a>> {
    let idx = args.word() as usize;
    match b.ctx().and_then(|ctx| ctx.counter(idx)) {
        Some(ctr) => ctr.inc(),
        None => {
            static LIMIT: RateLimit = RateLimit::new(1_000);
            if LIMIT.check() {
                tracing::info!(idx, "counter: bad index");
            }
        }
    }
    Some(b)
}

fn dec_counter<'r, 'a>(args: Args<'r>, b: Buf<'a>) -> Option<Buf<'a>> {
    let idx = args.word() as usize;
    match b.ctx().and_then(|ctx| ctx.counter(idx)) {
        Some(ctr) => ctr.dec(),
        None => {
            static LIMIT: RateLimit = RateLimit::new(1_000);
            if LIMIT.check() {
                tracing::info!(idx, "counter: bad index");
            }
        }
    }
    Some(b)
}

fn mark<'r, 'a>(args: Args<'r>, mut b: Buf<'a>) -> Option<Buf<'a>> {
    b.meta.fanout.mark = args.word();
    Some(b)
}

fn crc16_sum<'r, 'a>(_args: Args<'r>, mut b: Buf<'a>) -> Option<Buf<'a>> {
    b.meta.state = u32::from(CRC16.checksum(b.data()));
    Some(b)
}

fn log_msg<'r, 'a>(args: Args<'r>, b: Buf<'a>) -> Option<Buf<'a>> {
    static LIMIT: RateLimit = RateLimit::new(1_000);
    if LIMIT.check() {
        tracing::info!(msg = args.text().unwrap_or_default(), "log_msg");
    }
    Some(b)
}

fn log_buff<'r, 'a>(_args: Args<'r>, b: Buf<'a>) -> Option<Buf<'a>> {
    static LIMIT: RateLimit = RateLimit::new(1_000);
    if !LIMIT.check() {
        return Some(b);
    }

    let head: Vec<String> = b.data().iter().take(14).map(|x| format!("{x:02x}")).collect();
    tracing::info!(
        len = b.wire_len(),
        captured = b.data().len(),
        head = head.join(" "),
        "log_buff"
    );
    Some(b)
}

fn log_packet<'r, 'a>(_args: Args<'r>, b: Buf<'a>) -> Option<Buf<'a>> {
    static LIMIT: RateLimit = RateLimit::new(1_000);
    if !LIMIT.check() {
        return Some(b);
    }

    let frame = b.data();
    match headers::ethertype(frame) {
        Some(headers::ETH_P_IP) => {
            let (Some(src), Some(dst), Some(proto)) = (
                headers::ipv4_saddr(frame),
                headers::ipv4_daddr(frame),
                headers::ipv4_proto(frame),
            ) else {
                return Some(b);
            };
            match (proto, headers::l4_ports(frame)) {
                (IPPROTO_UDP, Some((sp, dp))) => {
                    tracing::info!("IP {src}.{sp} > {dst}.{dp}: UDP");
                }
                (IPPROTO_TCP, Some((sp, dp))) => {
                    tracing::info!("IP {src}.{sp} > {dst}.{dp}: TCP");
                }
                (IPPROTO_ICMP, _) => tracing::info!("IP {src} > {dst}: ICMP"),
                (proto, _) => tracing::info!("IP {src} > {dst}: proto {proto:x}"),
            }
        }
        Some(ethertype) => tracing::info!("ETH proto {ethertype:x}"),
        None => {}
    }
    Some(b)
}

/// Invert the verdict of the referenced function: a dropped (or vanished)
/// result passes, a passed result drops.
fn inv<'r, 'a>(args: Args<'r>, b: Buf<'a>) -> Option<Buf<'a>> {
    let Some(f) = args.fun(0) else {
        tracing::debug!("inv: missing function argument");
        return Some(b);
    };

    match f.eval(b) {
        Some(mut nb) => {
            nb.meta.fanout.kind = if nb.meta.fanout.is_drop() {
                FanoutKind::Copy
            } else {
                FanoutKind::Drop
            };
            Some(nb)
        }
        None => {
            let mut nb = b;
            nb.meta.fanout.kind = FanoutKind::Copy;
            Some(nb)
        }
    }
}

/// Evaluate `f`; when it drops or vanishes the packet, restore the fanout
/// and fall back to `g`.
fn par<'r, 'a>(args: Args<'r>, b: Buf<'a>) -> Option<Buf<'a>> {
    let (Some(f), Some(g)) = (args.fun(0), args.fun(1)) else {
        tracing::debug!("par: missing function arguments");
        return Some(b);
    };

    let fout = b.meta.fanout;
    match f.eval(b) {
        Some(mut nb) => {
            if nb.meta.fanout.is_drop() {
                nb.meta.fanout = fout;
                return g.eval(nb);
            }
            Some(nb)
        }
        // `b` still carries the pre-`f` fanout.
        None => g.eval(b),
    }
}

/// Pass the packet iff the referenced predicate holds.
fn filter<'r, 'a>(args: Args<'r>, mut b: Buf<'a>) -> Option<Buf<'a>> {
    let Some(pred) = args.pred() else {
        return Some(b);
    };
    if !pred.eval_predicate(&b) {
        b.meta.fanout.kind = FanoutKind::Drop;
    }
    Some(b)
}

pub(super) fn install(table: &mut SymbolTable) {
    use FunctionPtr::Monadic;

    table.register("dummy", "Int -> Buf -> Action Buf", Monadic(dummy), Some(dummy_init), Some(dummy_fini));
    table.register("vdummy", "[Int] -> Buf -> Action Buf", Monadic(vdummy), Some(dummy_init), Some(dummy_fini));

    table.register("inc", "Int -> Buf -> Action Buf", Monadic(inc_counter), None, None);
    table.register("dec", "Int -> Buf -> Action Buf", Monadic(dec_counter), None, None);
    table.register("mark", "UInt64 -> Buf -> Action Buf", Monadic(mark), None, None);
    table.register("crc16", "Buf -> Action Buf", Monadic(crc16_sum), None, None);
    table.register("log_msg", "String -> Buf -> Action Buf", Monadic(log_msg), None, None);
    table.register("log_buff", "Buf -> Action Buf", Monadic(log_buff), None, None);
    table.register("log_packet", "Buf -> Action Buf", Monadic(log_packet), None, None);

    table.register(
        "inv",
        "(Buf -> Action Buf) -> Buf -> Action Buf",
        Monadic(inv),
        None,
        None,
    );
    table.register(
        "par",
        "(Buf -> Action Buf) -> (Buf -> Action Buf) -> Buf -> Action Buf",
        Monadic(par),
        None,
        None,
    );
    table.register(
        "filter",
        "(Buf -> Bool) -> Buf -> Action Buf",
        Monadic(filter),
        None,
        None,
    );
}
