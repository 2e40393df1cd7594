use pktq_engine::computation::{Args, MonadicFn};
use pktq_engine::eval::bind;
use pktq_engine::prelude::*;
use pktq_engine::symtable::FunctionPtr;
use pktq_engine::{ArgSlot, CallTarget, FunctionalNode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn pass<'r, 'a>(_args: Args<'r>, b: Buf<'a>) -> Option<Buf<'a>> {
    Some(b)
}

fn go_left<'r, 'a>(_args: Args<'r>, mut b: Buf<'a>) -> Option<Buf<'a>> {
    b.meta.right = false;
    Some(b)
}

fn drop_all<'r, 'a>(_args: Args<'r>, mut b: Buf<'a>) -> Option<Buf<'a>> {
    b.meta.fanout.kind = FanoutKind::Drop;
    Some(b)
}

fn vanish<'r, 'a>(_args: Args<'r>, _b: Buf<'a>) -> Option<Buf<'a>> {
    None
}

fn table() -> SymbolTable {
    let mut table = SymbolTable::default_table();
    table.register("pass", "Buf -> Action Buf", FunctionPtr::Monadic(pass), None, None);
    table.register("go_left", "Buf -> Action Buf", FunctionPtr::Monadic(go_left), None, None);
    table.register("drop_all", "Buf -> Action Buf", FunctionPtr::Monadic(drop_all), None, None);
    table.register("vanish", "Buf -> Action Buf", FunctionPtr::Monadic(vanish), None, None);
    table
}

fn groups() -> GroupTable {
    let mut groups = GroupTable::new();
    groups.join(0);
    groups
}

fn monadic(table: &SymbolTable, name: &str) -> MonadicFn {
    match table.lookup(name).expect("registered").fun {
        FunctionPtr::Monadic(f) => f,
        _ => panic!("{name} is not monadic"),
    }
}

fn frame(len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(2322u64);
    (0..len).map(|_| rng.gen()).collect()
}

fn inc(counter: i32) -> FunctionalDescr {
    FunctionalDescr::new("inc", FunKind::Monadic).with_arg(&counter.to_ne_bytes())
}

#[test]
fn identity_pipeline() {
    let table = table();
    let groups = groups();
    let descr = ComputationDescr::new(0, vec![FunctionalDescr::new("pass", FunKind::Monadic)]);
    let comp = link(&descr, &table).unwrap();

    let data = frame(64);
    let out = run(0, &groups, &comp, Buf::new(&data)).unwrap();

    assert_eq!(out.meta.fanout.kind, FanoutKind::Copy);
    assert_eq!(out.meta.class_mask, ClassMask::DEFAULT);
    assert_eq!(out.data(), &data[..]);
}

#[test]
fn missing_group_drops_the_packet() {
    let table = table();
    let groups = groups();
    let descr = ComputationDescr::new(0, vec![FunctionalDescr::new("pass", FunKind::Monadic)]);
    let comp = link(&descr, &table).unwrap();

    let data = frame(64);
    assert!(run(99, &groups, &comp, Buf::new(&data)).is_none());
}

#[test]
fn counters_accumulate_over_packets() {
    let table = table();
    let groups = groups();
    let descr = ComputationDescr::new(
        0,
        vec![
            inc(0).with_links(1, 1),
            FunctionalDescr::new("pass", FunKind::Monadic),
        ],
    );
    let comp = link(&descr, &table).unwrap();

    let data = frame(64);
    for _ in 0..10 {
        run(0, &groups, &comp, Buf::new(&data)).unwrap();
    }

    let ctx = groups.get(0).unwrap().ctx();
    assert_eq!(ctx.counter(0).unwrap().read(), 10);
}

#[test]
fn counters_are_shared_across_evaluator_threads() {
    let table = table();
    let groups = groups();
    let descr = ComputationDescr::new(0, vec![inc(0)]);
    let comp = link(&descr, &table).unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            let (groups, comp) = (&groups, &comp);
            s.spawn(move || {
                let data = frame(64);
                for _ in 0..25 {
                    run(0, groups, comp, Buf::new(&data)).unwrap();
                }
            });
        }
    });

    assert_eq!(groups.get(0).unwrap().ctx().counter(0).unwrap().read(), 100);
}

#[test]
fn branch_follows_the_packet_bit() {
    let table = table();
    let groups = groups();

    // Node 0 forces the left branch: only counter 0 moves.
    let left = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("go_left", FunKind::Monadic).with_links(1, 2),
            inc(0),
            inc(1),
        ],
    );
    let comp = link(&left, &table).unwrap();
    let data = frame(64);
    run(0, &groups, &comp, Buf::new(&data)).unwrap();

    let ctx = groups.get(0).unwrap().ctx();
    assert_eq!(ctx.counter(0).unwrap().read(), 1);
    assert_eq!(ctx.counter(1).unwrap().read(), 0);

    // The default branch is the right one.
    let right = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("pass", FunKind::Monadic).with_links(1, 2),
            inc(2),
            inc(3),
        ],
    );
    let comp = link(&right, &table).unwrap();
    run(0, &groups, &comp, Buf::new(&data)).unwrap();

    assert_eq!(ctx.counter(2).unwrap().read(), 0);
    assert_eq!(ctx.counter(3).unwrap().read(), 1);
}

#[test]
fn drop_short_circuits_the_walk() {
    let table = table();
    let groups = groups();
    let descr = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("drop_all", FunKind::Monadic).with_links(1, 1),
            inc(0),
        ],
    );
    let comp = link(&descr, &table).unwrap();

    let data = frame(64);
    let out = run(0, &groups, &comp, Buf::new(&data)).unwrap();

    assert!(out.meta.fanout.is_drop());
    let ctx = groups.get(0).unwrap().ctx();
    assert_eq!(ctx.counter(0).unwrap().read(), 0);
}

#[test]
fn vanished_buffer_ends_the_run() {
    let table = table();
    let groups = groups();
    let descr = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("vanish", FunKind::Monadic).with_links(1, 1),
            inc(0),
        ],
    );
    let comp = link(&descr, &table).unwrap();

    let data = frame(64);
    assert!(run(0, &groups, &comp, Buf::new(&data)).is_none());
    assert_eq!(groups.get(0).unwrap().ctx().counter(0).unwrap().read(), 0);
}

/// Compute a frame's CRC through a single-node pipeline.
fn crc_of(table: &SymbolTable, groups: &GroupTable, data: &[u8]) -> u32 {
    let descr = ComputationDescr::new(0, vec![FunctionalDescr::new("crc16", FunKind::Monadic)]);
    let comp = link(&descr, table).unwrap();
    run(0, groups, &comp, Buf::new(data)).unwrap().meta.state
}

#[test]
fn crc_filter_passes_only_matching_frames() {
    let table = table();
    let groups = groups();

    let data = frame(60);
    let crc = crc_of(&table, &groups, &data);

    let descr = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("crc16", FunKind::Monadic).with_links(1, 1),
            FunctionalDescr::new("filter", FunKind::HighOrder).with_fun(2),
            FunctionalDescr::new("state_is", FunKind::Predicate)
                .with_arg(&u64::from(crc).to_ne_bytes()),
        ],
    );
    let comp = link(&descr, &table).unwrap();

    let out = run(0, &groups, &comp, Buf::new(&data)).unwrap();
    assert!(!out.meta.fanout.is_drop());
    assert_eq!(out.meta.state, crc);

    // Any other frame misses the filter.
    let mut tampered = data.clone();
    tampered[59] ^= 0x01;
    let out = run(0, &groups, &comp, Buf::new(&tampered)).unwrap();
    assert!(out.meta.fanout.is_drop());
}

#[test]
fn inversion_law() {
    let table = table();
    let groups = groups();
    let data = frame(64);

    // inv(drop_all) passes.
    let descr = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("inv", FunKind::Monadic).with_fun(1),
            FunctionalDescr::new("drop_all", FunKind::Monadic),
        ],
    );
    let comp = link(&descr, &table).unwrap();
    let out = run(0, &groups, &comp, Buf::new(&data)).unwrap();
    assert!(!out.meta.fanout.is_drop());

    // inv(pass) drops.
    let descr = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("inv", FunKind::Monadic).with_fun(1),
            FunctionalDescr::new("pass", FunKind::Monadic),
        ],
    );
    let comp = link(&descr, &table).unwrap();
    let out = run(0, &groups, &comp, Buf::new(&data)).unwrap();
    assert!(out.meta.fanout.is_drop());

    // inv(vanish) passes the original buffer.
    let descr = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("inv", FunKind::Monadic).with_fun(1),
            FunctionalDescr::new("vanish", FunKind::Monadic),
        ],
    );
    let comp = link(&descr, &table).unwrap();
    let out = run(0, &groups, &comp, Buf::new(&data)).unwrap();
    assert!(!out.meta.fanout.is_drop());
    assert_eq!(out.data(), &data[..]);

    // inv(inv(f)) behaves as f.
    for f in ["pass", "drop_all"] {
        let doubled = ComputationDescr::new(
            0,
            vec![
                FunctionalDescr::new("inv", FunKind::Monadic).with_fun(1),
                FunctionalDescr::new("inv", FunKind::Monadic).with_fun(2),
                FunctionalDescr::new(f, FunKind::Monadic),
            ],
        );
        let plain = ComputationDescr::new(0, vec![FunctionalDescr::new(f, FunKind::Monadic)]);

        let doubled = link(&doubled, &table).unwrap();
        let plain = link(&plain, &table).unwrap();

        let a = run(0, &groups, &doubled, Buf::new(&data)).unwrap();
        let b = run(0, &groups, &plain, Buf::new(&data)).unwrap();
        assert_eq!(a.meta.fanout.is_drop(), b.meta.fanout.is_drop(), "inv(inv({f}))");
    }
}

#[test]
fn par_falls_back_from_the_snapshotted_fanout() {
    let table = table();
    let data = frame(64);

    let nodes = vec![
        FunctionalNode::new(CallTarget::Monadic {
            fun: monadic(&table, "par"),
            arg: ArgSlot::Fun2(1, 2),
        }),
        FunctionalNode::new(CallTarget::Monadic {
            fun: monadic(&table, "drop_all"),
            arg: ArgSlot::None,
        }),
        FunctionalNode::new(CallTarget::Monadic {
            fun: monadic(&table, "mark"),
            arg: ArgSlot::Inline(7),
        }),
    ];
    let comp = Computation::from_nodes(0, nodes);

    let out = bind(Buf::new(&data), &comp).unwrap();
    assert_eq!(out.meta.fanout.mark, 7);
    assert!(!out.meta.fanout.is_drop());

    // A vanished f falls back to g as well.
    let nodes = vec![
        FunctionalNode::new(CallTarget::Monadic {
            fun: monadic(&table, "par"),
            arg: ArgSlot::Fun2(1, 2),
        }),
        FunctionalNode::new(CallTarget::Monadic {
            fun: monadic(&table, "vanish"),
            arg: ArgSlot::None,
        }),
        FunctionalNode::new(CallTarget::Monadic {
            fun: monadic(&table, "mark"),
            arg: ArgSlot::Inline(7),
        }),
    ];
    let comp = Computation::from_nodes(0, nodes);

    let out = bind(Buf::new(&data), &comp).unwrap();
    assert_eq!(out.meta.fanout.mark, 7);
    assert!(!out.meta.fanout.is_drop());

    // When f passes, g never runs.
    let nodes = vec![
        FunctionalNode::new(CallTarget::Monadic {
            fun: monadic(&table, "par"),
            arg: ArgSlot::Fun2(1, 2),
        }),
        FunctionalNode::new(CallTarget::Monadic {
            fun: monadic(&table, "pass"),
            arg: ArgSlot::None,
        }),
        FunctionalNode::new(CallTarget::Monadic {
            fun: monadic(&table, "mark"),
            arg: ArgSlot::Inline(7),
        }),
    ];
    let comp = Computation::from_nodes(0, nodes);

    let out = bind(Buf::new(&data), &comp).unwrap();
    assert_eq!(out.meta.fanout.mark, 0);
}

/// 60-byte Ethernet/IPv4/UDP frame, 10.0.0.1:53 > 10.0.0.2:1234.
fn udp_frame() -> Vec<u8> {
    let mut s = String::new();
    s.push_str("ffffffffffff0011223344550800");
    s.push_str("4500002e00004000401100000a0000010a000002");
    s.push_str("003504d2001a0000");
    s.push_str(&"00".repeat(18));
    hex::decode(s).unwrap()
}

#[test]
fn combinators_compose_predicates() {
    let table = table();
    let groups = groups();

    let mut data = udp_frame();

    let descr = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("filter", FunKind::HighOrder).with_fun(3),
            FunctionalDescr::new("is_ip", FunKind::Predicate),
            FunctionalDescr::new("is_udp", FunKind::Predicate),
            FunctionalDescr::new("and", FunKind::Combinator).with_operands(1, 2),
        ],
    );
    let comp = link(&descr, &table).unwrap();

    let out = run(0, &groups, &comp, Buf::new(&data)).unwrap();
    assert!(!out.meta.fanout.is_drop());

    data[23] = 6; // TCP
    let out = run(0, &groups, &comp, Buf::new(&data)).unwrap();
    assert!(out.meta.fanout.is_drop());
}

#[test]
fn wide_arguments_travel_through_the_arena() {
    let table = table();
    let groups = groups();

    let ints: Vec<u8> = [1i32, 2, 3, 4].iter().flat_map(|v| v.to_ne_bytes()).collect();
    let descr = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("log_msg", FunKind::Monadic)
                .with_arg(b"hello, pipeline")
                .with_links(1, 1),
            FunctionalDescr::new("vdummy", FunKind::Monadic).with_arg(&ints),
        ],
    );
    let comp = link(&descr, &table).unwrap();

    let data = udp_frame();
    let out = run(0, &groups, &comp, Buf::new(&data)).unwrap();
    assert!(!out.meta.fanout.is_drop());
}

#[test]
fn failing_init_hook_unwinds_the_prefix() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static INITS: AtomicUsize = AtomicUsize::new(0);
    static FINIS: AtomicUsize = AtomicUsize::new(0);

    fn witness_init(_call: &CallTarget) -> i32 {
        INITS.fetch_add(1, Ordering::SeqCst);
        0
    }
    fn witness_fini(_call: &CallTarget) -> i32 {
        FINIS.fetch_add(1, Ordering::SeqCst);
        0
    }
    fn bad_init(_call: &CallTarget) -> i32 {
        -1
    }

    let mut table = table();
    table.register(
        "witness",
        "Buf -> Action Buf",
        FunctionPtr::Monadic(pass),
        Some(witness_init),
        Some(witness_fini),
    );
    table.register(
        "bad_init",
        "Buf -> Action Buf",
        FunctionPtr::Monadic(pass),
        Some(bad_init),
        None,
    );

    let descr = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("witness", FunKind::Monadic),
            FunctionalDescr::new("bad_init", FunKind::Monadic),
        ],
    );

    assert_eq!(
        link(&descr, &table).unwrap_err(),
        EngineError::InitHook { index: 1 }
    );
    assert_eq!(INITS.load(Ordering::SeqCst), 1);
    assert_eq!(FINIS.load(Ordering::SeqCst), 1);
}

#[test]
fn fini_hooks_run_once_at_teardown() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static FINIS: AtomicUsize = AtomicUsize::new(0);

    fn counting_fini(_call: &CallTarget) -> i32 {
        FINIS.fetch_add(1, Ordering::SeqCst);
        0
    }

    let mut table = table();
    table.register(
        "finalized",
        "Buf -> Action Buf",
        FunctionPtr::Monadic(pass),
        None,
        Some(counting_fini),
    );

    let descr = ComputationDescr::new(
        0,
        vec![
            FunctionalDescr::new("finalized", FunKind::Monadic).with_links(1, 1),
            FunctionalDescr::new("finalized", FunKind::Monadic),
        ],
    );

    let comp = link(&descr, &table).unwrap();
    assert_eq!(FINIS.load(Ordering::SeqCst), 0);
    drop(comp);
    assert_eq!(FINIS.load(Ordering::SeqCst), 2);
}
