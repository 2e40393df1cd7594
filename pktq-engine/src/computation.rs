//! Materialized computations.
//!
//! The builder turns a descriptor graph into a flat array of functional
//! nodes owned by a [`Computation`]. Nodes reference their argument storage
//! and sibling nodes by index, never by pointer, so the whole computation is
//! a single movable allocation; the evaluator resolves indices on dispatch.

use pktq_types::{Buf, Word};

use crate::arena::PodArena;
use crate::error::EngineError;

/// Monadic packet transformer.
pub type MonadicFn = for<'r, 'a> fn(Args<'r>, Buf<'a>) -> Option<Buf<'a>>;

/// Boolean function of a packet.
pub type PredicateFn = fn(Args<'_>, &Buf<'_>) -> bool;

/// Scalar extractor.
pub type PropertyFn = fn(Args<'_>, &Buf<'_>) -> Word;

/// Hook run once per node after linking (init) or at teardown (fini).
/// Nonzero return from an init hook aborts the install.
pub type NodeHook = fn(&CallTarget) -> i32;

/// Bound argument of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSlot {
    /// No argument.
    None,
    /// Argument of at most 8 bytes, zero-extended.
    Inline(Word),
    /// Wide argument stored in the computation's arena.
    Pod {
        /// Byte offset of the payload within the arena.
        offset: usize,
        /// Declared payload length.
        len: usize,
    },
    /// Function-valued argument referencing a sibling node.
    Fun(usize),
    /// Two function-valued arguments referencing sibling nodes.
    Fun2(usize, usize),
}

/// Resolved call target of a node, tagged by kind.
#[derive(Debug, Clone, Copy)]
pub enum CallTarget {
    /// Monadic transformer with its bound argument.
    Monadic {
        /// Resolved function.
        fun: MonadicFn,
        /// Bound argument.
        arg: ArgSlot,
    },
    /// Monadic transformer parameterized by a predicate node.
    HighOrder {
        /// Resolved function.
        fun: MonadicFn,
        /// Referenced predicate node.
        pred: usize,
    },
    /// Predicate with its bound argument and optional sub-function.
    Predicate {
        /// Resolved function.
        fun: PredicateFn,
        /// Bound argument.
        arg: ArgSlot,
        /// Referenced sub-function node, if any.
        pred: Option<usize>,
    },
    /// Boolean composition of two predicate nodes.
    Combinator {
        /// Resolved function.
        fun: PredicateFn,
        /// Left operand node.
        left: usize,
        /// Right operand node.
        right: usize,
    },
    /// Scalar extractor with its bound argument.
    Property {
        /// Resolved function.
        fun: PropertyFn,
        /// Bound argument.
        arg: ArgSlot,
    },
}

impl CallTarget {
    fn arg(&self) -> ArgSlot {
        match self {
            Self::Monadic { arg, .. } | Self::Predicate { arg, .. } | Self::Property { arg, .. } => {
                *arg
            }
            Self::HighOrder { .. } | Self::Combinator { .. } => ArgSlot::None,
        }
    }
}

/// One linked node of a computation.
#[derive(Debug)]
pub struct FunctionalNode {
    /// Resolved call target.
    pub call: CallTarget,
    /// Hook run once after linking.
    pub init: Option<NodeHook>,
    /// Hook run once at teardown.
    pub fini: Option<NodeHook>,
    /// Successor taken when the packet's branch bit is false.
    pub left: Option<usize>,
    /// Successor taken when the packet's branch bit is true.
    pub right: Option<usize>,
}

impl FunctionalNode {
    /// Node with no hooks and no successors.
    pub fn new(call: CallTarget) -> Self {
        Self {
            call,
            init: None,
            fini: None,
            left: None,
            right: None,
        }
    }

    /// Set the successor indices.
    pub fn with_links(mut self, left: Option<usize>, right: Option<usize>) -> Self {
        self.left = left;
        self.right = right;
        self
    }
}

/// An evaluable computation: the node array, its entry point and the
/// argument arena.
#[derive(Debug)]
pub struct Computation {
    entry_point: usize,
    nodes: Vec<FunctionalNode>,
    arena: PodArena,
    initialized: bool,
}

impl Computation {
    /// Computation assembled programmatically, without descriptors.
    /// No hooks are run.
    pub fn from_nodes(entry_point: usize, nodes: Vec<FunctionalNode>) -> Self {
        Self::from_parts(entry_point, nodes, PodArena::empty())
    }

    pub(crate) fn from_parts(entry_point: usize, nodes: Vec<FunctionalNode>, arena: PodArena) -> Self {
        Self {
            entry_point,
            nodes,
            arena,
            initialized: false,
        }
    }

    /// Number of nodes.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Index of the node evaluation starts from.
    pub fn entry_point(&self) -> usize {
        self.entry_point
    }

    /// Node at `index`; panics when out of range.
    pub fn node(&self, index: usize) -> &FunctionalNode {
        &self.nodes[index]
    }

    /// Run every init hook in node order. On the first nonzero return the
    /// fini hooks of the already-initialized prefix run, and the install
    /// aborts.
    pub(crate) fn run_init(&mut self) -> Result<(), EngineError> {
        for n in 0..self.nodes.len() {
            let node = &self.nodes[n];
            if let Some(init) = node.init {
                if init(&node.call) != 0 {
                    tracing::info!(node = n, "computation init: error in function");
                    for m in (0..n).rev() {
                        if let Some(fini) = self.nodes[m].fini {
                            fini(&self.nodes[m].call);
                        }
                    }
                    return Err(EngineError::InitHook { index: n });
                }
            }
        }
        self.initialized = true;
        Ok(())
    }

    pub(crate) fn arena_slice(&self, offset: usize, len: usize) -> &[u8] {
        self.arena.slice(offset, len)
    }
}

impl Drop for Computation {
    fn drop(&mut self) {
        if !self.initialized {
            return;
        }
        for node in &self.nodes {
            if let Some(fini) = node.fini {
                if fini(&node.call) != 0 {
                    tracing::info!("computation fini: error in function");
                }
            }
        }
    }
}

/// Borrowed view of a node's bound arguments, handed to every call.
#[derive(Debug, Clone, Copy)]
pub struct Args<'r> {
    comp: &'r Computation,
    index: usize,
}

impl<'r> Args<'r> {
    pub(crate) fn new(comp: &'r Computation, index: usize) -> Self {
        Self { comp, index }
    }

    fn slot(&self) -> ArgSlot {
        self.comp.node(self.index).call.arg()
    }

    /// The inline argument, zero when the node has none.
    pub fn word(&self) -> Word {
        match self.slot() {
            ArgSlot::Inline(w) => w,
            _ => 0,
        }
    }

    /// The wide argument's payload bytes, if the node has one.
    pub fn bytes(&self) -> Option<&'r [u8]> {
        match self.slot() {
            ArgSlot::Pod { offset, len } => Some(self.comp.arena_slice(offset, len)),
            _ => None,
        }
    }

    /// The wide argument as UTF-8 text, trailing NULs stripped.
    pub fn text(&self) -> Option<&'r str> {
        let bytes = self.bytes()?;
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        core::str::from_utf8(&bytes[..end]).ok()
    }

    /// The `k`-th function-valued argument.
    pub fn fun(&self, k: usize) -> Option<FunctionRef<'r>> {
        let index = match (self.slot(), k) {
            (ArgSlot::Fun(i), 0) => i,
            (ArgSlot::Fun2(i, _), 0) => i,
            (ArgSlot::Fun2(_, j), 1) => j,
            _ => return None,
        };
        Some(FunctionRef::new(self.comp, index))
    }

    /// The predicate node a higher-order or predicate call references.
    pub fn pred(&self) -> Option<FunctionRef<'r>> {
        match self.comp.node(self.index).call {
            CallTarget::HighOrder { pred, .. } => Some(FunctionRef::new(self.comp, pred)),
            CallTarget::Predicate { pred, .. } => pred.map(|p| FunctionRef::new(self.comp, p)),
            _ => None,
        }
    }

    /// The two operand nodes of a combinator call.
    pub fn operands(&self) -> Option<(FunctionRef<'r>, FunctionRef<'r>)> {
        match self.comp.node(self.index).call {
            CallTarget::Combinator { left, right, .. } => Some((
                FunctionRef::new(self.comp, left),
                FunctionRef::new(self.comp, right),
            )),
            _ => None,
        }
    }
}

/// Reference to a sibling node, evaluable by kind.
#[derive(Debug, Clone, Copy)]
pub struct FunctionRef<'r> {
    comp: &'r Computation,
    index: usize,
}

impl<'r> FunctionRef<'r> {
    pub(crate) fn new(comp: &'r Computation, index: usize) -> Self {
        Self { comp, index }
    }

    /// Index of the referenced node.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Apply the referenced monadic node to `buf`.
    pub fn eval<'a>(&self, buf: Buf<'a>) -> Option<Buf<'a>> {
        crate::eval::apply(self.comp, self.index, buf)
    }

    /// Evaluate the referenced predicate or combinator node.
    pub fn eval_predicate(&self, buf: &Buf<'_>) -> bool {
        let args = Args::new(self.comp, self.index);
        match self.comp.node(self.index).call {
            CallTarget::Predicate { fun, .. } | CallTarget::Combinator { fun, .. } => {
                fun(args, buf)
            }
            _ => {
                tracing::debug!(node = self.index, "predicate reference to non-boolean node");
                false
            }
        }
    }

    /// Evaluate the referenced property node.
    pub fn eval_property(&self, buf: &Buf<'_>) -> Word {
        let args = Args::new(self.comp, self.index);
        match self.comp.node(self.index).call {
            CallTarget::Property { fun, .. } => fun(args, buf),
            _ => {
                tracing::debug!(node = self.index, "property reference to non-property node");
                0
            }
        }
    }
}
