use crate::Word;

bitflags::bitflags! {
    /// Delivery classes a packet may be dispatched to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassMask: u64 {
        /// The default delivery class.
        const DEFAULT = 1;
        /// Class reserved for user-defined steering.
        const USER = 1 << 1;
        /// Class reserved for control traffic.
        const CONTROL = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Attributes a functional node may attach to the pending action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActionAttrs: u32 {
        /// The frame must not be passed back to the capture stack.
        const STOLEN = 1;
        /// The frame must be returned to the capture stack after delivery.
        const RET_TO_STACK = 1 << 1;
    }
}

/// Disposition of a packet as decided by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum FanoutKind {
    /// Deliver a copy and let the frame continue.
    Copy = 0,
    /// Deliver the frame and steal it from the capture stack.
    Steal = 1,
    /// Discard the frame.
    Drop = 2,
}

/// Classification word carried by every packet.
///
/// The fanout is the part of the monad state that a fallback combinator
/// snapshots and restores, so it carries the disposition, the steering hash
/// and the mark together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fanout {
    /// Disposition of the packet.
    pub kind: FanoutKind,
    /// Steering hash, zero when unused.
    pub hash: u32,
    /// User mark attached by the `mark` combinator.
    pub mark: Word,
}

impl Fanout {
    /// Fanout of a freshly admitted packet.
    pub const fn new() -> Self {
        Self {
            kind: FanoutKind::Copy,
            hash: 0,
            mark: 0,
        }
    }

    /// Whether the packet has been marked for discard.
    pub const fn is_drop(&self) -> bool {
        matches!(self.kind, FanoutKind::Drop)
    }
}

impl Default for Fanout {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-packet monad state threaded through the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// Classification word; `fanout.is_drop()` terminates evaluation.
    pub fanout: Fanout,
    /// Delivery classes the packet is eligible for.
    pub class_mask: ClassMask,
    /// Attributes attached by functional nodes.
    pub attrs: ActionAttrs,
    /// Branch bit consulted by the evaluator to pick the successor.
    pub right: bool,
    /// Scratch word written by stateful combinators such as `crc16`.
    pub state: u32,
}

impl Metadata {
    /// State of a packet entering the pipeline.
    pub const fn new() -> Self {
        Self {
            fanout: Fanout::new(),
            class_mask: ClassMask::DEFAULT,
            attrs: ActionAttrs::empty(),
            right: true,
            state: 0,
        }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}
