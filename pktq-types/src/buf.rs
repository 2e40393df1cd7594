use crate::context::GroupContext;
use crate::meta::Metadata;

/// Capture timestamp, seconds and nanoseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp {
    /// Seconds.
    pub sec: u32,
    /// Nanoseconds.
    pub nsec: u32,
}

/// A captured frame and its per-packet metadata.
///
/// The payload is borrowed from the capture path; `wire_len` is the length
/// of the frame on the wire and may exceed the bytes actually captured.
#[derive(Debug, Clone, Copy)]
pub struct Buf<'a> {
    data: &'a [u8],
    wire_len: u32,
    if_index: u32,
    hw_queue: u32,
    vlan_tci: u16,
    tstamp: Option<Timestamp>,
    ctx: Option<&'a GroupContext>,
    /// Monad state consulted and updated by functional nodes.
    pub meta: Metadata,
}

impl<'a> Buf<'a> {
    /// Buf over a fully captured frame.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            wire_len: data.len() as u32,
            if_index: 0,
            hw_queue: 0,
            vlan_tci: 0,
            tstamp: None,
            ctx: None,
            meta: Metadata::new(),
        }
    }

    /// Set the on-wire frame length, for truncated captures.
    pub fn with_wire_len(mut self, len: u32) -> Self {
        self.wire_len = len;
        self
    }

    /// Set the source interface index.
    pub fn with_if_index(mut self, if_index: u32) -> Self {
        self.if_index = if_index;
        self
    }

    /// Set the hardware RX queue.
    pub fn with_hw_queue(mut self, hw_queue: u32) -> Self {
        self.hw_queue = hw_queue;
        self
    }

    /// Set the VLAN tag control information.
    pub fn with_vlan_tci(mut self, tci: u16) -> Self {
        self.vlan_tci = tci;
        self
    }

    /// Set the capture timestamp.
    pub fn with_tstamp(mut self, ts: Timestamp) -> Self {
        self.tstamp = Some(ts);
        self
    }

    /// Captured payload bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Frame length on the wire.
    pub fn wire_len(&self) -> u32 {
        self.wire_len
    }

    /// Source interface index.
    pub fn if_index(&self) -> u32 {
        self.if_index
    }

    /// Hardware RX queue.
    pub fn hw_queue(&self) -> u32 {
        self.hw_queue
    }

    /// VLAN tag control information, zero when untagged.
    pub fn vlan_tci(&self) -> u16 {
        self.vlan_tci
    }

    /// Capture timestamp, if taken.
    pub fn tstamp(&self) -> Option<Timestamp> {
        self.tstamp
    }

    /// Group context installed by the evaluator preamble.
    pub fn ctx(&self) -> Option<&'a GroupContext> {
        self.ctx
    }

    /// Install the group context for this run.
    pub fn set_ctx(&mut self, ctx: &'a GroupContext) {
        self.ctx = Some(ctx);
    }
}
