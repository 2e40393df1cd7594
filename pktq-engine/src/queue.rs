//! Double-buffered multi-producer delivery queue.
//!
//! The queue memory is one persistent header followed by two equal halves of
//! packet slots; the layout is user-space ABI. Producers reserve a slot with
//! a single `fetch_add` on the `data` word, which encodes the fill level of
//! the active half in its low bits and the half index in its top bit, so a
//! winning producer owns a unique slot without compare-and-swap retries. A
//! slot is published by storing the half index into its `ready` field after
//! a release fence; the consumer drains the opposite half and swaps by
//! publishing a `data` word with a cleared length and a flipped index.

use core::ptr::{self, NonNull};
use core::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use pktq_types::{Buf, Timestamp};
use static_assertions::const_assert_eq;

use crate::arena::align_up;
use crate::error::EngineError;

const PAGE_SIZE: usize = 4096;
const SHMLBA: usize = PAGE_SIZE;

/// Low bits of `data`: slots reserved in the active half.
pub const QUEUE_LEN_MASK: u32 = 0x7fff_ffff;

/// Top bit of `data`: index of the active half.
pub const QUEUE_INDEX_SHIFT: u32 = 31;

/// Producers attempt a watermark wake-up once per this many reservations.
const WAKE_STRIDE_MASK: u32 = 1023;

/// Fill level encoded in a `data` word.
pub const fn queue_len(data: u32) -> u32 {
    data & QUEUE_LEN_MASK
}

/// Half index encoded in a `data` word.
pub const fn queue_index(data: u32) -> u32 {
    data >> QUEUE_INDEX_SHIFT
}

/// Persistent queue header, mapped at the start of the region.
#[repr(C)]
struct QueueHdr {
    data: AtomicU32,
    poll_wait: AtomicU32,
}

/// Per-slot header preceding the payload. `ready` is written last and
/// carries the producing half index.
#[repr(C)]
struct SlotHeader {
    len: u32,
    caplen: u32,
    sec: u32,
    nsec: u32,
    if_index: u8,
    hw_queue: u8,
    vlan_tci: u16,
    ready: AtomicU32,
}

/// Byte size of [`SlotHeader`], part of the slot stride.
pub const SLOT_HEADER_SIZE: usize = core::mem::size_of::<SlotHeader>();

const_assert_eq!(core::mem::size_of::<QueueHdr>(), 8);
const_assert_eq!(SLOT_HEADER_SIZE, 24);

/// Queue geometry and capture policy.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueConfig {
    /// Packet slots per half.
    pub slots: usize,
    /// Byte stride of one slot, header included.
    pub slot_size: usize,
    /// Bytes of every frame skipped before capture.
    pub offset: usize,
    /// Capture length: at most this many payload bytes per slot.
    pub caplen: usize,
    /// Whether slot timestamps are filled.
    pub tstamp: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            slots: 1024,
            slot_size: SLOT_HEADER_SIZE + 1514,
            offset: 0,
            caplen: 1514,
            tstamp: false,
        }
    }
}

/// Page-aligned zeroed memory shared with the consumer mapping.
struct SharedRegion {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the region is plain bytes; all cross-thread access goes through
// the atomic words embedded in it, with the ready protocol ordering the
// non-atomic payload writes.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    fn alloc(size: usize) -> Result<Self, EngineError> {
        let layout = Layout::from_size_align(size, PAGE_SIZE)
            .map_err(|_| EngineError::Config("queue size overflows the address space"))?;
        // SAFETY: layout has nonzero size; both halves plus the header are
        // at least one page.
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(EngineError::NoMemory)?;
        Ok(Self { ptr, layout })
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        // SAFETY: allocated by `alloc` with this exact layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// The multi-producer double-buffered queue.
pub struct MpdbQueue {
    region: SharedRegion,
    config: QueueConfig,
    half_bytes: usize,
    wake_count: AtomicU64,
    waiter: Mutex<()>,
    cond: Condvar,
}

impl MpdbQueue {
    /// Allocate a queue for `config`.
    pub fn new(config: QueueConfig) -> Result<Self, EngineError> {
        if config.slots == 0 {
            return Err(EngineError::Config("no slots"));
        }
        if config.slots as u64 * 2 > QUEUE_LEN_MASK as u64 {
            return Err(EngineError::Config("slot count exceeds the length field"));
        }
        if config.slot_size < SLOT_HEADER_SIZE + config.caplen {
            return Err(EngineError::Config("slot too small for the capture length"));
        }

        let half_bytes = config
            .slots
            .checked_mul(config.slot_size)
            .ok_or(EngineError::Config("queue size overflows the address space"))?;
        let queue_mem = core::mem::size_of::<QueueHdr>() + 2 * half_bytes;

        let mut pages = align_up(queue_mem, PAGE_SIZE) / PAGE_SIZE;
        let granule = SHMLBA.max(PAGE_SIZE) / PAGE_SIZE;
        pages = align_up(pages, granule);

        let region = SharedRegion::alloc(pages * PAGE_SIZE)?;
        tracing::info!(
            slots = config.slots,
            caplen = config.caplen,
            mem = pages * PAGE_SIZE,
            "queue allocated"
        );

        Ok(Self {
            region,
            config,
            half_bytes,
            wake_count: AtomicU64::new(0),
            waiter: Mutex::new(()),
            cond: Condvar::new(),
        })
    }

    /// Total bytes of the mapped region.
    pub fn mem_size(&self) -> usize {
        self.layout_size()
    }

    fn layout_size(&self) -> usize {
        self.region.layout.size()
    }

    /// The queue geometry.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Current raw `data` word, decodable with [`queue_len`] and
    /// [`queue_index`].
    pub fn raw_data(&self) -> u32 {
        self.hdr().data.load(Ordering::Relaxed)
    }

    fn hdr(&self) -> &QueueHdr {
        // SAFETY: the region starts with a zero-initialized QueueHdr and
        // outlives `self`; both fields are atomics.
        unsafe { &*(self.region.ptr.as_ptr() as *const QueueHdr) }
    }

    fn slot_ptr(&self, q_index: u32, pos: usize) -> *mut u8 {
        // SAFETY: callers pass pos < slots, so the offset stays inside the
        // half selected by the index bit.
        unsafe {
            self.region.ptr.as_ptr().add(
                core::mem::size_of::<QueueHdr>()
                    + (q_index & 1) as usize * self.half_bytes
                    + pos * self.config.slot_size,
            )
        }
    }

    /// Enqueue one packet. Returns false when the active half is full or
    /// the payload copy cannot be satisfied.
    pub fn enqueue(&self, buf: &Buf<'_>) -> bool {
        let d = self.hdr().data.fetch_add(1, Ordering::AcqRel);
        self.enqueue_slot(d, buf)
    }

    /// Enqueue a batch, reserving all slots up front. Returns how many
    /// packets were placed; the remainder of the batch is dropped once the
    /// half fills up.
    pub fn enqueue_batch(&self, bufs: &[Buf<'_>]) -> usize {
        if bufs.is_empty() {
            return 0;
        }
        let first = self
            .hdr()
            .data
            .fetch_add(bufs.len() as u32, Ordering::AcqRel);

        let mut sent = 0;
        for (k, buf) in bufs.iter().enumerate() {
            if !self.enqueue_slot(first + k as u32, buf) {
                break;
            }
            sent += 1;
        }
        sent
    }

    /// Fill the slot reserved by the pre-increment word `d`.
    fn enqueue_slot(&self, d: u32, buf: &Buf<'_>) -> bool {
        let cfg = &self.config;
        let q_len = queue_len(d) + 1;
        let q_index = queue_index(d);

        if q_len as usize > cfg.slots {
            if self.poll_wait_set() {
                self.wake();
            }
            return false;
        }

        let bytes = (buf.wire_len() as usize)
            .saturating_sub(cfg.offset)
            .min(cfg.caplen);
        let avail = buf.data().len().saturating_sub(cfg.offset);
        if bytes > avail {
            tracing::error!(
                bytes,
                avail,
                wire_len = buf.wire_len(),
                offset = cfg.offset,
                "BUG: payload copy failed"
            );
            return false;
        }

        let slot = self.slot_ptr(q_index, (q_len - 1) as usize);

        // SAFETY: the reservation protocol hands this slot to exactly one
        // producer until the consumer swaps the half back in; writes stay
        // within slot_size (caplen + header fits by construction).
        unsafe {
            if bytes > 0 {
                ptr::copy_nonoverlapping(
                    buf.data().as_ptr().add(cfg.offset),
                    slot.add(SLOT_HEADER_SIZE),
                    bytes,
                );
            }

            let hdr = slot as *mut SlotHeader;
            ptr::addr_of_mut!((*hdr).len).write(buf.wire_len());
            ptr::addr_of_mut!((*hdr).caplen).write(bytes as u32);
            ptr::addr_of_mut!((*hdr).if_index).write((buf.if_index() & 0xff) as u8);
            ptr::addr_of_mut!((*hdr).hw_queue).write((buf.hw_queue() & 0xff) as u8);
            if cfg.tstamp {
                let ts = buf.tstamp().unwrap_or_default();
                ptr::addr_of_mut!((*hdr).sec).write(ts.sec);
                ptr::addr_of_mut!((*hdr).nsec).write(ts.nsec);
            }
            if buf.vlan_tci() != 0 {
                ptr::addr_of_mut!((*hdr).vlan_tci).write(buf.vlan_tci());
            }

            // Commit the slot (release semantics).
            fence(Ordering::Release);
            (*ptr::addr_of!((*hdr).ready)).store(q_index, Ordering::Relaxed);
        }

        // Watermark.
        if q_len as usize > cfg.slots / 2 && self.poll_wait_set() && (d & WAKE_STRIDE_MASK) == 0 {
            self.wake();
        }
        true
    }

    /// Publish a fresh `data` word with a cleared length and a flipped
    /// half index, and return a view of the half producers were filling.
    pub fn swap(&self) -> HalfView<'_> {
        let cur = queue_index(self.hdr().data.load(Ordering::Relaxed));
        let d = self
            .hdr()
            .data
            .swap((cur ^ 1) << QUEUE_INDEX_SHIFT, Ordering::AcqRel);

        HalfView {
            queue: self,
            index: queue_index(d),
            len: (queue_len(d) as usize).min(self.config.slots),
        }
    }

    fn poll_wait_set(&self) -> bool {
        self.hdr().poll_wait.load(Ordering::Relaxed) != 0
    }

    /// Announce (or withdraw) the consumer's intent to sleep.
    pub fn set_poll_wait(&self, on: bool) {
        self.hdr().poll_wait.store(u32::from(on), Ordering::SeqCst);
    }

    /// Wake-ups issued by producers so far.
    pub fn wakeups(&self) -> u64 {
        self.wake_count.load(Ordering::Acquire)
    }

    fn wake(&self) {
        self.wake_count.fetch_add(1, Ordering::Release);
        let _guard = self.waiter.lock().unwrap_or_else(PoisonError::into_inner);
        self.cond.notify_one();
    }

    /// Consumer-side sleep until a producer wake-up or `timeout`. Returns
    /// whether a wake-up arrived.
    pub fn poll(&self, timeout: Duration) -> bool {
        let seen = self.wakeups();
        self.set_poll_wait(true);

        let deadline = Instant::now() + timeout;
        let mut guard = self.waiter.lock().unwrap_or_else(PoisonError::into_inner);
        let woken = loop {
            if self.wakeups() > seen {
                break true;
            }
            let now = Instant::now();
            if now >= deadline {
                break false;
            }
            let (g, _) = self
                .cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            guard = g;
        };
        drop(guard);

        self.set_poll_wait(false);
        woken
    }
}

impl Drop for MpdbQueue {
    fn drop(&mut self) {
        tracing::info!("queue freed");
    }
}

impl core::fmt::Debug for MpdbQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MpdbQueue")
            .field("config", &self.config)
            .field("mem", &self.layout_size())
            .finish()
    }
}

/// One committed packet slot, as seen by the consumer.
#[derive(Debug)]
pub struct SlotView<'q> {
    /// Frame length on the wire.
    pub len: u32,
    /// Captured bytes present in the payload.
    pub caplen: u32,
    /// Low byte of the source interface index.
    pub if_index: u8,
    /// Low byte of the hardware RX queue.
    pub hw_queue: u8,
    /// VLAN tag control information.
    pub vlan_tci: u16,
    /// Capture timestamp, zero when disabled.
    pub tstamp: Timestamp,
    payload: &'q [u8],
}

impl<'q> SlotView<'q> {
    /// Captured payload bytes.
    pub fn payload(&self) -> &'q [u8] {
        self.payload
    }
}

/// Consumer view of one drained half.
#[derive(Debug)]
pub struct HalfView<'q> {
    queue: &'q MpdbQueue,
    index: u32,
    len: usize,
}

impl<'q> HalfView<'q> {
    /// Slots reserved in this half, committed or not.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no slot was reserved.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of this half.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The slot at `at`, or `None` when it is out of range or its producer
    /// has not committed yet.
    pub fn slot(&self, at: usize) -> Option<SlotView<'q>> {
        if at >= self.len {
            return None;
        }
        let slot = self.queue.slot_ptr(self.index, at);

        // SAFETY: an acquire load of `ready` equal to this half's index
        // synchronizes with the producer's release, making the header and
        // payload writes visible; the payload slice stays within the slot.
        unsafe {
            let hdr = slot as *const SlotHeader;
            if (*ptr::addr_of!((*hdr).ready)).load(Ordering::Acquire) != self.index {
                return None;
            }

            let caplen = ptr::addr_of!((*hdr).caplen).read();
            let max = self.queue.config.slot_size - SLOT_HEADER_SIZE;
            Some(SlotView {
                len: ptr::addr_of!((*hdr).len).read(),
                caplen,
                if_index: ptr::addr_of!((*hdr).if_index).read(),
                hw_queue: ptr::addr_of!((*hdr).hw_queue).read(),
                vlan_tci: ptr::addr_of!((*hdr).vlan_tci).read(),
                tstamp: Timestamp {
                    sec: ptr::addr_of!((*hdr).sec).read(),
                    nsec: ptr::addr_of!((*hdr).nsec).read(),
                },
                payload: core::slice::from_raw_parts(
                    slot.add(SLOT_HEADER_SIZE),
                    (caplen as usize).min(max),
                ),
            })
        }
    }

    /// Committed slots in reservation order, stopping at the first slot
    /// whose producer has not committed yet.
    pub fn iter(&self) -> impl Iterator<Item = SlotView<'q>> + '_ {
        (0..self.len).map_while(move |at| self.slot(at))
    }
}
