//! Single-producer/multi-consumer ring buffers carrying fixed-size samples
//!
//! Each stream in a flow graph is backed by one [`BufferWriter`] (owned by
//! the producing block's detail) and any number of [`BufferReader`]s, one
//! per consumer, each with an independent read cursor. Cursors are absolute
//! item counts: `nitems_written` for the producer, `nitems_read` per
//! consumer, both monotone, with `read <= written` and the occupied span
//! `written - min(read)` never exceeding capacity.
//!
//! Spans handed out are always linear, even across the wrap point: the
//! storage is allocated twice over and every produced region is copied into
//! the mirror half before the write cursor is published, so a span of up to
//! `capacity` items starting at any cursor position is contiguous. Blocks
//! cannot observe the wrap.
//!
//! The write cursor is published with release ordering and read with
//! acquire ordering; the tag store attached to the buffer is protected by a
//! lock, so tags flushed before a cursor advance are visible to any
//! consumer that observes the advance.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::tag::{Symbol, Tag, TagStore};
use super::watchdog::{WaitGuard, WatchdogHandle};

/// How long a blocking wait parks before re-checking the stop flag.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Byte storage, u64-word backed so every primitive sample type is aligned.
struct Storage {
    words: Box<[UnsafeCell<u64>]>,
}

impl Storage {
    fn new(bytes: usize) -> Self {
        let words = (0..bytes.div_ceil(8))
            .map(|_| UnsafeCell::new(0u64))
            .collect();
        Self { words }
    }

    fn ptr(&self) -> *mut u8 {
        self.words.as_ptr() as *mut u8
    }
}

struct ReaderState {
    read: AtomicU64,
}

struct Inner {
    item_size: usize,
    capacity: usize,
    /// 2 * capacity * item_size bytes; the upper half mirrors the lower.
    storage: Storage,
    written: AtomicU64,
    done: AtomicBool,
    readers: Mutex<Vec<Arc<ReaderState>>>,
    tags: Mutex<TagStore>,
    items_lock: Mutex<()>,
    items_cond: Condvar,
    space_lock: Mutex<()>,
    space_cond: Condvar,
}

// SAFETY: the storage is only accessed through the producer/consumer
// discipline enforced below: the unique BufferWriter writes bytes of items
// in [written, written + n) before release-publishing the new cursor, and
// readers only form references to items below an acquire-loaded cursor.
// Mirror copies target the alternate physical home of items being produced,
// which no reader can observe yet (the occupied-span-fits-capacity invariant
// keeps the two physical homes of readable and in-flight items disjoint).
unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

impl Inner {
    fn cap_bytes(&self) -> usize {
        self.capacity * self.item_size
    }

    fn min_read(&self) -> u64 {
        let readers = self.readers.lock();
        readers
            .iter()
            .map(|r| r.read.load(Ordering::Acquire))
            .min()
            .unwrap_or_else(|| self.written.load(Ordering::Relaxed))
    }
}

/// Producer endpoint of a stream buffer. One per output stream, owned by
/// the producing block's detail. Not cloneable: single producer.
pub struct BufferWriter {
    inner: Arc<Inner>,
    watchdog: Option<WatchdogHandle>,
}

/// Consumer endpoint: a non-owning read cursor over a producer's buffer.
pub struct BufferReader {
    inner: Arc<Inner>,
    state: Arc<ReaderState>,
    watchdog: Option<WatchdogHandle>,
}

impl BufferWriter {
    /// Allocate a buffer holding `capacity` items of `item_size` bytes.
    pub fn new(capacity: usize, item_size: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be positive");
        assert!(item_size > 0, "item size must be positive");
        Self {
            inner: Arc::new(Inner {
                item_size,
                capacity,
                storage: Storage::new(2 * capacity * item_size),
                written: AtomicU64::new(0),
                done: AtomicBool::new(false),
                readers: Mutex::new(Vec::new()),
                tags: Mutex::new(TagStore::new()),
                items_lock: Mutex::new(()),
                items_cond: Condvar::new(),
                space_lock: Mutex::new(()),
                space_cond: Condvar::new(),
            }),
            watchdog: None,
        }
    }

    /// Register a new consumer cursor, starting at the current write count.
    /// Readers are added while the graph is being built, before any
    /// production happens.
    pub fn add_reader(&self) -> BufferReader {
        let state = Arc::new(ReaderState {
            read: AtomicU64::new(self.inner.written.load(Ordering::Relaxed)),
        });
        self.inner.readers.lock().push(Arc::clone(&state));
        BufferReader {
            inner: Arc::clone(&self.inner),
            state,
            watchdog: None,
        }
    }

    pub(crate) fn attach_watchdog(&mut self, handle: WatchdogHandle) {
        self.watchdog = Some(handle);
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn item_size(&self) -> usize {
        self.inner.item_size
    }

    /// Whether any consumer cursors remain registered. Departed consumers
    /// remove themselves on drop.
    pub fn has_readers(&self) -> bool {
        !self.inner.readers.lock().is_empty()
    }

    /// Absolute count of items produced so far.
    pub fn nitems_written(&self) -> u64 {
        self.inner.written.load(Ordering::Relaxed)
    }

    /// Free space visible to the producer: the minimum over all consumer
    /// cursors.
    pub fn space_available(&self) -> usize {
        let written = self.inner.written.load(Ordering::Relaxed);
        let occupied = (written - self.inner.min_read()) as usize;
        self.inner.capacity - occupied
    }

    /// Linear writable region covering `space_available()` items.
    pub fn write_slice(&mut self) -> &mut [u8] {
        let written = self.inner.written.load(Ordering::Relaxed);
        let space = self.space_available();
        let start = (written % self.inner.capacity as u64) as usize * self.inner.item_size;
        let len = space * self.inner.item_size;
        // SAFETY: exclusive producer access (&mut self); the region covers
        // only free items, which no reader may touch, and stays inside the
        // doubled allocation (start < cap_bytes, len <= cap_bytes).
        unsafe { std::slice::from_raw_parts_mut(self.inner.storage.ptr().add(start), len) }
    }

    /// Publish `n` freshly written items: mirror them for linear reads,
    /// prune dead tags, then release-advance the write cursor and wake
    /// waiting consumers.
    pub fn produce(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        debug_assert!(n <= self.space_available(), "produce beyond free space");

        let inner = &self.inner;
        let cap_bytes = inner.cap_bytes();
        let written = inner.written.load(Ordering::Relaxed);
        let start = (written % inner.capacity as u64) as usize * inner.item_size;
        let len = n * inner.item_size;

        // Mirror the produced bytes into the other physical half.
        let lower = len.min(cap_bytes - start);
        let ptr = inner.storage.ptr();
        // SAFETY: source and destination are `cap_bytes` apart and each
        // copy is at most `cap_bytes - start` / `len - lower` long, so they
        // never overlap; both stay inside the doubled allocation.
        unsafe {
            std::ptr::copy_nonoverlapping(ptr.add(start), ptr.add(start + cap_bytes), lower);
            if lower < len {
                std::ptr::copy_nonoverlapping(
                    ptr.add(cap_bytes),
                    ptr,
                    len - lower,
                );
            }
        }

        inner.tags.lock().prune_before(inner.min_read());

        inner.written.store(written + n as u64, Ordering::Release);
        inner.items_cond.notify_all();
    }

    /// Append a tag to this output's store. The offset must be at or past
    /// the current write count; the scheduler validates block-attached tags
    /// against the produced range before flushing them here.
    pub fn add_tag(&self, tag: Tag) {
        debug_assert!(
            tag.offset >= self.nitems_written(),
            "tag attached behind the write cursor"
        );
        self.inner.tags.lock().append(tag);
    }

    /// Number of tags currently retained (pruning is opportunistic).
    pub fn tags_retained(&self) -> usize {
        self.inner.tags.lock().len()
    }

    /// Mark end-of-stream: no further items will ever be produced. Idempotent.
    pub fn set_done(&self) {
        self.inner.done.store(true, Ordering::Release);
        self.inner.items_cond.notify_all();
        self.inner.space_cond.notify_all();
    }

    pub fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }

    /// Park until at least `min_items` of space are free, the stop flag is
    /// raised, or this writer was already marked done. Returns the space
    /// available on wake-up.
    pub fn wait_for_space(&self, min_items: usize, stop: &AtomicBool) -> usize {
        loop {
            let space = self.space_available();
            if space >= min_items || stop.load(Ordering::Relaxed) || self.is_done() {
                return space;
            }
            let _guard = self.watchdog.as_ref().map(WaitGuard::new);
            let mut lock = self.inner.space_lock.lock();
            if self.space_available() >= min_items {
                return self.space_available();
            }
            self.inner.space_cond.wait_for(&mut lock, WAIT_SLICE);
        }
    }
}

impl BufferReader {
    pub(crate) fn attach_watchdog(&mut self, handle: WatchdogHandle) {
        self.watchdog = Some(handle);
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn item_size(&self) -> usize {
        self.inner.item_size
    }

    /// Absolute count of items this cursor has consumed.
    pub fn nitems_read(&self) -> u64 {
        self.state.read.load(Ordering::Relaxed)
    }

    /// Items readable by this cursor.
    pub fn items_available(&self) -> usize {
        let written = self.inner.written.load(Ordering::Acquire);
        (written - self.state.read.load(Ordering::Relaxed)) as usize
    }

    /// Linear readable region covering `items_available()` items.
    pub fn read_slice(&self) -> &[u8] {
        let avail = self.items_available();
        let read = self.state.read.load(Ordering::Relaxed);
        let start = (read % self.inner.capacity as u64) as usize * self.inner.item_size;
        let len = avail * self.inner.item_size;
        // SAFETY: the region covers only items below the acquire-loaded
        // write cursor; the producer never rewrites them until this cursor
        // passes (occupied span fits capacity), and the mirror makes the
        // span linear inside the doubled allocation.
        unsafe { std::slice::from_raw_parts(self.inner.storage.ptr().add(start), len) }
    }

    /// Advance this cursor by `n` items and wake a producer waiting on
    /// space. `n` must not exceed `items_available()`; exceeding it is a
    /// scheduler bug, not a recoverable condition.
    pub fn consume(&self, n: usize) {
        if n == 0 {
            return;
        }
        debug_assert!(n <= self.items_available(), "consume beyond available items");
        self.state.read.fetch_add(n as u64, Ordering::Release);
        self.inner.space_cond.notify_all();
    }

    /// Whether the producer has marked end-of-stream.
    pub fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }

    /// End-of-stream reached and every buffered item consumed.
    pub fn is_drained(&self) -> bool {
        self.is_done() && self.items_available() == 0
    }

    /// Tags on this stream with offsets in `[start, end)`, offset-ordered.
    pub fn tags_in_range(&self, start: u64, end: u64, key: Option<Symbol>) -> Vec<Tag> {
        self.inner.tags.lock().tags_in_range(start, end, key)
    }

    /// Park until at least `min_items` are readable, end-of-stream is
    /// marked, or the stop flag is raised. Returns the items available on
    /// wake-up.
    pub fn wait_for_items(&self, min_items: usize, stop: &AtomicBool) -> usize {
        loop {
            let avail = self.items_available();
            if avail >= min_items || self.is_done() || stop.load(Ordering::Relaxed) {
                return avail;
            }
            let _guard = self.watchdog.as_ref().map(WaitGuard::new);
            let mut lock = self.inner.items_lock.lock();
            if self.items_available() >= min_items || self.is_done() {
                return self.items_available();
            }
            self.inner.items_cond.wait_for(&mut lock, WAIT_SLICE);
        }
    }
}

impl Drop for BufferReader {
    fn drop(&mut self) {
        // A departed consumer must stop constraining the producer's free
        // space, or an upstream block outliving this one would stall.
        self.inner
            .readers
            .lock()
            .retain(|state| !Arc::ptr_eq(state, &self.state));
        self.inner.space_cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::tag::TagValue;

    fn write_u32s(writer: &mut BufferWriter, values: &[u32]) {
        let slice = writer.write_slice();
        assert!(slice.len() >= values.len() * 4);
        for (i, v) in values.iter().enumerate() {
            slice[i * 4..i * 4 + 4].copy_from_slice(&v.to_ne_bytes());
        }
        writer.produce(values.len());
    }

    fn read_u32s(reader: &BufferReader, n: usize) -> Vec<u32> {
        let slice = reader.read_slice();
        assert!(slice.len() >= n * 4);
        (0..n)
            .map(|i| u32::from_ne_bytes(slice[i * 4..i * 4 + 4].try_into().unwrap()))
            .collect()
    }

    #[test]
    fn test_produce_consume_roundtrip() {
        let mut writer = BufferWriter::new(16, 4);
        let reader = writer.add_reader();

        assert_eq!(writer.space_available(), 16);
        assert_eq!(reader.items_available(), 0);

        write_u32s(&mut writer, &[10, 20, 30]);
        assert_eq!(writer.nitems_written(), 3);
        assert_eq!(reader.items_available(), 3);
        assert_eq!(writer.space_available(), 13);

        assert_eq!(read_u32s(&reader, 3), vec![10, 20, 30]);
        reader.consume(3);
        assert_eq!(reader.nitems_read(), 3);
        assert_eq!(writer.space_available(), 16);
    }

    #[test]
    fn test_linear_span_across_wrap() {
        let mut writer = BufferWriter::new(8, 4);
        let reader = writer.add_reader();

        // Fill, drain most, then produce across the wrap point.
        write_u32s(&mut writer, &[0, 1, 2, 3, 4, 5]);
        reader.consume(5);
        write_u32s(&mut writer, &[6, 7, 8, 9, 10, 11]);

        // Cursor sits at item 5 with 7 items readable, spanning the wrap.
        assert_eq!(reader.items_available(), 7);
        assert_eq!(read_u32s(&reader, 7), vec![5, 6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_sequence_integrity_over_many_wraps() {
        let mut writer = BufferWriter::new(7, 4);
        let reader = writer.add_reader();

        let mut next_write = 0u32;
        let mut next_read = 0u32;
        for round in 0..50 {
            let n = 1 + (round % 5);
            let values: Vec<u32> = (0..n).map(|_| {
                let v = next_write;
                next_write += 1;
                v
            }).collect();
            writer.wait_for_space(values.len(), &AtomicBool::new(false));
            write_u32s(&mut writer, &values);

            let avail = reader.items_available();
            for v in read_u32s(&reader, avail) {
                assert_eq!(v, next_read);
                next_read += 1;
            }
            reader.consume(avail);
        }
        assert_eq!(next_read, next_write);
    }

    #[test]
    fn test_space_is_min_over_consumers() {
        let mut writer = BufferWriter::new(8, 4);
        let fast = writer.add_reader();
        let slow = writer.add_reader();

        write_u32s(&mut writer, &[1, 2, 3, 4]);
        fast.consume(4);
        slow.consume(1);

        assert_eq!(fast.items_available(), 0);
        assert_eq!(slow.items_available(), 3);
        assert_eq!(writer.space_available(), 5);
    }

    #[test]
    fn test_eos_drain() {
        let mut writer = BufferWriter::new(8, 4);
        let reader = writer.add_reader();

        write_u32s(&mut writer, &[7, 8]);
        writer.set_done();

        assert!(reader.is_done());
        assert!(!reader.is_drained());
        reader.consume(2);
        assert!(reader.is_drained());
    }

    #[test]
    fn test_wait_returns_early_on_done() {
        let mut writer = BufferWriter::new(8, 4);
        let reader = writer.add_reader();

        write_u32s(&mut writer, &[1]);
        writer.set_done();

        // Wants 4 items but only 1 will ever exist.
        let avail = reader.wait_for_items(4, &AtomicBool::new(false));
        assert_eq!(avail, 1);
    }

    #[test]
    fn test_tags_visible_to_reader_and_pruned() {
        let mut writer = BufferWriter::new(8, 4);
        let reader = writer.add_reader();

        writer.add_tag(Tag::new(0, "start", TagValue::Bool(true)));
        writer.add_tag(Tag::new(2, "mid", 5i64));
        write_u32s(&mut writer, &[1, 2, 3, 4]);

        let tags = reader.tags_in_range(0, 4, None);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].offset, 0);
        assert_eq!(tags[1].offset, 2);

        let filtered = reader.tags_in_range(0, 4, Some(Symbol::new("mid")));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].value, TagValue::Int(5));

        // Once the reader passes them and more production happens, old
        // tags may be dropped.
        reader.consume(4);
        write_u32s(&mut writer, &[5]);
        assert_eq!(writer.tags_retained(), 0);
    }

    #[test]
    fn test_dropped_reader_frees_space() {
        let mut writer = BufferWriter::new(8, 4);
        let gone = writer.add_reader();
        let kept = writer.add_reader();

        write_u32s(&mut writer, &[1, 2, 3, 4]);
        kept.consume(4);
        assert_eq!(writer.space_available(), 4);

        drop(gone);
        assert_eq!(writer.space_available(), 8);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        use std::thread;

        let mut writer = BufferWriter::new(64, 4);
        let reader = writer.add_reader();
        let stop = Arc::new(AtomicBool::new(false));

        let total = 10_000u32;
        let stop_w = Arc::clone(&stop);
        let producer = thread::spawn(move || {
            let mut next = 0u32;
            while next < total {
                let space = writer.wait_for_space(1, &stop_w);
                let n = space.min((total - next) as usize);
                let slice = writer.write_slice();
                for i in 0..n {
                    slice[i * 4..i * 4 + 4].copy_from_slice(&next.to_ne_bytes());
                    next += 1;
                }
                writer.produce(n);
            }
            writer.set_done();
        });

        let mut seen = 0u32;
        loop {
            let avail = reader.wait_for_items(1, &stop);
            if avail == 0 && reader.is_done() {
                break;
            }
            for v in read_u32s(&reader, avail) {
                assert_eq!(v, seen);
                seen += 1;
            }
            reader.consume(avail);
        }
        producer.join().unwrap();
        assert_eq!(seen, total);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Random single-threaded produce/consume schedules keep the
            /// cursor invariants: monotone counters, read <= written,
            /// occupancy within capacity, and the data itself in order.
            #[test]
            fn cursor_invariants_hold(
                ops in prop::collection::vec((0usize..=6, 0usize..=2), 1..200),
            ) {
                let mut writer = BufferWriter::new(11, 4);
                let readers = [writer.add_reader(), writer.add_reader()];
                let mut next_write = 0u32;
                let mut next_read = [0u32; 2];

                for (amount, who) in ops {
                    if who == 2 {
                        let n = amount.min(writer.space_available());
                        let slice = writer.write_slice();
                        for i in 0..n {
                            slice[i * 4..i * 4 + 4]
                                .copy_from_slice(&next_write.to_ne_bytes());
                            next_write += 1;
                        }
                        writer.produce(n);
                    } else {
                        let r = &readers[who];
                        let n = amount.min(r.items_available());
                        for v in read_u32s(r, n) {
                            prop_assert_eq!(v, next_read[who]);
                            next_read[who] += 1;
                        }
                        r.consume(n);
                    }

                    let written = writer.nitems_written();
                    for r in &readers {
                        prop_assert!(r.nitems_read() <= written);
                    }
                    let min_read = readers.iter().map(|r| r.nitems_read()).min().unwrap();
                    prop_assert!((written - min_read) as usize <= 11);
                    prop_assert_eq!(writer.space_available(), 11 - (written - min_read) as usize);
                }
            }
        }
    }
}
