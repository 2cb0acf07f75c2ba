//! Per-call port facades handed to `general_work`
//!
//! The scheduler builds one [`InputPort`] per input stream and one
//! [`OutputPort`] per output stream for each `general_work` invocation.
//! Ports expose typed views into the underlying ring buffers and record the
//! block's consume/produce/tag declarations; the scheduler audits the
//! recorded accounting after the call returns and only then advances the
//! buffer cursors.

use super::buffer::{BufferReader, BufferWriter};
use super::signature::StreamItem;
use super::tag::{Symbol, Tag, TagValue};

/// Read side of one input stream for the duration of a `general_work` call.
pub struct InputPort<'a> {
    reader: &'a BufferReader,
    navail: usize,
    consumed: Option<usize>,
}

impl<'a> InputPort<'a> {
    pub(crate) fn new(reader: &'a BufferReader, navail: usize) -> Self {
        Self {
            reader,
            navail,
            consumed: None,
        }
    }

    /// Items readable on this stream during this call (`ninput_items[i]`).
    pub fn items_available(&self) -> usize {
        self.navail
    }

    /// Typed read-only view of the readable items.
    ///
    /// Returns `None` if `T`'s size does not match the stream's item size.
    pub fn slice<T: StreamItem>(&self) -> Option<&'a [T]> {
        if std::mem::size_of::<T>() != self.reader.item_size() {
            return None;
        }
        let bytes = &self.reader.read_slice()[..self.navail * self.reader.item_size()];
        // SAFETY: T is StreamItem (valid for all bit patterns, no padding),
        // the length is an exact item multiple, and the storage base is
        // u64-aligned with item-size-multiple offsets.
        Some(unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const T, self.navail) })
    }

    /// Raw byte view of the readable items.
    pub fn raw(&self) -> &'a [u8] {
        &self.reader.read_slice()[..self.navail * self.reader.item_size()]
    }

    /// Declare how many items this call consumed from this stream. Zero is
    /// permitted; not calling `consume` at all on a non-terminal return is
    /// a contract violation. Repeated calls accumulate.
    pub fn consume(&mut self, n: usize) {
        *self.consumed.get_or_insert(0) += n;
    }

    /// The consumption declared so far this call, if any.
    pub fn consumed(&self) -> Option<usize> {
        self.consumed
    }

    /// Absolute count of items read on this stream before this call.
    pub fn nitems_read(&self) -> u64 {
        self.reader.nitems_read()
    }

    /// Whether the upstream producer has signalled end-of-stream.
    pub fn is_done(&self) -> bool {
        self.reader.is_done()
    }

    /// Tags on the upstream output feeding this input with absolute offsets
    /// in `[start, end)`.
    pub fn tags_in_range(&self, start: u64, end: u64) -> Vec<Tag> {
        self.reader.tags_in_range(start, end, None)
    }

    /// As [`tags_in_range`](Self::tags_in_range), restricted to `key`.
    pub fn tags_with_key(&self, start: u64, end: u64, key: impl Into<Symbol>) -> Vec<Tag> {
        self.reader.tags_in_range(start, end, Some(key.into()))
    }
}

/// Declare `n` consumed items on every input stream.
pub fn consume_each(inputs: &mut [InputPort<'_>], n: usize) {
    for input in inputs {
        input.consume(n);
    }
}

/// Write side of one output stream for the duration of a `general_work`
/// call.
pub struct OutputPort<'a> {
    writer: &'a mut BufferWriter,
    noutput: usize,
    produced: Option<usize>,
    /// Tags recorded this call; `bool` marks block-attached (strictly
    /// range-checked) vs propagation-generated.
    pending_tags: Vec<(Tag, bool)>,
    propagating: bool,
}

impl<'a> OutputPort<'a> {
    pub(crate) fn new(writer: &'a mut BufferWriter, noutput: usize) -> Self {
        Self {
            writer,
            noutput,
            produced: None,
            pending_tags: Vec::new(),
            propagating: false,
        }
    }

    /// Maximum items this call may write to this stream (`noutput_items`).
    pub fn noutput_items(&self) -> usize {
        self.noutput
    }

    /// Typed writable view covering `noutput_items` items.
    ///
    /// Returns `None` if `T`'s size does not match the stream's item size.
    pub fn slice_mut<T: StreamItem>(&mut self) -> Option<&mut [T]> {
        if std::mem::size_of::<T>() != self.writer.item_size() {
            return None;
        }
        let item_size = self.writer.item_size();
        let n = self.noutput;
        let bytes = &mut self.writer.write_slice()[..n * item_size];
        // SAFETY: as for InputPort::slice, with exclusive access through
        // &mut self.
        Some(unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut T, n) })
    }

    /// Raw byte view of the writable region.
    pub fn raw_mut(&mut self) -> &mut [u8] {
        let item_size = self.writer.item_size();
        let n = self.noutput;
        &mut self.writer.write_slice()[..n * item_size]
    }

    /// Declare `n` items written to this stream. Only needed when the block
    /// reports per-output counts and returns
    /// [`WorkReturn::CalledProduce`](super::block::WorkReturn::CalledProduce)
    /// or finishes with a terminal call; a plain `Items(n)` return covers
    /// every output uniformly. Repeated calls accumulate.
    pub fn produce(&mut self, n: usize) {
        *self.produced.get_or_insert(0) += n;
    }

    /// The production declared so far this call, if any.
    pub fn produced(&self) -> Option<usize> {
        self.produced
    }

    /// Absolute count of items written on this stream before this call.
    pub fn nitems_written(&self) -> u64 {
        self.writer.nitems_written()
    }

    /// Attach a tag at `offset` on this stream. The offset must satisfy
    /// `nitems_written() <= offset < nitems_written() + produced` once this
    /// call's production is known; violations are fatal.
    pub fn add_tag(&mut self, offset: u64, key: impl Into<Symbol>, value: impl Into<TagValue>) {
        let tag = Tag::new(offset, key, value);
        self.pending_tags.push((tag, !self.propagating));
    }

    /// As [`add_tag`](Self::add_tag) with an originating-block identifier.
    pub fn add_tag_from(
        &mut self,
        offset: u64,
        key: impl Into<Symbol>,
        value: impl Into<TagValue>,
        source: Option<Symbol>,
    ) {
        let mut tag = Tag::new(offset, key, value);
        tag.source = source;
        self.pending_tags.push((tag, !self.propagating));
    }

    /// Whether the block attached tags itself during this call (tag
    /// propagation is skipped in that case).
    pub(crate) fn has_user_tags(&self) -> bool {
        self.pending_tags.iter().any(|(_, user)| *user)
    }

    /// Everything after this point is propagation-generated, not
    /// block-attached.
    pub(crate) fn begin_propagation(&mut self) {
        self.propagating = true;
    }

    /// Tear the port apart for the scheduler's publication step.
    pub(crate) fn into_accounting(self) -> (Option<usize>, Vec<(Tag, bool)>) {
        (self.produced, self.pending_tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::buffer::BufferWriter;

    #[test]
    fn test_typed_slice_size_check() {
        let mut writer = BufferWriter::new(8, 4);
        let reader = writer.add_reader();

        {
            let mut out = OutputPort::new(&mut writer, 4);
            assert!(out.slice_mut::<u64>().is_none());
            let s = out.slice_mut::<u32>().unwrap();
            s.copy_from_slice(&[1, 2, 3, 4]);
            out.produce(4);
        }
        writer.produce(4);

        let input = InputPort::new(&reader, 4);
        assert!(input.slice::<u64>().is_none());
        assert_eq!(input.slice::<u32>().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_consume_accumulates() {
        let writer = BufferWriter::new(8, 4);
        let reader = writer.add_reader();
        let mut input = InputPort::new(&reader, 0);

        assert_eq!(input.consumed(), None);
        input.consume(0);
        assert_eq!(input.consumed(), Some(0));
        input.consume(3);
        input.consume(2);
        assert_eq!(input.consumed(), Some(5));
    }

    #[test]
    fn test_raw_view_matches_typed() {
        let mut writer = BufferWriter::new(8, 4);
        let reader = writer.add_reader();

        {
            let mut out = OutputPort::new(&mut writer, 2);
            out.slice_mut::<u32>()
                .unwrap()
                .copy_from_slice(&[0x0102_0304, 0x0506_0708]);
        }
        writer.produce(2);

        let input = InputPort::new(&reader, 2);
        let raw = input.raw();
        assert_eq!(raw.len(), 8);
        assert_eq!(&raw[..4], &0x0102_0304u32.to_ne_bytes());
        assert_eq!(&raw[4..], &0x0506_0708u32.to_ne_bytes());
    }

    #[test]
    fn test_tag_queries_with_and_without_key() {
        let mut writer = BufferWriter::new(8, 4);
        let reader = writer.add_reader();

        writer.add_tag(Tag::new(1, "freq", 2.5f64));
        writer.add_tag(Tag::new(3, "burst", 1i64));
        writer.write_slice()[..16].fill(0);
        writer.produce(4);

        let input = InputPort::new(&reader, 4);
        assert_eq!(input.tags_in_range(0, 4).len(), 2);

        let filtered = input.tags_with_key(0, 4, "burst");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].offset, 3);
    }

    #[test]
    fn test_user_tags_vs_propagated() {
        let mut writer = BufferWriter::new(8, 4);
        let mut out = OutputPort::new(&mut writer, 4);

        assert!(!out.has_user_tags());
        out.begin_propagation();
        out.add_tag(0, "copied", 1i64);
        assert!(!out.has_user_tags());

        let (_, tags) = out.into_accounting();
        assert_eq!(tags.len(), 1);
        assert!(!tags[0].1);
    }
}
