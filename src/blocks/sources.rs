//! Finite and endless test sources

use std::marker::PhantomData;

use crate::runtime::{
    Block, InputPort, OutputPort, StreamItem, StreamSignature, Symbol, Tag, TagValue, WorkError,
    WorkResult, WorkReturn,
};

/// Emits a fixed vector of items, optionally with tags at chosen offsets,
/// then signals end-of-stream.
pub struct VectorSource<T> {
    data: Vec<T>,
    position: usize,
    tags: Vec<Tag>,
}

impl<T: StreamItem> VectorSource<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            position: 0,
            tags: Vec::new(),
        }
    }

    /// Attach a tag at an absolute offset into the emitted stream.
    pub fn with_tag(
        mut self,
        offset: u64,
        key: impl Into<Symbol>,
        value: impl Into<TagValue>,
    ) -> Self {
        self.tags
            .push(Tag::new(offset, key, value).with_source("vector_source"));
        self
    }
}

impl<T: StreamItem> Block for VectorSource<T> {
    fn name(&self) -> &str {
        "vector_source"
    }

    fn input_signature(&self) -> StreamSignature {
        StreamSignature::null()
    }

    fn output_signature(&self) -> StreamSignature {
        StreamSignature::of_fixed::<T>(1)
    }

    fn general_work(
        &mut self,
        noutput_items: usize,
        _inputs: &mut [InputPort<'_>],
        outputs: &mut [OutputPort<'_>],
    ) -> WorkResult<WorkReturn> {
        let remaining = self.data.len() - self.position;
        if remaining == 0 {
            return Ok(WorkReturn::Done);
        }

        let n = noutput_items.min(remaining);
        let out = outputs[0]
            .slice_mut::<T>()
            .ok_or_else(|| WorkError::msg("output stream item size mismatch"))?;
        out[..n].copy_from_slice(&self.data[self.position..self.position + n]);

        let window = self.position as u64..(self.position + n) as u64;
        for tag in self.tags.iter().filter(|t| window.contains(&t.offset)) {
            outputs[0].add_tag_from(tag.offset, tag.key, tag.value.clone(), tag.source);
        }

        self.position += n;
        if self.position == self.data.len() {
            outputs[0].produce(n);
            Ok(WorkReturn::Done)
        } else {
            Ok(WorkReturn::Items(n))
        }
    }
}

/// Emits zero-valued items forever. Pair with [`Head`](crate::blocks::Head)
/// or an explicit scheduler stop.
pub struct NullSource<T> {
    _marker: PhantomData<T>,
}

impl<T: StreamItem> NullSource<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: StreamItem> Default for NullSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StreamItem> Block for NullSource<T> {
    fn name(&self) -> &str {
        "null_source"
    }

    fn input_signature(&self) -> StreamSignature {
        StreamSignature::null()
    }

    fn output_signature(&self) -> StreamSignature {
        StreamSignature::of_fixed::<T>(1)
    }

    fn general_work(
        &mut self,
        noutput_items: usize,
        _inputs: &mut [InputPort<'_>],
        outputs: &mut [OutputPort<'_>],
    ) -> WorkResult<WorkReturn> {
        outputs[0].raw_mut().fill(0);
        Ok(WorkReturn::Items(noutput_items))
    }
}
