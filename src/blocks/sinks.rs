//! Collecting and discarding sinks

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::runtime::{
    Block, InputPort, OutputPort, StreamItem, StreamSignature, Tag, WorkError, WorkResult,
    WorkReturn,
};

struct SinkData<T> {
    items: Vec<T>,
    tags: Vec<Tag>,
}

/// Shared handle to the data a [`VectorSink`] has collected. Stays valid
/// after the graph consumed the sink itself.
pub struct SinkStore<T> {
    inner: Arc<Mutex<SinkData<T>>>,
}

impl<T: Clone> SinkStore<T> {
    /// Snapshot of the items collected so far.
    pub fn items(&self) -> Vec<T> {
        self.inner.lock().items.clone()
    }

    /// Snapshot of the tags observed so far, in stream order.
    pub fn tags(&self) -> Vec<Tag> {
        self.inner.lock().tags.clone()
    }
}

impl<T> Clone for SinkStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Collects every item (and every tag) from its input into memory.
pub struct VectorSink<T> {
    store: Arc<Mutex<SinkData<T>>>,
}

impl<T: StreamItem> VectorSink<T> {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(SinkData {
                items: Vec::new(),
                tags: Vec::new(),
            })),
        }
    }

    /// Handle for reading the collected data after the run.
    pub fn store(&self) -> SinkStore<T> {
        SinkStore {
            inner: Arc::clone(&self.store),
        }
    }
}

impl<T: StreamItem> Default for VectorSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StreamItem> Block for VectorSink<T> {
    fn name(&self) -> &str {
        "vector_sink"
    }

    fn input_signature(&self) -> StreamSignature {
        StreamSignature::of_fixed::<T>(1)
    }

    fn output_signature(&self) -> StreamSignature {
        StreamSignature::null()
    }

    fn general_work(
        &mut self,
        _noutput_items: usize,
        inputs: &mut [InputPort<'_>],
        _outputs: &mut [OutputPort<'_>],
    ) -> WorkResult<WorkReturn> {
        let n = inputs[0].items_available();
        if n > 0 {
            let items = inputs[0]
                .slice::<T>()
                .ok_or_else(|| WorkError::msg("input stream item size mismatch"))?;
            let start = inputs[0].nitems_read();
            let tags = inputs[0].tags_in_range(start, start + n as u64);

            let mut data = self.store.lock();
            data.items.extend_from_slice(&items[..n]);
            data.tags.extend(tags);
        }
        inputs[0].consume(n);
        Ok(WorkReturn::Items(0))
    }
}

/// Consumes and discards everything.
pub struct NullSink<T> {
    _marker: PhantomData<T>,
}

impl<T: StreamItem> NullSink<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: StreamItem> Default for NullSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StreamItem> Block for NullSink<T> {
    fn name(&self) -> &str {
        "null_sink"
    }

    fn input_signature(&self) -> StreamSignature {
        StreamSignature::of_fixed::<T>(1)
    }

    fn output_signature(&self) -> StreamSignature {
        StreamSignature::null()
    }

    fn general_work(
        &mut self,
        _noutput_items: usize,
        inputs: &mut [InputPort<'_>],
        _outputs: &mut [OutputPort<'_>],
    ) -> WorkResult<WorkReturn> {
        let n = inputs[0].items_available();
        inputs[0].consume(n);
        Ok(WorkReturn::Items(0))
    }
}
