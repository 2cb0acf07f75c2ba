//! Pass the first N items, then end the stream

use std::marker::PhantomData;

use crate::runtime::{
    Block, InputPort, OutputPort, StreamItem, StreamSignature, WorkError, WorkResult, WorkReturn,
};

/// Forwards the first `count` items and then signals end-of-stream,
/// regardless of how much more the upstream could deliver.
pub struct Head<T> {
    remaining: usize,
    _marker: PhantomData<T>,
}

impl<T: StreamItem> Head<T> {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: count,
            _marker: PhantomData,
        }
    }
}

impl<T: StreamItem> Block for Head<T> {
    fn name(&self) -> &str {
        "head"
    }

    fn input_signature(&self) -> StreamSignature {
        StreamSignature::of_fixed::<T>(1)
    }

    fn output_signature(&self) -> StreamSignature {
        StreamSignature::of_fixed::<T>(1)
    }

    fn general_work(
        &mut self,
        noutput_items: usize,
        inputs: &mut [InputPort<'_>],
        outputs: &mut [OutputPort<'_>],
    ) -> WorkResult<WorkReturn> {
        let n = noutput_items
            .min(inputs[0].items_available())
            .min(self.remaining);
        if n > 0 {
            let input = inputs[0]
                .slice::<T>()
                .ok_or_else(|| WorkError::msg("input stream item size mismatch"))?;
            let output = outputs[0]
                .slice_mut::<T>()
                .ok_or_else(|| WorkError::msg("output stream item size mismatch"))?;
            output[..n].copy_from_slice(&input[..n]);
        }
        self.remaining -= n;
        inputs[0].consume(n);
        if self.remaining == 0 {
            outputs[0].produce(n);
            Ok(WorkReturn::Done)
        } else {
            Ok(WorkReturn::Items(n))
        }
    }
}
