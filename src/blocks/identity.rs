//! Identity block: forwards its input unchanged

use std::marker::PhantomData;

use crate::runtime::{
    Block, InputPort, OutputPort, StreamItem, StreamSignature, WorkError, WorkResult, WorkReturn,
};

/// `y = x`: copies items from input to output at rate 1. Useful as a graph
/// fixture and as the smallest possible `general_work` example.
pub struct Identity<T> {
    _marker: PhantomData<T>,
}

impl<T: StreamItem> Identity<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: StreamItem> Default for Identity<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StreamItem> Block for Identity<T> {
    fn name(&self) -> &str {
        "identity"
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
        let n = noutput_items.min(inputs[0].items_available());
        if n > 0 {
            let input = inputs[0]
                .slice::<T>()
                .ok_or_else(|| WorkError::msg("input stream item size mismatch"))?;
            let output = outputs[0]
                .slice_mut::<T>()
                .ok_or_else(|| WorkError::msg("output stream item size mismatch"))?;
            output[..n].copy_from_slice(&input[..n]);
        }
        inputs[0].consume(n);
        Ok(WorkReturn::Items(n))
    }
}
