//! Fixed-rate interpolator: repeat every item N times

use std::marker::PhantomData;

use crate::runtime::{
    FixedRate, InputPort, OutputPort, StreamItem, StreamSignature, SyncBlock, WorkError,
    WorkResult,
};

pub struct Repeat<T> {
    factor: usize,
    _marker: PhantomData<T>,
}

impl<T: StreamItem> Repeat<T> {
    /// Build a 1:N fixed-rate interpolator (`relative_rate = n`).
    pub fn new(factor: usize) -> FixedRate<Repeat<T>> {
        assert!(factor > 0, "interpolation factor must be positive");
        FixedRate::interpolator(
            Repeat {
                factor,
                _marker: PhantomData,
            },
            factor,
        )
    }
}

impl<T: StreamItem> SyncBlock for Repeat<T> {
    fn name(&self) -> &str {
        "repeat"
    }

    fn input_signature(&self) -> StreamSignature {
        StreamSignature::of_fixed::<T>(1)
    }

    fn output_signature(&self) -> StreamSignature {
        StreamSignature::of_fixed::<T>(1)
    }

    fn work(
        &mut self,
        noutput_items: usize,
        inputs: &mut [InputPort<'_>],
        outputs: &mut [OutputPort<'_>],
    ) -> WorkResult<usize> {
        let x = inputs[0]
            .slice::<T>()
            .ok_or_else(|| WorkError::msg("input stream item size mismatch"))?;
        let y = outputs[0]
            .slice_mut::<T>()
            .ok_or_else(|| WorkError::msg("output stream item size mismatch"))?;

        // noutput_items is always a whole number of interpolation groups.
        let groups = noutput_items / self.factor;
        for g in 0..groups {
            let value = x[g];
            for r in 0..self.factor {
                y[g * self.factor + r] = value;
            }
        }
        Ok(noutput_items)
    }
}
