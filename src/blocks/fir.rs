//! FIR filter over f32 samples
//!
//! A direct-form FIR: `y[i] = sum_j taps[j] * x[i - j]`. The tap count is
//! the block's history, so every output position sees the full filter
//! window; the first `len(taps) - 1` input positions are absorbed as
//! history and never produce an output of their own.

use crate::runtime::{
    FixedRate, InputPort, OutputPort, StreamSignature, SyncBlock, WorkError, WorkResult,
};

pub struct FirFilter {
    taps: Vec<f32>,
}

impl FirFilter {
    /// Build a 1:1 fixed-rate FIR block with the given taps.
    pub fn new(taps: Vec<f32>) -> FixedRate<FirFilter> {
        assert!(!taps.is_empty(), "FIR filter needs at least one tap");
        FixedRate::sync(FirFilter { taps })
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }
}

impl SyncBlock for FirFilter {
    fn name(&self) -> &str {
        "fir_filter"
    }

    fn input_signature(&self) -> StreamSignature {
        StreamSignature::of_fixed::<f32>(1)
    }

    fn output_signature(&self) -> StreamSignature {
        StreamSignature::of_fixed::<f32>(1)
    }

    fn history(&self) -> usize {
        self.taps.len()
    }

    fn work(
        &mut self,
        noutput_items: usize,
        inputs: &mut [InputPort<'_>],
        outputs: &mut [OutputPort<'_>],
    ) -> WorkResult<usize> {
        let x = inputs[0]
            .slice::<f32>()
            .ok_or_else(|| WorkError::msg("input stream item size mismatch"))?;
        let y = outputs[0]
            .slice_mut::<f32>()
            .ok_or_else(|| WorkError::msg("output stream item size mismatch"))?;

        let history = self.taps.len();
        for (k, out) in y.iter_mut().enumerate().take(noutput_items) {
            let mut acc = 0.0f32;
            for (j, tap) in self.taps.iter().enumerate() {
                acc += tap * x[k + history - 1 - j];
            }
            *out = acc;
        }
        Ok(noutput_items)
    }
}
