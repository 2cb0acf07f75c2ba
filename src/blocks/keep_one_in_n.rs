//! Fixed-rate decimator: keep the first item of every group of N

use std::marker::PhantomData;

use crate::runtime::{
    FixedRate, InputPort, OutputPort, StreamItem, StreamSignature, SyncBlock, WorkError,
    WorkResult,
};

pub struct KeepOneInN<T> {
    n: usize,
    _marker: PhantomData<T>,
}

impl<T: StreamItem> KeepOneInN<T> {
    /// Build an N:1 fixed-rate decimator (`relative_rate = 1/n`).
    pub fn new(n: usize) -> FixedRate<KeepOneInN<T>> {
        assert!(n > 0, "decimation factor must be positive");
        FixedRate::decimator(
            KeepOneInN {
                n,
                _marker: PhantomData,
            },
            n,
        )
    }
}

impl<T: StreamItem> SyncBlock for KeepOneInN<T> {
    fn name(&self) -> &str {
        "keep_one_in_n"
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

        for (k, out) in y.iter_mut().enumerate().take(noutput_items) {
            *out = x[k * self.n];
        }
        Ok(noutput_items)
    }
}

#[cfg(test)]
mod tests {
    use crate::blocks::{VectorSink, VectorSource};
    use crate::runtime::{Block, FlowGraph};

    use super::*;

    #[test]
    fn test_decimate_by_four() {
        let sink = VectorSink::<u32>::new();
        let store = sink.store();

        let mut graph = FlowGraph::new();
        graph
            .add_block("src", VectorSource::new((0u32..100).collect::<Vec<_>>()))
            .unwrap();
        graph.add_block("dec", KeepOneInN::<u32>::new(4)).unwrap();
        graph.add_block("snk", sink).unwrap();
        graph.connect("src", 0, "dec", 0).unwrap();
        graph.connect("dec", 0, "snk", 0).unwrap();
        graph.run().unwrap();

        let expected: Vec<u32> = (0..25).map(|k| k * 4).collect();
        assert_eq!(store.items(), expected);
    }

    #[test]
    fn test_forecast_requests_full_groups() {
        let block = KeepOneInN::<u32>::new(4);
        let mut required = [0usize];
        block.forecast(25, &mut required);
        assert_eq!(required, [100]);
        assert_eq!(block.relative_rate(), 0.25);
        assert!(block.fixed_rate());
    }

    #[test]
    fn test_tag_offsets_rescaled() {
        // A tag at input offset 8 lands at output offset 2 after /4.
        let sink = VectorSink::<u32>::new();
        let store = sink.store();

        let source = VectorSource::new((0u32..40).collect::<Vec<_>>()).with_tag(
            8,
            "marker",
            7i64,
        );

        let mut graph = FlowGraph::new();
        graph.add_block("src", source).unwrap();
        graph.add_block("dec", KeepOneInN::<u32>::new(4)).unwrap();
        graph.add_block("snk", sink).unwrap();
        graph.connect("src", 0, "dec", 0).unwrap();
        graph.connect("dec", 0, "snk", 0).unwrap();
        graph.run().unwrap();

        let tags = store.tags();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].offset, 2);
    }
}
