//! The block contract: what every processing node exposes to the scheduler
//!
//! A block declares its stream signatures and rate parameters, estimates
//! input requirements through [`Block::forecast`], and does its processing
//! in [`Block::general_work`], declaring per-input consumption (and, for
//! asymmetric producers, per-output production) through the ports it is
//! handed. The scheduler owns everything else: sizing invocations,
//! enforcing the accounting obligations, moving cursors and tags.
//!
//! Blocks with an exact input/output ratio usually implement the simpler
//! [`SyncBlock`] kernel and wrap it in [`FixedRate`], which supplies the
//! forecast and consume arithmetic.

use super::errors::{WorkError, WorkResult};
use super::ports::{consume_each, InputPort, OutputPort};
use super::signature::StreamSignature;

/// What a `general_work` call reports back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkReturn {
    /// `n` items were written to every output stream this call.
    Items(usize),
    /// Per-output counts were declared individually through
    /// [`OutputPort::produce`]; consult those instead of a uniform count.
    CalledProduce,
    /// Terminal: the block will never be called again. Any produce/consume
    /// accounting from this final call is honored, then end-of-stream
    /// propagates downstream once buffered items drain.
    Done,
}

/// A processing node with typed input and output streams.
///
/// Sources have no inputs, sinks no outputs; everything else consumes and
/// produces at rates of its own choosing, within the accounting contract
/// described on each method.
pub trait Block: Send {
    /// Debug name for this block, used in logs and error reports.
    fn name(&self) -> &str;

    /// Stream-count bounds and item size for the input side.
    fn input_signature(&self) -> StreamSignature;

    /// Stream-count bounds and item size for the output side.
    fn output_signature(&self) -> StreamSignature;

    /// Number of past input items that must stay visible when producing
    /// each output (filters with memory). The input slice always starts at
    /// the oldest unconsumed item, so a block with history `h` simply
    /// consumes `h - 1` fewer items than it reads.
    fn history(&self) -> usize {
        1
    }

    /// `noutput_items` is always an integer multiple of this.
    fn output_multiple(&self) -> usize {
        1
    }

    /// Advisory output/input ratio, used for buffer sizing and invocation
    /// sizing. Not a correctness constraint.
    fn relative_rate(&self) -> f64 {
        1.0
    }

    /// Whether the exact rate conversions below are meaningful.
    fn fixed_rate(&self) -> bool {
        false
    }

    /// Write into `ninput_items_required[i]` the minimum items needed on
    /// input `i` to produce `noutput_items` outputs. The estimate need not
    /// be exact, but must be sufficient. Pure computation; never fails.
    fn forecast(&self, noutput_items: usize, ninput_items_required: &mut [usize]) {
        for required in ninput_items_required {
            *required = noutput_items + self.history() - 1;
        }
    }

    /// Enable drivers before the first `general_work`. Errors abort the
    /// run.
    fn start(&mut self) -> WorkResult {
        Ok(())
    }

    /// Disable drivers after the final `general_work`. Errors are reported
    /// but do not prevent shutdown.
    fn stop(&mut self) -> WorkResult {
        Ok(())
    }

    /// The processing hook.
    ///
    /// `noutput_items` is the most this call may write to each output
    /// stream, always a multiple of [`output_multiple`](Self::output_multiple).
    /// Each input port exposes at least the items `forecast` asked for,
    /// except when the upstream has reached end-of-stream. Before
    /// returning anything other than [`WorkReturn::Done`], the block must
    /// declare consumption on every input (zero is permitted).
    fn general_work(
        &mut self,
        noutput_items: usize,
        inputs: &mut [InputPort<'_>],
        outputs: &mut [OutputPort<'_>],
    ) -> WorkResult<WorkReturn>;

    /// Move tags downstream after a `general_work` call that did not attach
    /// tags itself. The default copies every tag in the consumed range of
    /// each input to every output, offsets rescaled by
    /// [`relative_rate`](Self::relative_rate).
    fn propagate_tags(&mut self, inputs: &[InputPort<'_>], outputs: &mut [OutputPort<'_>]) {
        let rate = self.relative_rate();
        for input in inputs {
            let consumed = input.consumed().unwrap_or(0) as u64;
            if consumed == 0 {
                continue;
            }
            let start = input.nitems_read();
            let tags = input.tags_in_range(start, start + consumed);
            for output in outputs.iter_mut() {
                for tag in &tags {
                    let offset = if rate == 1.0 {
                        tag.offset
                    } else {
                        (tag.offset as f64 * rate).floor() as u64
                    };
                    output.add_tag_from(offset, tag.key, tag.value.clone(), tag.source);
                }
            }
        }
    }

    /// Exact outputs producible from `ninput` items. Only meaningful when
    /// [`fixed_rate`](Self::fixed_rate) is true; the default derives an
    /// estimate from `relative_rate`.
    fn fixed_rate_ninput_to_noutput(&self, ninput: usize) -> usize {
        (ninput.saturating_sub(self.history() - 1) as f64 * self.relative_rate()).floor() as usize
    }

    /// Exact inputs required to produce `noutput` items. Only meaningful
    /// when [`fixed_rate`](Self::fixed_rate) is true.
    fn fixed_rate_noutput_to_ninput(&self, noutput: usize) -> usize {
        (noutput as f64 / self.relative_rate()).ceil() as usize + self.history() - 1
    }
}

/// A fixed-rate processing kernel: reads input slices, writes output
/// slices, returns the item count produced. The [`FixedRate`] adapter owns
/// all consume/produce accounting; kernels must not touch it.
pub trait SyncBlock: Send {
    fn name(&self) -> &str;

    fn input_signature(&self) -> StreamSignature;

    fn output_signature(&self) -> StreamSignature;

    fn history(&self) -> usize {
        1
    }

    fn start(&mut self) -> WorkResult {
        Ok(())
    }

    fn stop(&mut self) -> WorkResult {
        Ok(())
    }

    /// Produce up to `noutput_items` items on every output, reading the
    /// matching input span (`noutput_items / interpolation * decimation`
    /// items plus history). Returns the count actually produced.
    fn work(
        &mut self,
        noutput_items: usize,
        inputs: &mut [InputPort<'_>],
        outputs: &mut [OutputPort<'_>],
    ) -> WorkResult<usize>;
}

/// Adapter giving a [`SyncBlock`] kernel the full [`Block`] contract with
/// exact rate arithmetic: `interp` outputs for every `decim` inputs.
pub struct FixedRate<K> {
    kernel: K,
    interp: usize,
    decim: usize,
}

impl<K: SyncBlock> FixedRate<K> {
    /// 1:1 kernel (`y[i]` from `x[i]` and history).
    pub fn sync(kernel: K) -> Self {
        Self {
            kernel,
            interp: 1,
            decim: 1,
        }
    }

    /// N:1 kernel: one output per `decim` inputs.
    pub fn decimator(kernel: K, decim: usize) -> Self {
        assert!(decim > 0, "decimation must be positive");
        Self {
            kernel,
            interp: 1,
            decim,
        }
    }

    /// 1:N kernel: `interp` outputs per input.
    pub fn interpolator(kernel: K, interp: usize) -> Self {
        assert!(interp > 0, "interpolation must be positive");
        Self {
            kernel,
            interp,
            decim: 1,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }
}

impl<K: SyncBlock> Block for FixedRate<K> {
    fn name(&self) -> &str {
        self.kernel.name()
    }

    fn input_signature(&self) -> StreamSignature {
        self.kernel.input_signature()
    }

    fn output_signature(&self) -> StreamSignature {
        self.kernel.output_signature()
    }

    fn history(&self) -> usize {
        self.kernel.history()
    }

    fn output_multiple(&self) -> usize {
        self.interp
    }

    fn relative_rate(&self) -> f64 {
        self.interp as f64 / self.decim as f64
    }

    fn fixed_rate(&self) -> bool {
        true
    }

    fn forecast(&self, noutput_items: usize, ninput_items_required: &mut [usize]) {
        let required = self.fixed_rate_noutput_to_ninput(noutput_items);
        for r in ninput_items_required {
            *r = required;
        }
    }

    fn start(&mut self) -> WorkResult {
        self.kernel.start()
    }

    fn stop(&mut self) -> WorkResult {
        self.kernel.stop()
    }

    fn general_work(
        &mut self,
        noutput_items: usize,
        inputs: &mut [InputPort<'_>],
        outputs: &mut [OutputPort<'_>],
    ) -> WorkResult<WorkReturn> {
        // End-of-stream can leave the inputs short of the forecast; clamp
        // the request to what the available items actually support.
        let possible = match inputs.iter().map(|i| i.items_available()).min() {
            Some(min_avail) => self.fixed_rate_ninput_to_noutput(min_avail),
            None => noutput_items,
        };
        let mut n = noutput_items.min(possible);
        n -= n % self.interp;
        if n == 0 {
            consume_each(inputs, 0);
            return Ok(WorkReturn::Items(0));
        }

        let produced = self.kernel.work(n, inputs, outputs)?;
        if produced > n {
            return Err(WorkError::msg(format!(
                "kernel '{}' produced {} items, limit was {}",
                self.kernel.name(),
                produced,
                n
            )));
        }
        consume_each(inputs, produced / self.interp * self.decim);
        Ok(WorkReturn::Items(produced))
    }

    fn fixed_rate_ninput_to_noutput(&self, ninput: usize) -> usize {
        ninput.saturating_sub(self.history() - 1) * self.interp / self.decim
    }

    fn fixed_rate_noutput_to_ninput(&self, noutput: usize) -> usize {
        (noutput * self.decim).div_ceil(self.interp) + self.history() - 1
    }
}
