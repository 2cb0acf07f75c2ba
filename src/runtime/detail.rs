//! Per-block runtime state owned by the scheduler
//!
//! A [`BlockDetail`] is installed once the graph topology is fixed: the
//! output buffers the block writes (it owns them), read cursors on the
//! upstream buffers it consumes (non-owning), and the lifecycle state. The
//! block itself holds only configuration; the detail refers back to it by
//! index into the graph's block table.

use super::buffer::{BufferReader, BufferWriter};

/// Lifecycle of a block within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Created,
    Started,
    Running,
    Stopping,
    Stopped,
}

pub struct BlockDetail {
    /// Index into the graph's block table.
    pub(crate) index: usize,
    pub(crate) inputs: Vec<BufferReader>,
    pub(crate) outputs: Vec<BufferWriter>,
    pub(crate) state: BlockState,
}

impl BlockDetail {
    pub(crate) fn new(
        index: usize,
        inputs: Vec<BufferReader>,
        outputs: Vec<BufferWriter>,
    ) -> Self {
        Self {
            index,
            inputs,
            outputs,
            state: BlockState::Created,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn ninputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn noutputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    /// Transition into `Started`. Returns false if start was already
    /// performed this run, so the hook is not invoked twice.
    pub(crate) fn mark_started(&mut self) -> bool {
        if matches!(self.state, BlockState::Created) {
            self.state = BlockState::Started;
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_running(&mut self) {
        self.state = BlockState::Running;
    }

    pub(crate) fn mark_stopping(&mut self) {
        self.state = BlockState::Stopping;
    }

    /// Transition into `Stopped`. Returns false if stop already ran.
    pub(crate) fn mark_stopped(&mut self) -> bool {
        if matches!(self.state, BlockState::Stopped) {
            false
        } else {
            self.state = BlockState::Stopped;
            true
        }
    }

    /// Mark every output end-of-stream so downstream consumers drain.
    pub(crate) fn propagate_done(&self) {
        for writer in &self.outputs {
            writer.set_done();
        }
    }

    /// All upstream producers have finished and every buffered item has
    /// been consumed.
    pub(crate) fn inputs_drained(&self) -> bool {
        self.inputs.iter().all(|r| r.is_drained())
    }

    /// Split borrows for port construction: readers shared, writers
    /// exclusive.
    pub(crate) fn endpoints(&mut self) -> (&[BufferReader], &mut [BufferWriter]) {
        (&self.inputs, &mut self.outputs)
    }
}
