//! Flow graph builder: blocks, connections, and run control
//!
//! Blocks are added under unique names and wired together by port index.
//! Signatures are validated as the graph is built: item sizes must match
//! across every connection, each input port accepts exactly one producer,
//! and stream counts must fall inside each block's signature bounds before
//! a run can start. `build` allocates the stream buffers, installs the
//! per-block details, invokes every `start` hook, and hands the graph to
//! the scheduler.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::block::Block;
use super::buffer::BufferWriter;
use super::detail::BlockDetail;
use super::errors::{ConnectionError, RunError};
use super::scheduler::Scheduler;

/// Default per-connection buffer capacity, in items.
const DEFAULT_BUFFER_ITEMS: usize = 8192;

/// A directed edge between an output port and an input port.
#[derive(Debug, Clone)]
pub struct Connection {
    pub from_block: usize,
    pub from_port: usize,
    pub to_block: usize,
    pub to_port: usize,
    pub buffer_items: usize,
}

struct BlockEntry {
    name: String,
    block: Box<dyn Block>,
}

/// Builder and container for a graph of blocks.
pub struct FlowGraph {
    entries: Vec<BlockEntry>,
    names: HashMap<String, usize>,
    connections: Vec<Connection>,
    default_buffer_items: usize,
}

impl FlowGraph {
    /// Create an empty flow graph
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            names: HashMap::new(),
            connections: Vec::new(),
            default_buffer_items: DEFAULT_BUFFER_ITEMS,
        }
    }

    /// Set the default buffer capacity (in items) for new connections
    pub fn with_default_buffer_size(mut self, items: usize) -> Self {
        self.default_buffer_items = items;
        self
    }

    /// Add a block under a unique name
    pub fn add_block<B: Block + 'static>(
        &mut self,
        name: impl Into<String>,
        block: B,
    ) -> Result<(), ConnectionError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(ConnectionError::DuplicateBlock(name));
        }
        let index = self.entries.len();
        self.names.insert(name.clone(), index);
        self.entries.push(BlockEntry {
            name,
            block: Box::new(block),
        });
        Ok(())
    }

    /// Connect an output port to an input port with the default buffer size
    pub fn connect(
        &mut self,
        from: &str,
        from_port: usize,
        to: &str,
        to_port: usize,
    ) -> Result<(), ConnectionError> {
        self.connect_with_buffer(from, from_port, to, to_port, self.default_buffer_items)
    }

    /// Connect with a custom buffer capacity (in items)
    pub fn connect_with_buffer(
        &mut self,
        from: &str,
        from_port: usize,
        to: &str,
        to_port: usize,
        buffer_items: usize,
    ) -> Result<(), ConnectionError> {
        let from_idx = *self
            .names
            .get(from)
            .ok_or_else(|| ConnectionError::BlockNotFound(from.to_string()))?;
        let to_idx = *self
            .names
            .get(to)
            .ok_or_else(|| ConnectionError::BlockNotFound(to.to_string()))?;

        let out_sig = self.entries[from_idx].block.output_signature();
        let in_sig = self.entries[to_idx].block.input_signature();

        if let Some(max) = out_sig.max_streams() {
            if from_port >= max {
                return Err(ConnectionError::PortOutOfRange {
                    block: from.to_string(),
                    dir: "output",
                    port: from_port,
                    max,
                });
            }
        }
        if let Some(max) = in_sig.max_streams() {
            if to_port >= max {
                return Err(ConnectionError::PortOutOfRange {
                    block: to.to_string(),
                    dir: "input",
                    port: to_port,
                    max,
                });
            }
        }

        if out_sig.item_size() != in_sig.item_size() {
            return Err(ConnectionError::SignatureMismatch {
                src: from.to_string(),
                src_port: from_port,
                src_size: out_sig.item_size(),
                dst: to.to_string(),
                dst_port: to_port,
                dst_size: in_sig.item_size(),
            });
        }

        if self
            .connections
            .iter()
            .any(|c| c.to_block == to_idx && c.to_port == to_port)
        {
            return Err(ConnectionError::DuplicateConnection {
                block: to.to_string(),
                port: to_port,
            });
        }

        self.connections.push(Connection {
            from_block: from_idx,
            from_port,
            to_block: to_idx,
            to_port,
            buffer_items,
        });

        Ok(())
    }

    /// All connections made so far
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Number of blocks in the graph
    pub fn num_blocks(&self) -> usize {
        self.entries.len()
    }

    /// Names of all blocks in the graph
    pub fn block_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Validate the topology against every block's signatures without
    /// starting anything.
    pub fn validate(&self) -> Result<(), ConnectionError> {
        for (idx, entry) in self.entries.iter().enumerate() {
            let n_in = self.stream_count(idx, false);
            let n_out = self.stream_count(idx, true);

            // Input ports must be contiguous and fully connected.
            for port in 0..n_in {
                if !self
                    .connections
                    .iter()
                    .any(|c| c.to_block == idx && c.to_port == port)
                {
                    return Err(ConnectionError::UnconnectedInput {
                        block: entry.name.clone(),
                        port,
                    });
                }
            }

            let in_sig = entry.block.input_signature();
            if !in_sig.accepts(n_in) {
                return Err(ConnectionError::StreamCount {
                    block: entry.name.clone(),
                    dir: "input",
                    actual: n_in,
                    expected: in_sig.bounds_description(),
                });
            }
            let out_sig = entry.block.output_signature();
            if !out_sig.accepts(n_out) {
                return Err(ConnectionError::StreamCount {
                    block: entry.name.clone(),
                    dir: "output",
                    actual: n_out,
                    expected: out_sig.bounds_description(),
                });
            }
        }
        Ok(())
    }

    /// Connected stream count for one side of a block: highest used port
    /// plus one.
    fn stream_count(&self, block: usize, output: bool) -> usize {
        self.connections
            .iter()
            .filter_map(|c| {
                if output && c.from_block == block {
                    Some(c.from_port + 1)
                } else if !output && c.to_block == block {
                    Some(c.to_port + 1)
                } else {
                    None
                }
            })
            .max()
            .unwrap_or(0)
    }

    /// Build the graph, run the start hooks, and spawn the block drivers.
    /// Returns the scheduler handle for stop/wait control.
    pub fn start(self) -> Result<Scheduler, RunError> {
        self.validate().map_err(RunError::Connection)?;

        info!(
            "Starting flow graph with {} blocks and {} connections",
            self.entries.len(),
            self.connections.len()
        );

        let FlowGraph {
            entries,
            connections,
            default_buffer_items,
            ..
        } = self;

        // ── Allocate one buffer per used output port ─────────────
        let mut writers: HashMap<(usize, usize), BufferWriter> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let n_out = connections
                .iter()
                .filter(|c| c.from_block == idx)
                .map(|c| c.from_port + 1)
                .max()
                .unwrap_or(0);
            let item_size = entry.block.output_signature().item_size();
            for port in 0..n_out {
                let capacity =
                    buffer_capacity(idx, port, &entries, &connections, default_buffer_items);
                debug!(
                    "Allocating {}-item buffer for {}:{}",
                    capacity, entry.name, port
                );
                writers.insert((idx, port), BufferWriter::new(capacity, item_size));
            }
        }

        // ── Install reader cursors per connection ────────────────
        let mut readers = HashMap::new();
        for conn in &connections {
            let writer = writers
                .get(&(conn.from_block, conn.from_port))
                .expect("writer allocated for every connected output");
            readers.insert((conn.to_block, conn.to_port), writer.add_reader());
        }

        // ── Assemble details ─────────────────────────────────────
        let mut blocks = Vec::new();
        let mut details = Vec::new();
        for (idx, entry) in entries.into_iter().enumerate() {
            let n_in = connections
                .iter()
                .filter(|c| c.to_block == idx)
                .map(|c| c.to_port + 1)
                .max()
                .unwrap_or(0);
            let n_out = connections
                .iter()
                .filter(|c| c.from_block == idx)
                .map(|c| c.from_port + 1)
                .max()
                .unwrap_or(0);

            let inputs = (0..n_in)
                .map(|p| readers.remove(&(idx, p)).expect("validated input port"))
                .collect();
            let outputs = (0..n_out)
                .map(|p| writers.remove(&(idx, p)).expect("allocated output port"))
                .collect();

            blocks.push((entry.name, entry.block));
            details.push(BlockDetail::new(idx, inputs, outputs));
        }

        // ── Start phase: every hook before any general_work ──────
        let mut failed_start = None;
        for idx in 0..blocks.len() {
            if details[idx].mark_started() {
                if let Err(source) = blocks[idx].1.start() {
                    failed_start = Some((idx, source));
                    break;
                }
            }
        }
        if let Some((failed_idx, source)) = failed_start {
            // Wind back the blocks that already started.
            for prev in 0..failed_idx {
                if details[prev].mark_stopped() {
                    if let Err(e) = blocks[prev].1.stop() {
                        warn!("[{}] stop hook failed: {}", blocks[prev].0, e);
                    }
                }
            }
            return Err(RunError::StartFailure {
                block: blocks[failed_idx].0.clone(),
                source,
            });
        }

        // ── Spawn drivers ────────────────────────────────────────
        let mut scheduler = Scheduler::new();
        for ((_, block), detail) in blocks.into_iter().zip(details) {
            scheduler.start_block(block, detail);
        }

        info!(
            "Flow graph running with {} block drivers",
            scheduler.num_threads()
        );
        Ok(scheduler)
    }

    /// Start the graph and block until every driver has finished.
    pub fn run(self) -> Result<(), RunError> {
        self.start()?.wait()
    }
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Capacity for the buffer behind `(block, port)`: the largest request among
/// its connections, with enough slack that every consumer's history and
/// output granularity always fit.
fn buffer_capacity(
    block: usize,
    port: usize,
    entries: &[BlockEntry],
    connections: &[Connection],
    default_items: usize,
) -> usize {
    let mut capacity = connections
        .iter()
        .filter(|c| c.from_block == block && c.from_port == port)
        .map(|c| c.buffer_items)
        .max()
        .unwrap_or(default_items);

    let producer = &entries[block].block;
    capacity = capacity.max(2 * producer.output_multiple().max(1));

    for conn in connections
        .iter()
        .filter(|c| c.from_block == block && c.from_port == port)
    {
        let consumer = &entries[conn.to_block].block;
        let n_in = connections
            .iter()
            .filter(|c| c.to_block == conn.to_block)
            .map(|c| c.to_port + 1)
            .max()
            .unwrap_or(0);
        let mut required = vec![0usize; n_in];
        consumer.forecast(consumer.output_multiple().max(1), &mut required);
        let need = required.get(conn.to_port).copied().unwrap_or(0);
        capacity = capacity.max(2 * need.max(1));
    }

    capacity
}
