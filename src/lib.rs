//! Dataflow signal-processing runtime: blocks, stream buffers, tags, and a
//! thread-per-block scheduler
//!
//! A graph of processing blocks is connected by typed sample streams; the
//! scheduler drives every block — moving samples through shared ring
//! buffers, carrying offset-anchored tags in lockstep with the data — until
//! the sources signal end-of-stream.
//!
//! # Architecture
//!
//! - **Block**: the user-visible contract (`forecast`, `general_work`,
//!   `start`/`stop`, history, output multiple, relative rate)
//! - **Stream buffers**: single-producer/multi-consumer rings with absolute
//!   item counts and always-linear spans
//! - **Tags**: out-of-band metadata anchored to absolute item offsets,
//!   propagated downstream alongside the samples
//! - **Scheduler**: one driver thread per block, blocking between work
//!   calls on buffer condition variables
//!
//! # Example
//!
//! ```no_run
//! use sdrflow::blocks::{VectorSink, VectorSource};
//! use sdrflow::FlowGraph;
//!
//! let source = VectorSource::new((0u32..1000).collect::<Vec<_>>());
//! let sink = VectorSink::<u32>::new();
//! let store = sink.store();
//!
//! let mut graph = FlowGraph::new();
//! graph.add_block("src", source)?;
//! graph.add_block("snk", sink)?;
//! graph.connect("src", 0, "snk", 0)?;
//! graph.run()?;
//!
//! assert_eq!(store.items().len(), 1000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod blocks;
pub mod runtime;

// Re-export the core contract types at the crate root
pub use runtime::{
    Block, ConnectionError, FixedRate, FlowGraph, InputPort, OutputPort, RunError, Scheduler,
    SignatureError, StreamItem, StreamSignature, Symbol, SyncBlock, Tag, TagValue, WorkError,
    WorkResult, WorkReturn,
};
