//! Runtime support for block flow graphs

pub mod block;
pub mod buffer;
pub mod detail;
pub mod errors;
pub mod graph;
pub mod ports;
pub mod scheduler;
pub mod signature;
pub mod tag;
pub mod watchdog;

pub use block::{Block, FixedRate, SyncBlock, WorkReturn};
pub use buffer::{BufferReader, BufferWriter};
pub use detail::{BlockDetail, BlockState};
pub use errors::{ConnectionError, RunError, SignatureError, WorkError, WorkResult};
pub use graph::{Connection, FlowGraph};
pub use ports::{consume_each, InputPort, OutputPort};
pub use scheduler::Scheduler;
pub use signature::{StreamItem, StreamSignature};
pub use tag::{Symbol, Tag, TagStore, TagValue};
pub use watchdog::Watchdog;
