//! Standard block library
//!
//! A starter set of sources, sinks and stream operators built on the block
//! contract: enough to assemble test graphs and simple receive chains.
//! Fixed-rate operators are implemented as [`SyncBlock`](crate::runtime::SyncBlock)
//! kernels wrapped in [`FixedRate`](crate::runtime::FixedRate).

mod fir;
mod head;
mod identity;
mod keep_one_in_n;
mod repeat;
mod sinks;
mod sources;

pub use fir::FirFilter;
pub use head::Head;
pub use identity::Identity;
pub use keep_one_in_n::KeepOneInN;
pub use repeat::Repeat;
pub use sinks::{NullSink, SinkStore, VectorSink};
pub use sources::{NullSource, VectorSource};
