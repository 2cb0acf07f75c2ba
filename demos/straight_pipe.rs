//! Demo: source → identity → sink straight pipe with a stream tag
//!
//! Usage:
//!   cargo run --release --example straight_pipe -- -n 100000 --tag-offset 42

use clap::Parser;
use sdrflow::blocks::{Identity, VectorSink, VectorSource};
use sdrflow::{FlowGraph, TagValue};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of items to stream
    #[arg(short, long, default_value = "100000")]
    n: u32,

    /// Offset to attach a "burst" tag at
    #[arg(long, default_value = "42")]
    tag_offset: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let source = VectorSource::new((0..args.n).collect::<Vec<_>>()).with_tag(
        args.tag_offset,
        "burst",
        TagValue::Int(1),
    );
    let sink = VectorSink::<u32>::new();
    let store = sink.store();

    let mut graph = FlowGraph::new();
    graph.add_block("src", source)?;
    graph.add_block("id", Identity::<u32>::new())?;
    graph.add_block("snk", sink)?;
    graph.connect("src", 0, "id", 0)?;
    graph.connect("id", 0, "snk", 0)?;

    info!("running {}-item straight pipe", args.n);
    graph.run()?;

    let items = store.items();
    println!("received {} items (last = {:?})", items.len(), items.last());
    for tag in store.tags() {
        println!("tag at offset {}: {} = {:?}", tag.offset, tag.key, tag.value);
    }
    Ok(())
}
