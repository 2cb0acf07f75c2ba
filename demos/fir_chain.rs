//! Demo: ramp source → moving-average FIR → decimate → sink
//!
//! Usage:
//!   cargo run --release --example fir_chain -- -n 4096 --taps 8 --decim 4

use clap::Parser;
use sdrflow::blocks::{FirFilter, KeepOneInN, VectorSink, VectorSource};
use sdrflow::FlowGraph;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of input samples
    #[arg(short, long, default_value = "4096")]
    n: usize,

    /// Moving-average length
    #[arg(long, default_value = "8")]
    taps: usize,

    /// Decimation factor
    #[arg(long, default_value = "4")]
    decim: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let input: Vec<f32> = (0..args.n).map(|i| (i % 64) as f32).collect();
    let taps = vec![1.0 / args.taps as f32; args.taps];
    let sink = VectorSink::<f32>::new();
    let store = sink.store();

    let mut graph = FlowGraph::new();
    graph.add_block("src", VectorSource::new(input))?;
    graph.add_block("fir", FirFilter::new(taps))?;
    graph.add_block("dec", KeepOneInN::<f32>::new(args.decim))?;
    graph.add_block("snk", sink)?;
    graph.connect("src", 0, "fir", 0)?;
    graph.connect("fir", 0, "dec", 0)?;
    graph.connect("dec", 0, "snk", 0)?;

    info!(
        "running {} samples through {}-tap average, decimate by {}",
        args.n, args.taps, args.decim
    );
    graph.run()?;

    let items = store.items();
    println!("received {} filtered samples", items.len());
    println!("first 8: {:?}", &items[..items.len().min(8)]);
    Ok(())
}
