mod logging;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use syncbfs_lib::{Graph, Topology};

#[derive(Debug, Parser)]
#[clap(name = "syncbfs", about = "Builds a BFS spanning tree with the synchronous flooding algorithm")]
struct Opts {
    /// Topology file: process count, identifiers, 1-based root index, matrix.
    topology: PathBuf,

    /// Check the resulting tree against a breadth-first search.
    #[clap(long)]
    verify: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let opts = Opts::parse();

    let topology = Topology::parse(&opts.topology)
        .await
        .with_context(|| format!("failed to load {}", opts.topology.display()))?;
    let topology = Arc::new(topology);
    println!("{}", topology);

    let graph = Graph::new(topology.clone());
    let tree = tokio::task::spawn_blocking(move || graph.run()).await??;
    println!("{}", tree);

    if opts.verify {
        tree.verify(&topology)?;
        println!(
            "Verified: {} rounds, {} messages.",
            tree.rounds(),
            tree.total_messages()
        );
    }

    Ok(())
}
