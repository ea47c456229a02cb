mod logging;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use clap::Parser;
use rayon::prelude::*;
use syncbfs_lib::{Graph, Topology};
use tokio::runtime::Handle;
use tracing::error;

#[derive(Debug, Parser)]
#[clap(name = "simulate", about = "Runs and verifies every topology in a directory")]
struct Opts {
    /// Directory of `.tpgy` files, as written by `gentopology`.
    #[clap(default_value = "./topologies")]
    dir: PathBuf,

    /// Skip topologies with more processes than this.
    #[clap(long)]
    max_nodes: Option<usize>,
}

struct SimResult {
    n: usize,
    rounds: u64,
    messages: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let opts = Opts::parse();

    let mut entries = fs::read_dir(&opts.dir)?
        .map(|res| res.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.retain(|p| p.extension().map_or(false, |ext| ext == "tpgy"));
    entries.sort();

    let handle = Handle::current();
    let failed = AtomicUsize::new(0);

    entries.par_iter().for_each(|path| {
        match run_simulation(&handle, path, opts.max_nodes) {
            Ok(Some(res)) => println!(
                "{}: n: {}, rounds: {}, messages: {}",
                path.display(),
                res.n,
                res.rounds,
                res.messages
            ),
            Ok(None) => {}
            Err(e) => {
                error!("{}: {:#}", path.display(), e);
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    let failed = failed.into_inner();
    if failed > 0 {
        anyhow::bail!("{} of {} topologies failed", failed, entries.len());
    }

    Ok(())
}

fn run_simulation(
    handle: &Handle,
    path: &Path,
    max_nodes: Option<usize>,
) -> anyhow::Result<Option<SimResult>> {
    let topology = Arc::new(handle.block_on(Topology::parse(path))?);

    if max_nodes.map_or(false, |max| topology.len() > max) {
        return Ok(None);
    }

    let tree = Graph::new(topology.clone()).run()?;
    tree.verify(&topology)?;

    Ok(Some(SimResult {
        n: topology.len(),
        rounds: tree.rounds(),
        messages: tree.total_messages(),
    }))
}
