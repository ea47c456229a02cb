mod logging;

use std::{fs, path::PathBuf};

use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use syncbfs_lib::Topology;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(name = "gentopology", about = "Writes random topologies connected from their root")]
struct Opts {
    /// Directory the topology files are written to.
    #[clap(long, default_value = "./topologies")]
    out: PathBuf,

    #[clap(long, default_value_t = 1)]
    min_nodes: usize,

    #[clap(long, default_value_t = 40)]
    max_nodes: usize,

    /// Files written for every size.
    #[clap(long, default_value_t = 5)]
    count: usize,

    /// Probability of every extra edge on top of the spanning arborescence.
    #[clap(long, default_value_t = 0.1)]
    density: f64,

    /// Do not mirror edges.
    #[clap(long)]
    directed: bool,

    /// Makes the output reproducible.
    #[clap(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    logging::init();
    let opts = Opts::parse();
    fs::create_dir_all(&opts.out)?;

    (opts.min_nodes.max(1)..=opts.max_nodes)
        .into_par_iter()
        .try_for_each(|n| gen_n(&opts, n))
}

fn gen_n(opts: &Opts, n: usize) -> anyhow::Result<()> {
    for i in 0..opts.count {
        let file = opts.out.join(format!("{}-{}.tpgy", n, i));

        if file.exists() {
            info!("Topology {}-{} already exists, skipping..", n, i);
            continue;
        }

        let mut rng = match opts.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ ((n as u64) << 32) ^ i as u64),
            None => StdRng::from_entropy(),
        };

        let topology = Topology::generate(&mut rng, n, opts.density, !opts.directed)?;
        topology.write(&file)?;
        info!("Generated topology {}-{}.", n, i);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_sets_files_per_size() {
        let opts = Opts::try_parse_from(["gentopology", "--count", "3", "--max-nodes", "8"]).unwrap();

        assert_eq!(opts.count, 3);
        assert_eq!(opts.max_nodes, 8);
        assert!(Opts::try_parse_from(["gentopology", "--per-size", "3"]).is_err());
    }
}
