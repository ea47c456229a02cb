use std::sync::Arc;

use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use syncbfs_lib::{Graph, Topology};

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]

    #[test]
    fn symmetric_topologies_resolve_to_bfs_trees(
        seed in any::<u64>(),
        n in 1usize..24,
        density in 0.0f64..0.4,
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let topology = Topology::generate(&mut rng, n, density, true).unwrap();

        let tree = Graph::new(Arc::new(topology.clone())).run().unwrap();

        prop_assert_eq!(tree.verify(&topology), Ok(()));
        prop_assert_eq!(tree.root(), topology.root_id());
    }

    #[test]
    fn directed_topologies_resolve_to_bfs_trees(
        seed in any::<u64>(),
        n in 1usize..24,
        density in 0.0f64..0.4,
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let topology = Topology::generate(&mut rng, n, density, false).unwrap();

        let tree = Graph::new(Arc::new(topology.clone())).run().unwrap();

        prop_assert_eq!(tree.verify(&topology), Ok(()));
    }
}
