use std::{
    collections::{HashSet, VecDeque},
    fmt::Display,
    io::Write,
    path::Path,
    str::FromStr,
};

use rand::{
    seq::{index, SliceRandom},
    Rng,
};
use tokio::fs::read_to_string;

use crate::{
    error::{Error, TopologyError},
    ProcessId,
};

/// Processes, root and directed send authorization of one simulation.
///
/// Entry `(i, j)` of the matrix lets the process at position `i` send to the
/// one at position `j`. It says nothing about `j` sending to `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    ids: Vec<ProcessId>,
    root_index: usize,
    matrix: Vec<Vec<bool>>,
}

impl Topology {
    pub fn new(
        ids: Vec<ProcessId>,
        root_index: usize,
        matrix: Vec<Vec<bool>>,
    ) -> Result<Self, TopologyError> {
        let n = ids.len();

        if n == 0 {
            return Err(TopologyError::Empty);
        }

        if root_index >= n {
            return Err(TopologyError::RootOutOfRange {
                index: root_index,
                len: n,
            });
        }

        if matrix.len() != n {
            return Err(TopologyError::RowCount {
                expected: n,
                found: matrix.len(),
            });
        }

        for (row, entries) in matrix.iter().enumerate() {
            if entries.len() != n {
                return Err(TopologyError::NotSquare {
                    expected: n,
                    row,
                    found: entries.len(),
                });
            }
        }

        let mut seen = HashSet::with_capacity(n);
        for id in &ids {
            if !seen.insert(*id) {
                return Err(TopologyError::DuplicateIdentifier(*id));
            }
        }

        Ok(Self {
            ids,
            root_index,
            matrix,
        })
    }

    /// Reads a topology file: the process count, the identifiers, the 1-based
    /// root index and one matrix row per line.
    pub async fn parse(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = read_to_string(&path).await?;

        Ok(content.parse()?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let mut result = String::new();

        result.push_str(&format!("{}\n", self.len()));
        result.push_str(&join(&self.ids));
        result.push('\n');
        result.push_str(&format!("{}\n", self.root_index + 1));

        for row in &self.matrix {
            let row = row.iter().map(|&b| u8::from(b)).collect::<Vec<_>>();
            result.push_str(&join(&row));
            result.push('\n');
        }

        std::fs::File::create(path)?.write_all(result.as_bytes())?;
        Ok(())
    }

    /// Builds a random topology where every process is reachable from the
    /// root: a random arborescence out of the root plus extra edges, each
    /// drawn with probability `density`.
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        n: usize,
        density: f64,
        symmetric: bool,
    ) -> Result<Self, TopologyError> {
        if n == 0 {
            return Err(TopologyError::Empty);
        }

        let density = if density.is_finite() {
            density.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let ids = index::sample(rng, n * 10, n)
            .into_iter()
            .map(|i| ProcessId(i as i64 + 1))
            .collect::<Vec<_>>();
        let root_index = rng.gen_range(0..n);
        let mut matrix = vec![vec![false; n]; n];
        let mut link = |a: usize, b: usize| {
            matrix[a][b] = true;
            if symmetric {
                matrix[b][a] = true;
            }
        };

        let mut order = (0..n).filter(|&i| i != root_index).collect::<Vec<_>>();
        order.shuffle(rng);
        order.insert(0, root_index);

        for k in 1..n {
            let parent = order[rng.gen_range(0..k)];
            link(parent, order[k]);
        }

        for a in 0..n {
            for b in 0..n {
                if a != b && rng.gen_bool(density) {
                    link(a, b);
                }
            }
        }

        Self::new(ids, root_index, matrix)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[ProcessId] {
        &self.ids
    }

    pub fn id(&self, index: usize) -> ProcessId {
        self.ids[index]
    }

    pub fn index_of(&self, id: ProcessId) -> Option<usize> {
        self.ids.iter().position(|&other| other == id)
    }

    pub fn root_index(&self) -> usize {
        self.root_index
    }

    pub fn root_id(&self) -> ProcessId {
        self.ids[self.root_index]
    }

    /// Whether position `from` may send to position `to`.
    pub fn can_send(&self, from: usize, to: usize) -> bool {
        from != to && self.matrix[from][to]
    }

    pub fn out_neighbors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(move |&j| self.can_send(index, j))
    }

    pub fn in_neighbors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(move |&j| self.can_send(j, index))
    }

    /// Hop count from the root to every position over directed edges, `None`
    /// where the root cannot reach.
    pub fn distances(&self) -> Vec<Option<usize>> {
        let mut dist = vec![None; self.len()];
        let mut q = VecDeque::from([self.root_index]);
        dist[self.root_index] = Some(0);

        while let Some(n) = q.pop_front() {
            let d = dist[n].unwrap_or_default();

            for neigh in self.out_neighbors(n) {
                if dist[neigh].is_none() {
                    dist[neigh] = Some(d + 1);
                    q.push_back(neigh);
                }
            }
        }

        dist
    }

    pub fn is_connected(&self) -> bool {
        self.distances().iter().all(Option::is_some)
    }
}

impl FromStr for Topology {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let (line, count) = lines
            .next()
            .ok_or(TopologyError::Truncated("process count"))?;
        let n = parse_number::<usize>(line, count)?;

        if n == 0 {
            return Err(TopologyError::Empty);
        }

        let (line, ids) = lines.next().ok_or(TopologyError::Truncated("identifiers"))?;
        let ids = ids
            .split_whitespace()
            .map(|token| parse_number::<ProcessId>(line, token))
            .collect::<Result<Vec<_>, _>>()?;

        if ids.len() != n {
            return Err(TopologyError::IdentifierCount {
                expected: n,
                found: ids.len(),
            });
        }

        let (line, root) = lines.next().ok_or(TopologyError::Truncated("root index"))?;
        let root = parse_number::<usize>(line, root)?;
        let root_index = root
            .checked_sub(1)
            .ok_or(TopologyError::RootOutOfRange { index: root, len: n })?;

        let mut matrix = Vec::with_capacity(n);
        for (row, (_, entries)) in lines.by_ref().take(n).enumerate() {
            let entries = entries
                .split_whitespace()
                .enumerate()
                .map(|(col, value)| match value {
                    "0" => Ok(false),
                    "1" => Ok(true),
                    _ => Err(TopologyError::InvalidEntry {
                        row,
                        col,
                        value: value.to_string(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;

            matrix.push(entries);
        }

        Self::new(ids, root_index, matrix)
    }
}

impl Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Config file:")?;
        writeln!(f, "# processes: {}", self.len())?;
        writeln!(f, "Process IDs:")?;
        writeln!(f, "{}", join(&self.ids))?;
        writeln!(f, "Root index: {}", self.root_index)?;
        writeln!(f, "Connectivity matrix:")?;

        for row in &self.matrix {
            let row = row.iter().map(|&b| u8::from(b)).collect::<Vec<_>>();
            writeln!(f, "{}", join(&row))?;
        }

        Ok(())
    }
}

fn parse_number<T: FromStr>(line: usize, value: &str) -> Result<T, TopologyError> {
    value.parse::<T>().map_err(|_| TopologyError::InvalidNumber {
        line,
        value: value.to_string(),
    })
}

fn join<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    const RING: &str = "4\n10 20 30 40\n1\n0 1 0 1\n1 0 1 0\n0 1 0 1\n1 0 1 0\n";

    #[test]
    fn parses_the_file_format() {
        let topology: Topology = RING.parse().unwrap();

        assert_eq!(topology.len(), 4);
        assert_eq!(topology.root_id(), ProcessId(10));
        assert_eq!(topology.root_index(), 0);
        assert!(topology.can_send(0, 1));
        assert!(!topology.can_send(0, 2));
        assert_eq!(topology.out_neighbors(2).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(topology.index_of(ProcessId(30)), Some(2));
    }

    #[test]
    fn display_then_write_format_round_trips() {
        let topology: Topology = RING.parse().unwrap();
        let dir = std::env::temp_dir().join(format!("syncbfs-topology-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ring.tpgy");

        topology.write(&path).unwrap();
        let reread: Topology = std::fs::read_to_string(&path).unwrap().parse().unwrap();
        assert_eq!(reread, topology);

        assert!(topology.to_string().contains("Root index: 0"));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!("".parse::<Topology>(), Err(TopologyError::Truncated("process count")));
        assert_eq!("0\n".parse::<Topology>(), Err(TopologyError::Empty));
        assert_eq!(
            "2\n1\n1\n0 1\n1 0\n".parse::<Topology>(),
            Err(TopologyError::IdentifierCount {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            "2\n1 2\n3\n0 1\n1 0\n".parse::<Topology>(),
            Err(TopologyError::RootOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            "2\n1 2\n0\n0 1\n1 0\n".parse::<Topology>(),
            Err(TopologyError::RootOutOfRange { index: 0, len: 2 })
        );
        assert_eq!(
            "2\n1 1\n1\n0 1\n1 0\n".parse::<Topology>(),
            Err(TopologyError::DuplicateIdentifier(ProcessId(1)))
        );
        assert_eq!(
            "2\n1 2\n1\n0 1 1\n1 0\n".parse::<Topology>(),
            Err(TopologyError::NotSquare {
                expected: 2,
                row: 0,
                found: 3
            })
        );
        assert_eq!(
            "2\n1 2\n1\n0 1\n".parse::<Topology>(),
            Err(TopologyError::RowCount {
                expected: 2,
                found: 1
            })
        );
        assert!(matches!(
            "2\n1 2\n1\n0 2\n1 0\n".parse::<Topology>(),
            Err(TopologyError::InvalidEntry { row: 0, col: 1, .. })
        ));
        assert!(matches!(
            "two\n".parse::<Topology>(),
            Err(TopologyError::InvalidNumber { line: 1, .. })
        ));
    }

    #[test]
    fn distances_follow_direction() {
        // 0 -> 1 -> 2, and 2 -> 0 only.
        let topology = Topology::new(
            vec![ProcessId(1), ProcessId(2), ProcessId(3)],
            0,
            vec![
                vec![false, true, false],
                vec![false, false, true],
                vec![true, false, false],
            ],
        )
        .unwrap();

        assert_eq!(topology.distances(), vec![Some(0), Some(1), Some(2)]);
        assert_eq!(topology.in_neighbors(0).collect::<Vec<_>>(), vec![2]);

        let rooted_at_two = Topology::new(topology.ids().to_vec(), 2, topology.matrix.clone()).unwrap();
        assert_eq!(rooted_at_two.distances(), vec![Some(1), Some(2), Some(0)]);
    }

    #[test]
    fn unreachable_positions_are_reported() {
        let topology = Topology::new(
            vec![ProcessId(1), ProcessId(2)],
            0,
            vec![vec![false, false], vec![true, false]],
        )
        .unwrap();

        assert_eq!(topology.distances(), vec![Some(0), None]);
        assert!(!topology.is_connected());
    }

    #[test]
    fn generated_topologies_are_connected() {
        let mut rng = StdRng::seed_from_u64(7);

        for n in 1..30 {
            for symmetric in [true, false] {
                let topology = Topology::generate(&mut rng, n, 0.1, symmetric).unwrap();
                assert_eq!(topology.len(), n);
                assert!(topology.is_connected());

                if symmetric {
                    for i in 0..n {
                        for j in 0..n {
                            assert_eq!(topology.can_send(i, j), topology.can_send(j, i));
                        }
                    }
                }
            }
        }

        assert_eq!(
            Topology::generate(&mut rng, 0, 0.5, true),
            Err(TopologyError::Empty)
        );
    }
}
