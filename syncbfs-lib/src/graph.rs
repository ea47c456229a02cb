use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
};

use tracing::{error, info, warn};

use crate::{
    barrier::{Arrival, RoundBarrier},
    channel::channel,
    error::{Error, Result, TopologyError},
    process::{Links, SyncProcess},
    tree::{BfsTree, TreeNode},
    ProcessId, Topology,
};

/// Owns the wired processes of one simulation and drives it to completion.
pub struct Graph {
    topology: Arc<Topology>,
    barrier: Arc<RoundBarrier>,
    processes: Vec<SyncProcess>,
}

impl Graph {
    /// Creates one mailbox per position and hands every process the mailboxes
    /// of the positions its row authorizes, plus those of the positions whose
    /// rows authorize it, for replies.
    pub fn new(topology: Arc<Topology>) -> Self {
        let n = topology.len();
        let root = topology.root_id();
        // One party per process plus the controller.
        let barrier = Arc::new(RoundBarrier::new(n + 1));

        let (senders, mailboxes): (Vec<_>, Vec<_>) =
            topology.ids().iter().map(|&id| channel(id)).unzip();

        let processes = mailboxes
            .into_iter()
            .enumerate()
            .map(|(i, mailbox)| {
                let links = Links {
                    downstream: topology
                        .out_neighbors(i)
                        .map(|j| (topology.id(j), senders[j].clone()))
                        .collect(),
                    upstream: topology
                        .in_neighbors(i)
                        .map(|j| (topology.id(j), senders[j].clone()))
                        .collect(),
                };

                SyncProcess::new(topology.id(i), root, mailbox, links, barrier.clone())
            })
            .collect();

        Self {
            topology,
            barrier,
            processes,
        }
    }

    /// Builds the simulation straight from the loader's output. `root_index`
    /// is 0-based.
    pub fn from_parts(
        num_processes: usize,
        ids: Vec<ProcessId>,
        root_index: usize,
        matrix: Vec<Vec<bool>>,
    ) -> Result<Self> {
        if ids.len() != num_processes {
            return Err(TopologyError::IdentifierCount {
                expected: num_processes,
                found: ids.len(),
            }
            .into());
        }

        let topology = Topology::new(ids, root_index, matrix)?;
        Ok(Self::new(Arc::new(topology)))
    }

    pub fn processes(&self) -> &[SyncProcess] {
        &self.processes
    }

    /// Starts every process on its own thread, then arrives at the barrier
    /// once per phase until the root terminates it.
    ///
    /// The topology must be connected from the root, otherwise this never
    /// returns.
    pub fn run(self) -> Result<BfsTree> {
        let Self {
            topology,
            barrier,
            processes,
        } = self;

        info!(
            processes = topology.len(),
            root = %topology.root_id(),
            "starting simulation"
        );

        let mut handles = Vec::with_capacity(processes.len());
        for process in processes {
            match Self::spawn(process, barrier.clone()) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!("failed to start a process: {}", e);
                    barrier.force_termination();
                    Self::join_all(handles);
                    return Err(e);
                }
            }
        }

        let observed = Self::observe(&barrier);
        if observed.is_err() {
            barrier.force_termination();
        }

        let joined = Self::join_all(handles);
        let phases = observed?;

        let mut nodes = Vec::with_capacity(joined.len());
        let mut cause = None;
        let mut aborted = None;
        for result in joined {
            match result {
                Ok(process) => nodes.push(TreeNode::from(&process)),
                // Aborts follow from another failure, report that one first.
                Err(e @ Error::Aborted { .. }) => {
                    aborted.get_or_insert(e);
                }
                Err(e) => {
                    cause.get_or_insert(e);
                }
            }
        }

        if let Some(e) = cause.or(aborted) {
            warn!("simulation failed: {}", e);
            return Err(e);
        }

        let tree = BfsTree::new(topology.root_id(), nodes, phases);
        info!(
            rounds = tree.rounds(),
            messages = tree.total_messages(),
            "simulation terminated"
        );

        Ok(tree)
    }

    fn spawn(
        process: SyncProcess,
        barrier: Arc<RoundBarrier>,
    ) -> Result<(ProcessId, JoinHandle<Result<SyncProcess>>)> {
        let id = process.id();

        let handle = thread::Builder::new()
            .name(format!("process-{}", id))
            .spawn(move || {
                match panic::catch_unwind(AssertUnwindSafe(|| process.run())) {
                    Ok(result) => result,
                    Err(_) => {
                        barrier.force_termination();
                        Err(Error::ThreadPanicked(id))
                    }
                }
            })?;

        Ok((id, handle))
    }

    /// The controller never deregisters: without its arrival no phase could
    /// complete.
    fn observe(barrier: &RoundBarrier) -> Result<u64> {
        let mut phases = 0;

        while !barrier.is_terminated() {
            match barrier.arrive_and_await_advance()? {
                Arrival::Advanced(_) => phases += 1,
                Arrival::Terminated => break,
            }
        }

        Ok(phases)
    }

    fn join_all(
        handles: Vec<(ProcessId, JoinHandle<Result<SyncProcess>>)>,
    ) -> Vec<Result<SyncProcess>> {
        handles
            .into_iter()
            .map(|(id, handle)| handle.join().unwrap_or(Err(Error::ThreadPanicked(id))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn wires_rows_downstream_and_columns_upstream() {
        // 0 -> 1, 0 -> 2, 1 -> 2
        let graph = Graph::from_parts(
            3,
            vec![ProcessId(5), ProcessId(6), ProcessId(7)],
            0,
            vec![
                vec![false, true, true],
                vec![false, false, true],
                vec![false, false, false],
            ],
        )
        .unwrap();

        let counts = graph
            .processes()
            .iter()
            .map(|p| p.neighbor_count())
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![2, 1, 0]);
        assert!(graph.processes()[0].is_root());
        assert_eq!(graph.processes()[0].parent(), Some(ProcessId(5)));
        assert_eq!(graph.processes()[1].parent(), None);
    }

    #[test]
    fn failing_process_terminates_the_barrier_and_reports_its_error() {
        // 1 -> 2. A stray Hello from 3 makes 2 owe a Nack it has no link for.
        let topology = Arc::new(
            Topology::new(
                vec![ProcessId(1), ProcessId(2)],
                0,
                vec![vec![false, true], vec![false, false]],
            )
            .unwrap(),
        );
        let barrier = Arc::new(RoundBarrier::new(3));
        let (to_root, root_mailbox) = channel(ProcessId(1));
        let (to_leaf, leaf_mailbox) = channel(ProcessId(2));

        let root = SyncProcess::new(
            ProcessId(1),
            ProcessId(1),
            root_mailbox,
            Links {
                downstream: [(ProcessId(2), to_leaf.clone())].into(),
                upstream: Default::default(),
            },
            barrier.clone(),
        );
        let leaf = SyncProcess::new(
            ProcessId(2),
            ProcessId(1),
            leaf_mailbox,
            Links {
                downstream: Default::default(),
                upstream: [(ProcessId(1), to_root)].into(),
            },
            barrier.clone(),
        );
        to_leaf.send(Message::Hello(ProcessId(3))).unwrap();

        let graph = Graph {
            topology,
            barrier: barrier.clone(),
            processes: vec![root, leaf],
        };
        let err = graph.run().unwrap_err();

        assert!(barrier.is_terminated());
        assert!(
            matches!(
                err,
                Error::UnknownLink {
                    from: ProcessId(2),
                    to: ProcessId(3)
                }
            ),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn from_parts_checks_the_process_count() {
        let err = Graph::from_parts(2, vec![ProcessId(1)], 0, vec![vec![false]]).err();

        assert!(matches!(
            err,
            Some(Error::Topology(TopologyError::IdentifierCount { .. }))
        ));
    }
}
