use std::{
    collections::{BTreeSet, HashMap},
    fmt::Display,
};

use crate::{error::TreeError, process::SyncProcess, ProcessId, Topology};

/// Final state of one process once the simulation halted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: ProcessId,
    /// The node itself for the root.
    pub parent: Option<ProcessId>,
    pub children: BTreeSet<ProcessId>,
    pub rounds: u64,
    pub messages_sent: u64,
}

impl From<&SyncProcess> for TreeNode {
    fn from(process: &SyncProcess) -> Self {
        Self {
            id: process.id(),
            parent: process.parent(),
            children: process.children().clone(),
            rounds: process.round(),
            messages_sent: process.messages_sent(),
        }
    }
}

/// The spanning tree resolved by a simulation, in topology order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BfsTree {
    root: ProcessId,
    nodes: Vec<TreeNode>,
    phases: u64,
}

impl BfsTree {
    pub fn new(root: ProcessId, nodes: Vec<TreeNode>, phases: u64) -> Self {
        Self {
            root,
            nodes,
            phases,
        }
    }

    pub fn root(&self) -> ProcessId {
        self.root
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn get(&self, id: ProcessId) -> Option<&TreeNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn parent_of(&self, id: ProcessId) -> Option<ProcessId> {
        self.get(id).and_then(|node| node.parent)
    }

    pub fn children_of(&self, id: ProcessId) -> Vec<ProcessId> {
        self.get(id)
            .map(|node| node.children.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Rounds executed by the root, which is the last process to finish.
    pub fn rounds(&self) -> u64 {
        self.nodes
            .iter()
            .map(|node| node.rounds)
            .max()
            .unwrap_or_default()
    }

    /// Barrier phases the controller observed. Every round is two phases, so
    /// this is `2 * rounds()` for a completed run.
    pub fn phases(&self) -> u64 {
        self.phases
    }

    pub fn total_messages(&self) -> u64 {
        self.nodes.iter().map(|node| node.messages_sent).sum()
    }

    /// Checks that the parent relation is a spanning tree of `topology`
    /// rooted at its root, that every parent was authorized to reach its
    /// child, that children mirror the parent relation and that every depth
    /// is a shortest path over the directed edges.
    pub fn verify(&self, topology: &Topology) -> Result<(), TreeError> {
        let n = topology.len();

        if self.nodes.len() != n {
            return Err(TreeError::NodeCount {
                expected: n,
                found: self.nodes.len(),
            });
        }

        let mut parents: Vec<Option<usize>> = vec![None; n];
        let mut expected_children: HashMap<ProcessId, BTreeSet<ProcessId>> = HashMap::new();

        for node in &self.nodes {
            let index = topology
                .index_of(node.id)
                .ok_or(TreeError::UnknownNode(node.id))?;
            let parent = node.parent.ok_or(TreeError::Orphan(node.id))?;
            let parent_index = topology
                .index_of(parent)
                .ok_or(TreeError::UnknownNode(parent))?;

            if index == topology.root_index() {
                if parent != node.id {
                    return Err(TreeError::RootParent(node.id));
                }
            } else {
                if parent == node.id {
                    return Err(TreeError::SelfParent(node.id));
                }

                if !topology.can_send(parent_index, index) {
                    return Err(TreeError::ParentNotLinked {
                        child: node.id,
                        parent,
                    });
                }

                expected_children.entry(parent).or_default().insert(node.id);
            }

            parents[index] = Some(parent_index);
        }

        // Equal counts with a repeated id leave some position unfilled.
        let parents = parents
            .into_iter()
            .enumerate()
            .map(|(index, parent)| parent.ok_or(TreeError::MissingNode(topology.id(index))))
            .collect::<Result<Vec<_>, _>>()?;

        for node in &self.nodes {
            let expected = expected_children.remove(&node.id).unwrap_or_default();
            if node.children != expected {
                return Err(TreeError::ChildrenMismatch(node.id));
            }
        }

        let distances = topology.distances();
        for (index, shortest) in distances.into_iter().enumerate() {
            let mut depth = 0;
            let mut current = index;

            while current != topology.root_index() {
                current = parents[current];
                depth += 1;

                if depth > n {
                    return Err(TreeError::Cycle(topology.id(index)));
                }
            }

            if Some(depth) != shortest {
                return Err(TreeError::NotShortest {
                    id: topology.id(index),
                    depth,
                    shortest,
                });
            }
        }

        Ok(())
    }
}

impl Display for BfsTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BFS tree:")?;

        for node in &self.nodes {
            writeln!(f)?;
            writeln!(f, "{}:", node.id)?;

            match node.parent {
                Some(parent) => writeln!(f, "parent: {}", parent)?,
                None => writeln!(f, "parent: none")?,
            }

            if !node.children.is_empty() {
                let children = node
                    .children
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>();
                writeln!(f, "children: {}", children.join(" "))?;
            }
        }

        Ok(())
    }
}
