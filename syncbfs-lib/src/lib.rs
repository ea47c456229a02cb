//! Lock-step simulation of the synchronous flooding algorithm that builds a
//! breadth-first spanning tree over a directed authorization matrix.

mod barrier;
mod channel;
pub mod error;
mod graph;
mod message;
mod process;
mod topology;
mod tree;

pub use barrier::{Arrival, RoundBarrier};
pub use channel::{channel, Mailbox, Sender};
pub use error::{Error, Result, TopologyError, TreeError};
pub use graph::Graph;
pub use message::{Message, ProcessId};
pub use process::{Links, SyncProcess};
pub use topology::Topology;
pub use tree::{BfsTree, TreeNode};
