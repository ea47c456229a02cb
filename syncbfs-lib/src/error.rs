use thiserror::Error;

use crate::ProcessId;

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or running a simulation.
#[derive(Debug, Error)]
pub enum Error {
    /// The topology handed to the controller is malformed.
    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),

    /// A party used the round barrier in a way the round loop never should.
    #[error("barrier misuse: {0}")]
    Barrier(String),

    /// A process tried to reply to an identifier it holds no link to.
    #[error("process {from} has no link to {to}")]
    UnknownLink { from: ProcessId, to: ProcessId },

    /// The mailbox of a process was dropped while others still send to it.
    #[error("mailbox of process {0} is closed")]
    MailboxClosed(ProcessId),

    /// More responses arrived than the process has outgoing neighbors.
    #[error("process {0} received more responses than it has neighbors")]
    ResponseOverflow(ProcessId),

    /// The barrier was terminated while the process still had work to do.
    #[error("process {id} aborted in round {round}")]
    Aborted { id: ProcessId, round: u64 },

    /// The thread running a process panicked.
    #[error("thread of process {0} panicked")]
    ThreadPanicked(ProcessId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a topology description is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("topology has no processes")]
    Empty,

    #[error("expected {expected} identifiers, found {found}")]
    IdentifierCount { expected: usize, found: usize },

    #[error("root index {index} out of range for {len} processes")]
    RootOutOfRange { index: usize, len: usize },

    #[error("connectivity matrix must be {expected}x{expected}, row {row} has {found} entries")]
    NotSquare {
        expected: usize,
        row: usize,
        found: usize,
    },

    #[error("expected {expected} matrix rows, found {found}")]
    RowCount { expected: usize, found: usize },

    #[error("identifier {0} appears more than once")]
    DuplicateIdentifier(ProcessId),

    #[error("matrix entry ({row}, {col}) must be 0 or 1, found `{value}`")]
    InvalidEntry {
        row: usize,
        col: usize,
        value: String,
    },

    #[error("line {line}: cannot parse `{value}` as a number")]
    InvalidNumber { line: usize, value: String },

    #[error("unexpected end of input, missing {0}")]
    Truncated(&'static str),
}

/// Ways a resolved tree can fail to be a BFS spanning tree of its topology.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("tree has {found} nodes, topology has {expected}")]
    NodeCount { expected: usize, found: usize },

    #[error("node {0} is not part of the topology")]
    UnknownNode(ProcessId),

    #[error("node {0} is missing from the tree")]
    MissingNode(ProcessId),

    #[error("node {0} never resolved a parent")]
    Orphan(ProcessId),

    #[error("parent chain of {0} never reaches the root")]
    Cycle(ProcessId),

    #[error("root {0} must be its own parent")]
    RootParent(ProcessId),

    #[error("node {0} claims to be its own parent but is not the root")]
    SelfParent(ProcessId),

    #[error("parent {parent} of {child} is not authorized to send to it")]
    ParentNotLinked { child: ProcessId, parent: ProcessId },

    #[error("children of {0} do not match the nodes that adopted it")]
    ChildrenMismatch(ProcessId),

    #[error("node {id} sits at depth {depth}, shortest path from the root is {shortest:?}")]
    NotShortest {
        id: ProcessId,
        depth: usize,
        shortest: Option<usize>,
    },
}
