use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    sync::Arc,
};

use tracing::{debug, info, info_span, trace};

use crate::{
    barrier::{Arrival, RoundBarrier},
    channel::{Mailbox, Sender},
    error::{Error, Result},
    message::Message,
    ProcessId,
};

/// Mailbox handles a process may write into.
#[derive(Debug, Default, Clone)]
pub struct Links {
    /// Processes this one is authorized to send to. Hello goes here and the
    /// size is the neighbor count awaited before terminating.
    pub downstream: BTreeMap<ProcessId, Sender>,
    /// Processes authorized to send to this one. Replies travel back along
    /// these.
    pub upstream: BTreeMap<ProcessId, Sender>,
}

/// One participant of the synchronous flooding protocol.
///
/// Every round is `arrive, send, arrive, receive`. The second arrival makes
/// sure all sends of a round are queued before anyone drains, the first one
/// that nobody sends for round `r` while someone still drains round `r - 1`.
#[derive(Debug)]
pub struct SyncProcess {
    id: ProcessId,
    root: ProcessId,
    barrier: Arc<RoundBarrier>,
    mailbox: Mailbox,
    links: Links,

    round: u64,
    committed: bool,
    received_messages: bool,
    awaiting_first_candidate: bool,
    parent: Option<ProcessId>,
    children: BTreeSet<ProcessId>,
    ack_count: usize,
    nack_count: usize,
    hellos_received: usize,
    outbox: BTreeMap<ProcessId, Message>,
    terminated: bool,
    messages_sent: u64,
}

impl SyncProcess {
    pub fn new(
        id: ProcessId,
        root: ProcessId,
        mailbox: Mailbox,
        links: Links,
        barrier: Arc<RoundBarrier>,
    ) -> Self {
        let is_root = id == root;

        Self {
            id,
            root,
            barrier,
            mailbox,
            links,
            round: 0,
            committed: is_root,
            received_messages: false,
            awaiting_first_candidate: true,
            parent: is_root.then_some(id),
            children: BTreeSet::new(),
            ack_count: 0,
            nack_count: 0,
            hellos_received: 0,
            outbox: BTreeMap::new(),
            terminated: false,
            messages_sent: 0,
        }
    }

    /// Runs rounds until the process is done, then leaves the barrier. The
    /// root terminates the barrier instead, which ends the simulation.
    ///
    /// On failure the barrier is force-terminated so that no other party
    /// keeps waiting for this one.
    pub fn run(mut self) -> Result<Self> {
        let span = info_span!("process", id = %self.id);
        let _enter = span.enter();

        match self.run_rounds() {
            Ok(()) => Ok(self),
            Err(e) => {
                self.barrier.force_termination();
                Err(e)
            }
        }
    }

    fn run_rounds(&mut self) -> Result<()> {
        while !self.terminated {
            self.next_round()?;
        }

        if self.is_root() {
            info!(
                rounds = self.round,
                children = self.children.len(),
                "root resolved, terminating the barrier"
            );
            self.barrier.force_termination();
        } else {
            debug!(rounds = self.round, "leaving the barrier");
            self.barrier.arrive_and_deregister()?;
        }

        Ok(())
    }

    fn next_round(&mut self) -> Result<()> {
        self.await_barrier()?;
        self.send_messages()?;
        self.await_barrier()?;
        self.receive_messages()?;
        self.round += 1;

        Ok(())
    }

    fn await_barrier(&self) -> Result<()> {
        match self.barrier.arrive_and_await_advance()? {
            Arrival::Advanced(_) => Ok(()),
            Arrival::Terminated => Err(Error::Aborted {
                id: self.id,
                round: self.round,
            }),
        }
    }

    fn send_messages(&mut self) -> Result<()> {
        if self.round == 0 {
            if self.is_root() {
                self.announce()?;
                self.check_completion()?;
            }
            return Ok(());
        }

        if !self.received_messages {
            return Ok(());
        }
        self.received_messages = false;

        if !self.committed {
            self.committed = true;
            debug!(round = self.round, parent = ?self.parent, "committed");
            self.announce()?;
        }

        // A fresh commit only completes here when there is nobody to wait for.
        self.check_completion()?;
        self.flush_outbox()
    }

    fn receive_messages(&mut self) -> Result<()> {
        let messages = self.mailbox.drain();
        if messages.is_empty() {
            return Ok(());
        }

        self.received_messages = true;

        for msg in messages {
            trace!(round = self.round, ?msg, "received");

            match msg {
                Message::Hello(sender) => self.on_hello(sender),
                Message::Ack(sender) => {
                    self.count_response()?;
                    self.ack_count += 1;
                    self.children.insert(sender);
                }
                Message::Nack(_) => {
                    self.count_response()?;
                    self.nack_count += 1;
                }
            }
        }

        Ok(())
    }

    /// Lowest identifier wins, but only among the Hellos of the batch that
    /// precedes the commit. Later Hellos are always refused.
    fn on_hello(&mut self, sender: ProcessId) {
        self.hellos_received += 1;

        if !self.committed {
            if self.awaiting_first_candidate {
                self.awaiting_first_candidate = false;
                self.parent = Some(sender);
                return;
            }

            if let Some(candidate) = self.parent {
                if sender < candidate {
                    self.outbox.insert(candidate, Message::Nack(self.id));
                    self.parent = Some(sender);
                    return;
                }
            }
        }

        self.outbox.insert(sender, Message::Nack(self.id));
    }

    fn count_response(&self) -> Result<()> {
        if self.ack_count + self.nack_count >= self.links.downstream.len() {
            return Err(Error::ResponseOverflow(self.id));
        }

        Ok(())
    }

    fn check_completion(&mut self) -> Result<()> {
        let responses = self.ack_count + self.nack_count;

        if responses != self.links.downstream.len()
            || self.hellos_received != self.links.upstream.len()
        {
            return Ok(());
        }

        self.terminated = true;
        debug!(
            round = self.round,
            acks = self.ack_count,
            nacks = self.nack_count,
            "subtree resolved"
        );

        let parent = self.parent;
        match parent {
            Some(parent) if !self.is_root() => self.reply(parent, Message::Ack(self.id)),
            _ => Ok(()),
        }
    }

    fn announce(&mut self) -> Result<()> {
        for tx in self.links.downstream.values() {
            tx.send(Message::Hello(self.id))?;
        }
        self.messages_sent += self.links.downstream.len() as u64;

        Ok(())
    }

    fn flush_outbox(&mut self) -> Result<()> {
        let outbox = std::mem::take(&mut self.outbox);

        for (to, msg) in outbox {
            self.reply(to, msg)?;
        }

        Ok(())
    }

    fn reply(&mut self, to: ProcessId, msg: Message) -> Result<()> {
        let tx = self.links.upstream.get(&to).ok_or(Error::UnknownLink {
            from: self.id,
            to,
        })?;

        trace!(round = self.round, %to, ?msg, "reply");
        tx.send(msg)?;
        self.messages_sent += 1;

        Ok(())
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn is_root(&self) -> bool {
        self.id == self.root
    }

    /// Parent once resolved, the process itself for the root.
    pub fn parent(&self) -> Option<ProcessId> {
        self.parent
    }

    pub fn children(&self) -> &BTreeSet<ProcessId> {
        &self.children
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn neighbor_count(&self) -> usize {
        self.links.downstream.len()
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }
}

impl Display for SyncProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Process `{}` ({} neighbors)",
            self.id,
            self.links.downstream.len()
        )
    }
}
