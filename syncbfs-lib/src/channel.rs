use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::{error::Error, message::Message, ProcessId};

/// Creates the mailbox of `owner` together with the first handle other
/// processes use to write into it.
pub fn channel(owner: ProcessId) -> (Sender, Mailbox) {
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    (Sender { owner, tx }, Mailbox { rx })
}

/// Write half of a mailbox. Cheap to clone, handed to every process allowed to
/// deliver into the mailbox.
#[derive(Debug, Clone)]
pub struct Sender {
    owner: ProcessId,
    tx: mpsc::UnboundedSender<Message>,
}

impl Sender {
    /// Enqueues a message, never blocks.
    pub fn send(&self, msg: Message) -> Result<(), Error> {
        self.tx
            .send(msg)
            .map_err(|_| Error::MailboxClosed(self.owner))
    }
}

/// Read half of a mailbox, owned by exactly one process.
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Mailbox {
    /// Takes every message currently queued, in arrival order.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut drained = Vec::new();

        loop {
            match self.rx.try_recv() {
                Ok(msg) => drained.push(msg),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        drained
    }
}
