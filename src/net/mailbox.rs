//! Latest-wins single-slot mailbox
//!
//! Joins a blocking I/O thread to the simulation thread. Posting never
//! blocks: a value that was not picked up yet is replaced by the newer one.
//! Built on a crossbeam bounded(1) channel; the sending side keeps its own
//! receiver handle to evict the stale value.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

/// The posting half was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Mailbox closed")]
pub struct MailboxClosed;

/// Posting half, held by the producer thread
pub struct MailboxSender<T> {
    sender: Sender<T>,
    evict: Receiver<T>,
}

/// Taking half, held by the consumer
pub struct MailboxReceiver<T> {
    receiver: Receiver<T>,
}

/// Create a connected mailbox pair
pub fn mailbox<T>() -> (MailboxSender<T>, MailboxReceiver<T>) {
    let (sender, receiver) = bounded(1);
    (
        MailboxSender {
            sender,
            evict: receiver.clone(),
        },
        MailboxReceiver { receiver },
    )
}

impl<T> MailboxSender<T> {
    /// Post a value, replacing any value not yet taken. Returns true if an
    /// older value was dropped.
    pub fn post(&self, value: T) -> bool {
        let mut value = value;
        let mut replaced = false;
        loop {
            match self.sender.try_send(value) {
                Ok(()) => return replaced,
                Err(TrySendError::Full(v)) => {
                    // Consumer may take it between the two calls; either way
                    // the slot frees up
                    replaced |= self.evict.try_recv().is_ok();
                    value = v;
                }
                // Unreachable while `evict` is alive, kept for completeness
                Err(TrySendError::Disconnected(_)) => return replaced,
            }
        }
    }
}

impl<T> MailboxReceiver<T> {
    /// Non-blocking take
    #[inline]
    pub fn try_take(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Block until a value arrives. None once the sender is gone.
    pub fn take(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Block up to `timeout`
    pub fn take_timeout(&self, timeout: Duration) -> Result<Option<T>, MailboxClosed> {
        match self.receiver.recv_timeout(timeout) {
            Ok(v) => Ok(Some(v)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(MailboxClosed),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
