//! Single-slot hand-off between the aggregator and the indicator driver.
//!
//! This is deliberately not a queue. The slot holds one value; posting
//! overwrites whatever is there and never waits. A receiver that falls
//! behind skips the values it missed and sees only the latest one. The
//! driver renders on its own tick anyway, so intermediate values would be
//! thrown away regardless.

use tokio::sync::watch;

use crate::status::Status;

/// Create a mailbox holding `initial`
///
/// The receiver treats `initial` as already seen.
pub fn mailbox(initial: Status) -> (MailboxSender, MailboxReceiver) {
    let (tx, rx) = watch::channel(initial);
    (MailboxSender { tx }, MailboxReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct MailboxSender {
    tx: watch::Sender<Status>,
}

impl MailboxSender {
    /// Overwrite the slot; returns true if the stored value changed
    ///
    /// Posting the value that is already there doesn't wake the receiver.
    pub fn post(&self, status: Status) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        })
    }

    /// Whatever is in the slot right now
    pub fn current(&self) -> Status {
        *self.tx.borrow()
    }
}

#[derive(Debug)]
pub struct MailboxReceiver {
    rx: watch::Receiver<Status>,
}

impl MailboxReceiver {
    /// Wait for a value we haven't seen yet and return the latest one
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Status> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// Latest value without waiting, marking it seen
    pub fn latest(&mut self) -> Status {
        *self.rx.borrow_and_update()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_then_recv() {
        let (tx, mut rx) = mailbox(Status::NotSet);
        assert!(tx.post(Status::Fail));
        assert_eq!(rx.recv().await, Some(Status::Fail));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let (tx, mut rx) = mailbox(Status::NotSet);
        tx.post(Status::Fail);
        tx.post(Status::InProgress);
        tx.post(Status::Success);

        // Only the newest value survives
        assert_eq!(rx.recv().await, Some(Status::Success));
        assert_eq!(tx.current(), Status::Success);

        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_same_value_does_not_wake() {
        let (tx, mut rx) = mailbox(Status::Success);
        assert!(!tx.post(Status::Success));

        drop(tx);
        // Nothing new was posted, so the receiver just sees the close
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_post_never_blocks_without_reader() {
        let (tx, mut rx) = mailbox(Status::NotSet);
        for _ in 0..1000 {
            tx.post(Status::Fail);
            tx.post(Status::Success);
        }
        assert_eq!(rx.latest(), Status::Success);
    }

    #[tokio::test]
    async fn test_recv_after_close_keeps_last_value() {
        let (tx, mut rx) = mailbox(Status::NotSet);
        tx.post(Status::InProgress);
        drop(tx);

        assert_eq!(rx.recv().await, Some(Status::InProgress));
        assert_eq!(rx.recv().await, None);
        assert_eq!(rx.latest(), Status::InProgress);
    }
}
