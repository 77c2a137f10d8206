use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::mailbox::MailboxSender;
use crate::status::Status;

/// Latest status per repository, reduced to one status for the light
///
/// Rules, first match wins:
/// 1. anything failed -> `Fail`
/// 2. anything building -> `InProgress`
/// 3. otherwise -> `Success`
pub struct Aggregator {
    statuses: Mutex<HashMap<String, Status>>,
    mailbox: MailboxSender,
}

impl Aggregator {
    pub fn new(mailbox: MailboxSender) -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            mailbox,
        }
    }

    /// A poisoned lock only means another poller panicked mid-insert, the
    /// map itself is still a valid map
    fn table(&self) -> MutexGuard<'_, HashMap<String, Status>> {
        self.statuses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the latest status of one repository and hand the new
    /// aggregate to the driver
    ///
    /// The post happens under the lock, so the mailbox never ends up holding
    /// an aggregate computed from an older table than the one before it.
    pub fn update(&self, repository: &str, status: Status) -> Status {
        let mut table = self.table();
        table.insert(repository.to_string(), status);

        let aggregate = reduce(table.values().copied());
        let changed = self.mailbox.post(aggregate);
        debug!(
            repository,
            %status,
            %aggregate,
            changed,
            "recorded build status"
        );
        aggregate
    }

    /// Aggregate of the table as it is now, `NotSet` before the first update
    pub fn aggregate(&self) -> Status {
        reduce(self.table().values().copied())
    }

    /// Copy of the per-repository table
    pub fn snapshot(&self) -> HashMap<String, Status> {
        self.table().clone()
    }
}

/// Priority reduction over a set of statuses, `NotSet` when nothing decisive is in it
pub fn reduce(statuses: impl IntoIterator<Item = Status>) -> Status {
    let mut building = false;
    let mut passed = false;
    for status in statuses {
        match status {
            Status::Fail => return Status::Fail,
            Status::InProgress => building = true,
            Status::Success => passed = true,
            Status::NotSet => {}
        }
    }

    if building {
        Status::InProgress
    } else if passed {
        Status::Success
    } else {
        Status::NotSet
    }
}
