//! Cancellable retry timer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{DeliveryEvent, TimerEvent};

/// At most one outstanding timer. Arming cancels whatever was armed
/// before, and each arm gets a new generation so a fire that was already
/// queued when the timer was replaced can be recognised and ignored.
#[derive(Debug, Default)]
pub(crate) struct RetryTimer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl RetryTimer {
    /// Arms the timer to deliver `RetryDue` into `mailbox` after `after`.
    pub(crate) fn arm(&mut self, after: Duration, mailbox: &mpsc::UnboundedSender<DeliveryEvent>) {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let mailbox = mailbox.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = mailbox.send(DeliveryEvent::Timer(TimerEvent::RetryDue { generation }));
        }));
    }

    /// Cancels the outstanding timer, if any.
    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Consumes a fire for `generation`. Returns `false` for stale fires.
    pub(crate) fn fired(&mut self, generation: u64) -> bool {
        if self.handle.is_some() && generation == self.generation {
            self.handle = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
