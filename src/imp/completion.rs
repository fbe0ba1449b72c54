// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Completion state shared between the CPU and whatever raises the timeline.
//!
//! Both backends funnel GPU progress through here.  Waiters park on a continuation
//! tagged with the ticket they need; raising the completed value resumes exactly the
//! waiters whose ticket has been reached.

use crate::fence::Ticket;
use crate::imp::DeviceError;
use std::future::Future;
use std::sync::Mutex;

type WaitResult = Result<(), DeviceError>;

struct Waiter {
    ticket: Ticket,
    sender: r#continue::Sender<WaitResult>,
}

struct Inner {
    completed: Ticket,
    lost: bool,
    waiters: Vec<Waiter>,
}

pub(crate) struct CompletionState {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for CompletionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("CompletionState")
            .field("completed", &inner.completed)
            .field("lost", &inner.lost)
            .field("waiters", &inner.waiters.len())
            .finish()
    }
}

impl CompletionState {
    pub fn new() -> Self {
        CompletionState {
            inner: Mutex::new(Inner {
                completed: Ticket::NONE,
                lost: false,
                waiters: Vec::new(),
            }),
        }
    }

    pub fn completed(&self) -> Ticket {
        self.inner.lock().unwrap().completed
    }

    pub fn is_lost(&self) -> bool {
        self.inner.lock().unwrap().lost
    }

    /// Raises the completed value to `ticket` (never lowers it) and resumes every waiter it satisfies.
    pub fn complete_through(&self, ticket: Ticket) {
        let ready: Vec<Waiter> = {
            let mut inner = self.inner.lock().unwrap();
            if ticket > inner.completed {
                inner.completed = ticket;
            }
            let completed = inner.completed;
            let (ready, pending) = std::mem::take(&mut inner.waiters)
                .into_iter()
                .partition(|w| w.ticket <= completed);
            inner.waiters = pending;
            ready
        };
        //resume outside the lock
        for waiter in ready {
            waiter.sender.send(Ok(()));
        }
    }

    /// Marks the device lost and fails every outstanding waiter.
    pub fn lose(&self) {
        let waiters = {
            let mut inner = self.inner.lock().unwrap();
            inner.lost = true;
            std::mem::take(&mut inner.waiters)
        };
        for waiter in waiters {
            waiter.sender.send(Err(DeviceError::Lost));
        }
    }

    pub fn wait(&self, ticket: Ticket) -> impl Future<Output = WaitResult> + Send {
        let pending = {
            let mut inner = self.inner.lock().unwrap();
            if inner.lost {
                Err(DeviceError::Lost)
            } else if inner.completed >= ticket {
                Ok(None)
            } else {
                let (sender, future) = r#continue::continuation();
                inner.waiters.push(Waiter { ticket, sender });
                Ok(Some(future))
            }
        };
        async move {
            match pending? {
                None => Ok(()),
                Some(future) => future.await,
            }
        }
    }
}

impl Drop for CompletionState {
    fn drop(&mut self) {
        //a continuation must be resumed before it goes away
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        for waiter in inner.waiters.drain(..) {
            waiter.sender.send(Err(DeviceError::Lost));
        }
    }
}
