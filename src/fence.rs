// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The fence clock.

The fence clock hands out strictly increasing [Ticket]s.  Each ticket is attached to a
GPU-side signal, so once the timeline's completed value reaches a ticket, every command
submitted before that ticket was issued has finished executing.

Frame slots store the ticket issued when they were submitted.  Before the CPU writes
into a slot again it asks the clock whether that ticket has been reached, and waits if
it has not.
*/

use crate::imp::{DeviceError, Timeline};
use crate::sys::time::Instant;
use futures::future::Either;
use std::fmt::{Display, Formatter};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

/// A point in GPU execution.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    /// The ticket of a slot that was never submitted.  Always complete.
    pub const NONE: Ticket = Ticket(0);

    pub const fn new(value: u64) -> Self {
        Ticket(value)
    }
    pub const fn get(self) -> u64 {
        self.0
    }
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
    fn next(self) -> Self {
        Ticket(self.0 + 1)
    }
}

impl Display for Ticket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/**
Issues tickets and waits on them.

# Invariants

* tickets returned by [FenceClock::issue_ticket] are strictly increasing
* [FenceClock::completed_ticket] never decreases and never exceeds [FenceClock::last_issued]
*/
#[derive(Debug)]
pub struct FenceClock<T: Timeline> {
    timeline: Arc<T>,
    last_issued: Ticket,
    wait_timeout: Option<Duration>,
    waits: u64,
}

impl<T: Timeline> FenceClock<T> {
    /**
    Creates a clock on `timeline`.

    When `wait_timeout` is `Some`, a wait that outlives it is classified as a
    [DeviceError::Hang] instead of blocking forever.
    */
    pub fn new(timeline: Arc<T>, wait_timeout: Option<Duration>) -> Self {
        FenceClock {
            last_issued: timeline.completed(),
            timeline,
            wait_timeout,
            waits: 0,
        }
    }

    /// Issues the next ticket and enqueues its GPU-side signal.
    pub fn issue_ticket(&mut self) -> Result<Ticket, DeviceError> {
        let ticket = self.last_issued.next();
        self.timeline.signal(ticket)?;
        self.last_issued = ticket;
        Ok(ticket)
    }

    pub fn completed_ticket(&self) -> Ticket {
        self.timeline.completed()
    }

    pub fn last_issued(&self) -> Ticket {
        self.last_issued
    }

    pub fn is_complete(&self, ticket: Ticket) -> bool {
        self.completed_ticket() >= ticket
    }

    /// How many times the CPU actually had to wait.
    pub fn waits(&self) -> u64 {
        self.waits
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    pub fn timeline(&self) -> &Arc<T> {
        &self.timeline
    }

    /**
    Resumes once the GPU has reached `ticket`.

    Returns immediately without counting a wait if `ticket` is already complete.
    */
    pub async fn wait_until(&mut self, ticket: Ticket) -> Result<(), DeviceError> {
        if self.is_complete(ticket) {
            return Ok(());
        }
        debug_assert!(
            ticket <= self.last_issued,
            "waiting on ticket {ticket} which was never issued (last issued {})",
            self.last_issued
        );
        self.waits += 1;
        let started = Instant::now();
        let wait_perf = logwise::perfwarn_begin!("FenceClock::wait_until");
        let result = match self.wait_timeout {
            None => self.timeline.wait(ticket).await,
            Some(timeout) => {
                let wait = pin!(self.timeline.wait(ticket));
                let expire = pin!(portable_async_sleep::async_sleep(timeout));
                match futures::future::select(wait, expire).await {
                    Either::Left((result, _)) => result,
                    Either::Right(((), _)) => Err(DeviceError::Hang {
                        ticket,
                        waited: started.elapsed(),
                    }),
                }
            }
        };
        drop(wait_perf);
        if let Err(e) = &result {
            logwise::error_sync!(
                "fence wait for ticket {ticket} failed: {err}",
                ticket = ticket.get(),
                err = logwise::privacy::LogIt(e)
            );
        }
        result
    }
}
