// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::fence::Ticket;
use std::time::Duration;

/// A fatal device condition.  The frame loop must stop when it sees one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DeviceError {
    #[error("device lost")]
    Lost,
    #[error("device hang: ticket {ticket} not reached after {waited:?}")]
    Hang { ticket: Ticket, waited: Duration },
    #[error("backend error: {0}")]
    Backend(String),
}
