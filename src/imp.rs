// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Device backends.

Everything above this module is written against the traits here, so the ring, the
fence clock and the record buffers run unchanged on the software backend (used for
tests and headless tools) and on wgpu.
*/

use crate::fence::Ticket;
use std::future::Future;
use std::sync::Arc;

mod completion;
mod error;
pub mod software;

#[cfg(all(feature = "backend_wgpu", not(target_arch = "wasm32")))]
pub mod wgpu;

pub(crate) use completion::CompletionState;
pub use error::DeviceError;

/**
The GPU side of the fence clock.

A timeline is a monotonic counter that the GPU raises as it finishes work.  The CPU
enqueues signals with [Timeline::signal] and learns about progress either by reading
[Timeline::completed] or by awaiting [Timeline::wait].
*/
pub trait Timeline: Send + Sync {
    /// Enqueues a GPU-side operation that will raise the completed value to `ticket`
    /// once all previously submitted work has finished.
    fn signal(&self, ticket: Ticket) -> Result<(), DeviceError>;

    /// Non-blocking read of GPU progress.
    fn completed(&self) -> Ticket;

    /**
    Resolves once the completed value reaches `ticket`.

    Implementations must park on a wait primitive associated with the ticket rather than
    poll.  Fails with [DeviceError::Lost] if the device goes away while waiting.
    */
    fn wait(&self, ticket: Ticket) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

/**
CPU-writable memory backing one dynamic record buffer.
*/
pub trait RecordMemory {
    fn byte_len(&self) -> usize;

    /// Copies `bytes` to `byte_offset`.  Callers have already bounds-checked.
    fn write(&mut self, byte_offset: usize, bytes: &[u8]);

    fn as_bytes(&self) -> &[u8];

    /// Device virtual address of byte 0.
    fn base_address(&self) -> u64;

    /// Makes CPU writes visible to the GPU copy.  Called before the owning slot is submitted.
    fn flush(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/**
The command-recording context owned by one frame slot.
*/
pub trait RecordingContext {
    /**
    Prepares the context to record a new frame.

    Only called once the slot's previous submission has completed.  Failure is fatal.
    */
    fn reset(&mut self) -> Result<(), DeviceError>;

    /// Submits whatever was recorded since the last reset.
    fn submit(&mut self) -> Result<(), DeviceError>;
}

/**
A device that can host a frame slot ring.
*/
pub trait Device {
    type Timeline: Timeline + 'static;
    type Memory: RecordMemory;
    type Context: RecordingContext;

    fn timeline(&self) -> Arc<Self::Timeline>;

    /// Minimum offset alignment for constant (uniform) buffer bindings.
    fn min_uniform_alignment(&self) -> usize;

    fn allocate(&self, byte_len: usize, debug_name: &str) -> Result<Self::Memory, DeviceError>;

    fn create_context(&self, debug_name: &str) -> Result<Self::Context, DeviceError>;
}
