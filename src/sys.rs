// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Platform shims.
//!
//! Fence waits are timed with a monotonic clock, which `std` does not provide on wasm.

pub mod time {
    //! `Instant` for measuring how long the CPU spent waiting on the GPU.

    #[cfg(not(target_arch = "wasm32"))]
    pub use std::time::Instant;

    #[cfg(target_arch = "wasm32")]
    pub use web_time::Instant;
}
