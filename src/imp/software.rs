// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A software device.

The "GPU" here is simulated: record memory is ordinary host memory, recording contexts
collect [Command]s, and the timeline completes according to a [CompletionMode].  This
is what the tests run on, and it is handy for headless tools that want the frame-ring
bookkeeping without a GPU.
*/

use crate::bittricks::align_up;
use crate::fence::Ticket;
use crate::imp::{CompletionState, Device, DeviceError, RecordMemory, RecordingContext, Timeline};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// First virtual address handed out by a [SoftwareDevice].
const ADDRESS_BASE: u64 = 0x1_0000_0000;

/// How the simulated GPU completes signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Nothing completes until the owner calls one of the `complete_*` methods.
    Manual,
    /// Each signal completes as soon as it is enqueued.
    Immediate,
    /// A worker thread completes signals in order, each after the given latency.
    Latency(Duration),
}

#[derive(Debug)]
struct Worker {
    sender: Option<Sender<Ticket>>,
    thread: Option<JoinHandle<()>>,
}

/**
Timeline of the simulated GPU.
*/
#[derive(Debug)]
pub struct SoftwareTimeline {
    state: Arc<CompletionState>,
    mode: CompletionMode,
    //signals enqueued but not completed, in submission order (manual mode)
    queued: Mutex<VecDeque<Ticket>>,
    worker: Option<Worker>,
}

impl SoftwareTimeline {
    pub fn new(mode: CompletionMode) -> Self {
        let state = Arc::new(CompletionState::new());
        let worker = match mode {
            CompletionMode::Latency(latency) => {
                let (sender, receiver): (Sender<Ticket>, Receiver<Ticket>) = mpsc::channel();
                let move_state = state.clone();
                let thread = thread::Builder::new()
                    .name("software_gpu".to_string())
                    .spawn(move || {
                        //exits when the timeline drops its sender
                        while let Ok(ticket) = receiver.recv() {
                            thread::sleep(latency);
                            if move_state.is_lost() {
                                continue;
                            }
                            move_state.complete_through(ticket);
                        }
                    })
                    .expect("Failed to spawn software GPU thread");
                Some(Worker {
                    sender: Some(sender),
                    thread: Some(thread),
                })
            }
            CompletionMode::Manual | CompletionMode::Immediate => None,
        };
        SoftwareTimeline {
            state,
            mode,
            queued: Mutex::new(VecDeque::new()),
            worker,
        }
    }

    pub fn mode(&self) -> CompletionMode {
        self.mode
    }

    /// Number of signals waiting for manual completion.
    pub fn pending(&self) -> usize {
        self.queued.lock().unwrap().len()
    }

    /// Completes the oldest pending signal, if any.
    pub fn complete_next(&self) -> Option<Ticket> {
        let next = self.queued.lock().unwrap().pop_front();
        if let Some(ticket) = next {
            self.state.complete_through(ticket);
        }
        next
    }

    /**
    Completes every pending signal up to and including `ticket`.

    Signals that were never enqueued cannot complete, so the completed value never
    runs ahead of what the CPU issued.
    */
    pub fn complete_through(&self, ticket: Ticket) {
        let highest = {
            let mut queued = self.queued.lock().unwrap();
            let mut highest = None;
            while let Some(front) = queued.front().copied() {
                if front > ticket {
                    break;
                }
                queued.pop_front();
                highest = Some(front);
            }
            highest
        };
        if let Some(highest) = highest {
            self.state.complete_through(highest);
        }
    }

    pub fn complete_all(&self) {
        let last = self.queued.lock().unwrap().drain(..).last();
        if let Some(last) = last {
            self.state.complete_through(last);
        }
    }

    /// Simulates device removal.  Outstanding and future waits fail.
    pub fn lose_device(&self) {
        logwise::warn_sync!("software device lost");
        self.state.lose();
    }

    pub fn is_lost(&self) -> bool {
        self.state.is_lost()
    }
}

impl Timeline for SoftwareTimeline {
    fn signal(&self, ticket: Ticket) -> Result<(), DeviceError> {
        if self.state.is_lost() {
            return Err(DeviceError::Lost);
        }
        match self.mode {
            CompletionMode::Immediate => self.state.complete_through(ticket),
            CompletionMode::Manual => self.queued.lock().unwrap().push_back(ticket),
            CompletionMode::Latency(_) => {
                let sender = self
                    .worker
                    .as_ref()
                    .and_then(|w| w.sender.as_ref())
                    .ok_or_else(|| DeviceError::Backend("software GPU thread missing".to_string()))?;
                sender
                    .send(ticket)
                    .map_err(|_| DeviceError::Backend("software GPU thread stopped".to_string()))?;
            }
        }
        Ok(())
    }

    fn completed(&self) -> Ticket {
        self.state.completed()
    }

    fn wait(&self, ticket: Ticket) -> impl Future<Output = Result<(), DeviceError>> + Send {
        self.state.wait(ticket)
    }
}

impl Drop for SoftwareTimeline {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.as_mut() {
            //closing the channel stops the thread
            worker.sender.take();
            if let Some(handle) = worker.thread.take() {
                let _ = handle.join();
            }
        }
    }
}

/// A command recorded into a [SoftwareContext].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Binds a descriptor table entry to a root parameter.
    BindTable { root_parameter: u32, table_offset: usize },
    /// Binds a buffer address directly to a root parameter.
    BindAddress { root_parameter: u32, address: u64 },
    Draw { index_count: u32 },
}

#[derive(Debug)]
struct DeviceShared {
    timeline: Arc<SoftwareTimeline>,
    next_address: AtomicU64,
    alignment: usize,
    fail_next_reset: AtomicBool,
}

/**
A simulated device.

Clones share the same timeline and address space, so a test can keep a handle while a
frame loop owns another.
*/
#[derive(Debug, Clone)]
pub struct SoftwareDevice {
    shared: Arc<DeviceShared>,
}

impl SoftwareDevice {
    pub fn new(mode: CompletionMode) -> Self {
        Self::with_alignment(mode, crate::bittricks::CONSTANT_BUFFER_ALIGNMENT)
    }

    /// A device whose minimum uniform alignment is `alignment` (a power of two).
    pub fn with_alignment(mode: CompletionMode, alignment: usize) -> Self {
        assert!(alignment.is_power_of_two(), "alignment must be a power of two");
        SoftwareDevice {
            shared: Arc::new(DeviceShared {
                timeline: Arc::new(SoftwareTimeline::new(mode)),
                next_address: AtomicU64::new(ADDRESS_BASE),
                alignment,
                fail_next_reset: AtomicBool::new(false),
            }),
        }
    }

    pub fn software_timeline(&self) -> &Arc<SoftwareTimeline> {
        &self.shared.timeline
    }

    /// Makes the next [RecordingContext::reset] on any context of this device fail.
    pub fn fail_next_reset(&self) {
        self.shared.fail_next_reset.store(true, Ordering::Relaxed);
    }

    pub fn lose_device(&self) {
        self.shared.timeline.lose_device();
    }
}

impl Device for SoftwareDevice {
    type Timeline = SoftwareTimeline;
    type Memory = SoftwareMemory;
    type Context = SoftwareContext;

    fn timeline(&self) -> Arc<Self::Timeline> {
        self.shared.timeline.clone()
    }

    fn min_uniform_alignment(&self) -> usize {
        self.shared.alignment
    }

    fn allocate(&self, byte_len: usize, debug_name: &str) -> Result<Self::Memory, DeviceError> {
        if self.shared.timeline.is_lost() {
            return Err(DeviceError::Lost);
        }
        let reserve = align_up(byte_len.max(1), self.shared.alignment) as u64;
        let address = self.shared.next_address.fetch_add(reserve, Ordering::Relaxed);
        logwise::trace_sync!(
            "software allocation {name} of {len} bytes",
            name = logwise::privacy::LogIt(debug_name),
            len = byte_len
        );
        Ok(SoftwareMemory {
            bytes: vec![0; byte_len].into_boxed_slice(),
            address,
        })
    }

    fn create_context(&self, debug_name: &str) -> Result<Self::Context, DeviceError> {
        if self.shared.timeline.is_lost() {
            return Err(DeviceError::Lost);
        }
        Ok(SoftwareContext {
            debug_name: debug_name.to_string(),
            device: self.shared.clone(),
            recording: Vec::new(),
            submitted: Vec::new(),
            resets: 0,
        })
    }
}

/// Host memory standing in for an upload heap.
#[derive(Debug)]
pub struct SoftwareMemory {
    bytes: Box<[u8]>,
    address: u64,
}

impl RecordMemory for SoftwareMemory {
    fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    fn write(&mut self, byte_offset: usize, bytes: &[u8]) {
        self.bytes[byte_offset..byte_offset + bytes.len()].copy_from_slice(bytes);
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn base_address(&self) -> u64 {
        self.address
    }
}

/// Collects commands for one frame slot.
#[derive(Debug)]
pub struct SoftwareContext {
    debug_name: String,
    device: Arc<DeviceShared>,
    recording: Vec<Command>,
    submitted: Vec<Vec<Command>>,
    resets: u64,
}

impl SoftwareContext {
    pub fn record(&mut self, command: Command) {
        self.recording.push(command);
    }

    /// Commands recorded since the last reset.
    pub fn recorded(&self) -> &[Command] {
        &self.recording
    }

    /// Every command list submitted from this context, oldest first.
    pub fn submitted(&self) -> &[Vec<Command>] {
        &self.submitted
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

impl RecordingContext for SoftwareContext {
    fn reset(&mut self) -> Result<(), DeviceError> {
        if self.device.fail_next_reset.swap(false, Ordering::Relaxed) {
            return Err(DeviceError::Backend(format!(
                "could not reset recording context {}",
                self.debug_name
            )));
        }
        if self.device.timeline.is_lost() {
            return Err(DeviceError::Lost);
        }
        self.recording.clear();
        self.resets += 1;
        Ok(())
    }

    fn submit(&mut self) -> Result<(), DeviceError> {
        if self.device.timeline.is_lost() {
            return Err(DeviceError::Lost);
        }
        self.submitted.push(std::mem::take(&mut self.recording));
        Ok(())
    }
}
