// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::fence::Ticket;
use crate::imp::{CompletionState, DeviceError, Timeline};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use wgpu::PollType;

/// Drives `Device::poll` on its own thread so queue callbacks fire without the render thread.
#[derive(Debug)]
pub(super) struct Poller {
    trigger: Mutex<Option<Sender<()>>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Poller {
    pub(super) fn spawn(device: wgpu::Device) -> Result<Self, DeviceError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let (sender, receiver): (Sender<()>, Receiver<()>) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("wgpu_poll".to_string())
            .spawn(move || {
                while !shutdown_clone.load(Ordering::Relaxed) {
                    match receiver.recv() {
                        //poll until the queue is empty
                        Ok(()) => {
                            if let Err(e) = device.poll(PollType::Wait) {
                                logwise::warn_sync!("wgpu poll failed: {err}", err = logwise::privacy::LogIt(&e));
                            }
                        }
                        Err(_) => break,
                    }
                }
            })
            .map_err(|e| DeviceError::Backend(format!("could not spawn wgpu poll thread: {e}")))?;
        Ok(Poller {
            trigger: Mutex::new(Some(sender)),
            shutdown,
            thread: Some(thread),
        })
    }

    pub(super) fn needs_poll(&self) {
        if let Some(sender) = self.trigger.lock().unwrap().as_ref() {
            //a closed channel means we are shutting down
            let _ = sender.send(());
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        //closing the channel wakes the thread if it is parked in recv
        self.trigger.lock().unwrap().take();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/**
Fence timeline over `Queue::on_submitted_work_done`.
*/
#[derive(Debug)]
pub struct WgpuTimeline {
    state: Arc<CompletionState>,
    queue: wgpu::Queue,
    poller: Poller,
}

impl WgpuTimeline {
    pub(super) fn new(device: &wgpu::Device, queue: wgpu::Queue) -> Result<Self, DeviceError> {
        let state = Arc::new(CompletionState::new());
        let lost_state = state.clone();
        device.set_device_lost_callback(move |reason, message| {
            logwise::error_sync!(
                "wgpu device lost ({reason}): {message}",
                reason = logwise::privacy::LogIt(&reason),
                message = logwise::privacy::LogIt(&message)
            );
            lost_state.lose();
        });
        Ok(WgpuTimeline {
            state,
            queue,
            poller: Poller::spawn(device.clone())?,
        })
    }

    pub(super) fn is_lost(&self) -> bool {
        self.state.is_lost()
    }
}

impl Timeline for WgpuTimeline {
    fn signal(&self, ticket: Ticket) -> Result<(), DeviceError> {
        if self.state.is_lost() {
            return Err(DeviceError::Lost);
        }
        let move_state = self.state.clone();
        self.queue.on_submitted_work_done(move || {
            //runs on the poll thread
            move_state.complete_through(ticket);
        });
        self.poller.needs_poll();
        Ok(())
    }

    fn completed(&self) -> Ticket {
        self.state.completed()
    }

    fn wait(&self, ticket: Ticket) -> impl Future<Output = Result<(), DeviceError>> + Send {
        self.poller.needs_poll();
        self.state.wait(ticket)
    }
}
