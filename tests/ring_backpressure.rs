// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The CPU may run up to N-1 frames ahead of the GPU and no further.
//wasm tests run in the browser, where timers are available
#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

use frames_and_records::constants::{ObjectConstants, StandardSchema};
use frames_and_records::frame_loop::{Error, FrameLoop};
use frames_and_records::imp::software::{CompletionMode, SoftwareDevice};
use frames_and_records::{Capacities, DeviceError, RingConfig, Ticket};
use std::time::Duration;

fn capacities() -> Capacities {
    Capacities {
        objects: 4,
        materials: 1,
        passes: 1,
    }
}

fn config(wait_timeout: Option<Duration>) -> RingConfig {
    RingConfig {
        slot_count: 3,
        wait_timeout,
        debug_name: "backpressure".to_string(),
        ..RingConfig::default()
    }
}

#[test]
fn stalled_gpu_allows_n_frames_then_hangs() {
    let device = SoftwareDevice::new(CompletionMode::Manual);
    let mut frames =
        FrameLoop::<_, StandardSchema>::new(device.clone(), capacities(), config(Some(Duration::from_millis(50))))
            .unwrap();
    frames.objects_mut().register(ObjectConstants::default()).unwrap();

    for expected in 1..=3 {
        let frame = test_executors::sleep_on(frames.begin_frame()).unwrap();
        assert_eq!(frame.end().unwrap(), Ticket::new(expected));
    }
    assert_eq!(frames.fence().waits(), 0);
    assert_eq!(frames.fence().completed_ticket(), Ticket::NONE);

    let err = test_executors::sleep_on(frames.begin_frame()).unwrap_err();
    match err {
        Error::Device(DeviceError::Hang { ticket, waited }) => {
            assert_eq!(ticket, Ticket::new(1));
            assert!(waited >= Duration::from_millis(50));
        }
        other => panic!("expected a hang, got {other:?}"),
    }
    assert_eq!(frames.fence().waits(), 1);
}

#[test]
fn waits_only_for_the_frame_n_back() {
    let device = SoftwareDevice::new(CompletionMode::Manual);
    let mut frames =
        FrameLoop::<_, StandardSchema>::new(device.clone(), capacities(), config(Some(Duration::from_secs(5))))
            .unwrap();
    for _ in 0..3 {
        let frame = test_executors::sleep_on(frames.begin_frame()).unwrap();
        frame.end().unwrap();
    }
    //the GPU finishes frame 0 only; slot 0 is reusable without waiting
    assert_eq!(device.software_timeline().complete_next(), Some(Ticket::new(1)));
    let frame = test_executors::sleep_on(frames.begin_frame()).unwrap();
    assert_eq!(frame.slot_index(), 0);
    frame.end().unwrap();
    assert_eq!(frames.fence().waits(), 0);

    //slot 1 still holds ticket 2; finish it from another thread while the CPU waits
    let timeline = device.software_timeline().clone();
    let gpu = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        timeline.complete_next();
    });
    let frame = test_executors::sleep_on(frames.begin_frame()).unwrap();
    assert_eq!(frame.slot_index(), 1);
    frame.end().unwrap();
    gpu.join().unwrap();

    assert_eq!(frames.fence().waits(), 1);
    assert_eq!(frames.fence().completed_ticket(), Ticket::new(2));
    assert_eq!(frames.fence().last_issued(), Ticket::new(5));
}

#[test]
fn cpu_never_runs_more_than_n_minus_one_ahead() {
    let device = SoftwareDevice::new(CompletionMode::Latency(Duration::from_millis(2)));
    let mut frames = FrameLoop::<_, StandardSchema>::new(device, capacities(), config(None)).unwrap();
    let object = frames.objects_mut().register(ObjectConstants::default()).unwrap();
    for frame_number in 0..30u32 {
        frames
            .objects_mut()
            .update(object, |o| o.material_index = frame_number)
            .unwrap();
        let frame = test_executors::sleep_on(frames.begin_frame()).unwrap();
        //the slot being recorded was submitted N frames ago and has completed
        assert!(frame.fence().is_complete(frame.slot().completion()));
        let ahead = frame.fence().last_issued().get() - frame.fence().completed_ticket().get();
        assert!(ahead <= 2, "CPU is {ahead} frames ahead");
        assert_eq!(frame.slot().objects().read(0).unwrap().material_index, frame_number);
        frame.end().unwrap();
    }
    test_executors::sleep_on(frames.wait_idle()).unwrap();
    assert_eq!(frames.fence().completed_ticket(), frames.fence().last_issued());
}
