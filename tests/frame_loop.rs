// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Driving the whole cycle the way a renderer's draw binder does.
//wasm tests run in the browser, where timers are available
#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

use frames_and_records::constants::{MaterialConstants, ObjectConstants, PassConstants, StandardSchema, Vertex};
use frames_and_records::frame_loop::FrameLoop;
use frames_and_records::imp::software::{Command, CompletionMode, SoftwareDevice};
use frames_and_records::{Capacities, RecordHandle, RecordKind, RingConfig, Ticket};
use std::time::Duration;
use test_executors::async_test;

const OBJECT_PARAMETER: u32 = 0;
const MATERIAL_PARAMETER: u32 = 1;
const PASS_PARAMETER: u32 = 2;

type Loop = FrameLoop<SoftwareDevice, StandardSchema>;

struct Scene {
    objects: Vec<RecordHandle>,
    materials: Vec<RecordHandle>,
    main_pass: RecordHandle,
    mirrored_pass: RecordHandle,
}

fn scene(frames: &mut Loop, objects: usize) -> Scene {
    let materials: Vec<_> = (0..2)
        .map(|i| {
            frames
                .materials_mut()
                .register(MaterialConstants {
                    roughness: i as f32,
                    ..MaterialConstants::default()
                })
                .unwrap()
        })
        .collect();
    let objects = (0..objects)
        .map(|i| {
            frames
                .objects_mut()
                .register(ObjectConstants {
                    material_index: materials[i % 2].ordinal() as u32,
                    ..ObjectConstants::default()
                })
                .unwrap()
        })
        .collect();
    let main_pass = frames.passes_mut().register(PassConstants::default()).unwrap();
    let mirrored_pass = frames.passes_mut().register(PassConstants::default()).unwrap();
    Scene {
        objects,
        materials,
        main_pass,
        mirrored_pass,
    }
}

/// Records one draw per object under each pass, binding constants by address and the pass by table.
async fn draw(frames: &mut Loop, scene: &Scene) -> Ticket {
    let mut frame = frames.begin_frame().await.unwrap();
    for pass in [scene.main_pass, scene.mirrored_pass] {
        for (i, object) in scene.objects.iter().enumerate() {
            let bindings = frame
                .draw_bindings(*object, scene.materials[i % 2], pass)
                .unwrap();
            let context = frame.context_mut();
            context.record(Command::BindAddress {
                root_parameter: OBJECT_PARAMETER,
                address: bindings.object.address,
            });
            context.record(Command::BindAddress {
                root_parameter: MATERIAL_PARAMETER,
                address: bindings.material.address,
            });
            context.record(Command::BindTable {
                root_parameter: PASS_PARAMETER,
                table_offset: bindings.pass.resolved.table_offset,
            });
            context.record(Command::Draw { index_count: 36 });
        }
    }
    frame.end().unwrap()
}

#[async_test]
async fn recorded_bindings_point_into_the_frame_slot() {
    let device = SoftwareDevice::new(CompletionMode::Immediate);
    let mut frames: Loop = FrameLoop::new(
        device,
        Capacities {
            objects: 4,
            materials: 2,
            passes: 2,
        },
        RingConfig::default(),
    )
    .unwrap();
    let scene = scene(&mut frames, 4);
    let mut last = Ticket::NONE;
    for _ in 0..6 {
        let ticket = draw(&mut frames, &scene).await;
        assert!(ticket > last);
        last = ticket;
    }
    frames.wait_idle().await.unwrap();

    let table = frames.descriptor_table();
    for slot in frames.ring().slots() {
        //two frames per slot
        assert_eq!(slot.context().submitted().len(), 2);
        for commands in slot.context().submitted() {
            assert_eq!(commands.len(), 2 * 4 * 4);
            for command in commands {
                match *command {
                    Command::BindAddress {
                        root_parameter: OBJECT_PARAMETER,
                        address,
                    } => {
                        let base = slot.base_address(RecordKind::Object);
                        assert!(address >= base && address < base + 4 * 256);
                    }
                    Command::BindAddress { address, .. } => {
                        let base = slot.base_address(RecordKind::Material);
                        assert!(address >= base && address < base + 2 * 256);
                    }
                    Command::BindTable { table_offset, .. } => {
                        let entry = table.entry(table_offset).unwrap();
                        assert_eq!(entry.kind, RecordKind::Pass);
                        assert_eq!(entry.slot, slot.index());
                    }
                    Command::Draw { index_count } => assert_eq!(index_count, 36),
                }
            }
        }
    }
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn abandoned_frame_submits_nothing() {
    let device = SoftwareDevice::new(CompletionMode::Immediate);
    let mut frames: Loop = FrameLoop::new(device, Capacities::default(), RingConfig::default()).unwrap();
    {
        let mut frame = test_executors::spin_on(frames.begin_frame()).unwrap();
        frame.context_mut().record(Command::Draw { index_count: 3 });
        //dropped without end
    }
    let frame = test_executors::spin_on(frames.begin_frame()).unwrap();
    assert_eq!(frame.slot_index(), 1);
    assert_eq!(frame.end().unwrap(), Ticket::new(1));
    let first = frames.ring().slot(0).unwrap();
    assert!(first.context().submitted().is_empty());
    assert_eq!(first.completion(), Ticket::NONE);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn resolve_is_stable_within_a_layout() {
    let device = SoftwareDevice::new(CompletionMode::Immediate);
    let mut frames: Loop = FrameLoop::new(
        device,
        Capacities {
            objects: 3,
            materials: 2,
            passes: 2,
        },
        RingConfig::default(),
    )
    .unwrap();
    let scene = scene(&mut frames, 3);
    let mut seen = Vec::new();
    for _ in 0..6 {
        let frame = test_executors::spin_on(frames.begin_frame()).unwrap();
        let resolved = frame.resolve(scene.objects[2]).unwrap();
        assert_eq!(resolved, frame.resolve(scene.objects[2]).unwrap());
        assert_eq!(resolved, frame.resolve_ordinal(RecordKind::Object, 2).unwrap());
        seen.push(resolved);
        frame.end().unwrap();
    }
    //same slot, same answer
    assert_eq!(seen[0], seen[3]);
    assert_eq!(seen[1], seen[4]);
    assert_ne!(seen[0].table_offset, seen[1].table_offset);
}

#[test]
fn rebuild_grows_capacity_and_keeps_records() {
    let device = SoftwareDevice::new(CompletionMode::Latency(Duration::from_millis(1)));
    let mut frames: Loop = FrameLoop::new(
        device,
        Capacities {
            objects: 2,
            materials: 2,
            passes: 2,
        },
        RingConfig::default(),
    )
    .unwrap();
    let mut scene = scene(&mut frames, 2);
    for _ in 0..4 {
        test_executors::sleep_on(draw(&mut frames, &scene));
    }
    let before = frames.fence().last_issued();
    let old_table_len = frames.descriptor_table().len();

    test_executors::sleep_on(frames.rebuild(Capacities {
        objects: 6,
        materials: 2,
        passes: 2,
    }))
    .unwrap();
    assert_eq!(frames.layout_generation(), 1);
    assert_eq!(frames.layout().capacity(RecordKind::Object), 6);
    assert_eq!(frames.descriptor_table().len(), old_table_len + 3 * 4);
    assert_eq!(frames.objects().dirty_count(), 2);

    //old handles survive, new ones fit
    for _ in 0..4 {
        let marker = scene.objects.len() as u32;
        let handle = frames
            .objects_mut()
            .register(ObjectConstants {
                material_index: marker,
                ..ObjectConstants::default()
            })
            .unwrap();
        scene.objects.push(handle);
    }
    let uploads: Vec<usize> = (0..4)
        .map(|_| {
            let frame = test_executors::sleep_on(frames.begin_frame()).unwrap();
            let uploaded = frame.uploaded().objects;
            for handle in &scene.objects {
                let stored = frame.slot().objects().read(handle.ordinal()).unwrap();
                assert_eq!(stored, *frames_payload(&frame, *handle));
            }
            frame.end().unwrap();
            uploaded
        })
        .collect();
    assert_eq!(uploads, vec![6, 6, 6, 0]);
    assert!(frames.fence().last_issued() > before);
}

fn frames_payload<'a>(
    frame: &'a frames_and_records::Frame<'_, SoftwareDevice, StandardSchema>,
    handle: RecordHandle,
) -> &'a ObjectConstants {
    frame.objects().get(handle).unwrap()
}

fn wave(marker: f32, len: usize) -> Vec<Vertex> {
    (0..len)
        .map(|i| Vertex {
            pos: [i as f32, marker, 0.0],
            ..Vertex::default()
        })
        .collect()
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn streams_belong_to_their_slot() {
    let device = SoftwareDevice::new(CompletionMode::Immediate);
    let mut frames: Loop = FrameLoop::new(
        device,
        Capacities::default(),
        RingConfig {
            stream_len: 4,
            ..RingConfig::default()
        },
    )
    .unwrap();
    for marker in 0..3 {
        let mut frame = test_executors::spin_on(frames.begin_frame()).unwrap();
        //streams are not dirty-tracked, so nothing is uploaded on their behalf
        assert_eq!(frame.uploaded().total(), 0);
        frame.stream_mut().write_all(&wave(marker as f32, 4)).unwrap();
        frame.end().unwrap();
    }

    //slot 0 again: it still holds frame 0's data, not the previous frame's
    let mut frame = test_executors::spin_on(frames.begin_frame()).unwrap();
    assert_eq!(frame.slot_index(), 0);
    assert_eq!(frame.stream().read(3).unwrap().pos[1], 0.0);
    frame.stream_mut().write(0, &wave(3.0, 1)[0]).unwrap();
    assert!(frame.stream_mut().write_all(&wave(3.0, 5)).is_err());
    frame.end().unwrap();

    let slots = frames.ring().slots();
    assert_eq!(slots[0].stream().read(0).unwrap().pos[1], 3.0);
    assert_eq!(slots[0].stream().read(1).unwrap().pos[1], 0.0);
    for (index, slot) in slots.iter().enumerate().skip(1) {
        for element in 0..4 {
            let vertex = slot.stream().read(element).unwrap();
            assert_eq!(vertex.pos, [element as f32, index as f32, 0.0]);
        }
    }
    assert_ne!(slots[0].stream().base_address(), slots[1].stream().base_address());
}
