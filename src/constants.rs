// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Record payloads for a conventional forward renderer.

These are the layouts most shaders expect for per-object, per-material and per-pass
constant buffers.  Applications with their own shader interfaces implement
[RecordSchema](crate::layout::RecordSchema) over their own [CRepr] types instead.

Every field is a 4-byte scalar so the structs have no implicit padding; the explicit
`_pad` fields keep vectors on the 16-byte boundaries HLSL/WGSL packing rules use.
*/

use crate::layout::RecordSchema;
use crate::record_buffer::CRepr;

pub type Float4x4 = [[f32; 4]; 4];

pub const IDENTITY: Float4x4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Per-object constants.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ObjectConstants {
    pub world: Float4x4,
    pub tex_transform: Float4x4,
    /// Ordinal of the material record this object draws with.
    pub material_index: u32,
    pub _pad: [u32; 3],
}

unsafe impl CRepr for ObjectConstants {}

impl Default for ObjectConstants {
    fn default() -> Self {
        ObjectConstants {
            world: IDENTITY,
            tex_transform: IDENTITY,
            material_index: 0,
            _pad: [0; 3],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MaterialConstants {
    pub diffuse_albedo: [f32; 4],
    pub fresnel_r0: [f32; 3],
    pub roughness: f32,
    pub mat_transform: Float4x4,
}

unsafe impl CRepr for MaterialConstants {}

impl Default for MaterialConstants {
    fn default() -> Self {
        MaterialConstants {
            diffuse_albedo: [1.0, 1.0, 1.0, 1.0],
            fresnel_r0: [0.01, 0.01, 0.01],
            roughness: 0.25,
            mat_transform: IDENTITY,
        }
    }
}

/// Lights a [PassConstants] record carries.
pub const MAX_LIGHTS: usize = 16;

/**
One light.  Directional, point and spot lights share the layout; a light ignores the
fields its type has no use for.
*/
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Light {
    pub strength: [f32; 3],
    /// Point and spot.
    pub falloff_start: f32,
    /// Directional and spot.
    pub direction: [f32; 3],
    pub falloff_end: f32,
    pub position: [f32; 3],
    pub spot_power: f32,
}

unsafe impl CRepr for Light {}

impl Default for Light {
    fn default() -> Self {
        Light {
            strength: [0.5, 0.5, 0.5],
            falloff_start: 1.0,
            direction: [0.0, -1.0, 0.0],
            falloff_end: 10.0,
            position: [0.0; 3],
            spot_power: 64.0,
        }
    }
}

/**
Per-pass globals: camera, viewport, timing, lights, a debug color override and fog.

A mirrored (reflection) pass uses a second record of this type with the reflected
view matrices.
*/
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PassConstants {
    pub view: Float4x4,
    pub inv_view: Float4x4,
    pub proj: Float4x4,
    pub inv_proj: Float4x4,
    pub view_proj: Float4x4,
    pub inv_view_proj: Float4x4,
    pub eye_pos_w: [f32; 3],
    pub _pad0: f32,
    pub render_target_size: [f32; 2],
    pub inv_render_target_size: [f32; 2],
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
    pub ambient_light: [f32; 4],
    pub lights: [Light; MAX_LIGHTS],
    /// Replaces shaded color when `use_custom_color` is nonzero.
    pub color: [f32; 4],
    pub use_custom_color: f32,
    pub _pad1: [f32; 3],
    pub fog_color: [f32; 4],
    pub fog_range: f32,
    pub fog_start: f32,
    pub _pad2: [f32; 2],
}

unsafe impl CRepr for PassConstants {}

impl Default for PassConstants {
    fn default() -> Self {
        PassConstants {
            view: IDENTITY,
            inv_view: IDENTITY,
            proj: IDENTITY,
            inv_proj: IDENTITY,
            view_proj: IDENTITY,
            inv_view_proj: IDENTITY,
            eye_pos_w: [0.0; 3],
            _pad0: 0.0,
            render_target_size: [0.0; 2],
            inv_render_target_size: [0.0; 2],
            near_z: 1.0,
            far_z: 1000.0,
            total_time: 0.0,
            delta_time: 0.0,
            ambient_light: [0.0, 0.0, 0.0, 1.0],
            lights: [Light::default(); MAX_LIGHTS],
            color: [1.0; 4],
            use_custom_color: 0.0,
            _pad1: [0.0; 3],
            fog_color: [0.7, 0.7, 0.7, 1.0],
            fog_range: 50.0,
            fog_start: 5.0,
            _pad2: [0.0; 2],
        }
    }
}

/// Element of a CPU-animated vertex stream.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub uv0: [f32; 2],
}

unsafe impl CRepr for Vertex {}

/**
[ObjectConstants], [MaterialConstants] and [PassConstants], each on a constant-buffer
stride, with a [Vertex] stream.
*/
#[derive(Debug, Clone, Copy)]
pub struct StandardSchema;

impl RecordSchema for StandardSchema {
    type Object = ObjectConstants;
    type Material = MaterialConstants;
    type Pass = PassConstants;
    type Stream = Vertex;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Capacities, RecordKind, SceneLayout};

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn sizes_have_no_implicit_padding() {
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 144);
        assert_eq!(std::mem::size_of::<MaterialConstants>(), 96);
        assert_eq!(std::mem::size_of::<Light>(), 48);
        assert_eq!(std::mem::size_of::<PassConstants>(), 1280);
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn standard_strides() {
        let layout = SceneLayout::new::<StandardSchema>(3, Capacities::default(), 256).unwrap();
        assert_eq!(layout.stride(RecordKind::Object), 256);
        assert_eq!(layout.stride(RecordKind::Material), 256);
        assert_eq!(layout.stride(RecordKind::Pass), 1280);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn pass_fields_sit_on_shader_offsets() {
        use std::mem::offset_of;
        assert_eq!(offset_of!(PassConstants, ambient_light), 432);
        assert_eq!(offset_of!(PassConstants, lights), 448);
        assert_eq!(offset_of!(PassConstants, color), 448 + 48 * MAX_LIGHTS);
        assert_eq!(offset_of!(PassConstants, fog_color), 1248);
        assert_eq!(offset_of!(PassConstants, fog_range), 1264);
    }
}
