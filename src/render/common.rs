use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

use super::{FrameUniforms, StaticUniforms};
use crate::lights::{LightMaterial, MAX_POINT_LIGHTS};

/// `@group(0) @binding(0)` of every shader variant.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct FrameUniform {
    pub projection_view: [[f32; 4]; 4],
    pub view_position: [f32; 4],
    pub normal_matrix: [[f32; 4]; 3],
    pub light_positions: [[f32; 4]; MAX_POINT_LIGHTS],
}

impl From<&FrameUniforms> for FrameUniform {
    fn from(uniforms: &FrameUniforms) -> Self {
        let mut light_positions = [[0.0; 4]; MAX_POINT_LIGHTS];
        for (slot, position) in light_positions
            .iter_mut()
            .zip(&uniforms.light_positions)
        {
            *slot = position.extend(1.0).into();
        }
        Self {
            projection_view: uniforms.projection_view.to_cols_array_2d(),
            view_position: uniforms.view_position.extend(1.0).into(),
            normal_matrix: mat3_to_3x4(uniforms.normal_matrix),
            light_positions,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct LightUniform {
    pub color: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// constant, linear, quadratic, unused
    pub attenuation: [f32; 4],
}

impl From<&LightMaterial> for LightUniform {
    fn from(material: &LightMaterial) -> Self {
        let attenuation = material.attenuation;
        Self {
            color: vec4(material.color),
            ambient: vec4(material.ambient),
            diffuse: vec4(material.diffuse),
            specular: vec4(material.specular),
            attenuation: [
                attenuation.constant,
                attenuation.linear,
                attenuation.quadratic,
                0.0,
            ],
        }
    }
}

/// `@group(1) @binding(0)` of every shader variant.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct StaticUniform {
    pub model: [[f32; 4]; 4],
    /// x: shininess, y: light count
    pub params: [f32; 4],
    pub lights: [LightUniform; MAX_POINT_LIGHTS],
}

impl From<&StaticUniforms> for StaticUniform {
    fn from(uniforms: &StaticUniforms) -> Self {
        let mut lights = [LightUniform::zeroed(); MAX_POINT_LIGHTS];
        for (slot, material) in lights.iter_mut().zip(&uniforms.lights) {
            *slot = LightUniform::from(material);
        }
        let count = uniforms.lights.len().min(MAX_POINT_LIGHTS);
        Self {
            model: uniforms.model.to_cols_array_2d(),
            params: [uniforms.shininess, count as f32, 0.0, 0.0],
            lights,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct MarkerUniform {
    pub mvp: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl MarkerUniform {
    pub fn new(mvp: Mat4, color: Vec3) -> Self {
        Self {
            mvp: mvp.to_cols_array_2d(),
            color: vec4(color),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct SkyUniform {
    pub view_proj: [[f32; 4]; 4],
    pub scale: [f32; 4],
}

impl SkyUniform {
    pub fn new(view_proj: Mat4, scale: f32) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            scale: [scale, 0.0, 0.0, 0.0],
        }
    }
}

fn vec4(value: Vec3) -> [f32; 4] {
    value.extend(1.0).into()
}

pub(crate) fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use super::*;
    use crate::lights::Attenuation;

    #[test]
    fn layouts_match_wgsl_sizes() {
        assert_eq!(size_of::<FrameUniform>(), 192);
        assert_eq!(size_of::<LightUniform>(), 80);
        assert_eq!(size_of::<StaticUniform>(), 400);
        assert_eq!(size_of::<MarkerUniform>(), 80);
        assert_eq!(size_of::<SkyUniform>(), 80);
    }

    #[test]
    fn unused_light_slots_stay_zeroed() {
        let uniforms = StaticUniforms {
            model: Mat4::IDENTITY,
            lights: vec![LightMaterial {
                attenuation: Attenuation {
                    constant: 1.0,
                    linear: 0.5,
                    quadratic: 0.25,
                },
                ..LightMaterial::default()
            }],
            shininess: 32.0,
        };
        let gpu = StaticUniform::from(&uniforms);
        assert_eq!(gpu.params, [32.0, 1.0, 0.0, 0.0]);
        assert_eq!(gpu.lights[0].attenuation, [1.0, 0.5, 0.25, 0.0]);
        assert_eq!(gpu.lights[1].color, [0.0; 4]);
    }

    #[test]
    fn frame_uniform_pads_light_positions() {
        let uniforms = FrameUniforms {
            projection_view: Mat4::IDENTITY,
            view_position: Vec3::new(0.0, 1.0, 2.0),
            normal_matrix: Mat3::IDENTITY,
            light_positions: vec![Vec3::X, Vec3::Y],
        };
        let gpu = FrameUniform::from(&uniforms);
        assert_eq!(gpu.view_position, [0.0, 1.0, 2.0, 1.0]);
        assert_eq!(gpu.light_positions[1], [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(gpu.light_positions[2], [0.0; 4]);
        assert_eq!(gpu.normal_matrix[2], [0.0, 0.0, 1.0, 0.0]);
    }
}
