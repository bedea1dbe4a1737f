//! GPU seam of the viewer.
//!
//! The frame orchestrator only talks to [`RenderBackend`]; the wgpu
//! implementation lives in [`native`] and unit tests substitute a recording
//! double.

mod common;
pub mod native;
#[cfg(test)]
pub(crate) mod recording;
mod shared;

use std::fmt;

use glam::{Mat3, Mat4, Vec3};
use thiserror::Error;

use crate::assets::{ModelAssets, SkyboxAssets};
use crate::lights::{LightMaterial, PointLight};
use crate::model::ModelGeometry;
use crate::state::{CullMode, FilteringMode};

pub use native::{ProgramId, WgpuBackend};
pub(crate) use shared::{DEFAULT_CUBE_INDICES, DEFAULT_CUBE_VERTICES};

/// Vertex and fragment WGSL for one shader variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    pub vertex: String,
    pub fragment: String,
}

/// Uniforms written once, right after a variant links.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticUniforms {
    pub model: Mat4,
    pub lights: Vec<LightMaterial>,
    pub shininess: f32,
}

/// Uniforms rewritten for the active variant on every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUniforms {
    pub projection_view: Mat4,
    pub view_position: Vec3,
    pub normal_matrix: Mat3,
    pub light_positions: Vec<Vec3>,
}

/// Pipeline switches that apply to the model draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSettings {
    pub filtering: FilteringMode,
    pub culling: CullMode,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to compile shader `{label}`: {message}")]
    ShaderCompile { label: String, message: String },
    #[error("failed to link shader program `{label}`: {message}")]
    ShaderLink { label: String, message: String },
    #[error("failed to upload {what}: {message}")]
    Upload { what: String, message: String },
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("GPU device error: {0}")]
    Device(String),
}

/// Operations the viewer needs from a GPU.
///
/// Draw calls between [`begin_frame`](Self::begin_frame) and
/// [`end_frame`](Self::end_frame) execute in the order issued.
pub trait RenderBackend {
    type Program: Copy + PartialEq + fmt::Debug;

    fn compile_program(
        &mut self,
        label: &str,
        source: &ProgramSource,
    ) -> Result<Self::Program, RenderError>;

    fn write_static_uniforms(&mut self, program: Self::Program, uniforms: &StaticUniforms);

    fn write_frame_uniforms(&mut self, program: Self::Program, uniforms: &FrameUniforms);

    /// Uploads the sub-meshes and texture maps named by `geometry`, taking
    /// vertex data and decoded images from `assets`.
    fn upload_model(
        &mut self,
        geometry: &ModelGeometry,
        assets: &ModelAssets,
    ) -> Result<(), RenderError>;

    fn upload_skybox(&mut self, assets: &SkyboxAssets) -> Result<(), RenderError>;

    fn begin_frame(&mut self, clear_color: Vec3, antialiasing: bool) -> Result<(), RenderError>;

    fn draw_skybox(&mut self, sky_projection_view: Mat4);

    fn draw_light_marker(&mut self, index: usize, projection_view: Mat4, light: &PointLight);

    fn draw_model(&mut self, program: Self::Program, settings: DrawSettings);

    fn end_frame(&mut self) -> Result<(), RenderError>;
}
