//! Backend double that records every call for assertions.

use glam::{Mat4, Vec3};

use super::{
    DrawSettings, FrameUniforms, ProgramSource, RenderBackend, RenderError, StaticUniforms,
};
use crate::assets::{ModelAssets, SkyboxAssets};
use crate::lights::PointLight;
use crate::model::{ModelGeometry, TextureKey};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Compile(String),
    StaticUniforms(u32, StaticUniforms),
    FrameUniforms(u32, FrameUniforms),
    UploadModel { submeshes: usize, textures: Vec<TextureKey> },
    UploadSkybox,
    BeginFrame { clear_color: Vec3, antialiasing: bool },
    Skybox(Mat4),
    LightMarker { index: usize, projection_view: Mat4, position: Vec3 },
    DrawModel(u32, DrawSettings),
    EndFrame,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    pub calls: Vec<Call>,
    failing_labels: Vec<String>,
    next_program: u32,
}

impl RecordingBackend {
    /// Backend whose compile step rejects the given labels.
    pub fn failing(labels: &[&str]) -> Self {
        Self {
            failing_labels: labels.iter().map(|label| label.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn frames(&self) -> Vec<&[Call]> {
        let mut frames = Vec::new();
        let mut start = None;
        for (index, call) in self.calls.iter().enumerate() {
            match call {
                Call::BeginFrame { .. } => start = Some(index),
                Call::EndFrame => {
                    if let Some(begin) = start.take() {
                        frames.push(&self.calls[begin..=index]);
                    }
                }
                _ => {}
            }
        }
        frames
    }
}

impl RenderBackend for RecordingBackend {
    type Program = u32;

    fn compile_program(
        &mut self,
        label: &str,
        _source: &ProgramSource,
    ) -> Result<u32, RenderError> {
        if self.failing_labels.iter().any(|failing| failing == label) {
            return Err(RenderError::ShaderCompile {
                label: label.to_string(),
                message: "rejected by test backend".into(),
            });
        }
        self.calls.push(Call::Compile(label.to_string()));
        let program = self.next_program;
        self.next_program += 1;
        Ok(program)
    }

    fn write_static_uniforms(&mut self, program: u32, uniforms: &StaticUniforms) {
        self.calls.push(Call::StaticUniforms(program, uniforms.clone()));
    }

    fn write_frame_uniforms(&mut self, program: u32, uniforms: &FrameUniforms) {
        self.calls.push(Call::FrameUniforms(program, uniforms.clone()));
    }

    fn upload_model(
        &mut self,
        geometry: &ModelGeometry,
        assets: &ModelAssets,
    ) -> Result<(), RenderError> {
        let textures = geometry.resolve_textures(assets)?;
        self.calls.push(Call::UploadModel {
            submeshes: geometry.submeshes().len(),
            textures: textures.into_iter().map(|(key, ..)| key).collect(),
        });
        Ok(())
    }

    fn upload_skybox(&mut self, _assets: &SkyboxAssets) -> Result<(), RenderError> {
        self.calls.push(Call::UploadSkybox);
        Ok(())
    }

    fn begin_frame(&mut self, clear_color: Vec3, antialiasing: bool) -> Result<(), RenderError> {
        self.calls.push(Call::BeginFrame {
            clear_color,
            antialiasing,
        });
        Ok(())
    }

    fn draw_skybox(&mut self, sky_projection_view: Mat4) {
        self.calls.push(Call::Skybox(sky_projection_view));
    }

    fn draw_light_marker(&mut self, index: usize, projection_view: Mat4, light: &PointLight) {
        self.calls.push(Call::LightMarker {
            index,
            projection_view,
            position: light.position(),
        });
    }

    fn draw_model(&mut self, program: u32, settings: DrawSettings) {
        self.calls.push(Call::DrawModel(program, settings));
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.calls.push(Call::EndFrame);
        Ok(())
    }
}
