use std::collections::BTreeMap;
use std::fmt;

use glam::{Mat3, Mat4, Quat, Vec3};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::assets::ModelAssets;
use crate::camera::CameraFrame;
use crate::lights::PointLight;
use crate::obj::SubMesh;
use crate::render::{DrawSettings, FrameUniforms, RenderBackend, RenderError};
use crate::shader::ShaderVariant;

/// What a texture map feeds in the lighting equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureRole {
    Diffuse,
    Normal,
    Specular,
}

impl TextureRole {
    pub const ALL: [Self; 3] = [Self::Diffuse, Self::Normal, Self::Specular];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "diffuse" | "albedo" => Some(Self::Diffuse),
            "normal" => Some(Self::Normal),
            "specular" => Some(Self::Specular),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Diffuse => "diffuse",
            Self::Normal => "normal",
            Self::Specular => "specular",
        }
    }

    /// Color stored in non-color maps must not be gamma decoded.
    pub fn is_color(self) -> bool {
        matches!(self, Self::Diffuse)
    }
}

/// Texture map address: role plus the sub-mesh slot it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextureKey {
    pub role: TextureRole,
    pub slot: u8,
}

impl TextureKey {
    pub const fn new(role: TextureRole, slot: u8) -> Self {
        Self { role, slot }
    }
}

impl fmt::Display for TextureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.role.name(), self.slot)
    }
}

/// Placement of the model in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelView {
    scale: Vec3,
    rotation: Quat,
    translation: Vec3,
    transform: Mat4,
    normal_matrix: Mat3,
}

impl Default for ModelView {
    fn default() -> Self {
        Self::new(Vec3::ONE, Quat::IDENTITY, Vec3::ZERO)
    }
}

impl ModelView {
    pub fn new(scale: Vec3, rotation: Quat, translation: Vec3) -> Self {
        let mut view = Self {
            scale,
            rotation,
            translation,
            transform: Mat4::IDENTITY,
            normal_matrix: Mat3::IDENTITY,
        };
        view.set_transformation(scale, rotation, translation);
        view
    }

    /// Replaces the transform and recomputes the normal matrix from it.
    pub fn set_transformation(&mut self, scale: Vec3, rotation: Quat, translation: Vec3) {
        self.scale = scale;
        self.rotation = rotation;
        self.translation = translation;
        self.transform = Mat4::from_scale_rotation_translation(scale, rotation, translation);
        let linear = Mat3::from_mat4(self.transform);
        self.normal_matrix = if linear.determinant().abs() > f32::EPSILON {
            linear.inverse().transpose()
        } else {
            Mat3::IDENTITY
        };
    }

    pub fn transformation(&self) -> Mat4 {
        self.transform
    }

    pub fn normal_matrix(&self) -> Mat3 {
        self.normal_matrix
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }
}

/// Renderable side of the model: sub-meshes and their texture maps.
///
/// The backend binds exactly the sub-meshes and `(role, slot)` keys listed
/// here; roles without a map fall back to the backend's default texel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelGeometry {
    submeshes: Vec<SubMesh>,
    texture_maps: BTreeMap<TextureKey, String>,
}

impl ModelGeometry {
    pub fn new(submeshes: Vec<SubMesh>) -> Self {
        Self {
            submeshes,
            texture_maps: BTreeMap::new(),
        }
    }

    /// Geometry describing everything loaded into `assets`.
    pub fn from_assets(assets: &ModelAssets) -> Self {
        let mut geometry = Self::new(assets.mesh.submeshes.clone());
        for texture in &assets.textures {
            geometry.add_texture_map(texture.key, texture.label.clone());
        }
        geometry
    }

    /// Registers a map under `key`, replacing any earlier map there.
    pub fn add_texture_map(&mut self, key: TextureKey, source: impl Into<String>) {
        self.texture_maps.insert(key, source.into());
    }

    pub fn texture_map(&self, key: TextureKey) -> Option<&str> {
        self.texture_maps.get(&key).map(String::as_str)
    }

    pub fn texture_maps(&self) -> impl Iterator<Item = (TextureKey, &str)> {
        self.texture_maps.iter().map(|(key, source)| (*key, source.as_str()))
    }

    pub fn submeshes(&self) -> &[SubMesh] {
        &self.submeshes
    }

    /// Pairs every registered map with its decoded image from `assets`.
    pub fn resolve_textures<'a>(
        &'a self,
        assets: &'a ModelAssets,
    ) -> Result<Vec<(TextureKey, &'a str, &'a RgbaImage)>, RenderError> {
        self.texture_maps()
            .map(|(key, label)| {
                assets
                    .texture(key)
                    .map(|image| (key, label, image))
                    .ok_or_else(|| RenderError::Upload {
                        what: format!("texture {key}"),
                        message: format!("`{label}` has no decoded image"),
                    })
            })
            .collect()
    }
}

/// The one model managed by the viewer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelInstance {
    pub geometry: ModelGeometry,
    pub view: ModelView,
    pub shininess: f32,
}

impl ModelInstance {
    pub fn new(geometry: ModelGeometry, view: ModelView, shininess: f32) -> Self {
        Self {
            geometry,
            view,
            shininess,
        }
    }
}

/// Builds the per-frame uniform set for the current world state.
pub fn frame_uniforms(
    camera: &CameraFrame,
    lights: &[PointLight],
    model: &ModelInstance,
) -> FrameUniforms {
    FrameUniforms {
        projection_view: camera.projection_view,
        view_position: camera.position,
        normal_matrix: model.view.normal_matrix(),
        light_positions: lights.iter().map(PointLight::position).collect(),
    }
}

/// Pushes the current world state into `program`.
pub fn upload_frame_uniforms<B: RenderBackend>(
    backend: &mut B,
    program: B::Program,
    camera: &CameraFrame,
    lights: &[PointLight],
    model: &ModelInstance,
) {
    let uniforms = frame_uniforms(camera, lights, model);
    backend.write_frame_uniforms(program, &uniforms);
}

/// Draws the model through the active variant.
///
/// Without an active variant nothing is drawn; that is the idle state
/// before the first selection.
pub fn render_model<B: RenderBackend>(
    backend: &mut B,
    active: Option<&ShaderVariant<B::Program>>,
    camera: &CameraFrame,
    lights: &[PointLight],
    model: &ModelInstance,
    settings: DrawSettings,
) {
    let Some(variant) = active else {
        return;
    };
    upload_frame_uniforms(backend, variant.program(), camera, lights, model);
    backend.draw_model(variant.program(), settings);
}
