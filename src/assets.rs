use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use image::RgbaImage;
use log::info;

use crate::config::{ModelConfig, ShaderSlotConfig, SkyboxConfig, ViewerConfig};
use crate::model::TextureKey;
use crate::obj::{load_obj_from_str, ObjMesh, SubMesh};
use crate::render::ProgramSource;

/// Decoded texture map ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub key: TextureKey,
    pub label: String,
    pub image: RgbaImage,
}

/// CPU side data of the model: mesh plus decoded texture maps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelAssets {
    pub mesh: ObjMesh,
    pub textures: Vec<TextureImage>,
}

impl ModelAssets {
    pub fn texture(&self, key: TextureKey) -> Option<&RgbaImage> {
        self.textures
            .iter()
            .find(|texture| texture.key == key)
            .map(|texture| &texture.image)
    }
}

/// Six square faces in right, left, up, down, back, front order.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyboxAssets {
    pub faces: Vec<RgbaImage>,
    pub scale: f32,
}

impl SkyboxAssets {
    pub fn face_size(&self) -> u32 {
        self.faces.first().map(RgbaImage::width).unwrap_or(0)
    }
}

/// Compiled-program input for one populated shader slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSlot {
    /// Zero based.
    pub slot: usize,
    pub label: String,
    pub source: ProgramSource,
}

/// Everything read from disk before the viewer starts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneAssets {
    pub model: ModelAssets,
    pub programs: Vec<ProgramSlot>,
    /// Present only when a skybox is configured and enabled.
    pub skybox: Option<SkyboxAssets>,
}

impl SceneAssets {
    pub fn load(config: &ViewerConfig) -> Result<Self> {
        let model = load_model_assets(&config.model)?;
        let programs = config
            .shaders
            .variants
            .iter()
            .map(|variant| {
                Ok(ProgramSlot {
                    slot: variant.slot,
                    label: variant.label.clone(),
                    source: load_program_source(variant)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let skybox = match &config.skybox {
            Some(skybox) if skybox.enabled => {
                Some(load_skybox_assets(skybox).context("failed to load skybox")?)
            }
            Some(_) => {
                info!("Skybox disabled in config");
                None
            }
            None => None,
        };
        Ok(Self {
            model,
            programs,
            skybox,
        })
    }
}

/// Loads the configured mesh (or the built-in cube) and every texture map.
///
/// Any configured asset that cannot be read is an error.
pub fn load_model_assets(config: &ModelConfig) -> Result<ModelAssets> {
    let mesh = match &config.mesh {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("unable to read mesh {}", path.display()))?;
            load_obj_from_str(&contents)
                .with_context(|| format!("failed to parse OBJ mesh {}", path.display()))?
        }
        None => default_cube(),
    };

    let mut textures = Vec::with_capacity(config.textures.len());
    for texture in &config.textures {
        let image = load_image(&texture.path)
            .with_context(|| format!("failed to load {} texture", texture.key))?;
        textures.push(TextureImage {
            key: texture.key,
            label: texture.path.display().to_string(),
            image,
        });
    }
    info!(
        "Loaded model: {} vertices, {} sub-meshes, {} texture maps",
        mesh.vertex_count(),
        mesh.submeshes.len(),
        textures.len()
    );
    Ok(ModelAssets { mesh, textures })
}

pub fn load_skybox_assets(config: &SkyboxConfig) -> Result<SkyboxAssets> {
    let faces = config
        .faces
        .iter()
        .map(|path| load_image(path))
        .collect::<Result<Vec<_>>>()?;
    if faces.len() != 6 {
        bail!("skybox needs 6 faces, got {}", faces.len());
    }
    let size = faces[0].width();
    if let Some(face) = faces
        .iter()
        .find(|face| face.width() != size || face.height() != size)
    {
        bail!(
            "skybox faces must be square and equally sized ({size}x{size} vs {}x{})",
            face.width(),
            face.height()
        );
    }
    Ok(SkyboxAssets {
        faces,
        scale: config.scale,
    })
}

pub fn load_program_source(slot: &ShaderSlotConfig) -> Result<ProgramSource> {
    let read = |path: &Path| {
        fs::read_to_string(path)
            .with_context(|| format!("unable to read shader source {}", path.display()))
    };
    Ok(ProgramSource {
        vertex: read(&slot.vertex)?,
        fragment: read(&slot.fragment)?,
    })
}

fn load_image(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path).map_err(|err| anyhow!("{}: {err}", path.display()))?;
    Ok(image.to_rgba8())
}

/// Unit cube used when no mesh is configured; one sub-mesh in slot 0.
pub fn default_cube() -> ObjMesh {
    use crate::render::{DEFAULT_CUBE_INDICES, DEFAULT_CUBE_VERTICES};

    const CORNER_UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
    let vertices = DEFAULT_CUBE_VERTICES
        .chunks_exact(6)
        .enumerate()
        .flat_map(|(index, chunk)| {
            let uv = CORNER_UVS[index % 4];
            chunk.iter().copied().chain(uv)
        })
        .collect();
    ObjMesh {
        vertices,
        indices: DEFAULT_CUBE_INDICES.to_vec(),
        submeshes: vec![SubMesh {
            first_index: 0,
            index_count: DEFAULT_CUBE_INDICES.len() as u32,
            slot: 0,
        }],
    }
}
