//! Per-frame orchestration for a single-scene 3D model viewer.
//!
//! A textured model is lit by orbiting point lights and drawn through one of
//! up to four interchangeable shader variants. Everything above the GPU is
//! plain data driven through the [`RenderBackend`] trait, so the frame loop
//! can be exercised without a window.

pub mod app;
pub mod assets;
pub mod camera;
pub mod config;
pub mod frame;
pub mod input;
pub mod lights;
pub mod model;
pub mod obj;
pub mod render;
pub mod router;
pub mod shader;
pub mod state;

pub use assets::{ModelAssets, ProgramSlot, SceneAssets, SkyboxAssets, TextureImage};
pub use camera::{CameraFrame, CameraRig, CameraSettings, OrbitCamera};
pub use config::ViewerConfig;
pub use frame::Viewer;
pub use input::{KeyAction, KeyBindings, KeyCode, NamedKey, ViewerEvent};
pub use lights::{LightMaterial, LightRig, PointLight};
pub use model::{ModelGeometry, ModelInstance, ModelView, TextureKey, TextureRole};
pub use obj::{load_obj_from_str, ObjMesh, SubMesh};
pub use render::{RenderBackend, RenderError, WgpuBackend};
pub use router::{Command, InputRouter};
pub use shader::{ShaderVariant, ShaderVariantRegistry};
pub use state::{ActiveRenderState, CullMode, FilteringMode};
