use anyhow::{Context, Result};
use glam::Vec3;
use log::{debug, info};

use crate::assets::SceneAssets;
use crate::camera::{CameraRig, OrbitCamera};
use crate::config::ViewerConfig;
use crate::input::{KeyBindings, ViewerEvent};
use crate::lights::LightRig;
use crate::model::{render_model, ModelGeometry, ModelInstance};
use crate::render::{DrawSettings, RenderBackend, RenderError, StaticUniforms};
use crate::router::{Command, InputRouter, RouteTargets};
use crate::shader::ShaderVariantRegistry;
use crate::state::ActiveRenderState;

/// Owns the world state and drives one backend, one tick at a time.
pub struct Viewer<B: RenderBackend, C = OrbitCamera> {
    backend: B,
    camera: C,
    lights: LightRig,
    shaders: ShaderVariantRegistry<B::Program>,
    state: ActiveRenderState,
    model: ModelInstance,
    router: InputRouter,
    clear_color: Vec3,
    skybox_enabled: bool,
    close_requested: bool,
    frames: u64,
}

impl<B: RenderBackend> Viewer<B, OrbitCamera> {
    /// Builds the viewer with an orbit camera sized to the configured window.
    pub fn from_config(config: &ViewerConfig, assets: SceneAssets, backend: B) -> Result<Self> {
        let camera = OrbitCamera::new(config.camera, config.window.aspect());
        Self::new(config, assets, backend, camera)
    }
}

impl<B: RenderBackend, C: CameraRig> Viewer<B, C> {
    /// Uploads the model, loads every shader slot and the optional skybox.
    ///
    /// Any upload or shader failure is fatal.
    pub fn new(
        config: &ViewerConfig,
        assets: SceneAssets,
        mut backend: B,
        camera: C,
    ) -> Result<Self> {
        let lights = config.lights.build_rig();

        let model = ModelInstance::new(
            ModelGeometry::from_assets(&assets.model),
            config.model.model_view(),
            config.model.shininess,
        );
        backend
            .upload_model(&model.geometry, &assets.model)
            .context("failed to upload model")?;

        let static_uniforms = StaticUniforms {
            model: model.view.transformation(),
            lights: lights.lights().iter().map(|light| light.material).collect(),
            shininess: model.shininess,
        };
        let mut shaders = ShaderVariantRegistry::new();
        for program in &assets.programs {
            shaders
                .load(
                    &mut backend,
                    program.slot,
                    &program.label,
                    &program.source,
                    static_uniforms.clone(),
                )
                .with_context(|| format!("failed to load shader variant `{}`", program.label))?;
        }
        let activated = config
            .shaders
            .initial_slot()
            .is_some_and(|slot| shaders.set_active(slot));
        if !activated {
            info!("No shader variant active; the model stays hidden until one is selected");
        }

        let skybox_enabled = match &assets.skybox {
            Some(skybox) => {
                backend
                    .upload_skybox(skybox)
                    .context("failed to upload skybox")?;
                true
            }
            None => false,
        };

        Ok(Self {
            backend,
            camera,
            lights,
            shaders,
            state: ActiveRenderState {
                filtering: config.model.filtering,
                culling: config.window.cull,
                antialiasing: config.window.antialiasing,
            },
            model,
            router: InputRouter::new(KeyBindings::with_overrides(&config.bindings)),
            clear_color: config.window.clear_color,
            skybox_enabled,
            close_requested: false,
            frames: 0,
        })
    }

    /// Routes one input event into the render state, shader registry or camera.
    pub fn handle_event(&mut self, event: &ViewerEvent) -> Option<Command> {
        self.router.handle(
            event,
            RouteTargets {
                state: &mut self.state,
                shaders: &mut self.shaders,
                camera: &mut self.camera,
                close_requested: &mut self.close_requested,
            },
        )
    }

    /// Advances the lights by `delta` seconds and renders one frame.
    ///
    /// Does nothing once a close was requested.
    pub fn tick(&mut self, delta: f32) -> Result<(), RenderError> {
        if self.close_requested {
            debug!("Skipping tick after close request");
            return Ok(());
        }
        self.lights.advance(delta);
        let camera = self.camera.capture();

        self.backend
            .begin_frame(self.clear_color, self.state.antialiasing)?;
        if self.skybox_enabled {
            self.backend.draw_skybox(camera.sky_projection_view());
        }
        for (index, light) in self.lights.lights().iter().enumerate() {
            self.backend
                .draw_light_marker(index, camera.projection_view, light);
        }
        render_model(
            &mut self.backend,
            self.shaders.active(),
            &camera,
            self.lights.lights(),
            &self.model,
            DrawSettings {
                filtering: self.state.filtering,
                culling: self.state.culling,
            },
        );
        self.backend.end_frame()?;
        self.frames += 1;
        Ok(())
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn lights(&self) -> &LightRig {
        &self.lights
    }

    pub fn shaders(&self) -> &ShaderVariantRegistry<B::Program> {
        &self.shaders
    }

    pub fn state(&self) -> &ActiveRenderState {
        &self.state
    }

    pub fn model(&self) -> &ModelInstance {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use image::RgbaImage;

    use super::*;
    use crate::assets::{default_cube, ModelAssets, ProgramSlot, SkyboxAssets, TextureImage};
    use crate::config::{LightsConfig, ShaderSlotConfig, ShadersConfig};
    use crate::input::{KeyCode, NamedKey};
    use crate::model::{TextureKey, TextureRole};
    use crate::render::recording::{Call, RecordingBackend};
    use crate::render::ProgramSource;
    use crate::state::{CullMode, FilteringMode};

    fn program(slot: usize, label: &str) -> ProgramSlot {
        ProgramSlot {
            slot,
            label: label.to_string(),
            source: ProgramSource {
                vertex: String::new(),
                fragment: String::new(),
            },
        }
    }

    fn config_with_slots(slots: &[usize], active: Option<usize>) -> ViewerConfig {
        let variants = slots
            .iter()
            .map(|slot| ShaderSlotConfig {
                slot: *slot,
                label: format!("variant{slot}"),
                vertex: "unused.vert".into(),
                fragment: "unused.frag".into(),
            })
            .collect();
        ViewerConfig {
            shaders: ShadersConfig { active, variants },
            ..ViewerConfig::default()
        }
    }

    fn assets_with_slots(slots: &[usize]) -> SceneAssets {
        SceneAssets {
            model: ModelAssets {
                mesh: default_cube(),
                textures: Vec::new(),
            },
            programs: slots
                .iter()
                .map(|slot| program(*slot, &format!("variant{slot}")))
                .collect(),
            skybox: None,
        }
    }

    fn viewer(slots: &[usize], active: Option<usize>) -> Viewer<RecordingBackend> {
        Viewer::from_config(
            &config_with_slots(slots, active),
            assets_with_slots(slots),
            RecordingBackend::default(),
        )
        .unwrap()
    }

    fn press(viewer: &mut Viewer<RecordingBackend>, name: &str) {
        viewer.handle_event(&ViewerEvent::KeyPressed(KeyCode::from_name(name).unwrap()));
    }

    #[test]
    fn startup_uploads_model_then_shaders_with_static_uniforms() {
        let viewer = viewer(&[0, 2], None);
        let calls = &viewer.backend().calls;
        assert_eq!(
            calls[0],
            Call::UploadModel {
                submeshes: 1,
                textures: Vec::new()
            }
        );
        assert_eq!(calls[1], Call::Compile("variant0".into()));
        assert!(matches!(&calls[2], Call::StaticUniforms(0, uniforms) if uniforms.lights.len() == 2));
        assert_eq!(calls[3], Call::Compile("variant2".into()));
        assert_eq!(viewer.shaders().active_slot(), Some(0));
    }

    #[test]
    fn upload_binds_the_geometry_texture_maps() {
        let mut assets = assets_with_slots(&[0]);
        let key = TextureKey::new(TextureRole::Specular, 0);
        assets.model.textures.push(TextureImage {
            key,
            label: "cube_spec.png".into(),
            image: RgbaImage::new(4, 4),
        });
        let viewer = Viewer::from_config(
            &config_with_slots(&[0], None),
            assets,
            RecordingBackend::default(),
        )
        .unwrap();
        assert_eq!(
            viewer.backend().calls[0],
            Call::UploadModel {
                submeshes: 1,
                textures: vec![key]
            }
        );
        assert_eq!(viewer.model().geometry.texture_map(key), Some("cube_spec.png"));
    }

    #[test]
    fn configured_active_slot_wins() {
        let viewer = viewer(&[0, 1], Some(1));
        assert_eq!(viewer.shaders().active_slot(), Some(1));
    }

    #[test]
    fn compile_failure_is_fatal() {
        let result = Viewer::from_config(
            &config_with_slots(&[0, 1], None),
            assets_with_slots(&[0, 1]),
            RecordingBackend::failing(&["variant1"]),
        );
        let err = result.err().unwrap();
        assert!(format!("{err:#}").contains("variant1"));
    }

    #[test]
    fn tick_follows_frame_order() {
        let mut viewer = viewer(&[0], None);
        viewer.tick(0.016).unwrap();
        let frames = viewer.backend().frames();
        assert_eq!(frames.len(), 1);
        let frame = frames[0];
        assert!(matches!(frame[0], Call::BeginFrame { antialiasing: true, .. }));
        assert!(matches!(frame[1], Call::LightMarker { index: 0, .. }));
        assert!(matches!(frame[2], Call::LightMarker { index: 1, .. }));
        assert!(matches!(frame[3], Call::FrameUniforms(0, _)));
        assert!(matches!(frame[4], Call::DrawModel(0, _)));
        assert_eq!(frame[5], Call::EndFrame);
        assert_eq!(viewer.frames_rendered(), 1);
    }

    #[test]
    fn lights_advance_before_drawing() {
        let mut viewer = viewer(&[0], None);
        let before = viewer.lights().positions();
        viewer.tick(0.5).unwrap();
        let after = viewer.lights().positions();
        assert_ne!(before, after);

        let frame = viewer.backend().frames()[0];
        let Call::LightMarker { position, .. } = frame[1] else {
            panic!("expected a light marker, got {:?}", frame[1]);
        };
        assert_eq!(position, after[0]);
        let Call::FrameUniforms(_, uniforms) = &frame[3] else {
            panic!("expected frame uniforms, got {:?}", frame[3]);
        };
        assert_eq!(uniforms.light_positions, after);
    }

    #[test]
    fn one_camera_snapshot_per_frame() {
        let mut viewer = viewer(&[0], None);
        viewer.handle_event(&ViewerEvent::PointerMoved(Vec2::ZERO));
        viewer.handle_event(&ViewerEvent::PointerMoved(Vec2::new(30.0, -12.0)));
        viewer.tick(0.016).unwrap();

        let expected = viewer.camera().capture();
        let frame = viewer.backend().frames()[0];
        for call in frame {
            match call {
                Call::LightMarker {
                    projection_view, ..
                } => assert_eq!(*projection_view, expected.projection_view),
                Call::FrameUniforms(_, uniforms) => {
                    assert_eq!(uniforms.projection_view, expected.projection_view);
                    assert_eq!(uniforms.view_position, expected.position);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn no_active_variant_still_clears_and_presents() {
        let mut viewer = viewer(&[], None);
        viewer.tick(0.016).unwrap();
        let frame = viewer.backend().frames()[0];
        assert!(!frame
            .iter()
            .any(|call| matches!(call, Call::DrawModel(..) | Call::FrameUniforms(..))));
        assert_eq!(frame.last(), Some(&Call::EndFrame));
    }

    #[test]
    fn zero_lights_still_draw_the_model() {
        let config = ViewerConfig {
            lights: LightsConfig {
                lights: Vec::new(),
                ..LightsConfig::default()
            },
            ..config_with_slots(&[0], None)
        };
        let mut viewer =
            Viewer::from_config(&config, assets_with_slots(&[0]), RecordingBackend::default())
                .unwrap();
        viewer.tick(0.016).unwrap();

        let frame = viewer.backend().frames()[0];
        assert!(!frame
            .iter()
            .any(|call| matches!(call, Call::LightMarker { .. })));
        let uniforms: Vec<_> = frame
            .iter()
            .filter_map(|call| match call {
                Call::FrameUniforms(_, uniforms) => Some(uniforms),
                _ => None,
            })
            .collect();
        assert_eq!(uniforms.len(), 1);
        assert!(uniforms[0].light_positions.is_empty());
        let draws = frame
            .iter()
            .filter(|call| matches!(call, Call::DrawModel(0, _)))
            .count();
        assert_eq!(draws, 1);
    }

    #[test]
    fn render_state_reaches_the_draw() {
        let mut viewer = viewer(&[0, 1], None);
        press(&mut viewer, "2");
        press(&mut viewer, "Q");
        press(&mut viewer, "A");
        press(&mut viewer, "Z");
        viewer.tick(0.016).unwrap();
        let frame = viewer.backend().frames()[0];
        assert!(matches!(frame[0], Call::BeginFrame { antialiasing: false, .. }));
        assert!(frame.contains(&Call::DrawModel(
            1,
            DrawSettings {
                filtering: FilteringMode::Point,
                culling: CullMode::Back,
            }
        )));
    }

    #[test]
    fn skybox_draws_first_when_enabled() {
        let mut assets = assets_with_slots(&[0]);
        assets.skybox = Some(SkyboxAssets {
            faces: vec![RgbaImage::new(2, 2); 6],
            scale: 40.0,
        });
        let mut viewer = Viewer::from_config(
            &config_with_slots(&[0], None),
            assets,
            RecordingBackend::default(),
        )
        .unwrap();
        assert!(viewer.backend().calls.contains(&Call::UploadSkybox));
        viewer.tick(0.016).unwrap();
        let frame = viewer.backend().frames()[0];
        let expected = viewer.camera().capture().sky_projection_view();
        assert_eq!(frame[1], Call::Skybox(expected));
        assert!(matches!(frame[2], Call::LightMarker { .. }));
    }

    #[test]
    fn close_stops_further_ticks() {
        let mut viewer = viewer(&[0], None);
        viewer.tick(0.016).unwrap();
        viewer.handle_event(&ViewerEvent::KeyPressed(KeyCode::Named(NamedKey::Escape)));
        assert!(viewer.close_requested());
        viewer.tick(0.016).unwrap();
        assert_eq!(viewer.backend().frames().len(), 1);
        assert_eq!(viewer.frames_rendered(), 1);
    }

    #[test]
    fn zero_delta_keeps_lights_still() {
        let mut viewer = viewer(&[0], None);
        let before = viewer.lights().positions();
        viewer.tick(0.0).unwrap();
        viewer.tick(-1.0).unwrap();
        assert_eq!(viewer.lights().positions(), before);
        assert_eq!(viewer.frames_rendered(), 2);
    }
}
