use glam::Vec2;
use log::{debug, info};

use crate::camera::CameraRig;
use crate::input::{KeyAction, KeyBindings, ViewerEvent};
use crate::shader::ShaderVariantRegistry;
use crate::state::ActiveRenderState;

/// Effect of one routed event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Key(KeyAction),
    Orbit { dx: f32, dy: f32 },
    Zoom(f32),
}

/// Everything an input event may mutate.
pub struct RouteTargets<'a, P, C> {
    pub state: &'a mut ActiveRenderState,
    pub shaders: &'a mut ShaderVariantRegistry<P>,
    pub camera: &'a mut C,
    pub close_requested: &'a mut bool,
}

/// Maps input events onto state transitions, synchronously.
#[derive(Debug, Clone, Default)]
pub struct InputRouter {
    bindings: KeyBindings,
    last_cursor: Option<Vec2>,
}

impl InputRouter {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            last_cursor: None,
        }
    }

    /// Translates an event without applying it.
    ///
    /// Pointer moves are turned into deltas against the previous position
    /// with y flipped to point up; the first move only records a baseline.
    /// Relative deltas from a locked cursor need no baseline.
    pub fn translate(&mut self, event: &ViewerEvent) -> Option<Command> {
        match *event {
            ViewerEvent::KeyPressed(key) => self.bindings.lookup(key).map(Command::Key),
            ViewerEvent::PointerMoved(position) => {
                let previous = self.last_cursor.replace(position)?;
                let dx = position.x - previous.x;
                let dy = previous.y - position.y;
                (dx != 0.0 || dy != 0.0).then_some(Command::Orbit { dx, dy })
            }
            ViewerEvent::PointerDelta(delta) => {
                let (dx, dy) = (delta.x, -delta.y);
                (delta.is_finite() && (dx != 0.0 || dy != 0.0))
                    .then_some(Command::Orbit { dx, dy })
            }
            ViewerEvent::Scroll(offset) => {
                (offset != 0.0 && offset.is_finite()).then_some(Command::Zoom(offset))
            }
        }
    }

    /// Routes `event` and applies its effect. Returns the applied command.
    ///
    /// Unbound keys and selections of empty shader slots change nothing.
    pub fn handle<P, C>(
        &mut self,
        event: &ViewerEvent,
        targets: RouteTargets<'_, P, C>,
    ) -> Option<Command>
    where
        P: Copy,
        C: CameraRig,
    {
        let Some(command) = self.translate(event) else {
            if let ViewerEvent::KeyPressed(key) = event {
                debug!("Ignoring unbound key {key:?}");
            }
            return None;
        };
        match command {
            Command::Key(action) => {
                if !apply_action(action, targets) {
                    return None;
                }
            }
            Command::Orbit { dx, dy } => targets.camera.rotate(dx, dy),
            Command::Zoom(offset) => targets.camera.zoom(offset),
        }
        Some(command)
    }
}

fn apply_action<P: Copy, C>(action: KeyAction, targets: RouteTargets<'_, P, C>) -> bool {
    match action {
        KeyAction::Close => {
            info!("Close requested");
            *targets.close_requested = true;
        }
        KeyAction::SelectVariant(slot) => {
            if !targets.shaders.set_active(slot) {
                return false;
            }
            if let Some(variant) = targets.shaders.active() {
                info!("Shader variant {} (`{}`) active", slot + 1, variant.label());
            }
        }
        KeyAction::SetFiltering(mode) => {
            info!("Texture filtering: {}", mode.name());
            targets.state.set_filtering(mode);
        }
        KeyAction::SetCulling(mode) => {
            info!("Face culling: {}", mode.name());
            targets.state.set_culling(mode);
        }
        KeyAction::SetAntialiasing(enabled) => {
            info!("Antialiasing: {}", if enabled { "on" } else { "off" });
            targets.state.set_antialiasing(enabled);
        }
        KeyAction::ToggleAntialiasing => {
            targets.state.toggle_antialiasing();
            info!(
                "Antialiasing: {}",
                if targets.state.antialiasing { "on" } else { "off" }
            );
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;
    use crate::camera::{CameraSettings, OrbitCamera};
    use crate::input::{KeyCode, NamedKey};
    use crate::render::recording::RecordingBackend;
    use crate::render::{ProgramSource, StaticUniforms};
    use crate::state::{CullMode, FilteringMode};

    struct Fixture {
        router: InputRouter,
        state: ActiveRenderState,
        shaders: ShaderVariantRegistry<u32>,
        camera: OrbitCamera,
        close: bool,
    }

    impl Fixture {
        fn with_slots(slots: &[usize]) -> Self {
            let mut backend = RecordingBackend::default();
            let mut shaders = ShaderVariantRegistry::new();
            let source = ProgramSource {
                vertex: String::new(),
                fragment: String::new(),
            };
            for slot in slots {
                let uniforms = StaticUniforms {
                    model: Mat4::IDENTITY,
                    lights: Vec::new(),
                    shininess: 32.0,
                };
                shaders
                    .load(&mut backend, *slot, "variant", &source, uniforms)
                    .unwrap();
            }
            Self {
                router: InputRouter::default(),
                state: ActiveRenderState::default(),
                shaders,
                camera: OrbitCamera::new(CameraSettings::default(), 1.0),
                close: false,
            }
        }

        fn send(&mut self, event: ViewerEvent) -> Option<Command> {
            self.router.handle(
                &event,
                RouteTargets {
                    state: &mut self.state,
                    shaders: &mut self.shaders,
                    camera: &mut self.camera,
                    close_requested: &mut self.close,
                },
            )
        }

        fn press(&mut self, name: &str) -> Option<Command> {
            self.send(ViewerEvent::KeyPressed(KeyCode::from_name(name).unwrap()))
        }
    }

    #[test]
    fn out_of_range_selection_keeps_previous_variant() {
        let mut fixture = Fixture::with_slots(&[0, 1]);
        assert!(fixture.press("2").is_some());
        assert!(fixture.press("5").is_none());
        assert_eq!(fixture.shaders.active_slot(), Some(1));
    }

    #[test]
    fn unpopulated_slots_are_ignored() {
        let mut fixture = Fixture::with_slots(&[0]);
        fixture.press("1");
        for key in ["2", "3", "4"] {
            assert!(fixture.press(key).is_none());
            assert_eq!(fixture.shaders.active_slot(), Some(0));
        }
    }

    #[test]
    fn escape_requests_close() {
        let mut fixture = Fixture::with_slots(&[]);
        assert!(!fixture.close);
        fixture.send(ViewerEvent::KeyPressed(KeyCode::Named(NamedKey::Escape)));
        assert!(fixture.close);
    }

    #[test]
    fn mode_keys_update_render_state() {
        let mut fixture = Fixture::with_slots(&[]);
        for (key, mode) in [
            ("Q", FilteringMode::Point),
            ("W", FilteringMode::Bilinear),
            ("E", FilteringMode::Trilinear),
            ("R", FilteringMode::Anisotropic),
        ] {
            fixture.press(key);
            assert_eq!(fixture.state.filtering, mode);
        }
        fixture.press("A");
        assert_eq!(fixture.state.culling, CullMode::Back);
        fixture.press("S");
        assert_eq!(fixture.state.culling, CullMode::Disabled);
        fixture.press("Z");
        assert!(!fixture.state.antialiasing);
        fixture.press("X");
        assert!(fixture.state.antialiasing);
        fixture.press("M");
        fixture.press("M");
        assert!(fixture.state.antialiasing);
    }

    #[test]
    fn unknown_keys_change_nothing() {
        let mut fixture = Fixture::with_slots(&[0]);
        fixture.press("1");
        let before = (fixture.state, fixture.shaders.active_slot(), fixture.camera.clone());
        assert!(fixture.press("P").is_none());
        assert!(fixture.press("F5").is_none());
        assert_eq!(
            before,
            (fixture.state, fixture.shaders.active_slot(), fixture.camera.clone())
        );
    }

    #[test]
    fn pointer_deltas_invert_y() {
        let mut router = InputRouter::default();
        assert_eq!(
            router.translate(&ViewerEvent::PointerMoved(Vec2::new(100.0, 100.0))),
            None
        );
        assert_eq!(
            router.translate(&ViewerEvent::PointerMoved(Vec2::new(110.0, 90.0))),
            Some(Command::Orbit { dx: 10.0, dy: 10.0 })
        );
        assert_eq!(
            router.translate(&ViewerEvent::PointerMoved(Vec2::new(110.0, 90.0))),
            None
        );
    }

    #[test]
    fn relative_deltas_orbit_without_baseline() {
        let mut router = InputRouter::default();
        assert_eq!(
            router.translate(&ViewerEvent::PointerDelta(Vec2::new(4.0, 6.0))),
            Some(Command::Orbit { dx: 4.0, dy: -6.0 })
        );
        assert_eq!(
            router.translate(&ViewerEvent::PointerDelta(Vec2::new(-3.0, -2.0))),
            Some(Command::Orbit { dx: -3.0, dy: 2.0 })
        );
        assert_eq!(router.translate(&ViewerEvent::PointerDelta(Vec2::ZERO)), None);
        assert_eq!(
            router.translate(&ViewerEvent::PointerDelta(Vec2::new(f32::NAN, 1.0))),
            None
        );
    }

    #[test]
    fn relative_deltas_keep_turning_past_the_window_edge() {
        let mut fixture = Fixture::with_slots(&[]);
        let step = |before: f32, after: f32| (after - before).rem_euclid(360.0);
        let mut yaw = fixture.camera.yaw();
        fixture.send(ViewerEvent::PointerDelta(Vec2::new(50.0, 0.0)));
        let first = step(yaw, fixture.camera.yaw());
        assert!(first > 0.0);
        for _ in 0..100 {
            yaw = fixture.camera.yaw();
            fixture.send(ViewerEvent::PointerDelta(Vec2::new(50.0, 0.0)));
            assert!((step(yaw, fixture.camera.yaw()) - first).abs() < 1e-2);
        }
    }

    #[test]
    fn pointer_and_scroll_drive_camera() {
        let mut fixture = Fixture::with_slots(&[]);
        let yaw = fixture.camera.yaw();
        fixture.send(ViewerEvent::PointerMoved(Vec2::ZERO));
        fixture.send(ViewerEvent::PointerMoved(Vec2::new(20.0, 0.0)));
        assert_ne!(fixture.camera.yaw(), yaw);

        let distance = fixture.camera.distance();
        fixture.send(ViewerEvent::Scroll(1.0));
        assert!(fixture.camera.distance() < distance);
        assert!(fixture.send(ViewerEvent::Scroll(0.0)).is_none());
    }
}
