use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use glam::Vec2;
use log::{info, warn};
use pollster::block_on;
use winit::dpi::PhysicalSize;
use winit::event::{
    DeviceEvent, ElementState, Event, KeyboardInput, MouseScrollDelta, WindowEvent,
};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::run_return::EventLoopExtRunReturn;
use winit::window::{CursorGrabMode, Window, WindowBuilder};

use orbit_viewer::app::{simulate_lights, write_light_positions, write_summary, FrameClock};
use orbit_viewer::{
    KeyCode, NamedKey, RenderError, SceneAssets, Viewer, ViewerConfig, ViewerEvent, WgpuBackend,
};

/// Pixel scroll deltas are converted to lines with this factor.
const PIXELS_PER_LINE: f64 = 40.0;

#[derive(Parser, Debug)]
#[command(name = "orbit-viewer")]
#[command(about = "Model viewer with orbiting point lights and switchable shader variants")]
struct Cli {
    /// Viewer configuration file (XML)
    #[arg(default_value = "assets/viewer.xml")]
    config: PathBuf,

    /// Print the configuration summary instead of opening a window
    #[arg(long)]
    summary_only: bool,

    /// Light animation ticks (60 Hz) to simulate before printing positions
    #[arg(long, default_value_t = 0)]
    frames: u32,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = ViewerConfig::load(&cli.config)?;

    if cli.summary_only {
        return run_headless(&config, cli.frames);
    }
    match run_interactive(&config) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
            );
            run_headless(&config, cli.frames)
        }
        Err(err) => Err(err),
    }
}

fn run_headless(config: &ViewerConfig, frames: u32) -> Result<()> {
    let mut out = io::stdout().lock();
    write_summary(&mut out, config)?;
    let rig = simulate_lights(config, frames);
    write_light_positions(&mut out, &rig)?;
    Ok(())
}

fn run_interactive(config: &ViewerConfig) -> Result<()> {
    let assets = SceneAssets::load(config)?;

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let mut event_loop =
        event_loop.map_err(|panic| WindowInitError::from_panic("event loop", panic))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&config.window.title)
            .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let backend = block_on(WgpuBackend::new(Arc::clone(&window), config.window.samples))?;
    let viewer = Viewer::from_config(config, assets, backend)?;
    let cursor_locked = lock_cursor(&window);
    let mut app = AppState {
        viewer,
        clock: FrameClock::new(),
        cursor_locked,
        last_error: None,
    };

    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        if let Err(err) = app.process_event(&event, control_flow) {
            app.last_error = Some(err);
            control_flow.set_exit();
        }
    });
    info!("Rendered {} frames", app.viewer.frames_rendered());

    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct AppState {
    viewer: Viewer<WgpuBackend>,
    clock: FrameClock,
    /// Orbit follows raw mouse motion while set, cursor positions otherwise.
    cursor_locked: bool,
    last_error: Option<anyhow::Error>,
}

impl AppState {
    fn process_event(&mut self, event: &Event<()>, control_flow: &mut ControlFlow) -> Result<()> {
        let window_id = self.viewer.backend().window_id();
        match event {
            Event::WindowEvent { event, window_id: id } if *id == window_id => match event {
                WindowEvent::CloseRequested => {
                    self.viewer.request_close();
                    control_flow.set_exit();
                }
                WindowEvent::Resized(size) => {
                    self.viewer.backend_mut().resize(*size);
                }
                WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                    self.viewer.backend_mut().resize(**new_inner_size);
                }
                WindowEvent::KeyboardInput { input, .. } => {
                    if let Some(event) = key_event(input) {
                        self.viewer.handle_event(&event);
                    }
                }
                WindowEvent::Focused(focused) => {
                    let window = self.viewer.backend().window();
                    self.cursor_locked = if *focused {
                        lock_cursor(window)
                    } else {
                        release_cursor(window);
                        false
                    };
                }
                WindowEvent::CursorMoved { position, .. } if !self.cursor_locked => {
                    let position = Vec2::new(position.x as f32, position.y as f32);
                    self.viewer
                        .handle_event(&ViewerEvent::PointerMoved(position));
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    let offset = match delta {
                        MouseScrollDelta::LineDelta(_, y) => *y,
                        MouseScrollDelta::PixelDelta(position) => {
                            (position.y / PIXELS_PER_LINE) as f32
                        }
                    };
                    self.viewer.handle_event(&ViewerEvent::Scroll(offset));
                }
                _ => {}
            },
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } if self.cursor_locked => {
                let delta = Vec2::new(delta.0 as f32, delta.1 as f32);
                self.viewer
                    .handle_event(&ViewerEvent::PointerDelta(delta));
            }
            Event::RedrawRequested(id) if *id == window_id => {
                let delta = self.clock.tick();
                match self.viewer.tick(delta) {
                    Ok(()) => {}
                    Err(RenderError::Surface(
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                    )) => {
                        info!("Surface lost; reconfiguring");
                        self.viewer.backend_mut().reconfigure();
                    }
                    Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                        warn!("Surface timeout; retrying next frame");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Event::MainEventsCleared => {
                if self.viewer.close_requested() {
                    control_flow.set_exit();
                } else {
                    self.viewer.backend().window().request_redraw();
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

/// Grabs and hides the cursor so pointer motion orbits without limit.
///
/// Returns whether a grab took effect.
fn lock_cursor(window: &Window) -> bool {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
    match grabbed {
        Ok(()) => {
            window.set_cursor_visible(false);
            true
        }
        Err(err) => {
            warn!("Cursor grab unavailable ({err}); orbiting from cursor positions");
            false
        }
    }
}

fn release_cursor(window: &Window) {
    if let Err(err) = window.set_cursor_grab(CursorGrabMode::None) {
        warn!("Failed to release cursor: {err}");
    }
    window.set_cursor_visible(true);
}

/// Press edges only; releases never reach the viewer.
fn key_event(input: &KeyboardInput) -> Option<ViewerEvent> {
    if input.state != ElementState::Pressed {
        return None;
    }
    input
        .virtual_keycode
        .and_then(map_keycode)
        .map(ViewerEvent::KeyPressed)
}

fn map_keycode(code: winit::event::VirtualKeyCode) -> Option<KeyCode> {
    use winit::event::VirtualKeyCode as Key;
    const LETTERS: [(Key, char); 26] = [
        (Key::A, 'A'),
        (Key::B, 'B'),
        (Key::C, 'C'),
        (Key::D, 'D'),
        (Key::E, 'E'),
        (Key::F, 'F'),
        (Key::G, 'G'),
        (Key::H, 'H'),
        (Key::I, 'I'),
        (Key::J, 'J'),
        (Key::K, 'K'),
        (Key::L, 'L'),
        (Key::M, 'M'),
        (Key::N, 'N'),
        (Key::O, 'O'),
        (Key::P, 'P'),
        (Key::Q, 'Q'),
        (Key::R, 'R'),
        (Key::S, 'S'),
        (Key::T, 'T'),
        (Key::U, 'U'),
        (Key::V, 'V'),
        (Key::W, 'W'),
        (Key::X, 'X'),
        (Key::Y, 'Y'),
        (Key::Z, 'Z'),
    ];
    if let Some((_, letter)) = LETTERS.iter().find(|(key, _)| *key == code) {
        return Some(KeyCode::Character(*letter));
    }
    Some(match code {
        Key::Space => KeyCode::Named(NamedKey::Space),
        Key::Return => KeyCode::Named(NamedKey::Enter),
        Key::Tab => KeyCode::Named(NamedKey::Tab),
        Key::Left => KeyCode::Named(NamedKey::Left),
        Key::Right => KeyCode::Named(NamedKey::Right),
        Key::Up => KeyCode::Named(NamedKey::Up),
        Key::Down => KeyCode::Named(NamedKey::Down),
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::Back => KeyCode::Named(NamedKey::Backspace),
        Key::Home => KeyCode::Named(NamedKey::Home),
        Key::End => KeyCode::Named(NamedKey::End),
        Key::PageUp => KeyCode::Named(NamedKey::PageUp),
        Key::PageDown => KeyCode::Named(NamedKey::PageDown),
        Key::LShift => KeyCode::Named(NamedKey::LeftShift),
        Key::RShift => KeyCode::Named(NamedKey::RightShift),
        Key::LControl => KeyCode::Named(NamedKey::LeftCtrl),
        Key::RControl => KeyCode::Named(NamedKey::RightCtrl),
        Key::LAlt => KeyCode::Named(NamedKey::LeftAlt),
        Key::RAlt => KeyCode::Named(NamedKey::RightAlt),
        Key::Key0 | Key::Numpad0 => KeyCode::Digit(0),
        Key::Key1 | Key::Numpad1 => KeyCode::Digit(1),
        Key::Key2 | Key::Numpad2 => KeyCode::Digit(2),
        Key::Key3 | Key::Numpad3 => KeyCode::Digit(3),
        Key::Key4 | Key::Numpad4 => KeyCode::Digit(4),
        Key::Key5 | Key::Numpad5 => KeyCode::Digit(5),
        Key::Key6 | Key::Numpad6 => KeyCode::Digit(6),
        Key::Key7 | Key::Numpad7 => KeyCode::Digit(7),
        Key::Key8 | Key::Numpad8 => KeyCode::Digit(8),
        Key::Key9 | Key::Numpad9 => KeyCode::Digit(9),
        Key::F1 => KeyCode::Function(1),
        Key::F2 => KeyCode::Function(2),
        Key::F3 => KeyCode::Function(3),
        Key::F4 => KeyCode::Function(4),
        Key::F5 => KeyCode::Function(5),
        Key::F6 => KeyCode::Function(6),
        Key::F7 => KeyCode::Function(7),
        Key::F8 => KeyCode::Function(8),
        Key::F9 => KeyCode::Function(9),
        Key::F10 => KeyCode::Function(10),
        Key::F11 => KeyCode::Function(11),
        Key::F12 => KeyCode::Function(12),
        _ => return None,
    })
}
