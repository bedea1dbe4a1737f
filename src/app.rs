use std::io::{self, Write};
use std::time::Instant;

use crate::config::ViewerConfig;
use crate::lights::LightRig;

/// Fixed step used when simulating without a window.
pub const HEADLESS_TICK: f32 = 1.0 / 60.0;

/// Measures wall-clock time between frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous call (or since construction).
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        delta
    }
}

/// Advances the configured light rig by `frames` fixed ticks.
pub fn simulate_lights(config: &ViewerConfig, frames: u32) -> LightRig {
    let mut rig = config.lights.build_rig();
    for _ in 0..frames {
        rig.advance(HEADLESS_TICK);
    }
    rig
}

pub fn write_summary(out: &mut impl Write, config: &ViewerConfig) -> io::Result<()> {
    let window = &config.window;
    writeln!(
        out,
        "Window: \"{}\" {}x{} ({}x MSAA, antialiasing {}, culling {})",
        window.title,
        window.width,
        window.height,
        window.samples,
        if window.antialiasing { "on" } else { "off" },
        window.cull.name()
    )?;
    match &config.model.mesh {
        Some(path) => writeln!(out, "Model: {}", path.display())?,
        None => writeln!(out, "Model: built-in cube")?,
    }
    writeln!(
        out,
        "Filtering: {}, shininess {}",
        config.model.filtering.name(),
        config.model.shininess
    )?;
    for texture in &config.model.textures {
        writeln!(out, " - {} {}", texture.key, texture.path.display())?;
    }
    writeln!(
        out,
        "Lights: {} (orbit radius {:.2}, speed {:.2})",
        config.lights.lights.len(),
        config.lights.radius,
        config.lights.speed
    )?;
    writeln!(out, "Shader variants: {}", config.shaders.variants.len())?;
    for variant in &config.shaders.variants {
        writeln!(out, " - slot {}: {}", variant.slot + 1, variant.label)?;
    }
    match config.shaders.initial_slot() {
        Some(slot) => writeln!(out, "Active variant: slot {}", slot + 1)?,
        None => writeln!(out, "Active variant: none")?,
    }
    match &config.skybox {
        Some(skybox) if skybox.enabled => writeln!(out, "Skybox: {} faces", skybox.faces.len())?,
        Some(_) => writeln!(out, "Skybox: disabled")?,
        None => writeln!(out, "Skybox: none")?,
    }
    Ok(())
}

pub fn write_light_positions(out: &mut impl Write, rig: &LightRig) -> io::Result<()> {
    writeln!(out, "Final light positions:")?;
    for (index, light) in rig.lights().iter().enumerate() {
        let position = light.position();
        writeln!(
            out,
            " - light {index} t={:.2}s pos=({:.2}, {:.2}, {:.2})",
            light.elapsed(),
            position.x,
            position.y,
            position.z
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_uses_fixed_steps() {
        let config = ViewerConfig::default();
        let rig = simulate_lights(&config, 60);
        for light in rig.lights() {
            assert!((light.elapsed() - 1.0).abs() < 1e-4);
        }
        assert_eq!(simulate_lights(&config, 0), config.lights.build_rig());
    }

    #[test]
    fn summary_lists_defaults() {
        let mut out = Vec::new();
        write_summary(&mut out, &ViewerConfig::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Model: built-in cube"));
        assert!(text.contains("Lights: 2"));
        assert!(text.contains("Active variant: none"));
        assert!(text.contains("Skybox: none"));
    }

    #[test]
    fn light_positions_are_listed_per_light() {
        let rig = simulate_lights(&ViewerConfig::default(), 1);
        let mut out = Vec::new();
        write_light_positions(&mut out, &rig).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("light 1"));
    }

    #[test]
    fn clock_reports_non_negative_deltas() {
        let mut clock = FrameClock::new();
        assert!(clock.tick() >= 0.0);
    }
}
