use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Upper bound on point lights; matches the uniform array length in the shaders.
pub const MAX_POINT_LIGHTS: usize = 4;

/// Constant/linear/quadratic distance falloff factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.0014,
            quadratic: 0.000007,
        }
    }
}

/// Lighting coefficients of one point light. Written once as static uniforms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightMaterial {
    pub color: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub attenuation: Attenuation,
}

impl Default for LightMaterial {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            ambient: Vec3::ZERO,
            diffuse: Vec3::splat(0.5),
            specular: Vec3::ONE,
            attenuation: Attenuation::default(),
        }
    }
}

/// Circular path in the XZ plane at a fixed height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orbit {
    pub radius: f32,
    pub phase: f32,
    pub speed: f32,
    pub height: f32,
}

impl Orbit {
    /// Point on the orbit after `elapsed` seconds.
    pub fn position_at(&self, elapsed: f32) -> Vec3 {
        let angle = self.phase + self.speed * elapsed;
        Vec3::new(
            self.radius * angle.cos(),
            self.height,
            self.radius * angle.sin(),
        )
    }

    /// Time for one full revolution, or `None` for a stationary light.
    pub fn period(&self) -> Option<f32> {
        (self.speed != 0.0).then(|| std::f32::consts::TAU / self.speed.abs())
    }
}

/// Phase offset spreading `count` lights that share `radius`.
pub fn orbit_phase(index: usize, radius: f32, count: usize) -> f32 {
    if count == 0 {
        return 0.0;
    }
    index as f32 * (radius / count as f32)
}

/// Animated point light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub material: LightMaterial,
    orbit: Orbit,
    elapsed: f32,
    position: Vec3,
}

impl PointLight {
    pub fn new(material: LightMaterial, orbit: Orbit) -> Self {
        Self {
            material,
            orbit,
            elapsed: 0.0,
            position: orbit.position_at(0.0),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn orbit(&self) -> &Orbit {
        &self.orbit
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

/// Moves `light` along its orbit by `delta` seconds.
///
/// Zero, negative and non-finite deltas leave the light where it is.
pub fn advance(light: &mut PointLight, delta: f32) {
    if !delta.is_finite() || delta <= 0.0 {
        return;
    }
    light.elapsed += delta;
    light.position = light.orbit.position_at(light.elapsed);
}

/// Fixed set of lights created at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightRig {
    lights: Vec<PointLight>,
}

impl LightRig {
    /// Builds evenly phased lights sharing one orbit radius and speed.
    ///
    /// Each entry is the `(height, material)` of one light; entries beyond
    /// [`MAX_POINT_LIGHTS`] are dropped.
    pub fn orbiting(radius: f32, speed: f32, lights: &[(f32, LightMaterial)]) -> Self {
        let count = lights.len().min(MAX_POINT_LIGHTS);
        let lights = lights
            .iter()
            .take(count)
            .enumerate()
            .map(|(index, (height, material))| {
                let orbit = Orbit {
                    radius,
                    phase: orbit_phase(index, radius, count),
                    speed,
                    height: *height,
                };
                PointLight::new(*material, orbit)
            })
            .collect();
        Self { lights }
    }

    pub fn advance(&mut self, delta: f32) {
        for light in &mut self.lights {
            advance(light, delta);
        }
    }

    pub fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.lights.iter().map(PointLight::position).collect()
    }
}
