use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use glam::{EulerRot, Quat, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::camera::CameraSettings;
use crate::input::{KeyAction, KeyCode};
use crate::lights::{Attenuation, LightMaterial, LightRig, MAX_POINT_LIGHTS};
use crate::model::{ModelView, TextureKey, TextureRole};
use crate::shader::SHADER_SLOTS;
use crate::state::{CullMode, FilteringMode};

/// Startup configuration of the viewer, read from an XML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub camera: CameraSettings,
    pub model: ModelConfig,
    pub lights: LightsConfig,
    pub shaders: ShadersConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skybox: Option<SkyboxConfig>,
    #[serde(default)]
    pub bindings: Vec<(KeyCode, KeyAction)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub samples: u32,
    pub antialiasing: bool,
    pub cull: CullMode,
    pub clear_color: Vec3,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Orbit Viewer".to_string(),
            width: 1920,
            height: 1080,
            samples: 8,
            antialiasing: true,
            cull: CullMode::Disabled,
            clear_color: Vec3::new(0.03, 0.03, 0.05),
        }
    }
}

impl WindowConfig {
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureConfig {
    pub key: TextureKey,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `None` selects the built-in cube.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<PathBuf>,
    pub scale: Vec3,
    /// Euler angles in degrees, applied X then Y then Z.
    pub rotation: Vec3,
    pub position: Vec3,
    pub shininess: f32,
    pub filtering: FilteringMode,
    #[serde(default)]
    pub textures: Vec<TextureConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            mesh: None,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
            position: Vec3::ZERO,
            shininess: 32.0,
            filtering: FilteringMode::Anisotropic,
            textures: Vec::new(),
        }
    }
}

impl ModelConfig {
    pub fn model_view(&self) -> ModelView {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.z.to_radians(),
        );
        ModelView::new(self.scale, rotation, self.position)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub height: f32,
    pub material: LightMaterial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightsConfig {
    pub radius: f32,
    pub speed: f32,
    pub lights: Vec<LightConfig>,
}

impl Default for LightsConfig {
    fn default() -> Self {
        let lights = (0..2)
            .map(|index| LightConfig {
                height: 3.0 - index as f32 * 1.2,
                material: LightMaterial::default(),
            })
            .collect();
        Self {
            radius: 7.3,
            speed: 1.0,
            lights,
        }
    }
}

impl LightsConfig {
    pub fn build_rig(&self) -> LightRig {
        let lights: Vec<_> = self
            .lights
            .iter()
            .map(|light| (light.height, light.material))
            .collect();
        LightRig::orbiting(self.radius, self.speed, &lights)
    }
}

/// One populated shader slot. `slot` is zero based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderSlotConfig {
    pub slot: usize,
    pub label: String,
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ShadersConfig {
    /// Zero based slot to activate at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<usize>,
    pub variants: Vec<ShaderSlotConfig>,
}

impl ShadersConfig {
    /// The configured start slot, else the lowest populated one.
    pub fn initial_slot(&self) -> Option<usize> {
        self.active
            .filter(|slot| self.variants.iter().any(|variant| variant.slot == *slot))
            .or_else(|| self.variants.iter().map(|variant| variant.slot).min())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkyboxConfig {
    pub enabled: bool,
    pub scale: f32,
    /// Right, left, up, down, back, front.
    pub faces: Vec<PathBuf>,
}

impl ViewerConfig {
    /// Reads a configuration file; relative asset paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path)
            .with_context(|| format!("unable to read config {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_xml(&xml, base_dir)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parses the XML configuration document.
    pub fn from_xml(xml: &str, base_dir: &Path) -> Result<Self> {
        let document = Document::parse(xml).context("invalid config XML")?;
        let root = document.root_element();
        if !root.has_tag_name("viewer") {
            bail!("root element must be <viewer>");
        }

        let mut config = ViewerConfig::default();
        if let Some(node) = child(&root, "window") {
            config.window = parse_window(&node)?;
        }
        if let Some(node) = child(&root, "camera") {
            config.camera = parse_camera(&node)?;
        }
        if let Some(node) = child(&root, "model") {
            config.model = parse_model(&node, base_dir)?;
        }
        if let Some(node) = child(&root, "lights") {
            config.lights = parse_lights(&node)?;
        }
        if let Some(node) = child(&root, "shaders") {
            config.shaders = parse_shaders(&node, base_dir)?;
        }
        if let Some(node) = child(&root, "skybox") {
            config.skybox = Some(parse_skybox(&node, base_dir)?);
        }
        if let Some(node) = child(&root, "bindings") {
            config.bindings = parse_bindings(&node)?;
        }
        Ok(config)
    }
}

fn parse_window(node: &Node<'_, '_>) -> Result<WindowConfig> {
    let defaults = WindowConfig::default();
    let (width, height) = match optional_text(node, "size") {
        Some(size) => parse_size(&size)?,
        None => (defaults.width, defaults.height),
    };
    let samples = parse_u32(optional_text(node, "samples"), defaults.samples)?;
    if !matches!(samples, 1 | 2 | 4 | 8 | 16) {
        bail!("<samples> must be 1, 2, 4, 8 or 16, got {samples}");
    }
    let cull = match optional_text(node, "cull") {
        Some(name) => {
            CullMode::from_name(&name).ok_or_else(|| anyhow!("unknown cull mode `{name}`"))?
        }
        None => defaults.cull,
    };
    Ok(WindowConfig {
        title: optional_text(node, "title").unwrap_or(defaults.title),
        width,
        height,
        samples,
        antialiasing: parse_bool(optional_text(node, "antialiasing"), defaults.antialiasing)?,
        cull,
        clear_color: parse_color(optional_text(node, "clear"), defaults.clear_color)?,
    })
}

fn parse_camera(node: &Node<'_, '_>) -> Result<CameraSettings> {
    let d = CameraSettings::default();
    let settings = CameraSettings {
        target: parse_vec3(optional_text(node, "target"), d.target)?,
        fov_degrees: parse_f32(optional_text(node, "fov"), d.fov_degrees)?,
        near: parse_f32(optional_text(node, "near"), d.near)?,
        far: parse_f32(optional_text(node, "far"), d.far)?,
        sensitivity: parse_f32(optional_text(node, "sensitivity"), d.sensitivity)?,
        zoom_enabled: parse_bool(optional_text(node, "zoom"), d.zoom_enabled)?,
        zoom_near: parse_f32(optional_text(node, "zoom_near"), d.zoom_near)?,
        zoom_far: parse_f32(optional_text(node, "zoom_far"), d.zoom_far)?,
        zoom_speed: parse_f32(optional_text(node, "zoom_speed"), d.zoom_speed)?,
        initial_distance: parse_f32(optional_text(node, "distance"), d.initial_distance)?,
        initial_yaw: parse_f32(optional_text(node, "yaw"), d.initial_yaw)?,
        initial_pitch: parse_f32(optional_text(node, "pitch"), d.initial_pitch)?,
    };
    if !(settings.near > 0.0 && settings.far > settings.near) {
        bail!("camera clip planes must satisfy 0 < near < far");
    }
    Ok(settings)
}

fn parse_model(node: &Node<'_, '_>, base_dir: &Path) -> Result<ModelConfig> {
    let d = ModelConfig::default();
    let filtering = match optional_text(node, "filtering") {
        Some(name) => FilteringMode::from_name(&name)
            .ok_or_else(|| anyhow!("unknown filtering mode `{name}`"))?,
        None => d.filtering,
    };
    let mut textures = Vec::new();
    for texture in node.children().filter(|n| n.has_tag_name("texture")) {
        let role_name = required_attribute(&texture, "role")?;
        let role = TextureRole::from_name(role_name)
            .ok_or_else(|| anyhow!("unknown texture role `{role_name}`"))?;
        let slot = match texture.attribute("slot") {
            Some(slot) => slot
                .trim()
                .parse::<u8>()
                .map_err(|err| anyhow!("invalid texture slot `{slot}`: {err}"))?,
            None => 0,
        };
        let path = node_text(&texture).ok_or_else(|| anyhow!("<texture> needs a path"))?;
        textures.push(TextureConfig {
            key: TextureKey::new(role, slot),
            path: base_dir.join(path),
        });
    }
    Ok(ModelConfig {
        mesh: optional_text(node, "mesh").map(|mesh| base_dir.join(mesh)),
        scale: parse_vec3(optional_text(node, "scale"), d.scale)?,
        rotation: parse_vec3(optional_text(node, "rotation"), d.rotation)?,
        position: parse_vec3(optional_text(node, "position"), d.position)?,
        shininess: parse_f32(optional_text(node, "shininess"), d.shininess)?,
        filtering,
        textures,
    })
}

fn parse_lights(node: &Node<'_, '_>) -> Result<LightsConfig> {
    let d = LightsConfig::default();
    let default_material = LightMaterial::default();
    let mut lights = Vec::new();
    for light in node.children().filter(|n| n.has_tag_name("light")) {
        let attenuation = Attenuation {
            constant: parse_f32(
                optional_text(&light, "constant"),
                default_material.attenuation.constant,
            )?,
            linear: parse_f32(
                optional_text(&light, "linear"),
                default_material.attenuation.linear,
            )?,
            quadratic: parse_f32(
                optional_text(&light, "quadratic"),
                default_material.attenuation.quadratic,
            )?,
        };
        let material = LightMaterial {
            color: parse_vec3(optional_text(&light, "color"), default_material.color)?,
            ambient: parse_vec3(optional_text(&light, "ambient"), default_material.ambient)?,
            diffuse: parse_vec3(optional_text(&light, "diffuse"), default_material.diffuse)?,
            specular: parse_vec3(optional_text(&light, "specular"), default_material.specular)?,
            attenuation,
        };
        let height = parse_f32(optional_text(&light, "height"), 3.0 - lights.len() as f32 * 1.2)?;
        lights.push(LightConfig { height, material });
    }
    if lights.len() > MAX_POINT_LIGHTS {
        bail!(
            "at most {MAX_POINT_LIGHTS} lights are supported, got {}",
            lights.len()
        );
    }
    Ok(LightsConfig {
        radius: parse_f32(optional_text(node, "radius"), d.radius)?,
        speed: parse_f32(optional_text(node, "speed"), d.speed)?,
        lights,
    })
}

fn parse_shaders(node: &Node<'_, '_>, base_dir: &Path) -> Result<ShadersConfig> {
    let mut variants: Vec<ShaderSlotConfig> = Vec::new();
    for variant in node.children().filter(|n| n.has_tag_name("variant")) {
        let slot = parse_slot(required_attribute(&variant, "slot")?)?;
        if variants.iter().any(|existing| existing.slot == slot) {
            bail!("shader slot {} is configured twice", slot + 1);
        }
        let label = variant
            .attribute("name")
            .map(str::to_string)
            .unwrap_or_else(|| format!("variant-{}", slot + 1));
        variants.push(ShaderSlotConfig {
            slot,
            label,
            vertex: base_dir.join(required_text(&variant, "vertex")?),
            fragment: base_dir.join(required_text(&variant, "fragment")?),
        });
    }
    let active = node.attribute("active").map(parse_slot).transpose()?;
    Ok(ShadersConfig { active, variants })
}

fn parse_skybox(node: &Node<'_, '_>, base_dir: &Path) -> Result<SkyboxConfig> {
    let faces: Vec<PathBuf> = node
        .children()
        .filter(|n| n.has_tag_name("face"))
        .map(|face| node_text(&face).map(|path| base_dir.join(path)))
        .collect::<Option<_>>()
        .ok_or_else(|| anyhow!("<face> needs a path"))?;
    if faces.len() != 6 {
        bail!("skybox needs exactly 6 faces, got {}", faces.len());
    }
    Ok(SkyboxConfig {
        enabled: parse_bool(node.attribute("enabled").map(str::to_string), true)?,
        scale: parse_f32(optional_text(node, "scale"), 40.0)?,
        faces,
    })
}

fn parse_bindings(node: &Node<'_, '_>) -> Result<Vec<(KeyCode, KeyAction)>> {
    node.children()
        .filter(|n| n.has_tag_name("bind"))
        .map(|bind| {
            let key_name = required_attribute(&bind, "key")?;
            let key = KeyCode::from_name(key_name)
                .ok_or_else(|| anyhow!("unknown key `{key_name}`"))?;
            let action_name = node_text(&bind).ok_or_else(|| anyhow!("<bind> needs an action"))?;
            let action = KeyAction::from_name(&action_name)
                .ok_or_else(|| anyhow!("unknown action `{action_name}`"))?;
            Ok((key, action))
        })
        .collect()
}

fn parse_slot(value: &str) -> Result<usize> {
    let slot = value
        .trim()
        .parse::<usize>()
        .map_err(|err| anyhow!("invalid shader slot `{value}`: {err}"))?;
    if !(1..=SHADER_SLOTS).contains(&slot) {
        bail!("shader slot must be between 1 and {SHADER_SLOTS}, got {slot}");
    }
    Ok(slot - 1)
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

fn required_attribute<'a>(node: &Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        anyhow!(
            "<{}> is missing the `{name}` attribute",
            node.tag_name().name()
        )
    })
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn node_text(node: &Node<'_, '_>) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag).and_then(|child| node_text(&child))
}

fn parse_components<const N: usize>(value: &str, what: &str) -> Result<[f32; N]> {
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|err| anyhow!("invalid {what} component `{component}`: {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    numbers
        .try_into()
        .map_err(|numbers: Vec<f32>| anyhow!("{what} needs {N} components, got {}", numbers.len()))
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    Ok(Vec3::from_array(parse_components::<3>(&value, "vector")?))
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let [r, g, b] = parse_components::<3>(&value, "color")?;
    Ok(Vec3::new(r / 255.0, g / 255.0, b / 255.0))
}

fn parse_size(value: &str) -> Result<(u32, u32)> {
    let [width, height] = parse_components::<2>(value, "size")?;
    if width < 1.0 || height < 1.0 {
        bail!("window size must be at least 1x1");
    }
    Ok((width as u32, height as u32))
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float `{value}`: {err}")),
        None => Ok(default),
    }
}

fn parse_u32(value: Option<String>, default: u32) -> Result<u32> {
    match value {
        Some(value) => value
            .parse::<u32>()
            .map_err(|err| anyhow!("failed to parse integer `{value}`: {err}")),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref().map(str::trim) {
        None => Ok(default),
        Some("true" | "on" | "yes" | "1") => Ok(true),
        Some("false" | "off" | "no" | "0") => Ok(false),
        Some(other) => Err(anyhow!("expected a boolean, got `{other}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::NamedKey;

    const SAMPLE: &str = r#"
    <viewer>
        <window>
            <title>FBX Viewer</title>
            <size>1920 1080</size>
            <samples>8</samples>
            <antialiasing>true</antialiasing>
            <cull>disabled</cull>
        </window>
        <camera>
            <zoom_near>8</zoom_near>
            <zoom_far>18</zoom_far>
            <zoom_speed>0.8</zoom_speed>
        </camera>
        <model>
            <mesh>cat/cat.obj</mesh>
            <scale>0.2 0.2 0.2</scale>
            <rotation>-90 0 0</rotation>
            <filtering>trilinear</filtering>
            <texture role="normal" slot="0">cat/body_norm.png</texture>
            <texture role="specular" slot="1">cat/fur_diff_spec.png</texture>
        </model>
        <lights>
            <radius>7.3</radius>
            <light><height>3.0</height></light>
            <light><height>1.8</height><linear>0.0014</linear></light>
        </lights>
        <shaders active="1">
            <variant slot="1" name="blinn-phong">
                <vertex>shaders/model.vert.wgsl</vertex>
                <fragment>shaders/blinn_phong.frag.wgsl</fragment>
            </variant>
            <variant slot="3">
                <vertex>shaders/model.vert.wgsl</vertex>
                <fragment>shaders/normals.frag.wgsl</fragment>
            </variant>
        </shaders>
        <bindings>
            <bind key="Space">toggle-antialiasing</bind>
        </bindings>
    </viewer>
    "#;

    #[test]
    fn parses_full_config() {
        let config = ViewerConfig::from_xml(SAMPLE, Path::new("/assets")).unwrap();
        assert_eq!(config.window.title, "FBX Viewer");
        assert_eq!(config.window.samples, 8);
        assert_eq!(config.window.cull, CullMode::Disabled);
        assert_eq!(config.model.mesh, Some(PathBuf::from("/assets/cat/cat.obj")));
        assert_eq!(config.model.filtering, FilteringMode::Trilinear);
        assert_eq!(config.model.textures.len(), 2);
        assert_eq!(
            config.model.textures[1].key,
            TextureKey::new(TextureRole::Specular, 1)
        );
        assert_eq!(config.lights.lights.len(), 2);
        assert_eq!(config.lights.lights[1].height, 1.8);
        assert_eq!(config.shaders.variants[1].slot, 2);
        assert_eq!(config.shaders.variants[1].label, "variant-3");
        assert_eq!(config.shaders.initial_slot(), Some(0));
        assert_eq!(
            config.bindings,
            vec![(
                KeyCode::Named(NamedKey::Space),
                KeyAction::ToggleAntialiasing
            )]
        );
        assert!(config.skybox.is_none());
    }

    #[test]
    fn empty_viewer_uses_defaults() {
        let config = ViewerConfig::from_xml("<viewer/>", Path::new(".")).unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.window.samples, 8);
        let rig = config.lights.build_rig();
        assert_eq!(rig.len(), 2);
        assert_eq!(config.shaders.initial_slot(), None);
    }

    #[test]
    fn lights_element_without_children_means_no_lights() {
        let xml = "<viewer><lights><radius>2</radius></lights></viewer>";
        let config = ViewerConfig::from_xml(xml, Path::new(".")).unwrap();
        assert!(config.lights.build_rig().is_empty());
    }

    #[test]
    fn active_slot_falls_back_to_lowest_populated() {
        let xml = r#"<viewer><shaders active="4">
            <variant slot="2"><vertex>a</vertex><fragment>b</fragment></variant>
        </shaders></viewer>"#;
        let config = ViewerConfig::from_xml(xml, Path::new(".")).unwrap();
        assert_eq!(config.shaders.initial_slot(), Some(1));
    }

    #[test]
    fn rejects_invalid_documents() {
        let cases = [
            "<scene/>",
            "<viewer><window><samples>3</samples></window></viewer>",
            "<viewer><window><size>0 10</size></window></viewer>",
            "<viewer><model><filtering>cubic</filtering></model></viewer>",
            "<viewer><model><texture role=\"height\">a.png</texture></model></viewer>",
            "<viewer><shaders><variant slot=\"5\"><vertex>a</vertex><fragment>b</fragment></variant></shaders></viewer>",
            "<viewer><shaders><variant slot=\"1\"><vertex>a</vertex></variant></shaders></viewer>",
            "<viewer><skybox><face>a.png</face></skybox></viewer>",
            "<viewer><bindings><bind key=\"Nope\">close</bind></bindings></viewer>",
            "<viewer><lights><light/><light/><light/><light/><light/></lights></viewer>",
            "<viewer><camera><near>0</near></camera></viewer>",
        ];
        for xml in cases {
            assert!(
                ViewerConfig::from_xml(xml, Path::new(".")).is_err(),
                "accepted {xml}"
            );
        }
    }

    #[test]
    fn skybox_can_be_disabled() {
        let xml = r#"<viewer><skybox enabled="false">
            <face>r.png</face><face>l.png</face><face>u.png</face>
            <face>d.png</face><face>b.png</face><face>f.png</face>
        </skybox></viewer>"#;
        let config = ViewerConfig::from_xml(xml, Path::new("sky")).unwrap();
        let skybox = config.skybox.unwrap();
        assert!(!skybox.enabled);
        assert_eq!(skybox.faces[0], PathBuf::from("sky/r.png"));
        assert_eq!(skybox.scale, 40.0);
    }

    #[test]
    fn model_view_rotates_in_degrees() {
        let model = ModelConfig {
            rotation: Vec3::new(-90.0, 0.0, 0.0),
            ..ModelConfig::default()
        };
        let rotated = model.model_view().transformation().transform_vector3(Vec3::Y);
        assert!(rotated.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-5));
    }
}
