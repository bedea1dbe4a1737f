use serde::{Deserialize, Serialize};

/// Sampling applied uniformly to every texture map bound to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilteringMode {
    Point,
    Bilinear,
    Trilinear,
    #[default]
    Anisotropic,
}

impl FilteringMode {
    pub const ALL: [Self; 4] = [
        Self::Point,
        Self::Bilinear,
        Self::Trilinear,
        Self::Anisotropic,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "point" | "nearest" => Some(Self::Point),
            "bilinear" => Some(Self::Bilinear),
            "trilinear" => Some(Self::Trilinear),
            "anisotropic" | "anisotropy" => Some(Self::Anisotropic),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Bilinear => "bilinear",
            Self::Trilinear => "trilinear",
            Self::Anisotropic => "anisotropic",
        }
    }
}

/// Face culling applied to the model pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CullMode {
    Back,
    #[default]
    Disabled,
}

impl CullMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "back" | "back-faces" => Some(Self::Back),
            "disabled" | "none" | "off" => Some(Self::Disabled),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Back => "back",
            Self::Disabled => "disabled",
        }
    }
}

/// Rendering switches the user can flip at runtime.
///
/// Only the input router mutates this; the frame orchestrator reads it once
/// per tick. The active shader slot is not stored here: it lives in
/// [`ShaderVariantRegistry::active_slot`](crate::shader::ShaderVariantRegistry::active_slot)
/// and only changes through
/// [`ShaderVariantRegistry::set_active`](crate::shader::ShaderVariantRegistry::set_active).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRenderState {
    pub filtering: FilteringMode,
    pub culling: CullMode,
    pub antialiasing: bool,
}

impl Default for ActiveRenderState {
    fn default() -> Self {
        Self {
            filtering: FilteringMode::default(),
            culling: CullMode::default(),
            antialiasing: true,
        }
    }
}

impl ActiveRenderState {
    pub fn set_filtering(&mut self, mode: FilteringMode) {
        self.filtering = mode;
    }

    pub fn set_culling(&mut self, mode: CullMode) {
        self.culling = mode;
    }

    pub fn set_antialiasing(&mut self, enabled: bool) {
        self.antialiasing = enabled;
    }

    pub fn toggle_antialiasing(&mut self) {
        self.antialiasing = !self.antialiasing;
    }
}
