use log::{debug, info};

use crate::render::{ProgramSource, RenderBackend, RenderError, StaticUniforms};

/// Number of selectable shader slots (keys 1 to 4).
pub const SHADER_SLOTS: usize = 4;

/// A linked program plus the static uniforms written when it loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderVariant<P> {
    label: String,
    program: P,
    static_uniforms: StaticUniforms,
}

impl<P: Copy> ShaderVariant<P> {
    pub fn new(label: impl Into<String>, program: P, static_uniforms: StaticUniforms) -> Self {
        Self {
            label: label.into(),
            program,
            static_uniforms,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn program(&self) -> P {
        self.program
    }

    pub fn static_uniforms(&self) -> &StaticUniforms {
        &self.static_uniforms
    }
}

/// Fixed set of shader slots, at most one of them active.
///
/// A slot only ever holds a variant that compiled and linked, so whatever
/// is active is renderable.
#[derive(Debug)]
pub struct ShaderVariantRegistry<P> {
    slots: [Option<ShaderVariant<P>>; SHADER_SLOTS],
    active: Option<usize>,
}

impl<P> Default for ShaderVariantRegistry<P> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            active: None,
        }
    }
}

impl<P: Copy> ShaderVariantRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `source` into `slot` and writes its static uniforms.
    ///
    /// Compile and link failures are returned untouched; there is no
    /// fallback program.
    pub fn load<B>(
        &mut self,
        backend: &mut B,
        slot: usize,
        label: &str,
        source: &ProgramSource,
        static_uniforms: StaticUniforms,
    ) -> Result<P, RenderError>
    where
        B: RenderBackend<Program = P>,
    {
        if slot >= SHADER_SLOTS {
            return Err(RenderError::ShaderLink {
                label: label.to_string(),
                message: format!("slot {slot} is outside 0..{SHADER_SLOTS}"),
            });
        }
        let program = backend.compile_program(label, source)?;
        backend.write_static_uniforms(program, &static_uniforms);
        info!("Loaded shader variant `{label}` into slot {}", slot + 1);
        let variant = ShaderVariant::new(label, program, static_uniforms);
        debug!(
            "Static uniforms for `{label}`: {} light materials, shininess {}",
            variant.static_uniforms().lights.len(),
            variant.static_uniforms().shininess
        );
        self.slots[slot] = Some(variant);
        Ok(program)
    }

    /// Activates `slot` if it holds a variant. Returns whether it did.
    ///
    /// Static uniforms are not rewritten on activation.
    pub fn set_active(&mut self, slot: usize) -> bool {
        if self.get(slot).is_none() {
            debug!("Ignoring selection of empty shader slot index {slot}");
            return false;
        }
        self.active = Some(slot);
        true
    }

    pub fn get(&self, slot: usize) -> Option<&ShaderVariant<P>> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn active(&self) -> Option<&ShaderVariant<P>> {
        self.active.and_then(|slot| self.get(slot))
    }

    pub fn active_slot(&self) -> Option<usize> {
        self.active
    }

    pub fn populated_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, variant)| variant.as_ref().map(|_| slot))
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;
    use crate::render::recording::{Call, RecordingBackend};

    fn source() -> ProgramSource {
        ProgramSource {
            vertex: "@vertex fn vs_main() {}".into(),
            fragment: "@fragment fn fs_main() {}".into(),
        }
    }

    fn uniforms() -> StaticUniforms {
        StaticUniforms {
            model: Mat4::from_scale(glam::Vec3::splat(0.2)),
            lights: Vec::new(),
            shininess: 32.0,
        }
    }

    #[test]
    fn load_writes_static_uniforms_once() {
        let mut backend = RecordingBackend::default();
        let mut registry = ShaderVariantRegistry::new();
        let program = registry
            .load(&mut backend, 0, "blinn-phong", &source(), uniforms())
            .unwrap();
        assert!(registry.set_active(0));
        assert!(registry.set_active(0));
        let writes = backend
            .calls
            .iter()
            .filter(|call| matches!(call, Call::StaticUniforms(..)))
            .count();
        assert_eq!(writes, 1);
        assert_eq!(registry.active().map(ShaderVariant::program), Some(program));
        assert_eq!(
            registry.get(0).map(ShaderVariant::static_uniforms),
            Some(&uniforms())
        );
    }

    #[test]
    fn failed_variant_never_becomes_active() {
        let mut backend = RecordingBackend::failing(&["broken"]);
        let mut registry = ShaderVariantRegistry::new();
        let err = registry
            .load(&mut backend, 1, "broken", &source(), uniforms())
            .unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompile { .. }));
        assert!(!registry.set_active(1));
        assert!(registry.active().is_none());
    }

    #[test]
    fn empty_and_out_of_range_slots_are_ignored() {
        let mut backend = RecordingBackend::default();
        let mut registry = ShaderVariantRegistry::new();
        registry
            .load(&mut backend, 1, "phong", &source(), uniforms())
            .unwrap();
        assert!(registry.set_active(1));
        for slot in [0, 2, 3, 4, 17, usize::MAX] {
            assert!(!registry.set_active(slot));
            assert_eq!(registry.active_slot(), Some(1));
        }
        assert_eq!(registry.populated_slots().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn loading_past_the_last_slot_fails() {
        let mut backend = RecordingBackend::default();
        let mut registry = ShaderVariantRegistry::<u32>::new();
        assert!(registry
            .load(&mut backend, SHADER_SLOTS, "extra", &source(), uniforms())
            .is_err());
        assert!(backend.calls.is_empty());
    }
}
