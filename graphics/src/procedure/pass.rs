//! Runtime passes of a scene procedure.

use std::sync::Arc;

use crate::effects::Effect;
use crate::scene::Renderable;
use crate::types::{BlendMode, ClearFlags, ClearValue};

use super::descriptor::{ClearConfig, PassCondition, PassInput, PassOutput};

/// Which renderables a scene pass draws.
pub enum Selector {
    All,
    /// Renderables whose selector mask has bit `n` set.
    Id(u32),
    Custom(Box<dyn Fn(&dyn Renderable) -> bool + Send + Sync>),
}

impl Selector {
    pub fn matches(&self, renderable: &dyn Renderable) -> bool {
        match self {
            Self::All => true,
            Self::Id(bit) => {
                *bit < u64::BITS && renderable.selector_mask() & (1u64 << *bit) != 0
            }
            Self::Custom(predicate) => predicate(renderable),
        }
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::Id(bit) => f.debug_tuple("Id").field(bit).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

#[derive(Debug)]
pub enum PassKind {
    Scene {
        selector: Selector,
        effect_override: Option<Arc<Effect>>,
        lod: u32,
    },
    /// Fullscreen quad drawn once with `effect`.
    Quad { effect: Arc<Effect> },
}

/// One step of a scene procedure.
#[derive(Debug)]
pub struct ScenePass {
    pub(crate) name: String,
    pub(crate) output: PassOutput,
    pub(crate) reads: Vec<PassInput>,
    pub(crate) clear: ClearConfig,
    pub(crate) blend: BlendMode,
    pub(crate) kind: PassKind,
    pub(crate) camera: usize,
    pub(crate) condition: Option<PassCondition>,
}

impl ScenePass {
    /// A pass drawing every renderable into the back buffer.
    pub fn scene(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            PassKind::Scene {
                selector: Selector::All,
                effect_override: None,
                lod: 0,
            },
        )
    }

    /// A fullscreen post-processing pass.
    pub fn quad(name: impl Into<String>, effect: Arc<Effect>) -> Self {
        Self::with_kind(name, PassKind::Quad { effect })
    }

    fn with_kind(name: impl Into<String>, kind: PassKind) -> Self {
        Self {
            name: name.into(),
            output: PassOutput::BackBuffer,
            reads: Vec::new(),
            clear: ClearConfig::default(),
            blend: BlendMode::Replace,
            kind,
            camera: 0,
            condition: None,
        }
    }

    /// Render into a procedure target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.output = PassOutput::Target(target.into());
        self
    }

    /// Declare a texture this pass samples.
    pub fn reading(mut self, input: PassInput) -> Self {
        self.reads.push(input);
        self
    }

    pub fn with_clear(mut self, flags: ClearFlags, value: ClearValue) -> Self {
        self.clear = ClearConfig { flags, value };
        self
    }

    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_camera(mut self, camera: usize) -> Self {
        self.camera = camera;
        self
    }

    /// Run the pass only on frames where `condition` holds.
    pub fn with_condition(mut self, condition: PassCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Replace the selector of a scene pass. Ignored for quad passes.
    pub fn with_selector(mut self, new: Selector) -> Self {
        if let PassKind::Scene { selector, .. } = &mut self.kind {
            *selector = new;
        }
        self
    }

    /// Draw every render operation with `effect`. Ignored for quad passes.
    pub fn with_effect_override(mut self, effect: Arc<Effect>) -> Self {
        if let PassKind::Scene {
            effect_override, ..
        } = &mut self.kind
        {
            *effect_override = Some(effect);
        }
        self
    }

    /// Level of detail requested from renderables. Ignored for quad passes.
    pub fn with_lod(mut self, level: u32) -> Self {
        if let PassKind::Scene { lod, .. } = &mut self.kind {
            *lod = level;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> &PassOutput {
        &self.output
    }

    pub fn reads(&self) -> &[PassInput] {
        &self.reads
    }

    pub fn clear(&self) -> &ClearConfig {
        &self.clear
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    pub fn kind(&self) -> &PassKind {
        &self.kind
    }

    pub fn camera(&self) -> usize {
        self.camera
    }

    pub fn condition(&self) -> Option<&PassCondition> {
        self.condition.as_ref()
    }

    pub fn is_scene(&self) -> bool {
        matches!(self.kind, PassKind::Scene { .. })
    }

    /// Flags actually cleared. Additive passes keep their color.
    pub fn effective_clear_flags(&self) -> ClearFlags {
        let mut flags = self.clear.flags;
        if self.blend == BlendMode::Additive {
            flags.remove(ClearFlags::COLOR);
        }
        flags
    }

    /// Effects this pass names directly.
    pub(crate) fn effects(&self) -> impl Iterator<Item = &Arc<Effect>> {
        let effect = match &self.kind {
            PassKind::Scene {
                effect_override, ..
            } => effect_override.as_ref(),
            PassKind::Quad { effect } => Some(effect),
        };
        effect.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Masked(u64);

    impl Renderable for Masked {
        fn render_operations(&self, _level: u32) -> Option<crate::scene::RenderOperationBuffer> {
            None
        }

        fn selector_mask(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn test_selector_bits() {
        let r = Masked(0b101);
        assert!(Selector::All.matches(&r));
        assert!(Selector::Id(0).matches(&r));
        assert!(!Selector::Id(1).matches(&r));
        assert!(Selector::Id(2).matches(&r));
        assert!(!Selector::Id(64).matches(&r));
        let custom = Selector::Custom(Box::new(|r| r.selector_mask() > 4));
        assert!(custom.matches(&r));
    }

    #[test]
    fn test_additive_pass_keeps_color() {
        let pass = ScenePass::scene("glow")
            .with_blend(BlendMode::Additive)
            .with_clear(ClearFlags::all(), ClearValue::default());
        assert_eq!(
            pass.effective_clear_flags(),
            ClearFlags::DEPTH | ClearFlags::STENCIL
        );
    }
}
