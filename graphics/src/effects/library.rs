//! Built-in effect atoms and the effects the stock procedures use.
//!
//! The atom sources are stored as `.wgsl` files in `shaders/atoms/`:
//!
//! | Atom | Stage | Reads |
//! |------|-------|-------|
//! | `transform` | vertex | world-view-projection, world |
//! | `screen` | vertex | nothing (fullscreen quad) |
//! | `shadow_depth` | fragment | nothing |
//! | `lambert` | fragment | first light, material diffuse |
//! | `textured` | fragment | material texture slot 0 |
//! | `shadow_receive` | fragment | `shadow` pass input, `shadow_view_projection` variable |
//! | `emissive` | fragment | material emissive |
//! | `bright_pass` | fragment | `scene` pass input, `bloom_threshold` variable |
//! | `blur_horizontal` | fragment | `bloom` pass input, `bloom_blur_filter` variable |
//! | `blur_vertical` | fragment | `bloom_blur` pass input, `bloom_blur_filter` variable |
//! | `bloom_combine` | fragment | `scene` and `bloom` pass inputs, `bloom_strength` variable |

use crate::error::GraphicsError;
use crate::types::{Attachment, ShaderModel};

use super::atom::{EffectAtom, ShaderStage};
use super::parameter::{EffectParameter, ParamSource, ParamType};
use super::registry::EffectRegistry;

const TRANSFORM: &str = include_str!("../../../shaders/atoms/transform.wgsl");
const SCREEN: &str = include_str!("../../../shaders/atoms/screen.wgsl");
const SHADOW_DEPTH: &str = include_str!("../../../shaders/atoms/shadow_depth.wgsl");
const LAMBERT: &str = include_str!("../../../shaders/atoms/lambert.wgsl");
const TEXTURED: &str = include_str!("../../../shaders/atoms/textured.wgsl");
const SHADOW_RECEIVE: &str = include_str!("../../../shaders/atoms/shadow_receive.wgsl");
const EMISSIVE: &str = include_str!("../../../shaders/atoms/emissive.wgsl");
const BRIGHT_PASS: &str = include_str!("../../../shaders/atoms/bright_pass.wgsl");
const BLUR_HORIZONTAL: &str = include_str!("../../../shaders/atoms/blur_horizontal.wgsl");
const BLUR_VERTICAL: &str = include_str!("../../../shaders/atoms/blur_vertical.wgsl");
const BLOOM_COMBINE: &str = include_str!("../../../shaders/atoms/bloom_combine.wgsl");

/// Effect names registered by [`register_standard_effects`].
pub mod names {
    pub const SHADOW_CASTER: &str = "shadow_caster";
    pub const LIT: &str = "lit";
    pub const TEXTURED: &str = "textured";
    pub const BRIGHT_PASS: &str = "bright_pass";
    pub const BLUR_HORIZONTAL: &str = "blur_horizontal";
    pub const BLUR_VERTICAL: &str = "blur_vertical";
    pub const COMPOSITE: &str = "composite";
}

fn input(name: &str, target: &str) -> EffectParameter {
    EffectParameter::auto(
        name,
        ParamSource::Input {
            target: target.into(),
            attachment: Attachment::Color,
        },
    )
}

fn variable(name: &str, ty: ParamType) -> EffectParameter {
    EffectParameter::new(name, ty, ParamSource::Variable(name.into()))
}

/// Register the built-in atoms and effects.
pub fn register_standard_effects(registry: &mut EffectRegistry) -> Result<(), GraphicsError> {
    let transform = registry.register_atom(EffectAtom::new(
        "transform",
        ShaderStage::Vertex,
        TRANSFORM,
        vec![
            EffectParameter::auto("wvp", ParamSource::WorldViewProjection),
            EffectParameter::auto("world", ParamSource::World),
        ],
    )?)?;
    let screen =
        registry.register_atom(EffectAtom::new("screen", ShaderStage::Vertex, SCREEN, vec![])?)?;
    let shadow_depth = registry.register_atom(EffectAtom::new(
        "shadow_depth",
        ShaderStage::Fragment,
        SHADOW_DEPTH,
        vec![],
    )?)?;
    let lambert = registry.register_atom(EffectAtom::new(
        "lambert",
        ShaderStage::Fragment,
        LAMBERT,
        vec![
            EffectParameter::auto("light_dir", ParamSource::LightDirection),
            EffectParameter::auto("light_ambient", ParamSource::LightAmbient),
            EffectParameter::auto("light_diffuse", ParamSource::LightDiffuse),
            EffectParameter::auto("diffuse", ParamSource::MaterialDiffuse),
        ],
    )?)?;
    let textured = registry.register_atom(EffectAtom::new(
        "textured",
        ShaderStage::Fragment,
        TEXTURED,
        vec![EffectParameter::auto("diffuse_map", ParamSource::MaterialTexture(0))],
    )?)?;
    let shadow_receive = registry.register_atom(
        EffectAtom::new(
            "shadow_receive",
            ShaderStage::Fragment,
            SHADOW_RECEIVE,
            vec![
                input("shadow_map", "shadow"),
                variable("shadow_view_projection", ParamType::Matrix),
            ],
        )?
        .with_shader_model(ShaderModel::SM3_0),
    )?;
    let emissive = registry.register_atom(EffectAtom::new(
        "emissive",
        ShaderStage::Fragment,
        EMISSIVE,
        vec![EffectParameter::auto("emissive", ParamSource::MaterialEmissive)],
    )?)?;
    let bright_pass = registry.register_atom(EffectAtom::new(
        "bright_pass",
        ShaderStage::Fragment,
        BRIGHT_PASS,
        vec![
            input("scene", "scene"),
            EffectParameter::new(
                "threshold",
                ParamType::Float,
                ParamSource::Variable("bloom_threshold".into()),
            ),
        ],
    )?)?;
    let blur_filter = || {
        EffectParameter::new(
            "blur_filter",
            ParamType::BlurFilter,
            ParamSource::Variable("bloom_blur_filter".into()),
        )
    };
    let blur_horizontal = registry.register_atom(
        EffectAtom::new(
            "blur_horizontal",
            ShaderStage::Fragment,
            BLUR_HORIZONTAL,
            vec![input("bloom", "bloom"), blur_filter()],
        )?
        .with_shader_model(ShaderModel::SM3_0),
    )?;
    let blur_vertical = registry.register_atom(
        EffectAtom::new(
            "blur_vertical",
            ShaderStage::Fragment,
            BLUR_VERTICAL,
            vec![input("bloom_blur", "bloom_blur"), blur_filter()],
        )?
        .with_shader_model(ShaderModel::SM3_0),
    )?;
    let bloom_combine = registry.register_atom(EffectAtom::new(
        "bloom_combine",
        ShaderStage::Fragment,
        BLOOM_COMBINE,
        vec![
            input("scene", "scene"),
            input("bloom", "bloom"),
            variable("bloom_strength", ParamType::Float),
        ],
    )?)?;

    registry.register_effect(names::SHADOW_CASTER, &[transform, shadow_depth])?;
    registry.register_effect(names::LIT, &[transform, lambert, shadow_receive, emissive])?;
    registry.register_effect(names::TEXTURED, &[transform, textured, lambert])?;
    registry.register_effect(names::BRIGHT_PASS, &[screen, bright_pass])?;
    registry.register_effect(names::BLUR_HORIZONTAL, &[screen, blur_horizontal])?;
    registry.register_effect(names::BLUR_VERTICAL, &[screen, blur_vertical])?;
    registry.register_effect(names::COMPOSITE, &[screen, bloom_combine])?;
    log::debug!(
        "EffectRegistry: {} standard atoms, {} standard effects",
        registry.atom_count(),
        registry.effect_count()
    );
    Ok(())
}

impl EffectRegistry {
    /// A registry holding the built-in atoms and effects.
    pub fn with_standard_effects() -> Result<Self, GraphicsError> {
        let mut registry = Self::new();
        register_standard_effects(&mut registry)?;
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_effects_register() {
        let registry = EffectRegistry::with_standard_effects().unwrap();
        assert_eq!(
            registry.effect_names(),
            [
                "blur_horizontal",
                "blur_vertical",
                "bright_pass",
                "composite",
                "lit",
                "shadow_caster",
                "textured"
            ]
        );
        let lit = registry.effect(names::LIT).unwrap();
        assert_eq!(lit.atoms().len(), 4);
        assert_eq!(lit.min_shader_model(), ShaderModel::SM3_0);
    }

    #[test]
    fn test_sources_define_entry_points() {
        let registry = EffectRegistry::with_standard_effects().unwrap();
        for name in registry.effect_names() {
            let effect = registry.effect(name).unwrap();
            for atom in effect.atoms() {
                assert!(
                    atom.source().contains(&format!("fn {}(", atom.entry_point())),
                    "atom '{}' does not define {}",
                    atom.name(),
                    atom.entry_point()
                );
            }
        }
    }
}
