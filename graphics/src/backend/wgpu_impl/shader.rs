//! WGSL composition of effect atoms.
//!
//! An effect is compiled into one module: a fixed preamble, the parameter
//! and texture declarations of the draw, the sources of the applied atoms,
//! and generated `vs_main`/`fs_main` entry points that chain the atoms in
//! effect order.

use std::fmt::Write;

use umbra_core::mesh::{VertexAttributeFormat, VertexAttributeSemantic, VertexLayout};

use crate::effects::{EffectAtom, ParamType, ShaderStage};
use crate::error::GraphicsError;
use crate::types::Attachment;

const PREAMBLE: &str = "\
struct VertexInput {
    position: vec3<f32>,
    normal: vec3<f32>,
    tangent: vec4<f32>,
    uv: vec2<f32>,
    uv1: vec2<f32>,
    color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) world_pos: vec3<f32>,
    @location(3) color: vec4<f32>,
}
";

/// Everything about a draw that shapes its shader module.
#[derive(Debug, Clone, Copy)]
pub struct ShaderInterface<'a> {
    /// Uniform names and types, in uniform block order.
    pub uniforms: &'a [(&'a str, ParamType)],
    /// Sampled textures, in binding order.
    pub textures: &'a [(&'a str, Attachment)],
    pub layout: &'a VertexLayout,
}

/// Build the WGSL module for `atoms` drawn through `interface`.
pub fn compose(atoms: &[&EffectAtom], interface: &ShaderInterface<'_>) -> Result<String, GraphicsError> {
    if !interface.layout.has_semantic(VertexAttributeSemantic::Position) {
        return Err(GraphicsError::DrawFailed(
            "vertex layout has no position attribute".into(),
        ));
    }

    let mut out = String::from(PREAMBLE);
    // Writing into a String cannot fail.
    let _ = write_declarations(&mut out, interface);
    for atom in atoms {
        out.push('\n');
        out.push_str(atom.source());
        out.push('\n');
    }
    let _ = write_vertex_main(&mut out, atoms, interface.layout);
    let _ = write_fragment_main(&mut out, atoms);
    Ok(out)
}

/// Parse and validate a composed module.
pub fn validate(source: &str) -> Result<(), GraphicsError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        GraphicsError::DrawFailed(format!("shader parse error: {}", e.emit_to_string(source)))
    })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| {
        GraphicsError::DrawFailed(format!("shader validation error: {}", e.emit_to_string(source)))
    })?;
    Ok(())
}

// Blur filters declare one header slot plus one slot per tap.
static_assertions::const_assert_eq!(umbra_core::blur::MAX_BLUR_SAMPLES + 1, 16);

fn uniform_type(ty: ParamType) -> &'static str {
    match ty {
        ParamType::Matrix => "mat4x4<f32>",
        ParamType::Int => "vec4<i32>",
        ParamType::Bool => "vec4<u32>",
        ParamType::BlurFilter => "array<vec4<f32>, 16>",
        _ => "vec4<f32>",
    }
}

fn write_declarations(out: &mut String, interface: &ShaderInterface<'_>) -> std::fmt::Result {
    writeln!(out, "\nstruct Params {{")?;
    if interface.uniforms.is_empty() {
        writeln!(out, "    padding: vec4<f32>,")?;
    }
    for (name, ty) in interface.uniforms {
        writeln!(out, "    {name}: {},", uniform_type(*ty))?;
    }
    writeln!(out, "}}\n")?;
    writeln!(out, "@group(0) @binding(0) var<uniform> params: Params;")?;

    for (i, (name, attachment)) in interface.textures.iter().enumerate() {
        let ty = match attachment {
            Attachment::Color => "texture_2d<f32>",
            Attachment::Depth => "texture_depth_2d",
        };
        writeln!(out, "@group(1) @binding({}) var {name}: {ty};", 2 * i)?;
        writeln!(out, "@group(1) @binding({}) var {name}_sampler: sampler;", 2 * i + 1)?;
    }
    Ok(())
}

fn components(format: VertexAttributeFormat) -> usize {
    match format {
        VertexAttributeFormat::Float => 1,
        VertexAttributeFormat::Float2 => 2,
        VertexAttributeFormat::Float3 => 3,
        VertexAttributeFormat::Float4 | VertexAttributeFormat::Unorm8x4 => 4,
    }
}

fn vector_type(n: usize) -> String {
    if n == 1 {
        "f32".to_string()
    } else {
        format!("vec{n}<f32>")
    }
}

/// Convert an `n`-component expression to `to` components. Missing
/// components are zero, except a missing `w` which is one.
fn convert(expr: &str, from: usize, to: usize) -> String {
    match from.cmp(&to) {
        std::cmp::Ordering::Equal => expr.to_string(),
        std::cmp::Ordering::Greater => {
            let swizzle = &"xyzw"[..to];
            if to == 1 {
                format!("{expr}.x")
            } else {
                format!("{expr}.{swizzle}")
            }
        }
        std::cmp::Ordering::Less => {
            let mut args = vec![expr.to_string()];
            for i in from..to {
                args.push(if to == 4 && i == 3 { "1.0" } else { "0.0" }.to_string());
            }
            format!("{}({})", vector_type(to), args.join(", "))
        }
    }
}

fn semantic_field(semantic: VertexAttributeSemantic) -> (&'static str, usize) {
    match semantic {
        VertexAttributeSemantic::Position => ("position", 3),
        VertexAttributeSemantic::Normal => ("normal", 3),
        VertexAttributeSemantic::Tangent => ("tangent", 4),
        VertexAttributeSemantic::TexCoord0 => ("uv", 2),
        VertexAttributeSemantic::TexCoord1 => ("uv1", 2),
        VertexAttributeSemantic::Color => ("color", 4),
    }
}

fn write_vertex_main(
    out: &mut String,
    atoms: &[&EffectAtom],
    layout: &VertexLayout,
) -> std::fmt::Result {
    writeln!(out, "\nstruct RawVertex {{")?;
    for attribute in &layout.attributes {
        let (field, _) = semantic_field(attribute.semantic);
        writeln!(
            out,
            "    @location({}) a_{field}: {},",
            attribute.semantic.location(),
            vector_type(components(attribute.format))
        )?;
    }
    writeln!(out, "}}\n")?;

    writeln!(out, "@vertex\nfn vs_main(raw: RawVertex) -> VertexOutput {{")?;
    writeln!(out, "    var vin: VertexInput;")?;
    writeln!(out, "    vin.normal = vec3<f32>(0.0, 0.0, 1.0);")?;
    writeln!(out, "    vin.tangent = vec4<f32>(1.0, 0.0, 0.0, 1.0);")?;
    writeln!(out, "    vin.color = vec4<f32>(1.0);")?;
    for attribute in &layout.attributes {
        let (field, size) = semantic_field(attribute.semantic);
        let value = convert(&format!("raw.a_{field}"), components(attribute.format), size);
        writeln!(out, "    vin.{field} = {value};")?;
    }
    writeln!(out, "    var vout: VertexOutput;")?;
    writeln!(out, "    vout.clip = vec4<f32>(vin.position, 1.0);")?;
    writeln!(out, "    vout.uv = vin.uv;")?;
    writeln!(out, "    vout.normal = vin.normal;")?;
    writeln!(out, "    vout.world_pos = vin.position;")?;
    writeln!(out, "    vout.color = vin.color;")?;
    for atom in atoms.iter().filter(|a| a.stage() == ShaderStage::Vertex) {
        writeln!(out, "    {}(vin, &vout);", atom.entry_point())?;
    }
    writeln!(out, "    return vout;\n}}")
}

fn write_fragment_main(out: &mut String, atoms: &[&EffectAtom]) -> std::fmt::Result {
    writeln!(
        out,
        "\n@fragment\nfn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {{"
    )?;
    writeln!(out, "    var color = frag.color;")?;
    for atom in atoms.iter().filter(|a| a.stage() == ShaderStage::Fragment) {
        writeln!(out, "    {}(frag, &color);", atom.entry_point())?;
    }
    writeln!(out, "    return color;\n}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectRegistry, library::names};

    fn interface_for(atoms: &[&EffectAtom], layout: &VertexLayout) -> String {
        let mut uniforms: Vec<(&str, ParamType)> = Vec::new();
        let mut textures: Vec<(&str, Attachment)> = Vec::new();
        for atom in atoms {
            for param in atom.params() {
                if param.ty == ParamType::Texture {
                    if !textures.iter().any(|(n, _)| *n == param.name) {
                        textures.push((&param.name, Attachment::Color));
                    }
                } else if !uniforms.iter().any(|(n, _)| *n == param.name) {
                    uniforms.push((&param.name, param.ty));
                }
            }
        }
        compose(
            atoms,
            &ShaderInterface {
                uniforms: &uniforms,
                textures: &textures,
                layout,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_standard_effects_validate() {
        let registry = EffectRegistry::with_standard_effects().unwrap();
        let layout = VertexLayout::position_normal_uv();
        for name in [
            names::SHADOW_CASTER,
            names::LIT,
            names::TEXTURED,
            names::BRIGHT_PASS,
            names::BLUR_HORIZONTAL,
            names::BLUR_VERTICAL,
            names::COMPOSITE,
        ] {
            let effect = registry.effect(name).unwrap();
            let atoms: Vec<&EffectAtom> = effect.atoms().iter().map(|a| a.as_ref()).collect();
            let source = interface_for(&atoms, &layout);
            if let Err(e) = validate(&source) {
                panic!("{name}: {e}\n{source}");
            }
        }
    }

    #[test]
    fn test_partial_effect_validates() {
        // lit without its shadow atom, as drawn when the shadow input is unbound
        let registry = EffectRegistry::with_standard_effects().unwrap();
        let effect = registry.effect(names::LIT).unwrap();
        let atoms: Vec<&EffectAtom> = effect
            .atoms()
            .iter()
            .map(|a| a.as_ref())
            .filter(|a| a.name() != "shadow_receive")
            .collect();
        let source = interface_for(&atoms, &VertexLayout::position_uv());
        assert!(!source.contains("shadow_receive_fragment(frag"));
        validate(&source).unwrap();
    }

    #[test]
    fn test_missing_position_rejected() {
        let layout = VertexLayout::new(8);
        let result = compose(
            &[],
            &ShaderInterface {
                uniforms: &[],
                textures: &[],
                layout: &layout,
            },
        );
        assert!(matches!(result, Err(GraphicsError::DrawFailed(_))));
    }

    #[test]
    fn test_attribute_conversion() {
        assert_eq!(convert("v", 3, 3), "v");
        assert_eq!(convert("v", 4, 2), "v.xy");
        assert_eq!(convert("v", 2, 4), "vec4<f32>(v, 0.0, 1.0)");
        assert_eq!(convert("v", 1, 3), "vec3<f32>(v, 0.0, 0.0)");
    }

    #[test]
    fn test_bad_source_reported() {
        let err = validate("fn broken( {").unwrap_err();
        assert!(matches!(err, GraphicsError::DrawFailed(_)));
    }
}
