//! Effect atoms: indivisible shader fragments and the parameters they declare.

use std::collections::HashSet;

use crate::error::GraphicsError;
use crate::types::ShaderModel;

use super::parameter::{EffectParameter, ParamType};

/// Pipeline stage an atom contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// An indivisible shader fragment.
///
/// Vertex atoms provide `fn <name>_vertex(vin: VertexInput, vout: ptr<function, VertexOutput>)`
/// and fragment atoms provide `fn <name>_fragment(frag: VertexOutput, color: ptr<function, vec4<f32>>)`
/// in WGSL and read their parameters as `params.<name>` (textures as
/// `<name>` plus `<name>_sampler`). Backends that compile shaders chain the
/// functions of the applied atoms in effect order.
///
/// Atoms are immutable once built and are shared between effects by `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectAtom {
    name: String,
    stage: ShaderStage,
    source: String,
    params: Vec<EffectParameter>,
    min_shader_model: ShaderModel,
}

impl EffectAtom {
    /// Create an atom.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] when the name is not a
    /// valid shader identifier, when two parameters share a name, or when a
    /// parameter's declared type disagrees with the fixed type of its source.
    pub fn new(
        name: impl Into<String>,
        stage: ShaderStage,
        source: impl Into<String>,
        params: Vec<EffectParameter>,
    ) -> Result<Self, GraphicsError> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(GraphicsError::InvalidParameter(format!(
                "atom name '{name}' is not a shader identifier"
            )));
        }

        let mut seen = HashSet::new();
        for param in &params {
            if !is_identifier(&param.name) {
                return Err(GraphicsError::InvalidParameter(format!(
                    "atom '{name}': parameter name '{}' is not a shader identifier",
                    param.name
                )));
            }
            if !seen.insert(param.name.as_str()) {
                return Err(GraphicsError::InvalidParameter(format!(
                    "atom '{name}' declares parameter '{}' twice",
                    param.name
                )));
            }
            if let Some(natural) = param.source.natural_type()
                && natural != param.ty
            {
                return Err(GraphicsError::InvalidParameter(format!(
                    "atom '{name}': parameter '{}' declared {:?} but {:?} produces {:?}",
                    param.name, param.ty, param.source, natural
                )));
            }
            if param.ty == ParamType::Texture && param.source.natural_type().is_none() {
                return Err(GraphicsError::InvalidParameter(format!(
                    "atom '{name}': texture parameter '{}' must bind a texture source",
                    param.name
                )));
            }
        }

        Ok(Self {
            name,
            stage,
            source: source.into(),
            params,
            min_shader_model: ShaderModel::default(),
        })
    }

    /// Set the minimum shader model this atom needs.
    pub fn with_shader_model(mut self, model: ShaderModel) -> Self {
        self.min_shader_model = model;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// WGSL source of the atom's stage function.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn params(&self) -> &[EffectParameter] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&EffectParameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn min_shader_model(&self) -> ShaderModel {
        self.min_shader_model
    }

    /// Name of the WGSL function this atom provides.
    pub fn entry_point(&self) -> String {
        match self.stage {
            ShaderStage::Vertex => format!("{}_vertex", self.name),
            ShaderStage::Fragment => format!("{}_fragment", self.name),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
