//! Effect parameters: typed slots bound to engine-level data sources.

use std::fmt;

use serde::{Deserialize, Serialize};
use umbra_core::blur::{GaussBlurFilter, MAX_BLUR_SAMPLES};
use umbra_core::math::{Mat4, Vec2, Vec3, Vec4};

use crate::device::TextureRef;
use crate::types::Attachment;

/// Semantic type of an effect parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Float,
    Int,
    Bool,
    Vector2,
    Vector3,
    Vector4,
    Matrix,
    Texture,
    /// Gaussian kernel: a header slot then one slot per tap.
    BlurFilter,
}

impl ParamType {
    /// Bytes this type occupies in a packed uniform block.
    ///
    /// Every non-matrix value takes one 16-byte slot.
    pub fn uniform_size(&self) -> usize {
        match self {
            Self::Matrix => 64,
            Self::Texture => 0,
            Self::BlurFilter => 16 * (MAX_BLUR_SAMPLES + 1),
            _ => 16,
        }
    }
}

/// Where the value of an effect parameter comes from.
///
/// Matrix and camera sources read the current camera and the world matrix
/// of the render operation being drawn. Light sources read the first
/// directional light of the render context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamSource {
    WorldViewProjection,
    World,
    WorldView,
    View,
    ViewProjection,
    Projection,
    InverseView,
    InverseProjection,
    CameraPosition,
    /// Camera forward direction in world space.
    CameraForward,
    NearPlane,
    FarPlane,
    ViewportSize,
    InverseViewportSize,
    /// Context time wrapped to `[0, 5π)`.
    Time,
    LightDirection,
    LightAmbient,
    LightDiffuse,
    LightSpecular,
    MaterialAmbient,
    MaterialDiffuse,
    MaterialSpecular,
    MaterialEmissive,
    MaterialPower,
    /// Material texture slot (0..16).
    MaterialTexture(u8),
    /// Named custom value on the material.
    MaterialCustom(String),
    /// Named scene procedure variable.
    Variable(String),
    /// Texture published by an earlier pass of the running procedure.
    Input {
        target: String,
        attachment: Attachment,
    },
}

/// Number of material texture slots.
pub const MATERIAL_TEXTURE_SLOTS: u8 = 16;

impl ParamSource {
    /// The type this source always produces, or `None` for sources whose
    /// type is only known when the value is looked up.
    pub fn natural_type(&self) -> Option<ParamType> {
        use ParamSource::*;
        match self {
            WorldViewProjection | World | WorldView | View | ViewProjection | Projection
            | InverseView | InverseProjection => Some(ParamType::Matrix),
            CameraPosition | CameraForward | LightDirection => Some(ParamType::Vector3),
            NearPlane | FarPlane | Time | MaterialPower => Some(ParamType::Float),
            ViewportSize | InverseViewportSize => Some(ParamType::Vector2),
            LightAmbient | LightDiffuse | LightSpecular | MaterialAmbient | MaterialDiffuse
            | MaterialSpecular | MaterialEmissive => Some(ParamType::Vector4),
            MaterialTexture(_) | Input { .. } => Some(ParamType::Texture),
            MaterialCustom(_) | Variable(_) => None,
        }
    }
}

/// A resolved parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    Matrix(Mat4),
    Texture(TextureRef),
    BlurFilter(GaussBlurFilter),
}

impl ParamValue {
    pub fn ty(&self) -> ParamType {
        match self {
            Self::Float(_) => ParamType::Float,
            Self::Int(_) => ParamType::Int,
            Self::Bool(_) => ParamType::Bool,
            Self::Vector2(_) => ParamType::Vector2,
            Self::Vector3(_) => ParamType::Vector3,
            Self::Vector4(_) => ParamType::Vector4,
            Self::Matrix(_) => ParamType::Matrix,
            Self::Texture(_) => ParamType::Texture,
            Self::BlurFilter(_) => ParamType::BlurFilter,
        }
    }

    /// Append this value to a packed uniform block.
    ///
    /// Scalars and vectors are widened to a 16-byte slot. Textures write
    /// nothing. A blur filter writes its tap count, then
    /// `(offset_x.x, offset_y.y, weight, 0)` for every tap slot, unused
    /// slots zeroed.
    pub fn write_uniform(&self, out: &mut Vec<u8>) {
        let mut slot = [0u32; 4];
        match self {
            Self::Float(v) => slot[0] = v.to_bits(),
            Self::Int(v) => slot[0] = *v as u32,
            Self::Bool(v) => slot[0] = *v as u32,
            Self::Vector2(v) => {
                slot[0] = v.x.to_bits();
                slot[1] = v.y.to_bits();
            }
            Self::Vector3(v) => {
                slot[0] = v.x.to_bits();
                slot[1] = v.y.to_bits();
                slot[2] = v.z.to_bits();
            }
            Self::Vector4(v) => {
                for (dst, src) in slot.iter_mut().zip(v.iter()) {
                    *dst = src.to_bits();
                }
            }
            Self::Matrix(m) => {
                out.extend_from_slice(bytemuck::cast_slice(m.as_slice()));
                return;
            }
            Self::Texture(_) => return,
            Self::BlurFilter(filter) => {
                let mut taps = [[0.0f32; 4]; MAX_BLUR_SAMPLES + 1];
                taps[0][0] = filter.sample_count() as f32;
                for (i, weight) in filter.weights().iter().enumerate() {
                    taps[i + 1] = [filter.offset_x(i).x, filter.offset_y(i).y, *weight, 0.0];
                }
                out.extend_from_slice(bytemuck::cast_slice(&taps));
                return;
            }
        }
        out.extend_from_slice(bytemuck::cast_slice(&slot));
    }
}

/// A named, typed parameter declared by an effect atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EffectParameter {
    pub name: String,
    pub ty: ParamType,
    pub source: ParamSource,
}

impl EffectParameter {
    pub fn new(name: impl Into<String>, ty: ParamType, source: ParamSource) -> Self {
        Self {
            name: name.into(),
            ty,
            source,
        }
    }

    /// Declare a parameter with the natural type of its source.
    ///
    /// Sources without a natural type default to [`ParamType::Float`].
    pub fn auto(name: impl Into<String>, source: ParamSource) -> Self {
        let ty = source.natural_type().unwrap_or(ParamType::Float);
        Self::new(name, ty, source)
    }

    /// True when both declarations bind the same data with the same type.
    pub fn same_binding(&self, other: &EffectParameter) -> bool {
        self.ty == other.ty && self.source == other.source
    }
}

impl fmt::Display for EffectParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?} <- {:?}", self.name, self.ty, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_types() {
        assert_eq!(
            ParamSource::WorldViewProjection.natural_type(),
            Some(ParamType::Matrix)
        );
        assert_eq!(
            ParamSource::MaterialTexture(3).natural_type(),
            Some(ParamType::Texture)
        );
        assert_eq!(ParamSource::Variable("exposure".into()).natural_type(), None);
    }

    #[test]
    fn test_auto_declaration() {
        let p = EffectParameter::auto("tr_wvp", ParamSource::WorldViewProjection);
        assert_eq!(p.ty, ParamType::Matrix);
        let p = EffectParameter::auto("exposure", ParamSource::Variable("exposure".into()));
        assert_eq!(p.ty, ParamType::Float);
    }

    #[test]
    fn test_uniform_packing() {
        let mut out = Vec::new();
        ParamValue::Float(1.5).write_uniform(&mut out);
        assert_eq!(out.len(), 16);
        ParamValue::Vector3(Vec3::new(1.0, 2.0, 3.0)).write_uniform(&mut out);
        assert_eq!(out.len(), 32);
        ParamValue::Matrix(Mat4::identity()).write_uniform(&mut out);
        assert_eq!(out.len(), 96);
        assert_eq!(&out[0..4], &1.5f32.to_ne_bytes());
    }

    #[test]
    fn test_blur_filter_packing() {
        let filter = GaussBlurFilter::new(5, 2.0, 100, 50);
        let mut out = Vec::new();
        ParamValue::BlurFilter(filter).write_uniform(&mut out);
        assert_eq!(out.len(), ParamType::BlurFilter.uniform_size());

        let floats: Vec<f32> = out
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(floats[0], 5.0);
        // tap 1: half a texel past the first neighbour, to the right and down
        assert_eq!(floats[4], 1.5 / 100.0);
        assert_eq!(floats[5], 1.5 / 50.0);
        assert_eq!(floats[6], filter.weights()[1]);
        // slots past the last tap stay zero
        assert!(floats[4 * 6..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_same_binding() {
        let a = EffectParameter::auto("world", ParamSource::World);
        let b = EffectParameter::auto("world", ParamSource::World);
        let c = EffectParameter::auto("world", ParamSource::View);
        assert!(a.same_binding(&b));
        assert!(!a.same_binding(&c));
    }
}
