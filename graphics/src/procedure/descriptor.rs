//! Declarative, serde-loadable form of a scene procedure.
//!
//! ```ron
//! ProcedureDescriptor(
//!     name: "shadowed",
//!     targets: [
//!         TargetDecl(name: "shadow", size: Absolute(width: 1024, height: 1024),
//!                    color_format: R32Float, depth_format: Some(Depth24Plus)),
//!     ],
//!     passes: [
//!         PassDecl(name: "shadow", output: Target("shadow"), camera: 1,
//!                  kind: Scene(effect_override: Some("shadow_caster"))),
//!         PassDecl(name: "main", reads: [PassInput(target: "shadow")],
//!                  kind: Scene()),
//!     ],
//! )
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use umbra_core::blur::GaussBlurFilter;
use umbra_core::math::{Mat4, Vec2, Vec3, Vec4};

use crate::effects::ParamValue;
use crate::scene::Renderable;
use crate::types::{
    Attachment, BlendMode, ClearFlags, ClearValue, RenderTargetDescriptor, TextureFormat,
    Viewport,
};

/// Size of a procedure target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetSize {
    Absolute { width: u32, height: u32 },
    /// Fraction of the back-buffer viewport, rounded to the nearest pixel.
    Relative { width_scale: f32, height_scale: f32 },
}

impl Default for TargetSize {
    fn default() -> Self {
        Self::Relative {
            width_scale: 1.0,
            height_scale: 1.0,
        }
    }
}

impl TargetSize {
    /// Pixel size for a viewport. Never smaller than 1x1.
    pub fn resolve(&self, viewport: Viewport) -> (u32, u32) {
        match *self {
            Self::Absolute { width, height } => (width.max(1), height.max(1)),
            Self::Relative {
                width_scale,
                height_scale,
            } => (
                ((viewport.width as f32 * width_scale).round() as u32).max(1),
                ((viewport.height as f32 * height_scale).round() as u32).max(1),
            ),
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, Self::Relative { .. })
    }
}

fn one() -> u32 {
    1
}

/// A render target owned by a procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDecl {
    pub name: String,
    #[serde(default)]
    pub size: TargetSize,
    #[serde(default)]
    pub color_format: TextureFormat,
    #[serde(default)]
    pub depth_format: Option<TextureFormat>,
    #[serde(default = "one")]
    pub sample_count: u32,
}

impl TargetDecl {
    pub fn new(name: impl Into<String>, size: TargetSize, color_format: TextureFormat) -> Self {
        Self {
            name: name.into(),
            size,
            color_format,
            depth_format: None,
            sample_count: 1,
        }
    }

    pub fn with_depth(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    pub fn with_samples(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Device descriptor for the current viewport.
    pub fn descriptor(&self, viewport: Viewport) -> RenderTargetDescriptor {
        let (width, height) = self.size.resolve(viewport);
        let mut desc = RenderTargetDescriptor::new(width, height, self.color_format)
            .with_samples(self.sample_count)
            .with_label(self.name.clone());
        if let Some(depth) = self.depth_format {
            desc = desc.with_depth(depth);
        }
        desc
    }
}

/// Initial value of a procedure variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VariableValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    /// Column-major.
    Matrix([[f32; 4]; 4]),
    /// Gaussian kernel for a map of `size`. Relative sizes follow the
    /// viewport like relative targets do.
    GaussBlur {
        sample_count: u32,
        blur_amount: f32,
        size: TargetSize,
    },
}

impl VariableValue {
    /// The parameter value for the current viewport.
    pub fn resolve(&self, viewport: Viewport) -> ParamValue {
        match *self {
            Self::Float(v) => ParamValue::Float(v),
            Self::Int(v) => ParamValue::Int(v),
            Self::Bool(v) => ParamValue::Bool(v),
            Self::Vector2(v) => ParamValue::Vector2(Vec2::from(v)),
            Self::Vector3(v) => ParamValue::Vector3(Vec3::from(v)),
            Self::Vector4(v) => ParamValue::Vector4(Vec4::from(v)),
            Self::Matrix(cols) => ParamValue::Matrix(Mat4::from_fn(|r, c| cols[c][r])),
            Self::GaussBlur {
                sample_count,
                blur_amount,
                size,
            } => {
                let (width, height) = size.resolve(viewport);
                ParamValue::BlurFilter(GaussBlurFilter::new(
                    sample_count,
                    blur_amount,
                    width,
                    height,
                ))
            }
        }
    }

    /// Map size of a viewport-relative blur kernel.
    pub fn relative_size(&self) -> Option<TargetSize> {
        match self {
            Self::GaussBlur { size, .. } if size.is_relative() => Some(*size),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub value: VariableValue,
}

/// Where a pass renders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PassOutput {
    #[default]
    BackBuffer,
    /// A target declared by the procedure.
    Target(String),
}

/// A texture a pass samples from an earlier pass's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassInput {
    pub target: String,
    #[serde(default)]
    pub attachment: Attachment,
}

impl PassInput {
    pub fn color(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attachment: Attachment::Color,
        }
    }

    pub fn depth(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attachment: Attachment::Depth,
        }
    }
}

/// What a pass clears before drawing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClearConfig {
    #[serde(default)]
    pub flags: ClearFlags,
    #[serde(default)]
    pub value: ClearValue,
}

/// Runtime gate of a pass, evaluated at the start of the pass.
///
/// A pass whose condition is false is skipped entirely: it neither binds
/// nor clears its output, and later passes reading that output see it as
/// unbound for this frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassCondition {
    /// A procedure variable. `Bool` is used as is and `Int` is true when
    /// non-zero; a missing variable or any other type is false.
    Variable(String),
    /// True when any renderable handed to `invoke` has selector bit `n`.
    VisibleTo(u32),
    Not(Box<PassCondition>),
    /// True when every condition is. An empty list is true.
    All(Vec<PassCondition>),
    /// True when any condition is. An empty list is false.
    Any(Vec<PassCondition>),
}

impl PassCondition {
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Negate this condition.
    pub fn negated(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn evaluate(
        &self,
        variables: &HashMap<String, ParamValue>,
        renderables: &[&dyn Renderable],
    ) -> bool {
        match self {
            Self::Variable(name) => match variables.get(name) {
                Some(ParamValue::Bool(v)) => *v,
                Some(ParamValue::Int(v)) => *v != 0,
                Some(other) => {
                    log::debug!(
                        "Pass condition: variable '{name}' is {:?}, not a flag",
                        other.ty()
                    );
                    false
                }
                None => false,
            },
            Self::VisibleTo(bit) => renderables
                .iter()
                .any(|r| *bit < u64::BITS && r.selector_mask() & (1u64 << *bit) != 0),
            Self::Not(inner) => !inner.evaluate(variables, renderables),
            Self::All(all) => all.iter().all(|c| c.evaluate(variables, renderables)),
            Self::Any(any) => any.iter().any(|c| c.evaluate(variables, renderables)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PassKindDecl {
    /// Draw the renderables picked by `selector` (all when absent).
    Scene {
        #[serde(default)]
        selector: Option<u32>,
        /// Effect used instead of each render operation's own.
        #[serde(default)]
        effect_override: Option<String>,
        #[serde(default)]
        lod: u32,
    },
    /// Draw a fullscreen quad with `effect`.
    Quad { effect: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassDecl {
    pub name: String,
    #[serde(default)]
    pub output: PassOutput,
    #[serde(default)]
    pub reads: Vec<PassInput>,
    #[serde(default)]
    pub clear: ClearConfig,
    #[serde(default)]
    pub blend: BlendMode,
    pub kind: PassKindDecl,
    /// Index into the camera list handed to `invoke`.
    #[serde(default)]
    pub camera: usize,
    /// Skip the pass for frames where this is false.
    #[serde(default)]
    pub condition: Option<PassCondition>,
}

/// A complete scene procedure: targets, variables and passes in order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcedureDescriptor {
    pub name: String,
    #[serde(default)]
    pub targets: Vec<TargetDecl>,
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
    #[serde(default)]
    pub passes: Vec<PassDecl>,
}
