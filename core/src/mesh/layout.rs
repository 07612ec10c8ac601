//! Vertex layout definitions.
//!
//! Geometry in Umbra is a single interleaved vertex stream. Layouts are
//! shared via `Arc` since a scene only uses a handful of combinations, and
//! backends key their pipeline caches on the layout contents.

use std::sync::Arc;

/// Semantic meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeSemantic {
    Position,
    Normal,
    Tangent,
    TexCoord0,
    TexCoord1,
    Color,
}

impl VertexAttributeSemantic {
    /// Shader input location for this semantic.
    pub fn location(&self) -> u32 {
        match self {
            Self::Position => 0,
            Self::Normal => 1,
            Self::Tangent => 2,
            Self::TexCoord0 => 3,
            Self::TexCoord1 => 4,
            Self::Color => 5,
        }
    }
}

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeFormat {
    Float,
    Float2,
    Float3,
    Float4,
    /// Four 8-bit unsigned integers normalized to 0.0-1.0.
    Unorm8x4,
}

impl VertexAttributeFormat {
    /// Size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float | Self::Unorm8x4 => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }
}

/// A single vertex attribute inside the interleaved stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub semantic: VertexAttributeSemantic,
    pub format: VertexAttributeFormat,
    /// Byte offset within one vertex.
    pub offset: u32,
}

impl VertexAttribute {
    pub fn new(semantic: VertexAttributeSemantic, format: VertexAttributeFormat, offset: u32) -> Self {
        Self {
            semantic,
            format,
            offset,
        }
    }
}

/// Complete vertex layout: a stride and the attributes packed into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Create an empty layout with the given stride.
    pub fn new(stride: u32) -> Self {
        Self {
            stride,
            attributes: Vec::new(),
        }
    }

    /// Append an attribute.
    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Whether the layout carries the given semantic.
    pub fn has_semantic(&self, semantic: VertexAttributeSemantic) -> bool {
        self.attributes.iter().any(|a| a.semantic == semantic)
    }

    /// Look up the attribute for a semantic.
    pub fn attribute(&self, semantic: VertexAttributeSemantic) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }

    /// Check that every attribute fits inside the stride and no semantic repeats.
    pub fn validate(&self) -> Result<(), String> {
        for (i, attr) in self.attributes.iter().enumerate() {
            if attr.offset + attr.format.size() > self.stride {
                return Err(format!(
                    "attribute {:?} at offset {} overflows stride {}",
                    attr.semantic, attr.offset, self.stride
                ));
            }
            if self.attributes[..i].iter().any(|a| a.semantic == attr.semantic) {
                return Err(format!("semantic {:?} declared twice", attr.semantic));
            }
        }
        Ok(())
    }
}

impl VertexLayout {
    /// Position (float3) + texcoord (float2). 20 bytes.
    pub fn position_uv() -> Arc<Self> {
        Arc::new(
            Self::new(20)
                .with_attribute(VertexAttribute::new(
                    VertexAttributeSemantic::Position,
                    VertexAttributeFormat::Float3,
                    0,
                ))
                .with_attribute(VertexAttribute::new(
                    VertexAttributeSemantic::TexCoord0,
                    VertexAttributeFormat::Float2,
                    12,
                )),
        )
    }

    /// Position (float3) + normal (float3) + texcoord (float2). 32 bytes.
    pub fn position_normal_uv() -> Arc<Self> {
        Arc::new(
            Self::new(32)
                .with_attribute(VertexAttribute::new(
                    VertexAttributeSemantic::Position,
                    VertexAttributeFormat::Float3,
                    0,
                ))
                .with_attribute(VertexAttribute::new(
                    VertexAttributeSemantic::Normal,
                    VertexAttributeFormat::Float3,
                    12,
                ))
                .with_attribute(VertexAttribute::new(
                    VertexAttributeSemantic::TexCoord0,
                    VertexAttributeFormat::Float2,
                    24,
                )),
        )
    }
}
