//! Texture formats and render target descriptors.

use serde::{Deserialize, Serialize};

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TextureFormat {
    // 8-bit formats
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,

    // 16-bit formats
    /// 16-bit red channel, float.
    R16Float,

    // 32-bit formats
    /// 32-bit red channel, float.
    R32Float,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 10-bit RGB with 2-bit alpha, unsigned normalized.
    Rgb10a2Unorm,

    // 64-bit formats
    /// 16-bit RGBA channels, float.
    Rgba16Float,

    // 128-bit formats
    /// 32-bit RGBA channels, float.
    Rgba32Float,

    // Depth/stencil formats
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth.
    Depth24Plus,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
}

impl TextureFormat {
    /// Every format the engine knows about.
    pub const ALL: [TextureFormat; 14] = [
        Self::R8Unorm,
        Self::R16Float,
        Self::R32Float,
        Self::Rg16Float,
        Self::Rgba8Unorm,
        Self::Rgba8UnormSrgb,
        Self::Bgra8Unorm,
        Self::Rgb10a2Unorm,
        Self::Rgba16Float,
        Self::Rgba32Float,
        Self::Depth16Unorm,
        Self::Depth24Plus,
        Self::Depth24PlusStencil8,
        Self::Depth32Float,
    ];

    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm | Self::Depth24Plus | Self::Depth24PlusStencil8 | Self::Depth32Float
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }

    /// Returns true for floating point color formats.
    pub fn is_float(&self) -> bool {
        matches!(
            self,
            Self::R16Float | Self::R32Float | Self::Rg16Float | Self::Rgba16Float | Self::Rgba32Float
        )
    }

    /// Returns the size in bytes per pixel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Rgb10a2Unorm
            | Self::Depth24Plus
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// Which surface of a render target a texture handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Attachment {
    #[default]
    Color,
    Depth,
}

/// Descriptor for creating a render target.
///
/// Dimensions and formats are fixed once the target exists. Resizing means
/// creating a new target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTargetDescriptor {
    /// Debug label, also used to name the target in logs and errors.
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub color_format: TextureFormat,
    /// Depth buffer format. `None` creates a depth-less target.
    pub depth_format: Option<TextureFormat>,
    pub sample_count: u32,
}

impl RenderTargetDescriptor {
    /// Create a single-sampled, depth-less target descriptor.
    pub fn new(width: u32, height: u32, color_format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            color_format,
            depth_format: None,
            sample_count: 1,
        }
    }

    /// Attach a depth buffer.
    pub fn with_depth(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    /// Set the multisample count.
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.sample_count = samples;
        self
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Bytes of device memory this target occupies.
    ///
    /// Multisampled color needs a single-sampled resolve copy on top of the
    /// sample storage.
    pub fn byte_cost(&self) -> u64 {
        let pixels = self.width as u64 * self.height as u64;
        let samples = self.sample_count.max(1) as u64;
        let color = self.color_format.block_size() as u64;
        let resolve = if samples > 1 { color } else { 0 };
        let depth = self.depth_format.map_or(0, |f| f.block_size() as u64);
        pixels * (color * samples + resolve + depth * samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_classification() {
        for format in TextureFormat::ALL {
            assert_eq!(
                format.is_depth_stencil(),
                matches!(
                    format,
                    TextureFormat::Depth16Unorm
                        | TextureFormat::Depth24Plus
                        | TextureFormat::Depth24PlusStencil8
                        | TextureFormat::Depth32Float
                )
            );
            assert!(!(format.is_depth_stencil() && format.is_float()));
        }
    }

    #[test]
    fn test_byte_cost() {
        let desc = RenderTargetDescriptor::new(4, 4, TextureFormat::Rgba8Unorm);
        assert_eq!(desc.byte_cost(), 64);

        let desc = desc.with_depth(TextureFormat::Depth32Float);
        assert_eq!(desc.byte_cost(), 128);

        // 4x MSAA: 4 color samples + resolve + 4 depth samples
        let desc = desc.with_samples(4);
        assert_eq!(desc.byte_cost(), 16 * (16 + 4 + 16));
    }
}
