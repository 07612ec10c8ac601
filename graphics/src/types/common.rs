//! Common types shared across the graphics system.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use umbra_core::Color;

/// Back-buffer viewport in pixels.
///
/// Relative-size render targets are computed from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height, or 1.0 for a degenerate viewport.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

bitflags! {
    /// Which surfaces of the bound target a clear touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

impl Default for ClearFlags {
    fn default() -> Self {
        Self::COLOR | Self::DEPTH
    }
}

/// Values written by a clear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearValue {
    pub color: Color,
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValue {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            depth: 1.0,
            stencil: 0,
        }
    }
}

impl ClearValue {
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

/// How a pass combines its draws with what is already in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Overwrite the target.
    #[default]
    Replace,
    /// Add to the target. Passes in this mode never clear color.
    Additive,
}

/// Shader model version, ordered by capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShaderModel {
    pub major: u8,
    pub minor: u8,
}

impl ShaderModel {
    pub const SM2_0: Self = Self::new(2, 0);
    pub const SM3_0: Self = Self::new(3, 0);
    pub const SM4_0: Self = Self::new(4, 0);
    pub const SM5_0: Self = Self::new(5, 0);

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl Default for ShaderModel {
    fn default() -> Self {
        Self::SM2_0
    }
}

impl std::fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_model_ordering() {
        assert!(ShaderModel::SM3_0 < ShaderModel::SM5_0);
        assert!(ShaderModel::new(3, 1) > ShaderModel::SM3_0);
        assert_eq!(ShaderModel::SM5_0.to_string(), "5.0");
    }

    #[test]
    fn test_default_clear() {
        assert!(ClearFlags::default().contains(ClearFlags::COLOR | ClearFlags::DEPTH));
        assert!(!ClearFlags::default().contains(ClearFlags::STENCIL));
        assert_eq!(ClearValue::default().depth, 1.0);
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(Viewport::new(200, 100).aspect_ratio(), 2.0);
        assert_eq!(Viewport::new(200, 0).aspect_ratio(), 1.0);
    }
}
