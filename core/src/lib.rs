//! # Umbra Core
//!
//! Renderer-agnostic building blocks shared by the Umbra crates:
//!
//! - [`math`] - f32 vector/matrix aliases over nalgebra and camera helpers
//! - [`blur`] - gaussian blur kernels for separable post-processing
//! - [`color`] - RGBA colors used for clears and material parameters
//! - [`mesh`] - CPU-side geometry consumed by render operations

pub mod blur;
pub mod color;
pub mod math;
pub mod mesh;

pub use color::Color;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
