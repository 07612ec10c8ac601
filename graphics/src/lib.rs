//! # Umbra Graphics
//!
//! Backend-neutral render device and multi-pass scene rendering.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderDevice`] - Creates, binds and releases [`RenderTarget`]s and
//!   issues draws through a [`GpuBackend`](backend::GpuBackend)
//! - [`effects`] - Effects composed from shared atoms with typed,
//!   source-bound parameters
//! - [`SceneProcedure`] - Validated pass sequences (shadow map, main pass,
//!   post-processing) run over a scene
//! - Backends: `null` (always available, for tests and headless runs) and
//!   `wgpu` (feature `wgpu-backend`)
//!
//! ## Example
//!
//! ```ignore
//! use umbra_graphics::{Config, DeviceConfig, EffectRegistry, ProcedureDescriptor,
//!                      RenderDevice, SceneProcedure};
//!
//! let mut device = RenderDevice::from_config(&DeviceConfig::default())?;
//! let registry = EffectRegistry::with_standard_effects()?;
//! let descriptor = ProcedureDescriptor::load_from_file("shadow_bloom.ron")?;
//! let procedure = SceneProcedure::load(&mut device, &registry, &descriptor)?;
//!
//! device.begin_frame()?;
//! let report = procedure.invoke(&mut device, &cameras, &renderables, &context)?;
//! device.end_frame()?;
//! ```

pub mod backend;
pub mod config;
pub mod device;
pub mod effects;
pub mod error;
pub mod procedure;
pub mod scene;
pub mod types;

// Re-export main types for convenience
pub use backend::{
    BackBuffer, BackendKind, CapabilityProfile, CommandLog, NullBackend, NullCommand,
};
pub use config::{Config, ConfigError, DeviceConfig};
pub use device::{
    BindTarget, DeviceCapabilities, DrawRequest, FormatSupport, FrameStats, RenderDevice,
    RenderTarget, TargetId, TextureInfo, TextureRef, TextureView,
};
pub use effects::{
    ApplyContext, ApplyReport, AtomId, Effect, EffectAtom, EffectBuilder, EffectParameter,
    EffectRegistry, ParamSource, ParamType, ParamValue, ShaderStage,
};
pub use error::GraphicsError;
pub use procedure::{
    FrameReport, PassCondition, PassInput, PassOutput, ProcedureDescriptor, ProcedureState,
    SceneProcedure, ScenePass, Selector, TargetDecl, TargetSize, VariableValue,
};
pub use scene::{
    Camera, Light, Material, RenderContext, RenderOperation, RenderOperationBuffer, Renderable,
};
pub use types::{
    Attachment, BlendMode, ClearFlags, ClearValue, RenderTargetDescriptor, ShaderModel,
    TextureFormat, Viewport,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version. Call once at startup if you want it in the log.
pub fn init() {
    log::info!("Umbra Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_device_is_null() {
        let device = RenderDevice::from_config(&DeviceConfig::default()).unwrap();
        assert_eq!(device.backend_name(), "Null");
    }
}
