//! GPU backend abstraction layer.
//!
//! Every backend implements [`GpuBackend`], which is the only thing
//! [`RenderDevice`](crate::device::RenderDevice) talks to. Backend handles
//! travel across the boundary as the closed [`GpuSurface`] enum, so callers
//! never see a backend-specific type.
//!
//! # Available Backends
//!
//! - `null` (always built): no GPU work; capability profiles, a memory
//!   budget and a command log make it the backend for tests
//! - `wgpu-backend`: offscreen rendering through wgpu

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;
#[cfg(feature = "wgpu-backend")]
mod wgpu_impl;

pub mod null;

use serde::{Deserialize, Serialize};
use umbra_core::mesh::GeometryData;

use crate::config::DeviceConfig;
use crate::device::DeviceCapabilities;
use crate::effects::{EffectAtom, ParamValue};
use crate::error::GraphicsError;
use crate::types::{
    Attachment, BlendMode, ClearFlags, ClearValue, RenderTargetDescriptor, TextureFormat,
};

pub use null::{CapabilityProfile, CommandLog, NullBackend, NullCommand};

/// Which backend a device should be created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Null,
    Wgpu,
}

/// Backend-side storage of a render target.
#[derive(Clone)]
pub enum GpuSurface {
    /// Null backend (no GPU allocation)
    Null { id: u64 },
    /// wgpu backend textures
    #[cfg(feature = "wgpu-backend")]
    Wgpu(std::sync::Arc<wgpu_backend::WgpuSurface>),
}

impl std::fmt::Debug for GpuSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null { id } => f.debug_struct("GpuSurface::Null").field("id", id).finish(),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(surface) => f
                .debug_struct("GpuSurface::Wgpu")
                .field("sample_count", &surface.sample_count)
                .finish_non_exhaustive(),
        }
    }
}

/// Dimensions and formats of a backend's default back buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackBuffer {
    pub width: u32,
    pub height: u32,
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
}

/// What a backend should render into next.
#[derive(Debug, Clone, Copy)]
pub enum SurfaceBinding<'a> {
    BackBuffer,
    Target {
        label: &'a str,
        descriptor: &'a RenderTargetDescriptor,
        surface: &'a GpuSurface,
    },
}

/// A render target texture bound to an effect parameter for one draw.
#[derive(Debug, Clone, Copy)]
pub struct BoundTexture<'a> {
    /// Parameter name the shader reads it through.
    pub name: &'a str,
    /// Label of the target that owns the texture.
    pub target: &'a str,
    pub attachment: Attachment,
    pub surface: &'a GpuSurface,
}

/// One fully resolved draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub effect: &'a str,
    /// Atoms whose parameters resolved, in effect order.
    pub atoms: &'a [&'a EffectAtom],
    /// Non-texture parameter values, one per name.
    pub uniforms: &'a [(&'a str, ParamValue)],
    pub textures: &'a [BoundTexture<'a>],
    pub geometry: &'a GeometryData,
    pub blend: BlendMode,
}

/// GPU backend trait for abstracting different GPU APIs.
///
/// A backend is driven from the single thread that owns its device.
pub trait GpuBackend: Send + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Render target capabilities of the underlying device.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Current back buffer description.
    fn back_buffer(&self) -> BackBuffer;

    /// Recreate the back buffer at a new size.
    fn resize_back_buffer(&mut self, width: u32, height: u32) -> Result<(), GraphicsError>;

    /// Allocate storage for a render target.
    fn create_surface(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<GpuSurface, GraphicsError>;

    /// Free a render target's storage.
    fn release_surface(&mut self, surface: GpuSurface);

    fn begin_frame(&mut self) -> Result<(), GraphicsError>;

    /// Finish the frame and submit recorded work.
    fn end_frame(&mut self) -> Result<(), GraphicsError>;

    /// Direct subsequent clears and draws at `binding`.
    fn bind(&mut self, binding: SurfaceBinding<'_>) -> Result<(), GraphicsError>;

    /// Clear the bound surface.
    fn clear(&mut self, flags: ClearFlags, value: &ClearValue) -> Result<(), GraphicsError>;

    /// Issue a draw into the bound surface.
    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), GraphicsError>;
}

/// Create the backend requested by `config`.
///
/// A wgpu request falls back to the null backend when no adapter is
/// available or the `wgpu-backend` feature is disabled.
pub fn create_backend(config: &DeviceConfig) -> Result<Box<dyn GpuBackend>, GraphicsError> {
    match config.backend {
        BackendKind::Null => {
            log::info!("Using null backend ({:?} profile)", config.profile);
            Ok(Box::new(NullBackend::from_config(config)))
        }
        BackendKind::Wgpu => {
            #[cfg(feature = "wgpu-backend")]
            {
                match wgpu_backend::WgpuBackend::new(config) {
                    Ok(backend) => {
                        log::info!("Using wgpu backend");
                        return Ok(Box::new(backend));
                    }
                    Err(e) => {
                        log::warn!("Failed to create wgpu backend: {}", e);
                    }
                }
            }
            #[cfg(not(feature = "wgpu-backend"))]
            log::warn!("wgpu backend requested but the wgpu-backend feature is disabled");

            log::info!("Falling back to null backend");
            Ok(Box::new(NullBackend::from_config(config)))
        }
    }
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "wgpu-backend")
}
