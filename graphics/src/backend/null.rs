//! Null GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It answers capability
//! queries from a [`CapabilityProfile`], accounts target memory against an
//! optional budget, and records every command into a [`CommandLog`] so tests
//! can inspect exactly what a procedure asked the GPU to do.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::DeviceConfig;
use crate::device::{DeviceCapabilities, FormatSupport};
use crate::error::GraphicsError;
use crate::types::{
    Attachment, BlendMode, ClearFlags, ClearValue, RenderTargetDescriptor, ShaderModel,
    TextureFormat,
};

use super::{BackBuffer, DrawCall, GpuBackend, GpuSurface, SurfaceBinding};

/// Capability set the null backend pretends to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityProfile {
    /// Direct3D 9 class hardware.
    Legacy,
    /// Direct3D 11 class hardware.
    #[default]
    Modern,
}

impl CapabilityProfile {
    /// Build the capability table for this profile.
    pub fn capabilities(&self) -> DeviceCapabilities {
        match self {
            Self::Legacy => {
                let msaa = vec![1, 2, 4];
                let color_formats = [
                    TextureFormat::R8Unorm,
                    TextureFormat::Rgba8Unorm,
                    TextureFormat::Rgba8UnormSrgb,
                    TextureFormat::Bgra8Unorm,
                    TextureFormat::Rgb10a2Unorm,
                    TextureFormat::R16Float,
                    TextureFormat::R32Float,
                    TextureFormat::Rg16Float,
                    TextureFormat::Rgba16Float,
                    TextureFormat::Rgba32Float,
                ]
                .into_iter()
                .map(|format| FormatSupport {
                    format,
                    // no multisampled float color on this class of hardware
                    sample_counts: if format.is_float() { vec![1] } else { msaa.clone() },
                })
                .collect();
                let depth_formats = [TextureFormat::Depth16Unorm, TextureFormat::Depth24PlusStencil8]
                    .into_iter()
                    .map(|format| FormatSupport {
                        format,
                        sample_counts: msaa.clone(),
                    })
                    .collect();
                DeviceCapabilities {
                    color_formats,
                    depth_formats,
                    max_simultaneous_targets: 4,
                    shader_model: ShaderModel::SM3_0,
                    max_texture_dimension: 4096,
                }
            }
            Self::Modern => {
                let (depth, color): (Vec<_>, Vec<_>) = TextureFormat::ALL
                    .into_iter()
                    .map(|format| FormatSupport {
                        format,
                        sample_counts: vec![1, 2, 4, 8],
                    })
                    .partition(|s| s.format.is_depth_stencil());
                DeviceCapabilities {
                    color_formats: color,
                    depth_formats: depth,
                    max_simultaneous_targets: 8,
                    shader_model: ShaderModel::SM5_0,
                    max_texture_dimension: 16384,
                }
            }
        }
    }
}

/// One command received by the null backend.
#[derive(Debug, Clone, PartialEq)]
pub enum NullCommand {
    CreateSurface {
        label: String,
        bytes: u64,
    },
    ReleaseSurface {
        label: String,
    },
    BeginFrame,
    EndFrame,
    /// `None` is the back buffer.
    Bind {
        target: Option<String>,
    },
    Clear {
        target: Option<String>,
        flags: ClearFlags,
    },
    Draw {
        target: Option<String>,
        effect: String,
        atoms: Vec<String>,
        /// (parameter, owning target, attachment)
        textures: Vec<(String, String, Attachment)>,
        blend: BlendMode,
        vertices: u32,
        primitives: u32,
    },
}

/// Shared, append-only record of null backend commands.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<NullCommand>>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, command: NullCommand) {
        self.commands.lock().push(command);
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<NullCommand> {
        self.commands.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    /// Draw commands only.
    pub fn draws(&self) -> Vec<NullCommand> {
        self.commands
            .lock()
            .iter()
            .filter(|c| matches!(c, NullCommand::Draw { .. }))
            .cloned()
            .collect()
    }

    /// Number of recorded bind commands.
    pub fn bind_count(&self) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| matches!(c, NullCommand::Bind { .. }))
            .count()
    }
}

#[derive(Debug)]
struct NullSurface {
    label: String,
    bytes: u64,
}

/// Null GPU backend.
#[derive(Debug)]
pub struct NullBackend {
    profile: CapabilityProfile,
    capabilities: DeviceCapabilities,
    back_buffer: BackBuffer,
    memory_budget: Option<u64>,
    surfaces: HashMap<u64, NullSurface>,
    next_id: u64,
    refused: HashSet<String>,
    bound: Option<String>,
    log: CommandLog,
}

impl NullBackend {
    /// Create a null backend with a 1280x720 back buffer.
    pub fn new(profile: CapabilityProfile) -> Self {
        Self {
            profile,
            capabilities: profile.capabilities(),
            back_buffer: BackBuffer {
                width: 1280,
                height: 720,
                color_format: TextureFormat::Bgra8Unorm,
                depth_format: Some(TextureFormat::Depth24PlusStencil8),
            },
            memory_budget: None,
            surfaces: HashMap::new(),
            next_id: 1,
            refused: HashSet::new(),
            bound: None,
            log: CommandLog::new(),
        }
    }

    /// Create a null backend from a device configuration.
    pub fn from_config(config: &DeviceConfig) -> Self {
        let mut backend = Self::new(config.profile).with_back_buffer(BackBuffer {
            width: config.width,
            height: config.height,
            color_format: config.color_format,
            depth_format: config.depth_format,
        });
        backend.memory_budget = config.memory_budget;
        backend
    }

    pub fn with_back_buffer(mut self, back_buffer: BackBuffer) -> Self {
        self.back_buffer = back_buffer;
        self
    }

    /// Limit total render target memory to `bytes`.
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Refuse to bind any target with this label.
    pub fn with_refused_target(mut self, label: impl Into<String>) -> Self {
        self.refused.insert(label.into());
        self
    }

    pub fn profile(&self) -> CapabilityProfile {
        self.profile
    }

    /// Handle to the command log. Clones share the same log.
    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Bytes currently held by live surfaces.
    pub fn memory_used(&self) -> u64 {
        self.surfaces.values().map(|s| s.bytes).sum()
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new(CapabilityProfile::default())
    }
}

impl GpuBackend for NullBackend {
    fn name(&self) -> &'static str {
        "Null"
    }

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn back_buffer(&self) -> BackBuffer {
        self.back_buffer
    }

    fn resize_back_buffer(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        log::trace!("NullBackend: resizing back buffer to {width}x{height}");
        self.back_buffer.width = width;
        self.back_buffer.height = height;
        Ok(())
    }

    fn create_surface(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<GpuSurface, GraphicsError> {
        let bytes = descriptor.byte_cost();
        if let Some(budget) = self.memory_budget {
            let available = budget.saturating_sub(self.memory_used());
            if bytes > available {
                return Err(GraphicsError::OutOfDeviceMemory {
                    requested: bytes,
                    available,
                });
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let label = descriptor.label.clone().unwrap_or_default();
        log::trace!(
            "NullBackend: creating surface {:?} ({}x{}, {} bytes)",
            label,
            descriptor.width,
            descriptor.height,
            bytes
        );
        self.log.record(NullCommand::CreateSurface {
            label: label.clone(),
            bytes,
        });
        self.surfaces.insert(id, NullSurface { label, bytes });
        Ok(GpuSurface::Null { id })
    }

    fn release_surface(&mut self, surface: GpuSurface) {
        #[allow(irrefutable_let_patterns)]
        let GpuSurface::Null { id } = surface else {
            log::warn!("NullBackend: asked to release a foreign surface");
            return;
        };
        if let Some(s) = self.surfaces.remove(&id) {
            log::trace!("NullBackend: releasing surface {:?}", s.label);
            self.log.record(NullCommand::ReleaseSurface { label: s.label });
        }
    }

    fn begin_frame(&mut self) -> Result<(), GraphicsError> {
        self.log.record(NullCommand::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GraphicsError> {
        self.log.record(NullCommand::EndFrame);
        Ok(())
    }

    fn bind(&mut self, binding: SurfaceBinding<'_>) -> Result<(), GraphicsError> {
        let target = match binding {
            SurfaceBinding::BackBuffer => None,
            SurfaceBinding::Target { label, .. } => {
                if self.refused.contains(label) {
                    return Err(GraphicsError::BindFailed {
                        target: label.to_string(),
                        reason: "refused by null backend".into(),
                    });
                }
                Some(label.to_string())
            }
        };
        log::trace!("NullBackend: bind {:?}", target);
        self.log.record(NullCommand::Bind {
            target: target.clone(),
        });
        self.bound = target;
        Ok(())
    }

    fn clear(&mut self, flags: ClearFlags, _value: &ClearValue) -> Result<(), GraphicsError> {
        log::trace!("NullBackend: clear {:?} on {:?}", flags, self.bound);
        self.log.record(NullCommand::Clear {
            target: self.bound.clone(),
            flags,
        });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), GraphicsError> {
        log::trace!(
            "NullBackend: draw '{}' with {} atoms into {:?}",
            call.effect,
            call.atoms.len(),
            self.bound
        );
        self.log.record(NullCommand::Draw {
            target: self.bound.clone(),
            effect: call.effect.to_string(),
            atoms: call.atoms.iter().map(|a| a.name().to_string()).collect(),
            textures: call
                .textures
                .iter()
                .map(|t| (t.name.to_string(), t.target.to_string(), t.attachment))
                .collect(),
            blend: call.blend,
            vertices: call.geometry.vertex_count(),
            primitives: call.geometry.primitive_count(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_profile_rejects_float_msaa() {
        let caps = CapabilityProfile::Legacy.capabilities();
        assert!(caps.supports_render_target(1, TextureFormat::Rgba16Float, None));
        assert!(!caps.supports_render_target(2, TextureFormat::Rgba16Float, None));
        assert!(caps.supports_render_target(4, TextureFormat::Rgba8Unorm, None));
        assert!(!caps.supports_render_target(8, TextureFormat::Rgba8Unorm, None));
        assert!(!caps.supports_render_target(
            1,
            TextureFormat::Rgba8Unorm,
            Some(TextureFormat::Depth32Float)
        ));
    }

    #[test]
    fn test_modern_profile_supports_everything() {
        let caps = CapabilityProfile::Modern.capabilities();
        for format in TextureFormat::ALL.into_iter().filter(|f| !f.is_depth_stencil()) {
            assert!(caps.supports_render_target(8, format, Some(TextureFormat::Depth32Float)));
        }
    }

    #[test]
    fn test_budget() {
        let mut backend = NullBackend::new(CapabilityProfile::Modern).with_memory_budget(100);
        let desc = RenderTargetDescriptor::new(4, 4, TextureFormat::Rgba8Unorm);
        let surface = backend.create_surface(&desc).unwrap();
        assert_eq!(backend.memory_used(), 64);
        assert!(matches!(
            backend.create_surface(&desc),
            Err(GraphicsError::OutOfDeviceMemory {
                requested: 64,
                available: 36
            })
        ));
        backend.release_surface(surface);
        assert_eq!(backend.memory_used(), 0);
        assert!(backend.create_surface(&desc).is_ok());
    }

    #[test]
    fn test_refused_bind() {
        let mut backend = NullBackend::default().with_refused_target("shadow");
        let desc = RenderTargetDescriptor::new(4, 4, TextureFormat::Rgba8Unorm).with_label("shadow");
        let surface = backend.create_surface(&desc).unwrap();
        let result = backend.bind(SurfaceBinding::Target {
            label: "shadow",
            descriptor: &desc,
            surface: &surface,
        });
        assert!(matches!(result, Err(GraphicsError::BindFailed { .. })));
        assert!(backend.bind(SurfaceBinding::BackBuffer).is_ok());
    }

    #[test]
    fn test_command_log_is_shared() {
        let mut backend = NullBackend::default();
        let log = backend.command_log();
        backend.bind(SurfaceBinding::BackBuffer).unwrap();
        backend
            .clear(ClearFlags::COLOR, &ClearValue::default())
            .unwrap();
        assert_eq!(
            log.snapshot(),
            vec![
                NullCommand::Bind { target: None },
                NullCommand::Clear {
                    target: None,
                    flags: ClearFlags::COLOR
                }
            ]
        );
        assert_eq!(log.bind_count(), 1);
    }
}
