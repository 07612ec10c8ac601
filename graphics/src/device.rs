//! Render device and render targets.
//!
//! The [`RenderDevice`] owns a backend and every [`RenderTarget`] created
//! through it. Targets are addressed by [`TargetId`]; borrowing a target
//! yields [`TextureView`]s that cannot outlive it.
//!
//! # Example
//!
//! ```ignore
//! let mut device = RenderDevice::from_config(&DeviceConfig::default())?;
//! let shadow = device.create_render_target(
//!     &RenderTargetDescriptor::new(1024, 1024, TextureFormat::R32Float)
//!         .with_depth(TextureFormat::Depth24PlusStencil8)
//!         .with_label("shadow"),
//! )?;
//! device.bind_render_target(BindTarget::Target(shadow))?;
//! device.clear(ClearFlags::COLOR | ClearFlags::DEPTH, &ClearValue::default())?;
//! device.bind_render_target(BindTarget::BackBuffer)?;
//! ```

use std::cell::OnceCell;

use slotmap::{SlotMap, new_key_type};
use umbra_core::mesh::GeometryData;

use crate::backend::{self, BoundTexture, DrawCall, GpuBackend, GpuSurface, SurfaceBinding};
use crate::config::DeviceConfig;
use crate::effects::{EffectAtom, ParamValue};
use crate::error::GraphicsError;
use crate::types::{
    Attachment, BlendMode, ClearFlags, ClearValue, RenderTargetDescriptor, ShaderModel,
    TextureFormat, Viewport,
};

new_key_type! {
    /// Stable handle to a render target owned by a [`RenderDevice`].
    pub struct TargetId;
}

/// Sample counts a backend supports for one format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSupport {
    pub format: TextureFormat,
    pub sample_counts: Vec<u32>,
}

/// Render target capabilities of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Renderable color formats.
    pub color_formats: Vec<FormatSupport>,
    /// Usable depth buffer formats.
    pub depth_formats: Vec<FormatSupport>,
    /// Maximum number of simultaneously bound color targets.
    pub max_simultaneous_targets: u32,
    /// Highest shader model the device runs.
    pub shader_model: ShaderModel,
    /// Maximum render target width or height.
    pub max_texture_dimension: u32,
}

impl DeviceCapabilities {
    fn sample_counts(&self, format: TextureFormat) -> &[u32] {
        let table = if format.is_depth_stencil() {
            &self.depth_formats
        } else {
            &self.color_formats
        };
        table
            .iter()
            .find(|s| s.format == format)
            .map_or(&[], |s| s.sample_counts.as_slice())
    }

    /// Whether a target with this format/sample combination can be created.
    pub fn supports_render_target(
        &self,
        samples: u32,
        color: TextureFormat,
        depth: Option<TextureFormat>,
    ) -> bool {
        self.multisample_counts(color, depth).contains(&samples)
    }

    /// Every sample count usable with this color/depth pair, ascending.
    pub fn multisample_counts(&self, color: TextureFormat, depth: Option<TextureFormat>) -> Vec<u32> {
        if color.is_depth_stencil() || depth.is_some_and(|d| !d.is_depth_stencil()) {
            return Vec::new();
        }
        let mut counts: Vec<u32> = self
            .sample_counts(color)
            .iter()
            .copied()
            .filter(|n| depth.is_none_or(|d| self.sample_counts(d).contains(n)))
            .collect();
        counts.sort_unstable();
        counts.dedup();
        counts
    }

    /// The supported sample count nearest to `requested`. Ties go to the
    /// lower count.
    pub fn closest_multisample_count(
        &self,
        requested: u32,
        color: TextureFormat,
        depth: Option<TextureFormat>,
    ) -> Option<u32> {
        self.multisample_counts(color, depth)
            .into_iter()
            .min_by_key(|n| (n.abs_diff(requested), *n))
    }

    pub fn max_simultaneous_targets(&self) -> u32 {
        self.max_simultaneous_targets
    }

    pub fn supports_shader_model(&self, major: u8, minor: u8) -> bool {
        self.shader_model >= ShaderModel::new(major, minor)
    }
}

/// What draw calls render into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindTarget {
    /// The device's default back buffer.
    #[default]
    BackBuffer,
    Target(TargetId),
}

/// Weak reference to one surface of a render target.
///
/// Unlike [`TextureView`] this is not borrow-bound, so it can be stored in
/// materials and resolved at draw time. A reference to a released target
/// simply fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRef {
    pub target: TargetId,
    pub attachment: Attachment,
}

/// Description of a target texture, created on first access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub attachment: Attachment,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub sample_count: u32,
}

/// Read-only handle to a render target texture.
///
/// Borrows the owning target, so it cannot be used after the target is
/// released.
#[derive(Debug, Clone, Copy)]
pub struct TextureView<'a> {
    target: &'a RenderTarget,
    info: &'a TextureInfo,
}

impl<'a> TextureView<'a> {
    pub fn info(&self) -> &'a TextureInfo {
        self.info
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn format(&self) -> TextureFormat {
        self.info.format
    }

    pub fn attachment(&self) -> Attachment {
        self.info.attachment
    }

    /// Label of the owning target.
    pub fn target_label(&self) -> &'a str {
        &self.target.label
    }

    /// Detach into a storable reference.
    pub fn to_ref(&self) -> TextureRef {
        TextureRef {
            target: self.target.id,
            attachment: self.info.attachment,
        }
    }
}

/// An offscreen color surface with an optional depth buffer.
///
/// Dimensions and formats never change after creation.
#[derive(Debug)]
pub struct RenderTarget {
    id: TargetId,
    label: String,
    descriptor: RenderTargetDescriptor,
    surface: GpuSurface,
    color: OnceCell<TextureInfo>,
    depth: OnceCell<TextureInfo>,
    rendering: bool,
}

impl RenderTarget {
    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn descriptor(&self) -> &RenderTargetDescriptor {
        &self.descriptor
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn color_format(&self) -> TextureFormat {
        self.descriptor.color_format
    }

    pub fn depth_format(&self) -> Option<TextureFormat> {
        self.descriptor.depth_format
    }

    pub fn sample_count(&self) -> u32 {
        self.descriptor.sample_count
    }

    pub fn has_depth(&self) -> bool {
        self.descriptor.depth_format.is_some()
    }

    /// True while this target is the device's bound target.
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// The color texture.
    pub fn color_texture(&self) -> TextureView<'_> {
        let info = self.color.get_or_init(|| {
            log::trace!("RenderTarget {:?}: materializing color texture", self.label);
            TextureInfo {
                attachment: Attachment::Color,
                width: self.descriptor.width,
                height: self.descriptor.height,
                format: self.descriptor.color_format,
                sample_count: self.descriptor.sample_count,
            }
        });
        TextureView { target: self, info }
    }

    /// The depth buffer, if the target has one.
    pub fn depth_texture(&self) -> Option<TextureView<'_>> {
        let format = self.descriptor.depth_format?;
        let info = self.depth.get_or_init(|| {
            log::trace!("RenderTarget {:?}: materializing depth texture", self.label);
            TextureInfo {
                attachment: Attachment::Depth,
                width: self.descriptor.width,
                height: self.descriptor.height,
                format,
                sample_count: self.descriptor.sample_count,
            }
        });
        Some(TextureView { target: self, info })
    }

    pub fn texture(&self, attachment: Attachment) -> Option<TextureView<'_>> {
        match attachment {
            Attachment::Color => Some(self.color_texture()),
            Attachment::Depth => self.depth_texture(),
        }
    }
}

/// Per-frame draw statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Draw calls issued.
    pub batches: u32,
    pub primitives: u64,
    pub vertices: u64,
}

/// A draw submitted by an effect.
#[derive(Debug, Clone, Copy)]
pub struct DrawRequest<'a> {
    pub effect: &'a str,
    pub atoms: &'a [&'a EffectAtom],
    /// Resolved parameter values, one per name. Texture values are resolved
    /// against the device's targets.
    pub values: &'a [(&'a str, ParamValue)],
    pub geometry: &'a GeometryData,
}

/// A backend plus the render targets created through it.
///
/// All operations run on the thread that owns the device.
pub struct RenderDevice {
    backend: Box<dyn GpuBackend>,
    targets: SlotMap<TargetId, RenderTarget>,
    bound: BindTarget,
    blend: BlendMode,
    viewport: Viewport,
    in_frame: bool,
    frame: FrameStats,
    last_frame: FrameStats,
    /// Suffix of the next generated target label.
    next_label: u64,
}

impl std::fmt::Debug for RenderDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderDevice")
            .field("backend", &self.backend.name())
            .field("targets", &self.targets.len())
            .field("bound", &self.bound)
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

impl RenderDevice {
    /// Wrap a backend.
    pub fn new(backend: Box<dyn GpuBackend>) -> Self {
        let back_buffer = backend.back_buffer();
        log::info!(
            "RenderDevice: {} backend, {}x{} back buffer",
            backend.name(),
            back_buffer.width,
            back_buffer.height
        );
        Self {
            backend,
            targets: SlotMap::with_key(),
            bound: BindTarget::BackBuffer,
            blend: BlendMode::Replace,
            viewport: Viewport::new(back_buffer.width, back_buffer.height),
            in_frame: false,
            frame: FrameStats::default(),
            last_frame: FrameStats::default(),
            next_label: 0,
        }
    }

    /// Create a device with the backend named in `config`.
    pub fn from_config(config: &DeviceConfig) -> Result<Self, GraphicsError> {
        Ok(Self::new(backend::create_backend(config)?))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        self.backend.capabilities()
    }

    pub fn default_color_format(&self) -> TextureFormat {
        self.backend.back_buffer().color_format
    }

    pub fn default_depth_format(&self) -> Option<TextureFormat> {
        self.backend.back_buffer().depth_format
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Resize the back buffer.
    pub fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        if width == 0 || height == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "viewport {width}x{height} is empty"
            )));
        }
        self.backend.resize_back_buffer(width, height)?;
        self.viewport = Viewport::new(width, height);
        log::debug!("RenderDevice: viewport is now {width}x{height}");
        Ok(())
    }

    /// Create a render target.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::InvalidParameter`] for empty or oversized dimensions,
    ///   a depth format used as color, or a color format used as depth
    /// - [`GraphicsError::UnsupportedFormat`] when the backend cannot produce
    ///   the format/sample combination
    /// - [`GraphicsError::OutOfDeviceMemory`] when allocation fails
    pub fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<TargetId, GraphicsError> {
        let caps = self.backend.capabilities();
        if descriptor.width == 0
            || descriptor.height == 0
            || descriptor.width > caps.max_texture_dimension
            || descriptor.height > caps.max_texture_dimension
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "render target size {}x{} outside 1..={}",
                descriptor.width, descriptor.height, caps.max_texture_dimension
            )));
        }
        if descriptor.color_format.is_depth_stencil() {
            return Err(GraphicsError::InvalidParameter(format!(
                "{:?} is not a color format",
                descriptor.color_format
            )));
        }
        if let Some(depth) = descriptor.depth_format
            && !depth.is_depth_stencil()
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "{depth:?} is not a depth format"
            )));
        }
        if !caps.supports_render_target(
            descriptor.sample_count,
            descriptor.color_format,
            descriptor.depth_format,
        ) {
            return Err(GraphicsError::UnsupportedFormat {
                color: descriptor.color_format,
                depth: descriptor.depth_format,
                samples: descriptor.sample_count,
            });
        }

        let label = match &descriptor.label {
            Some(label) => label.clone(),
            None => {
                let label = format!("target{}", self.next_label);
                self.next_label += 1;
                label
            }
        };
        let mut descriptor = descriptor.clone();
        descriptor.label = Some(label.clone());
        let surface = self.backend.create_surface(&descriptor)?;

        let id = self.targets.insert_with_key(|id| RenderTarget {
            id,
            label,
            descriptor,
            surface,
            color: OnceCell::new(),
            depth: OnceCell::new(),
            rendering: false,
        });
        log::debug!("RenderDevice: created render target {:?}", self.targets[id].label);
        Ok(id)
    }

    pub fn target(&self, id: TargetId) -> Option<&RenderTarget> {
        self.targets.get(id)
    }

    pub fn render_target_count(&self) -> usize {
        self.targets.len()
    }

    /// Release a render target. Returns false if it was already gone.
    ///
    /// Releasing the bound target binds the back buffer.
    pub fn release_render_target(&mut self, id: TargetId) -> bool {
        let Some(target) = self.targets.remove(id) else {
            return false;
        };
        if self.bound == BindTarget::Target(id) {
            if let Err(e) = self.backend.bind(SurfaceBinding::BackBuffer) {
                log::warn!("RenderDevice: failed to rebind back buffer: {e}");
            }
            self.bound = BindTarget::BackBuffer;
        }
        log::debug!("RenderDevice: releasing render target {:?}", target.label);
        self.backend.release_surface(target.surface);
        true
    }

    pub fn bound_target(&self) -> BindTarget {
        self.bound
    }

    /// Direct subsequent clears and draws at `target`.
    ///
    /// Binding the already-bound target does nothing.
    pub fn bind_render_target(&mut self, target: BindTarget) -> Result<(), GraphicsError> {
        if target == self.bound {
            return Ok(());
        }

        let binding = match target {
            BindTarget::BackBuffer => SurfaceBinding::BackBuffer,
            BindTarget::Target(id) => {
                let t = self.targets.get(id).ok_or_else(|| {
                    GraphicsError::InvalidParameter(format!("render target {id:?} does not exist"))
                })?;
                SurfaceBinding::Target {
                    label: &t.label,
                    descriptor: &t.descriptor,
                    surface: &t.surface,
                }
            }
        };
        self.backend.bind(binding).map_err(|e| match e {
            GraphicsError::BindFailed { .. } => e,
            other => GraphicsError::BindFailed {
                target: match binding {
                    SurfaceBinding::BackBuffer => "back buffer".into(),
                    SurfaceBinding::Target { label, .. } => label.to_string(),
                },
                reason: other.to_string(),
            },
        })?;

        if let BindTarget::Target(previous) = self.bound
            && let Some(t) = self.targets.get_mut(previous)
        {
            t.rendering = false;
        }
        if let BindTarget::Target(id) = target
            && let Some(t) = self.targets.get_mut(id)
        {
            t.rendering = true;
        }
        self.bound = target;
        Ok(())
    }

    /// Blend mode for subsequent draws.
    pub fn set_blend_mode(&mut self, blend: BlendMode) {
        self.blend = blend;
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    /// Clear the bound target.
    pub fn clear(&mut self, flags: ClearFlags, value: &ClearValue) -> Result<(), GraphicsError> {
        if flags.is_empty() {
            return Ok(());
        }
        self.backend.clear(flags, value)
    }

    /// Draw into the bound target.
    ///
    /// # Errors
    ///
    /// [`GraphicsError::DrawFailed`] when the geometry is empty, a texture
    /// value refers to a missing target or surface, or a texture belongs to
    /// the bound target.
    pub fn draw(&mut self, request: &DrawRequest<'_>) -> Result<(), GraphicsError> {
        if request.geometry.vertex_count() == 0 {
            return Err(GraphicsError::DrawFailed(format!(
                "effect '{}': geometry {:?} has no vertices",
                request.effect,
                request.geometry.label()
            )));
        }

        let mut uniforms = Vec::with_capacity(request.values.len());
        let mut textures = Vec::new();
        for &(name, value) in request.values {
            let ParamValue::Texture(texture) = value else {
                uniforms.push((name, value));
                continue;
            };
            let target = self.targets.get(texture.target).ok_or_else(|| {
                GraphicsError::DrawFailed(format!("texture '{name}' refers to a released target"))
            })?;
            if texture.attachment == Attachment::Depth && !target.has_depth() {
                return Err(GraphicsError::DrawFailed(format!(
                    "texture '{name}': target {:?} has no depth buffer",
                    target.label
                )));
            }
            if self.bound == BindTarget::Target(texture.target) {
                return Err(GraphicsError::DrawFailed(format!(
                    "texture '{name}': target {:?} is bound for rendering",
                    target.label
                )));
            }
            textures.push(BoundTexture {
                name,
                target: &target.label,
                attachment: texture.attachment,
                surface: &target.surface,
            });
        }

        let call = DrawCall {
            effect: request.effect,
            atoms: request.atoms,
            uniforms: &uniforms,
            textures: &textures,
            geometry: request.geometry,
            blend: self.blend,
        };
        self.backend.draw(&call)?;

        self.frame.batches += 1;
        self.frame.primitives += request.geometry.primitive_count() as u64;
        self.frame.vertices += request.geometry.vertex_count() as u64;
        Ok(())
    }

    /// Start a frame and reset the frame statistics.
    pub fn begin_frame(&mut self) -> Result<(), GraphicsError> {
        if self.in_frame {
            return Err(GraphicsError::InvalidParameter(
                "begin_frame called twice without end_frame".into(),
            ));
        }
        self.backend.begin_frame()?;
        self.in_frame = true;
        self.frame = FrameStats::default();
        Ok(())
    }

    /// Finish the frame and submit its work.
    pub fn end_frame(&mut self) -> Result<(), GraphicsError> {
        if !self.in_frame {
            return Err(GraphicsError::InvalidParameter(
                "end_frame called without begin_frame".into(),
            ));
        }
        self.in_frame = false;
        self.last_frame = self.frame;
        self.backend.end_frame()
    }

    pub fn is_in_frame(&self) -> bool {
        self.in_frame
    }

    /// Statistics of the frame in progress.
    pub fn frame_stats(&self) -> FrameStats {
        self.frame
    }

    /// Statistics of the last finished frame.
    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_frame
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        // Targets go before the backend that owns their storage.
        for (_, target) in self.targets.drain() {
            self.backend.release_surface(target.surface);
        }
    }
}

static_assertions::assert_impl_all!(RenderDevice: Send);
static_assertions::assert_impl_all!(RenderTarget: Send);
