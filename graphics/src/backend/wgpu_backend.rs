//! wgpu GPU backend implementation.
//!
//! Renders offscreen: the back buffer is a texture owned by the backend.
//! Clears and draws are recorded against the bound surface and encoded as
//! one render pass per run of work on that surface. A frame's passes share
//! one command encoder, submitted by `end_frame`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use umbra_core::mesh::{GeometryData, IndexFormat, PrimitiveTopology, VertexLayout};
use wgpu::util::DeviceExt;

use crate::config::DeviceConfig;
use crate::device::{DeviceCapabilities, FormatSupport};
use crate::effects::{EffectAtom, ParamType};
use crate::error::GraphicsError;
use crate::types::{
    Attachment, BlendMode, ClearFlags, ClearValue, RenderTargetDescriptor, ShaderModel,
    TextureFormat,
};

use super::wgpu_impl::conversion::{
    convert_blend_mode, convert_color, convert_index_format, convert_texture_format,
    convert_topology, convert_vertex_format,
};
use super::wgpu_impl::shader::{self, ShaderInterface};
use super::{BackBuffer, DrawCall, GpuBackend, GpuSurface, SurfaceBinding};

const SAMPLE_COUNTS: [u32; 5] = [1, 2, 4, 8, 16];

/// Textures of one render target. Views keep their textures alive.
pub struct WgpuSurface {
    /// Render attachment; multisampled when `sample_count > 1`.
    color_view: wgpu::TextureView,
    /// Single-sampled resolve of a multisampled color attachment.
    resolve_view: Option<wgpu::TextureView>,
    depth_view: Option<wgpu::TextureView>,
    /// Depth aspect of a single-sampled depth buffer, for sampling.
    depth_sample_view: Option<wgpu::TextureView>,
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
    pub sample_count: u32,
    pub width: u32,
    pub height: u32,
}

impl WgpuSurface {
    fn new(device: &wgpu::Device, descriptor: &RenderTargetDescriptor) -> Self {
        let label = descriptor.label.as_deref();
        let samples = descriptor.sample_count.max(1);
        let size = wgpu::Extent3d {
            width: descriptor.width,
            height: descriptor.height,
            depth_or_array_layers: 1,
        };
        let texture = |label: Option<&str>, format: TextureFormat, samples: u32, usage| {
            device.create_texture(&wgpu::TextureDescriptor {
                label,
                size,
                mip_level_count: 1,
                sample_count: samples,
                dimension: wgpu::TextureDimension::D2,
                format: convert_texture_format(format),
                usage,
                view_formats: &[],
            })
        };

        let sampled = if samples == 1 {
            wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            wgpu::TextureUsages::empty()
        };
        let color = texture(
            label,
            descriptor.color_format,
            samples,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC | sampled,
        );
        let resolve_view = (samples > 1).then(|| {
            texture(
                label,
                descriptor.color_format,
                1,
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
            )
            .create_view(&wgpu::TextureViewDescriptor::default())
        });

        let depth = descriptor.depth_format.map(|format| {
            texture(
                label,
                format,
                samples,
                wgpu::TextureUsages::RENDER_ATTACHMENT | sampled,
            )
        });
        let depth_view = depth
            .as_ref()
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));
        let depth_sample_view = depth.as_ref().filter(|_| samples == 1).map(|t| {
            t.create_view(&wgpu::TextureViewDescriptor {
                aspect: wgpu::TextureAspect::DepthOnly,
                ..Default::default()
            })
        });

        Self {
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            resolve_view,
            depth_view,
            depth_sample_view,
            color_format: descriptor.color_format,
            depth_format: descriptor.depth_format,
            sample_count: samples,
            width: descriptor.width,
            height: descriptor.height,
        }
    }

    /// View a shader samples for `attachment`.
    fn sampled_view(&self, attachment: Attachment) -> Option<&wgpu::TextureView> {
        match attachment {
            Attachment::Color => self.resolve_view.as_ref().or(Some(&self.color_view)),
            Attachment::Depth => self.depth_sample_view.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    effect: String,
    atoms: Vec<String>,
    uniforms: Vec<(String, ParamType)>,
    textures: Vec<(String, Attachment)>,
    layout: VertexLayout,
    topology: PrimitiveTopology,
    strip_index_format: Option<IndexFormat>,
    color_format: TextureFormat,
    depth_format: Option<TextureFormat>,
    samples: u32,
    blend: BlendMode,
}

struct CachedPipeline {
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: Option<wgpu::BindGroupLayout>,
}

struct PreparedDraw {
    pipeline: Arc<CachedPipeline>,
    uniforms: wgpu::BindGroup,
    textures: Option<wgpu::BindGroup>,
    vertices: wgpu::Buffer,
    vertex_count: u32,
    indices: Option<(wgpu::Buffer, wgpu::IndexFormat, u32)>,
}

/// Work recorded against one surface, encoded as one render pass.
struct Segment {
    label: String,
    target: Arc<WgpuSurface>,
    color_load: wgpu::LoadOp<wgpu::Color>,
    depth_load: wgpu::LoadOp<f32>,
    stencil_load: wgpu::LoadOp<u32>,
    cleared: bool,
    draws: Vec<PreparedDraw>,
}

impl Segment {
    fn new(label: String, target: Arc<WgpuSurface>) -> Self {
        Self {
            label,
            target,
            color_load: wgpu::LoadOp::Load,
            depth_load: wgpu::LoadOp::Load,
            stencil_load: wgpu::LoadOp::Load,
            cleared: false,
            draws: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        !self.cleared && self.draws.is_empty()
    }
}

enum Bound {
    BackBuffer,
    Target {
        label: String,
        surface: Arc<WgpuSurface>,
    },
}

/// wgpu-based GPU backend.
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    capabilities: DeviceCapabilities,
    blendable: HashSet<TextureFormat>,
    back_buffer: Arc<WgpuSurface>,
    sampler: wgpu::Sampler,
    pipelines: HashMap<PipelineKey, Arc<CachedPipeline>>,
    bound: Bound,
    current: Option<Segment>,
    encoder: Option<wgpu::CommandEncoder>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .field("pipelines", &self.pipelines.len())
            .finish()
    }
}

impl WgpuBackend {
    /// Create a new wgpu backend with an offscreen back buffer sized from
    /// `config`.
    pub fn new(config: &DeviceConfig) -> Result<Self, GraphicsError> {
        // Create instance with all backends
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("No compatible GPU adapter: {e}")))?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        // Per-adapter format features give the real MSAA support.
        let required_features =
            adapter.features() & wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Umbra Device"),
            required_features,
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("Device creation failed: {e}")))?;

        let (capabilities, blendable) = query_capabilities(&adapter, &device);
        if !capabilities.supports_render_target(1, config.color_format, config.depth_format) {
            return Err(GraphicsError::UnsupportedFormat {
                color: config.color_format,
                depth: config.depth_format,
                samples: 1,
            });
        }

        let back_buffer = Arc::new(WgpuSurface::new(
            &device,
            &back_buffer_descriptor(config.width, config.height, config.color_format, config.depth_format),
        ));
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Umbra Input Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            capabilities,
            blendable,
            back_buffer,
            sampler,
            pipelines: HashMap::new(),
            bound: Bound::BackBuffer,
            current: None,
            encoder: None,
        })
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Number of distinct pipelines compiled so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn bound_surface(&self) -> (&str, &Arc<WgpuSurface>) {
        match &self.bound {
            Bound::BackBuffer => ("back buffer", &self.back_buffer),
            Bound::Target { label, surface } => (label, surface),
        }
    }

    /// The segment recording into the bound surface.
    fn segment(&mut self) -> &mut Segment {
        let (label, surface) = match &self.bound {
            Bound::BackBuffer => ("back buffer", &self.back_buffer),
            Bound::Target { label, surface } => (label.as_str(), surface),
        };
        self.current
            .get_or_insert_with(|| Segment::new(label.to_string(), surface.clone()))
    }

    /// Encode the current segment, if it has any work.
    fn flush(&mut self) {
        let Some(segment) = self.current.take() else {
            return;
        };
        if segment.is_empty() {
            return;
        }

        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Umbra Frame Encoder"),
                })
        });

        let target = &segment.target;
        let has_stencil = target.depth_format.is_some_and(|f| f.has_stencil());
        let depth_stencil_attachment =
            target
                .depth_view
                .as_ref()
                .map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: segment.depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: has_stencil.then_some(wgpu::Operations {
                        load: segment.stencil_load,
                        store: wgpu::StoreOp::Store,
                    }),
                });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(segment.label.as_str()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.color_view,
                depth_slice: None,
                resolve_target: target.resolve_view.as_ref(),
                ops: wgpu::Operations {
                    load: segment.color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_viewport(0.0, 0.0, target.width as f32, target.height as f32, 0.0, 1.0);

        for draw in &segment.draws {
            pass.set_pipeline(&draw.pipeline.pipeline);
            pass.set_bind_group(0, &draw.uniforms, &[]);
            if let Some(textures) = &draw.textures {
                pass.set_bind_group(1, textures, &[]);
            }
            pass.set_vertex_buffer(0, draw.vertices.slice(..));
            match &draw.indices {
                Some((buffer, format, count)) => {
                    pass.set_index_buffer(buffer.slice(..), *format);
                    pass.draw_indexed(0..*count, 0, 0..1);
                }
                None => pass.draw(0..draw.vertex_count, 0..1),
            }
        }
        log::trace!(
            "WgpuBackend: encoded pass '{}' with {} draws",
            segment.label,
            segment.draws.len()
        );
    }

    fn pipeline(
        &mut self,
        key: PipelineKey,
        atoms: &[&EffectAtom],
    ) -> Result<Arc<CachedPipeline>, GraphicsError> {
        if let Some(cached) = self.pipelines.get(&key) {
            return Ok(cached.clone());
        }

        let uniforms: Vec<(&str, ParamType)> =
            key.uniforms.iter().map(|(n, t)| (n.as_str(), *t)).collect();
        let textures: Vec<(&str, Attachment)> =
            key.textures.iter().map(|(n, a)| (n.as_str(), *a)).collect();
        let source = shader::compose(
            atoms,
            &ShaderInterface {
                uniforms: &uniforms,
                textures: &textures,
                layout: &key.layout,
            },
        )?;
        shader::validate(&source)
            .inspect_err(|e| log::error!("Effect '{}': {}", key.effect, e))?;

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(key.effect.as_str()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        let uniform_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Umbra Params Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
        let texture_layout = (!key.textures.is_empty()).then(|| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = key
                .textures
                .iter()
                .enumerate()
                .flat_map(|(i, (_, attachment))| {
                    let sample_type = match attachment {
                        Attachment::Color => wgpu::TextureSampleType::Float { filterable: false },
                        Attachment::Depth => wgpu::TextureSampleType::Depth,
                    };
                    [
                        wgpu::BindGroupLayoutEntry {
                            binding: 2 * i as u32,
                            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type,
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 2 * i as u32 + 1,
                            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                            count: None,
                        },
                    ]
                })
                .collect();
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Umbra Textures Layout"),
                    entries: &entries,
                })
        });

        let mut group_layouts = vec![&uniform_layout];
        if let Some(layout) = &texture_layout {
            group_layouts.push(layout);
        }
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(key.effect.as_str()),
                bind_group_layouts: &group_layouts,
                immediate_size: 0,
            });

        let attributes: Vec<wgpu::VertexAttribute> = key
            .layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: convert_vertex_format(a.format),
                offset: a.offset as u64,
                shader_location: a.semantic.location(),
            })
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(key.effect.as_str()),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: key.layout.stride as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: convert_texture_format(key.color_format),
                        blend: convert_blend_mode(key.blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: convert_topology(key.topology),
                    strip_index_format: key.strip_index_format.map(convert_index_format),
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: key.depth_format.map(|format| wgpu::DepthStencilState {
                    format: convert_texture_format(format),
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: key.samples,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview_mask: None,
                cache: None,
            });

        log::debug!(
            "WgpuBackend: compiled pipeline for '{}' ({} atoms, {:?}, {}x)",
            key.effect,
            key.atoms.len(),
            key.color_format,
            key.samples
        );
        let cached = Arc::new(CachedPipeline {
            pipeline,
            uniform_layout,
            texture_layout,
        });
        self.pipelines.insert(key, cached.clone());
        Ok(cached)
    }

    fn geometry_buffers(
        &self,
        effect: &str,
        geometry: &GeometryData,
    ) -> (wgpu::Buffer, Option<(wgpu::Buffer, wgpu::IndexFormat, u32)>) {
        let vertices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(effect),
                contents: geometry.vertex_data(),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let indices = geometry
            .index_data()
            .zip(geometry.index_format())
            .map(|(data, format)| {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(effect),
                        contents: data,
                        usage: wgpu::BufferUsages::INDEX,
                    });
                (buffer, convert_index_format(format), geometry.index_count())
            });
        (vertices, indices)
    }
}

fn back_buffer_descriptor(
    width: u32,
    height: u32,
    color: TextureFormat,
    depth: Option<TextureFormat>,
) -> RenderTargetDescriptor {
    let descriptor = RenderTargetDescriptor::new(width.max(1), height.max(1), color)
        .with_label("back buffer");
    match depth {
        Some(format) => descriptor.with_depth(format),
        None => descriptor,
    }
}

/// Render target capabilities of a wgpu device.
fn query_capabilities(
    adapter: &wgpu::Adapter,
    device: &wgpu::Device,
) -> (DeviceCapabilities, HashSet<TextureFormat>) {
    let adapter_specific = device
        .features()
        .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);

    let mut color_formats = Vec::new();
    let mut depth_formats = Vec::new();
    let mut blendable = HashSet::new();
    for format in TextureFormat::ALL {
        let wgpu_format = convert_texture_format(format);
        let features = if adapter_specific {
            adapter.get_texture_format_features(wgpu_format)
        } else {
            wgpu_format.guaranteed_format_features(device.features())
        };
        if !features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        {
            continue;
        }

        let resolvable = format.is_depth_stencil()
            || features
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE);
        let sample_counts: Vec<u32> = SAMPLE_COUNTS
            .into_iter()
            .filter(|&n| n == 1 || (resolvable && features.flags.sample_count_supported(n)))
            .collect();
        if features
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE)
        {
            blendable.insert(format);
        }

        let support = FormatSupport {
            format,
            sample_counts,
        };
        if format.is_depth_stencil() {
            depth_formats.push(support);
        } else {
            color_formats.push(support);
        }
    }

    let limits = device.limits();
    (
        DeviceCapabilities {
            color_formats,
            depth_formats,
            max_simultaneous_targets: limits.max_color_attachments,
            shader_model: ShaderModel::SM5_0,
            max_texture_dimension: limits.max_texture_dimension_2d,
        },
        blendable,
    )
}

fn wgpu_surface<'a>(surface: &'a GpuSurface, what: &str) -> Result<&'a Arc<WgpuSurface>, GraphicsError> {
    match surface {
        GpuSurface::Wgpu(surface) => Ok(surface),
        GpuSurface::Null { .. } => Err(GraphicsError::Internal(format!(
            "{what} was not created by the wgpu backend"
        ))),
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn back_buffer(&self) -> BackBuffer {
        BackBuffer {
            width: self.back_buffer.width,
            height: self.back_buffer.height,
            color_format: self.back_buffer.color_format,
            depth_format: self.back_buffer.depth_format,
        }
    }

    fn resize_back_buffer(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        if matches!(self.bound, Bound::BackBuffer) {
            self.flush();
        }
        self.back_buffer = Arc::new(WgpuSurface::new(
            &self.device,
            &back_buffer_descriptor(
                width,
                height,
                self.back_buffer.color_format,
                self.back_buffer.depth_format,
            ),
        ));
        log::debug!("WgpuBackend: back buffer is now {width}x{height}");
        Ok(())
    }

    fn create_surface(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<GpuSurface, GraphicsError> {
        log::trace!(
            "WgpuBackend: creating surface {:?} ({}x{}, {:?}, {}x)",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.color_format,
            descriptor.sample_count
        );
        Ok(GpuSurface::Wgpu(Arc::new(WgpuSurface::new(
            &self.device,
            descriptor,
        ))))
    }

    fn release_surface(&mut self, surface: GpuSurface) {
        // Recorded passes hold their own reference until the frame is submitted.
        if let GpuSurface::Null { .. } = surface {
            log::warn!("WgpuBackend: asked to release a foreign surface");
        }
    }

    fn begin_frame(&mut self) -> Result<(), GraphicsError> {
        log::trace!("WgpuBackend: begin frame");
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GraphicsError> {
        self.flush();
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };
        let index = self.queue.submit(std::iter::once(encoder.finish()));
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(index),
                timeout: Some(std::time::Duration::from_secs(10)),
            })
            .map_err(|e| GraphicsError::Internal(format!("waiting for frame: {e}")))?;
        log::trace!("WgpuBackend: frame submitted");
        Ok(())
    }

    fn bind(&mut self, binding: SurfaceBinding<'_>) -> Result<(), GraphicsError> {
        let bound = match binding {
            SurfaceBinding::BackBuffer => Bound::BackBuffer,
            SurfaceBinding::Target { label, surface, .. } => {
                let surface = wgpu_surface(surface, label).map_err(|e| GraphicsError::BindFailed {
                    target: label.to_string(),
                    reason: e.to_string(),
                })?;
                Bound::Target {
                    label: label.to_string(),
                    surface: surface.clone(),
                }
            }
        };
        self.flush();
        self.bound = bound;
        Ok(())
    }

    fn clear(&mut self, flags: ClearFlags, value: &ClearValue) -> Result<(), GraphicsError> {
        // A clear after draws starts a new pass; load ops only clear at pass start.
        if self.current.as_ref().is_some_and(|s| !s.draws.is_empty()) {
            self.flush();
        }
        let segment = self.segment();
        let depth_format = segment.target.depth_format;
        if flags.contains(ClearFlags::COLOR) {
            segment.color_load = wgpu::LoadOp::Clear(convert_color(value.color));
        }
        if flags.contains(ClearFlags::DEPTH) && depth_format.is_some() {
            segment.depth_load = wgpu::LoadOp::Clear(value.depth);
        }
        if flags.contains(ClearFlags::STENCIL) && depth_format.is_some_and(|f| f.has_stencil()) {
            segment.stencil_load = wgpu::LoadOp::Clear(value.stencil);
        }
        segment.cleared = true;
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), GraphicsError> {
        let (_, target) = self.bound_surface();
        let target = target.clone();
        if call.blend == BlendMode::Additive && !self.blendable.contains(&target.color_format) {
            return Err(GraphicsError::DrawFailed(format!(
                "effect '{}': {:?} does not support blending",
                call.effect, target.color_format
            )));
        }

        let mut views = Vec::with_capacity(call.textures.len());
        for texture in call.textures {
            let surface = wgpu_surface(texture.surface, texture.target)
                .map_err(|e| GraphicsError::DrawFailed(e.to_string()))?;
            let view = surface.sampled_view(texture.attachment).ok_or_else(|| {
                GraphicsError::DrawFailed(format!(
                    "texture '{}': {:?} of target '{}' cannot be sampled",
                    texture.name, texture.attachment, texture.target
                ))
            })?;
            views.push(view.clone());
        }

        let geometry = call.geometry;
        let strip_index_format = match geometry.topology() {
            PrimitiveTopology::LineStrip | PrimitiveTopology::TriangleStrip => {
                geometry.index_format()
            }
            _ => None,
        };
        let key = PipelineKey {
            effect: call.effect.to_string(),
            atoms: call.atoms.iter().map(|a| a.name().to_string()).collect(),
            uniforms: call
                .uniforms
                .iter()
                .map(|(name, value)| (name.to_string(), value.ty()))
                .collect(),
            textures: call
                .textures
                .iter()
                .map(|t| (t.name.to_string(), t.attachment))
                .collect(),
            layout: geometry.layout().as_ref().clone(),
            topology: geometry.topology(),
            strip_index_format,
            color_format: target.color_format,
            depth_format: target.depth_format,
            samples: target.sample_count,
            blend: call.blend,
        };
        let pipeline = self.pipeline(key, call.atoms)?;

        let mut data = Vec::new();
        for (_, value) in call.uniforms {
            value.write_uniform(&mut data);
        }
        if data.is_empty() {
            data.resize(16, 0);
        }
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(call.effect),
                contents: &data,
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let uniforms = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(call.effect),
            layout: &pipeline.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let textures = pipeline.texture_layout.as_ref().map(|layout| {
            let entries: Vec<wgpu::BindGroupEntry> = views
                .iter()
                .enumerate()
                .flat_map(|(i, view)| {
                    [
                        wgpu::BindGroupEntry {
                            binding: 2 * i as u32,
                            resource: wgpu::BindingResource::TextureView(view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2 * i as u32 + 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ]
                })
                .collect();
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(call.effect),
                layout,
                entries: &entries,
            })
        });

        let (vertices, indices) = self.geometry_buffers(call.effect, geometry);
        self.segment().draws.push(PreparedDraw {
            pipeline,
            uniforms,
            textures,
            vertices,
            vertex_count: geometry.vertex_count(),
            indices,
        });
        Ok(())
    }
}
