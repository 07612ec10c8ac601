//! Common utilities for procedure integration tests.
//!
//! Provides a backend-parameterized test context, renderables with
//! scripted behavior and the shared shadow/bloom procedure.

#![allow(dead_code)]

use std::cell::RefCell;
use std::sync::Arc;

use umbra_core::Color;
use umbra_core::math::{self, Vec3};
use umbra_core::mesh::{GeometryData, generators};
use umbra_graphics::{
    BackBuffer, Camera, CapabilityProfile, CommandLog, Config, Effect, EffectRegistry,
    FrameReport, GraphicsError, Light, NullBackend, ProcedureDescriptor, RenderContext,
    RenderDevice, RenderOperation, RenderOperationBuffer, Renderable, SceneProcedure,
    TextureFormat,
};

/// The shadow, main, bright, composite procedure shipped with the engine.
pub const SHADOW_BLOOM: &str = include_str!("../../../assets/procedures/shadow_bloom.ron");

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Backends the procedure tests run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Null backend with Direct3D 9 class capabilities.
    Legacy,
    /// Null backend with Direct3D 11 class capabilities.
    Modern,
    /// wgpu on whatever adapter the machine has.
    Wgpu,
}

impl Backend {
    pub fn profile(&self) -> Option<CapabilityProfile> {
        match self {
            Self::Legacy => Some(CapabilityProfile::Legacy),
            Self::Modern => Some(CapabilityProfile::Modern),
            Self::Wgpu => None,
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// A device, the standard effects and, for null backends, the command log.
pub struct TestContext {
    pub device: RenderDevice,
    pub registry: EffectRegistry,
    pub log: Option<CommandLog>,
}

impl TestContext {
    /// Create a context, or `None` when the backend is unavailable here.
    pub fn new(backend: Backend) -> Option<Self> {
        match backend.profile() {
            Some(profile) => Some(Self::with_null(NullBackend::new(profile))),
            None => Self::wgpu(),
        }
    }

    /// Context around a preconfigured null backend.
    pub fn with_null(backend: NullBackend) -> Self {
        let log = backend.command_log();
        Self {
            device: RenderDevice::new(Box::new(backend)),
            registry: standard_registry(),
            log: Some(log),
        }
    }

    #[cfg(feature = "wgpu-backend")]
    fn wgpu() -> Option<Self> {
        let config = umbra_graphics::DeviceConfig {
            backend: umbra_graphics::BackendKind::Wgpu,
            width: 320,
            height: 240,
            color_format: TextureFormat::Rgba8Unorm,
            ..Default::default()
        };
        let backend = umbra_graphics::backend::wgpu_backend::WgpuBackend::new(&config).ok()?;
        Some(Self {
            device: RenderDevice::new(Box::new(backend)),
            registry: standard_registry(),
            log: None,
        })
    }

    #[cfg(not(feature = "wgpu-backend"))]
    fn wgpu() -> Option<Self> {
        None
    }

    /// Load the shadow/bloom procedure on this context's device.
    pub fn shadow_bloom(&mut self) -> Result<SceneProcedure, GraphicsError> {
        SceneProcedure::load(&mut self.device, &self.registry, &shadow_bloom_descriptor())
    }

    /// Command log of a null backend context.
    pub fn log(&self) -> &CommandLog {
        self.log.as_ref().expect("null backend context")
    }
}

pub fn standard_registry() -> EffectRegistry {
    EffectRegistry::with_standard_effects().expect("standard effects register")
}

pub fn shadow_bloom_descriptor() -> ProcedureDescriptor {
    ProcedureDescriptor::from_ron_str(SHADOW_BLOOM).expect("shadow_bloom.ron parses")
}

/// Null back buffer matching the default device config.
pub fn back_buffer(width: u32, height: u32) -> BackBuffer {
    BackBuffer {
        width,
        height,
        color_format: TextureFormat::Bgra8Unorm,
        depth_format: Some(TextureFormat::Depth24PlusStencil8),
    }
}

// ============================================================================
// Scene
// ============================================================================

/// Viewer camera followed by a light camera.
pub fn cameras() -> Vec<Camera> {
    vec![
        Camera::perspective(
            Vec3::new(0.0, 3.0, 8.0),
            Vec3::zeros(),
            std::f32::consts::FRAC_PI_4,
            4.0 / 3.0,
            0.1,
            100.0,
        ),
        Camera::orthographic(
            Vec3::new(4.0, 10.0, 4.0),
            Vec3::zeros(),
            8.0,
            8.0,
            0.1,
            30.0,
        ),
    ]
}

pub fn render_context() -> RenderContext {
    RenderContext::new()
        .with_light(Light::directional(Vec3::new(-0.4, -1.0, -0.4)).with_diffuse(Color::WHITE))
        .with_time(1.0)
}

/// A renderable with one buffer of render operations per LOD level.
pub struct TestObject {
    pub name: String,
    pub lods: Vec<RenderOperationBuffer>,
    pub mask: u64,
}

impl TestObject {
    /// A cube at `x` drawn with `effect` at LOD 0 only.
    pub fn cube(name: &str, x: f32, effect: Arc<Effect>) -> Self {
        let op = RenderOperation::new(cube_geometry())
            .with_world(math::mat4_from_translation(Vec3::new(x, 0.0, 0.0)))
            .with_effect(effect);
        Self {
            name: name.to_string(),
            lods: vec![RenderOperationBuffer::from(vec![op])],
            mask: u64::MAX,
        }
    }

    pub fn with_mask(mut self, mask: u64) -> Self {
        self.mask = mask;
        self
    }
}

impl Renderable for TestObject {
    fn render_operations(&self, level: u32) -> Option<RenderOperationBuffer> {
        self.lods.get(level as usize).cloned()
    }

    fn selector_mask(&self) -> u64 {
        self.mask
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A renderable that never produces render operations.
pub struct BrokenObject;

impl Renderable for BrokenObject {
    fn render_operations(&self, _level: u32) -> Option<RenderOperationBuffer> {
        None
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// A renderable that invokes `procedure` again while being drawn by it.
pub struct ReentrantObject<'a> {
    pub procedure: &'a SceneProcedure,
    pub device: RefCell<RenderDevice>,
    pub inner: RefCell<Option<Result<FrameReport, GraphicsError>>>,
    pub effect: Arc<Effect>,
}

impl<'a> ReentrantObject<'a> {
    pub fn new(procedure: &'a SceneProcedure, effect: Arc<Effect>) -> Self {
        Self {
            procedure,
            device: RefCell::new(RenderDevice::new(Box::new(NullBackend::default()))),
            inner: RefCell::new(None),
            effect,
        }
    }
}

impl Renderable for ReentrantObject<'_> {
    fn render_operations(&self, _level: u32) -> Option<RenderOperationBuffer> {
        let result = self.procedure.invoke(
            &mut self.device.borrow_mut(),
            &cameras(),
            &[],
            &render_context(),
        );
        *self.inner.borrow_mut() = Some(result);
        Some(RenderOperationBuffer::from(vec![
            RenderOperation::new(cube_geometry()).with_effect(self.effect.clone()),
        ]))
    }

    fn name(&self) -> &str {
        "reentrant"
    }
}

pub fn cube_geometry() -> Arc<GeometryData> {
    Arc::new(generators::cube(0.5))
}
