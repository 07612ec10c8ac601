//! # Umbra Demos
//!
//! Shared pieces of the demo binaries: CLI enums, the demo scene and the
//! frame loop.
//!
//! ## Available Demos
//!
//! - `shadow_bloom` - Renders a procedure descriptor (shadow map, lit pass,
//!   blurred bloom) over a grid of cubes and spheres

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use umbra_core::Color;
use umbra_core::math::{self, Vec3};
use umbra_core::mesh::{GeometryData, generators};
use umbra_graphics::effects::library::names;
use umbra_graphics::{
    BackendKind, Camera, CapabilityProfile, Config, DeviceConfig, EffectRegistry, FrameReport,
    Light, Material, ParamValue, ProcedureDescriptor, RenderContext, RenderDevice,
    RenderOperation, RenderOperationBuffer, Renderable, SceneProcedure,
};

/// Procedure variable that gates the shadow pass.
pub const SHADOWS_VARIABLE: &str = "shadows_enabled";

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// CLI Selection
// ============================================================================

/// Backend selection for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliBackend {
    /// Records commands without touching a GPU.
    #[default]
    Null,
    /// Offscreen rendering through wgpu. Falls back to null without an adapter.
    Wgpu,
}

impl From<CliBackend> for BackendKind {
    fn from(cli: CliBackend) -> Self {
        match cli {
            CliBackend::Null => BackendKind::Null,
            CliBackend::Wgpu => BackendKind::Wgpu,
        }
    }
}

/// Capability profile the null backend pretends to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliProfile {
    /// Direct3D 9 class hardware.
    Legacy,
    /// Direct3D 11 class hardware.
    #[default]
    Modern,
}

impl From<CliProfile> for CapabilityProfile {
    fn from(cli: CliProfile) -> Self {
        match cli {
            CliProfile::Legacy => CapabilityProfile::Legacy,
            CliProfile::Modern => CapabilityProfile::Modern,
        }
    }
}

/// Everything a demo run needs.
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub backend: CliBackend,
    pub profile: CliProfile,
    pub procedure: PathBuf,
    pub frames: u32,
    pub width: u32,
    pub height: u32,
    pub shadows: bool,
}

impl DemoOptions {
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            backend: self.backend.into(),
            profile: self.profile.into(),
            width: self.width,
            height: self.height,
            ..Default::default()
        }
    }
}

// ============================================================================
// Scene
// ============================================================================

/// A static object with one LOD.
pub struct Prop {
    name: String,
    operations: RenderOperationBuffer,
}

impl Prop {
    pub fn new(name: impl Into<String>, operation: RenderOperation) -> Self {
        Self {
            name: name.into(),
            operations: RenderOperationBuffer::from(vec![operation]),
        }
    }
}

impl Renderable for Prop {
    fn render_operations(&self, level: u32) -> Option<RenderOperationBuffer> {
        (level == 0).then(|| self.operations.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A `columns` x `rows` grid of alternating lit cubes and spheres.
pub fn build_scene(registry: &EffectRegistry, columns: u32, rows: u32) -> anyhow::Result<Vec<Prop>> {
    let lit = registry
        .effect(names::LIT)
        .context("the standard registry has no lit effect")?;
    let cube: Arc<GeometryData> = Arc::new(generators::cube(0.5));
    let sphere: Arc<GeometryData> = Arc::new(generators::sphere(0.6, 24, 12));

    let mut props = Vec::with_capacity((columns * rows) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let x = (column as f32 - (columns as f32 - 1.0) * 0.5) * 2.0;
            let z = (row as f32 - (rows as f32 - 1.0) * 0.5) * 2.0;
            let (geometry, kind) = if (row + column) % 2 == 0 {
                (cube.clone(), "cube")
            } else {
                (sphere.clone(), "sphere")
            };
            let hue = column as f32 / columns.max(1) as f32;
            let material = Material::new()
                .with_diffuse(Color::rgb(0.3 + 0.7 * hue, 0.5, 1.0 - 0.7 * hue))
                .with_emissive(if row == 0 && column == 0 {
                    Color::rgb(2.0, 1.6, 0.8)
                } else {
                    Color::BLACK
                });
            let operation = RenderOperation::new(geometry)
                .with_world(math::mat4_from_translation(Vec3::new(x, 0.0, z)))
                .with_material(Arc::new(material))
                .with_effect(lit.clone());
            props.push(Prop::new(format!("{kind}_{row}_{column}"), operation));
        }
    }
    Ok(props)
}

/// Viewer camera followed by the light camera the shadow pass uses.
pub fn demo_cameras(aspect: f32, light_direction: Vec3) -> Vec<Camera> {
    let light_eye = -light_direction.normalize() * 15.0;
    vec![
        Camera::perspective(
            Vec3::new(0.0, 6.0, 12.0),
            Vec3::zeros(),
            std::f32::consts::FRAC_PI_4,
            aspect,
            0.1,
            100.0,
        ),
        Camera::orthographic(light_eye, Vec3::zeros(), 16.0, 16.0, 0.1, 40.0),
    ]
}

// ============================================================================
// Frame Loop
// ============================================================================

/// Totals over every rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u32,
    pub drawn: usize,
    pub skipped: usize,
    pub batches: u32,
}

impl RunSummary {
    fn add(&mut self, report: &FrameReport, batches: u32) {
        self.frames += 1;
        self.drawn += report.total_drawn();
        self.skipped += report.total_skipped();
        self.batches += batches;
    }
}

/// Load the procedure and render `options.frames` frames.
pub fn run(options: &DemoOptions) -> anyhow::Result<RunSummary> {
    let mut device = RenderDevice::from_config(&options.device_config())?;
    log::info!(
        "Device: {} backend, {}x{}",
        device.backend_name(),
        device.viewport().width,
        device.viewport().height
    );

    let registry = EffectRegistry::with_standard_effects()?;
    let descriptor = ProcedureDescriptor::load_from_file(&options.procedure)
        .with_context(|| format!("loading {}", options.procedure.display()))?;
    let mut procedure = SceneProcedure::load(&mut device, &registry, &descriptor)?;
    if let Some(reason) = procedure.unavailable_reason() {
        anyhow::bail!(
            "procedure '{}' cannot run on this device: {reason}",
            procedure.name()
        );
    }
    if !options.shadows {
        procedure.set_variable(SHADOWS_VARIABLE, ParamValue::Bool(false));
    }

    let props = build_scene(&registry, 4, 3)?;
    let renderables: Vec<&dyn Renderable> = props.iter().map(|p| p as &dyn Renderable).collect();
    let light_direction = Vec3::new(-0.4, -1.0, -0.3);
    let mut summary = RunSummary::default();

    for frame in 0..options.frames {
        procedure.check_dimensions(&mut device)?;
        let cameras = demo_cameras(device.viewport().aspect_ratio(), light_direction);
        let context = RenderContext::new()
            .with_light(Light::directional(light_direction).with_diffuse(Color::WHITE))
            .with_time(frame as f32 / 60.0);

        device.begin_frame()?;
        let report = procedure.invoke(&mut device, &cameras, &renderables, &context)?;
        device.end_frame()?;

        let stats = device.last_frame_stats();
        log::debug!(
            "Frame {}: {} batches, {} primitives",
            frame,
            stats.batches,
            stats.primitives
        );
        for pass in report.passes.iter().filter(|p| !p.skipped_atoms.is_empty()) {
            log::warn!(
                "Pass '{}' left out {} atoms",
                pass.name,
                pass.skipped_atoms.len()
            );
        }
        summary.add(&report, stats.batches);
    }

    procedure.release(&mut device);
    Ok(summary)
}
