//! The scene procedure: an ordered list of passes run against a device.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

use umbra_core::mesh::{GeometryData, generators};

use crate::device::{BindTarget, RenderDevice, RenderTarget, TargetId};
use crate::effects::{ApplyContext, EffectRegistry, ParamValue};
use crate::error::GraphicsError;
use crate::scene::{Camera, RenderContext, RenderOperation, Renderable};
use crate::types::Viewport;

use super::descriptor::{PassKindDecl, PassOutput, ProcedureDescriptor, TargetDecl, TargetSize};
use super::pass::{PassKind, ScenePass, Selector};
use super::validation::{PassIo, validate_passes};

/// Execution state of a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcedureState {
    #[default]
    Idle,
    Running {
        pass: usize,
    },
}

/// What one pass did during an invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub name: String,
    /// False when the pass condition skipped the pass.
    pub executed: bool,
    /// Render operations drawn.
    pub drawn: usize,
    /// Renderables or render operations skipped after a failure.
    pub skipped: usize,
    /// Atoms left out of draws, one error per atom and draw.
    pub skipped_atoms: Vec<GraphicsError>,
}

/// What an invocation did, pass by pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub passes: Vec<PassReport>,
}

impl FrameReport {
    pub fn pass(&self, name: &str) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.name == name)
    }

    pub fn total_drawn(&self) -> usize {
        self.passes.iter().map(|p| p.drawn).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.passes.iter().map(|p| p.skipped).sum()
    }

    /// Names of the passes whose condition held.
    pub fn executed(&self) -> Vec<&str> {
        self.passes
            .iter()
            .filter(|p| p.executed)
            .map(|p| p.name.as_str())
            .collect()
    }
}

#[derive(Debug)]
struct ProcedureTarget {
    decl: TargetDecl,
    id: Option<TargetId>,
}

/// Resets the procedure to `Idle` however `invoke` exits.
struct StateGuard<'a>(&'a Cell<ProcedureState>);

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.0.set(ProcedureState::Idle);
    }
}

/// An ordered sequence of rendering passes producing one frame.
///
/// Pass dependencies are validated when the procedure is built. Building
/// also checks that the device can run it; an unavailable procedure keeps
/// the reason and refuses to run.
#[derive(Debug)]
pub struct SceneProcedure {
    name: String,
    targets: Vec<ProcedureTarget>,
    passes: Vec<ScenePass>,
    variables: HashMap<String, ParamValue>,
    /// Blur kernels sized relative to the viewport.
    relative_blurs: Vec<(String, TargetSize)>,
    unavailable: Option<GraphicsError>,
    viewport: Viewport,
    quad: Arc<GeometryData>,
    state: Cell<ProcedureState>,
    last_camera: Cell<Option<usize>>,
}

impl SceneProcedure {
    /// Build a procedure from its descriptor.
    ///
    /// Ordering is validated first; on failure nothing touches the device.
    /// Effects are looked up in `registry`; a missing effect, an unsupported
    /// target format or a shader model the device lacks makes the procedure
    /// unavailable rather than failing the load.
    ///
    /// # Errors
    ///
    /// Validation errors from [`validate_passes`], or target creation
    /// failures such as [`GraphicsError::OutOfDeviceMemory`].
    pub fn load(
        device: &mut RenderDevice,
        registry: &EffectRegistry,
        descriptor: &ProcedureDescriptor,
    ) -> Result<Self, GraphicsError> {
        let io: Vec<PassIo<'_>> = descriptor
            .passes
            .iter()
            .map(|p| PassIo {
                name: &p.name,
                output: &p.output,
                reads: &p.reads,
            })
            .collect();
        validate_passes(&descriptor.targets, &io)?;

        let mut passes = Vec::with_capacity(descriptor.passes.len());
        let mut missing = None;
        for decl in &descriptor.passes {
            let lookup = |name: &str| {
                registry
                    .effect(name)
                    .ok_or_else(|| GraphicsError::UnknownEffect(name.to_string()))
            };
            let pass = match &decl.kind {
                PassKindDecl::Scene {
                    selector,
                    effect_override,
                    lod,
                } => {
                    let mut pass = ScenePass::scene(&decl.name).with_lod(*lod);
                    if let Some(bit) = selector {
                        pass = pass.with_selector(Selector::Id(*bit));
                    }
                    if let Some(name) = effect_override {
                        match lookup(name) {
                            Ok(effect) => pass = pass.with_effect_override(effect),
                            Err(e) => {
                                missing.get_or_insert(e);
                                continue;
                            }
                        }
                    }
                    pass
                }
                PassKindDecl::Quad { effect } => match lookup(effect) {
                    Ok(effect) => ScenePass::quad(&decl.name, effect),
                    Err(e) => {
                        missing.get_or_insert(e);
                        continue;
                    }
                },
            };
            let mut pass = pass
                .with_clear(decl.clear.flags, decl.clear.value)
                .with_blend(decl.blend)
                .with_camera(decl.camera);
            pass.output = decl.output.clone();
            pass.reads = decl.reads.clone();
            pass.condition = decl.condition.clone();
            passes.push(pass);
        }

        let viewport = device.viewport();
        let variables = descriptor
            .variables
            .iter()
            .map(|v| (v.name.clone(), v.value.resolve(viewport)))
            .collect();
        let mut procedure = Self::assemble(
            device,
            descriptor.name.clone(),
            descriptor.targets.clone(),
            passes,
            variables,
            missing,
        )?;
        procedure.relative_blurs = descriptor
            .variables
            .iter()
            .filter_map(|v| Some((v.name.clone(), v.value.relative_size()?)))
            .collect();
        Ok(procedure)
    }

    /// Build a procedure from code-constructed passes.
    pub fn from_passes(
        device: &mut RenderDevice,
        name: impl Into<String>,
        targets: Vec<TargetDecl>,
        passes: Vec<ScenePass>,
    ) -> Result<Self, GraphicsError> {
        let io: Vec<PassIo<'_>> = passes
            .iter()
            .map(|p| PassIo {
                name: &p.name,
                output: &p.output,
                reads: &p.reads,
            })
            .collect();
        validate_passes(&targets, &io)?;
        Self::assemble(device, name.into(), targets, passes, HashMap::new(), None)
    }

    fn assemble(
        device: &mut RenderDevice,
        name: String,
        targets: Vec<TargetDecl>,
        passes: Vec<ScenePass>,
        variables: HashMap<String, ParamValue>,
        missing: Option<GraphicsError>,
    ) -> Result<Self, GraphicsError> {
        let unavailable = missing.or_else(|| Self::check_support(device, &targets, &passes));
        let mut procedure = Self {
            name,
            targets: targets
                .into_iter()
                .map(|decl| ProcedureTarget { decl, id: None })
                .collect(),
            passes,
            variables,
            relative_blurs: Vec::new(),
            unavailable,
            viewport: device.viewport(),
            quad: Arc::new(generators::fullscreen_quad()),
            state: Cell::new(ProcedureState::Idle),
            last_camera: Cell::new(None),
        };

        if let Some(reason) = &procedure.unavailable {
            log::warn!("SceneProcedure '{}' is unavailable: {}", procedure.name, reason);
            return Ok(procedure);
        }
        if let Err(e) = procedure.create_targets(device) {
            procedure.release_targets(device);
            return Err(e);
        }
        log::debug!(
            "SceneProcedure '{}': {} passes, {} targets",
            procedure.name,
            procedure.passes.len(),
            procedure.targets.len()
        );
        Ok(procedure)
    }

    fn check_support(
        device: &RenderDevice,
        targets: &[TargetDecl],
        passes: &[ScenePass],
    ) -> Option<GraphicsError> {
        let caps = device.capabilities();
        for t in targets {
            if !caps.supports_render_target(t.sample_count, t.color_format, t.depth_format) {
                return Some(GraphicsError::UnsupportedFormat {
                    color: t.color_format,
                    depth: t.depth_format,
                    samples: t.sample_count,
                });
            }
        }
        for effect in passes.iter().flat_map(|p| p.effects()) {
            let model = effect.min_shader_model();
            if !caps.supports_shader_model(model.major, model.minor) {
                return Some(GraphicsError::InvalidParameter(format!(
                    "effect '{}' needs shader model {}, device has {}",
                    effect.name(),
                    model,
                    caps.shader_model
                )));
            }
        }
        None
    }

    fn create_targets(&mut self, device: &mut RenderDevice) -> Result<(), GraphicsError> {
        let viewport = device.viewport();
        for target in &mut self.targets {
            if target.id.is_none() {
                target.id = Some(device.create_render_target(&target.decl.descriptor(viewport))?);
            }
        }
        self.viewport = viewport;
        Ok(())
    }

    fn release_targets(&mut self, device: &mut RenderDevice) {
        for target in &mut self.targets {
            if let Some(id) = target.id.take() {
                device.release_render_target(id);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn passes(&self) -> &[ScenePass] {
        &self.passes
    }

    pub fn state(&self) -> ProcedureState {
        self.state.get()
    }

    /// Whether the device can run this procedure.
    pub fn is_available(&self) -> bool {
        self.unavailable.is_none()
    }

    /// Why the procedure is unavailable.
    pub fn unavailable_reason(&self) -> Option<&GraphicsError> {
        self.unavailable.as_ref()
    }

    /// Camera index of the last pass executed.
    pub fn last_camera(&self) -> Option<usize> {
        self.last_camera.get()
    }

    /// Set a variable that effects read through `ParamSource::Variable`.
    /// Returns the previous value.
    pub fn set_variable(&mut self, name: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.variables.insert(name.into(), value)
    }

    pub fn variable(&self, name: &str) -> Option<&ParamValue> {
        self.variables.get(name)
    }

    pub fn target_id(&self, name: &str) -> Option<TargetId> {
        self.targets
            .iter()
            .find(|t| t.decl.name == name)
            .and_then(|t| t.id)
    }

    /// Borrow one of the procedure's targets.
    pub fn render_target<'d>(&self, device: &'d RenderDevice, name: &str) -> Option<&'d RenderTarget> {
        device.target(self.target_id(name)?)
    }

    /// Recreate relative-size targets if the viewport changed since they
    /// were created. Returns whether anything was recreated.
    ///
    /// Replacements are created before the old targets are released. If
    /// one cannot be created the ones already made are released again and
    /// the procedure keeps rendering at its previous size.
    ///
    /// # Errors
    ///
    /// Target creation failures such as [`GraphicsError::OutOfDeviceMemory`].
    pub fn check_dimensions(&mut self, device: &mut RenderDevice) -> Result<bool, GraphicsError> {
        let viewport = device.viewport();
        if viewport == self.viewport || !self.is_available() {
            return Ok(false);
        }

        let mut replacements = Vec::new();
        for (index, target) in self.targets.iter().enumerate() {
            if !target.decl.size.is_relative() {
                continue;
            }
            match device.create_render_target(&target.decl.descriptor(viewport)) {
                Ok(id) => replacements.push((index, id)),
                Err(e) => {
                    log::warn!(
                        "SceneProcedure '{}': cannot resize '{}' for {}x{}: {}",
                        self.name,
                        target.decl.name,
                        viewport.width,
                        viewport.height,
                        e
                    );
                    for (_, id) in replacements {
                        device.release_render_target(id);
                    }
                    return Err(e);
                }
            }
        }

        let recreated = !replacements.is_empty();
        for (index, id) in replacements {
            if let Some(old) = self.targets[index].id.replace(id) {
                device.release_render_target(old);
            }
        }
        for (name, size) in &self.relative_blurs {
            if let Some(ParamValue::BlurFilter(filter)) = self.variables.get_mut(name) {
                let (width, height) = size.resolve(viewport);
                filter.resize(width, height);
            }
        }
        self.viewport = viewport;
        if recreated {
            log::debug!(
                "SceneProcedure '{}': targets resized for {}x{}",
                self.name,
                viewport.width,
                viewport.height
            );
        }
        Ok(recreated)
    }

    /// Release every target owned by the procedure.
    pub fn release(mut self, device: &mut RenderDevice) {
        self.release_targets(device);
    }

    /// Run every pass in order.
    ///
    /// Each scene pass renders with `cameras[pass.camera]`. A pass whose
    /// condition is false is reported as not executed and publishes no
    /// output. Per-renderable failures are logged and skipped; a failure to
    /// bind or clear a pass target aborts the invocation.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::AlreadyInProgress`] when called while running
    /// - [`GraphicsError::InvalidParameter`] for an unavailable procedure or
    ///   a camera index outside `cameras`
    /// - [`GraphicsError::BindFailed`] when a pass target cannot be bound
    pub fn invoke(
        &self,
        device: &mut RenderDevice,
        cameras: &[Camera],
        renderables: &[&dyn Renderable],
        ctx: &RenderContext,
    ) -> Result<FrameReport, GraphicsError> {
        if self.state.get() != ProcedureState::Idle {
            return Err(GraphicsError::AlreadyInProgress(self.name.clone()));
        }
        if let Some(reason) = &self.unavailable {
            return Err(GraphicsError::InvalidParameter(format!(
                "procedure '{}' is unavailable: {reason}",
                self.name
            )));
        }
        if let Some(pass) = self
            .passes
            .iter()
            .find(|p| p.is_scene() && p.camera >= cameras.len())
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "pass '{}' uses camera {} of {}",
                pass.name,
                pass.camera,
                cameras.len()
            )));
        }

        let _guard = StateGuard(&self.state);
        let fallback_camera = Camera::default();
        let mut produced: HashMap<&str, TargetId> = HashMap::new();
        let mut report = FrameReport::default();

        for (index, pass) in self.passes.iter().enumerate() {
            self.state.set(ProcedureState::Running { pass: index });
            if let Some(condition) = &pass.condition
                && !condition.evaluate(&self.variables, renderables)
            {
                log::trace!(
                    "SceneProcedure '{}': pass '{}' skipped by its condition",
                    self.name,
                    pass.name
                );
                report.passes.push(PassReport {
                    name: pass.name.clone(),
                    ..PassReport::default()
                });
                continue;
            }
            let camera = cameras.get(pass.camera).unwrap_or(&fallback_camera);
            let inputs: HashMap<String, TargetId> = pass
                .reads
                .iter()
                .filter_map(|r| Some((r.target.clone(), *produced.get(r.target.as_str())?)))
                .collect();

            report
                .passes
                .push(self.run_pass(device, pass, camera, renderables, ctx, &inputs)?);
            self.last_camera.set(Some(pass.camera));

            if let PassOutput::Target(name) = &pass.output
                && let Some(id) = self.target_id(name)
            {
                produced.insert(name.as_str(), id);
            }
        }
        Ok(report)
    }

    fn run_pass(
        &self,
        device: &mut RenderDevice,
        pass: &ScenePass,
        camera: &Camera,
        renderables: &[&dyn Renderable],
        ctx: &RenderContext,
        inputs: &HashMap<String, TargetId>,
    ) -> Result<PassReport, GraphicsError> {
        let (bind, viewport) = match &pass.output {
            PassOutput::BackBuffer => (BindTarget::BackBuffer, device.viewport()),
            PassOutput::Target(name) => {
                let id = self.target_id(name).ok_or_else(|| {
                    GraphicsError::Internal(format!("target '{name}' was never created"))
                })?;
                let size = device
                    .target(id)
                    .map(|t| Viewport::new(t.width(), t.height()))
                    .ok_or_else(|| {
                        GraphicsError::Internal(format!("target '{name}' was released"))
                    })?;
                (BindTarget::Target(id), size)
            }
        };

        log::trace!("SceneProcedure '{}': pass '{}'", self.name, pass.name);
        device.bind_render_target(bind)?;
        device.set_blend_mode(pass.blend);
        device.clear(pass.effective_clear_flags(), &pass.clear.value)?;

        let apply_ctx = ApplyContext::new(camera, ctx, viewport)
            .with_variables(&self.variables)
            .with_inputs(inputs);
        let mut report = PassReport {
            name: pass.name.clone(),
            executed: true,
            ..PassReport::default()
        };

        match &pass.kind {
            PassKind::Scene {
                selector,
                effect_override,
                lod,
            } => {
                for renderable in renderables.iter().filter(|r| selector.matches(**r)) {
                    let operations = match renderable.render_operations(*lod) {
                        Some(ops) if !ops.is_empty() => ops,
                        _ => {
                            log::warn!(
                                "Pass '{}': '{}' has nothing to draw at LOD {}",
                                pass.name,
                                renderable.name(),
                                lod
                            );
                            report.skipped += 1;
                            continue;
                        }
                    };
                    for op in &operations {
                        let Some(effect) = effect_override.as_ref().or(op.effect.as_ref()) else {
                            log::warn!(
                                "Pass '{}': '{}' has a render operation without an effect",
                                pass.name,
                                renderable.name()
                            );
                            report.skipped += 1;
                            continue;
                        };
                        match effect.apply(device, op, &apply_ctx) {
                            Ok(applied) => {
                                report.drawn += 1;
                                report.skipped_atoms.extend(applied.skipped);
                            }
                            Err(e) => {
                                log::warn!(
                                    "Pass '{}': skipping '{}': {}",
                                    pass.name,
                                    renderable.name(),
                                    e
                                );
                                report.skipped += 1;
                            }
                        }
                    }
                }
            }
            PassKind::Quad { effect } => {
                let op = RenderOperation::new(self.quad.clone());
                match effect.apply(device, &op, &apply_ctx) {
                    Ok(applied) => {
                        report.drawn += 1;
                        report.skipped_atoms.extend(applied.skipped);
                    }
                    Err(e) => {
                        log::warn!("Pass '{}': fullscreen draw failed: {}", pass.name, e);
                        report.skipped += 1;
                    }
                }
            }
        }
        Ok(report)
    }
}

static_assertions::assert_impl_all!(SceneProcedure: Send);
