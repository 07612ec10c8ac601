//! Effects: ordered compositions of shared atoms.

use std::sync::Arc;

use crate::device::{DrawRequest, RenderDevice};
use crate::error::GraphicsError;
use crate::scene::RenderOperation;
use crate::types::ShaderModel;

use super::atom::EffectAtom;
use super::context::ApplyContext;
use super::parameter::{EffectParameter, ParamValue};

/// An ordered composition of effect atoms.
///
/// Atom order is shader execution order. Parameters declared by more than
/// one atom are merged when they bind the same source with the same type.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    name: String,
    atoms: Vec<Arc<EffectAtom>>,
    parameters: Vec<EffectParameter>,
}

/// Builder for [`Effect`].
#[derive(Debug, Clone)]
pub struct EffectBuilder {
    name: String,
    atoms: Vec<Arc<EffectAtom>>,
}

impl EffectBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            atoms: Vec::new(),
        }
    }

    /// Append an atom. Atoms run in the order they are appended.
    pub fn with_atom(mut self, atom: Arc<EffectAtom>) -> Self {
        self.atoms.push(atom);
        self
    }

    /// Build the effect.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::DuplicateParameterBinding`] when two atoms declare
    ///   the same parameter name with different sources or types
    /// - [`GraphicsError::InvalidParameter`] for an effect without atoms or
    ///   with the same atom twice
    pub fn build(self) -> Result<Effect, GraphicsError> {
        if self.atoms.is_empty() {
            return Err(GraphicsError::InvalidParameter(format!(
                "effect '{}' has no atoms",
                self.name
            )));
        }

        let mut parameters: Vec<EffectParameter> = Vec::new();
        // atom that first declared each merged parameter
        let mut owners: Vec<&str> = Vec::new();
        for (i, atom) in self.atoms.iter().enumerate() {
            if self.atoms[..i].iter().any(|a| a.name() == atom.name()) {
                return Err(GraphicsError::InvalidParameter(format!(
                    "effect '{}' contains atom '{}' twice",
                    self.name,
                    atom.name()
                )));
            }
            for param in atom.params() {
                match parameters.iter().position(|p| p.name == param.name) {
                    Some(idx) if parameters[idx].same_binding(param) => {}
                    Some(idx) => {
                        return Err(GraphicsError::DuplicateParameterBinding {
                            parameter: param.name.clone(),
                            first_atom: owners[idx].to_string(),
                            second_atom: atom.name().to_string(),
                        });
                    }
                    None => {
                        parameters.push(param.clone());
                        owners.push(atom.name());
                    }
                }
            }
        }

        log::debug!(
            "Effect '{}': {} atoms, {} parameters",
            self.name,
            self.atoms.len(),
            parameters.len()
        );
        Ok(Effect {
            name: self.name,
            atoms: self.atoms,
            parameters,
        })
    }
}

/// Outcome of applying an effect to one render operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Atoms that contributed to the draw.
    pub applied_atoms: usize,
    /// One [`GraphicsError::UnboundParameter`] per skipped atom.
    pub skipped: Vec<GraphicsError>,
    pub vertices: u32,
    pub primitives: u32,
}

impl Effect {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn atoms(&self) -> &[Arc<EffectAtom>] {
        &self.atoms
    }

    /// Merged parameter declarations, in first-declaration order.
    pub fn parameters(&self) -> &[EffectParameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&EffectParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Lowest shader model that runs every atom.
    pub fn min_shader_model(&self) -> ShaderModel {
        self.atoms
            .iter()
            .map(|a| a.min_shader_model())
            .max()
            .unwrap_or_default()
    }

    /// Bind every atom's parameters from `ctx` and draw `op` into the bound
    /// target.
    ///
    /// An atom with a parameter that cannot be resolved is left out of the
    /// draw and reported in [`ApplyReport::skipped`]; the remaining atoms
    /// still draw.
    ///
    /// # Errors
    ///
    /// [`GraphicsError::DrawFailed`] when every atom was skipped, or any
    /// error the device reports for the draw itself.
    pub fn apply(
        &self,
        device: &mut RenderDevice,
        op: &RenderOperation,
        ctx: &ApplyContext<'_>,
    ) -> Result<ApplyReport, GraphicsError> {
        let mut active: Vec<&EffectAtom> = Vec::with_capacity(self.atoms.len());
        let mut values: Vec<(&str, ParamValue)> = Vec::new();
        let mut skipped = Vec::new();

        'atoms: for atom in &self.atoms {
            let mut atom_values = Vec::with_capacity(atom.params().len());
            for param in atom.params() {
                if let Some(&(_, value)) = values.iter().find(|(n, _)| *n == param.name) {
                    atom_values.push((param.name.as_str(), value));
                    continue;
                }
                match ctx.resolve(param, op, device) {
                    Some(value) => atom_values.push((param.name.as_str(), value)),
                    None => {
                        let err = GraphicsError::UnboundParameter {
                            atom: atom.name().to_string(),
                            parameter: param.name.clone(),
                        };
                        log::warn!("Effect '{}': skipping atom: {}", self.name, err);
                        skipped.push(err);
                        continue 'atoms;
                    }
                }
            }
            for (name, value) in atom_values {
                if !values.iter().any(|(n, _)| *n == name) {
                    values.push((name, value));
                }
            }
            active.push(atom.as_ref());
        }

        if active.is_empty() {
            return Err(GraphicsError::DrawFailed(format!(
                "effect '{}': every atom was skipped",
                self.name
            )));
        }

        log::trace!(
            "Effect '{}': drawing with {}/{} atoms",
            self.name,
            active.len(),
            self.atoms.len()
        );
        device.draw(&DrawRequest {
            effect: &self.name,
            atoms: &active,
            values: &values,
            geometry: op.geometry.as_ref(),
        })?;

        Ok(ApplyReport {
            applied_atoms: active.len(),
            skipped,
            vertices: op.geometry.vertex_count(),
            primitives: op.geometry.primitive_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CapabilityProfile, NullBackend, NullCommand};
    use crate::effects::{ParamSource, ParamType, ShaderStage};
    use crate::scene::{Camera, RenderContext};
    use crate::types::Viewport;
    use umbra_core::mesh::generators;

    fn atom(name: &str, stage: ShaderStage, params: Vec<EffectParameter>) -> Arc<EffectAtom> {
        Arc::new(EffectAtom::new(name, stage, "", params).unwrap())
    }

    fn transform() -> Arc<EffectAtom> {
        atom(
            "transform",
            ShaderStage::Vertex,
            vec![
                EffectParameter::auto("wvp", ParamSource::WorldViewProjection),
                EffectParameter::auto("world", ParamSource::World),
            ],
        )
    }

    #[test]
    fn test_shared_parameter_merges() {
        let lighting = atom(
            "lighting",
            ShaderStage::Fragment,
            vec![
                EffectParameter::auto("world", ParamSource::World),
                EffectParameter::auto("light_dir", ParamSource::LightDirection),
            ],
        );
        let effect = EffectBuilder::new("lit")
            .with_atom(transform())
            .with_atom(lighting)
            .build()
            .unwrap();
        let names: Vec<_> = effect.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["wvp", "world", "light_dir"]);
    }

    #[test]
    fn test_conflicting_binding_rejected_in_atom_order() {
        let a = transform();
        let b = atom(
            "skin",
            ShaderStage::Vertex,
            vec![EffectParameter::auto("world", ParamSource::View)],
        );
        let err = EffectBuilder::new("bad")
            .with_atom(a.clone())
            .with_atom(b.clone())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            GraphicsError::DuplicateParameterBinding {
                parameter: "world".into(),
                first_atom: "transform".into(),
                second_atom: "skin".into(),
            }
        );

        let err = EffectBuilder::new("bad")
            .with_atom(b)
            .with_atom(a)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            GraphicsError::DuplicateParameterBinding { ref first_atom, .. } if first_atom == "skin"
        ));
    }

    #[test]
    fn test_empty_effect_rejected() {
        assert!(EffectBuilder::new("nothing").build().is_err());
        let t = transform();
        assert!(
            EffectBuilder::new("twice")
                .with_atom(t.clone())
                .with_atom(t)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_unbound_parameter_skips_only_its_atom() {
        let backend = NullBackend::new(CapabilityProfile::Modern);
        let log = backend.command_log();
        let mut device = RenderDevice::new(Box::new(backend));

        let exposure = atom(
            "exposure",
            ShaderStage::Fragment,
            vec![EffectParameter::new(
                "exposure",
                ParamType::Float,
                ParamSource::Variable("exposure".into()),
            )],
        );
        let effect = EffectBuilder::new("tonemapped")
            .with_atom(transform())
            .with_atom(exposure)
            .build()
            .unwrap();

        let camera = Camera::default();
        let render = RenderContext::new();
        let ctx = ApplyContext::new(&camera, &render, Viewport::new(64, 64));
        let op = RenderOperation::new(Arc::new(generators::cube(1.0)));

        let report = effect.apply(&mut device, &op, &ctx).unwrap();
        assert_eq!(report.applied_atoms, 1);
        assert_eq!(
            report.skipped,
            vec![GraphicsError::UnboundParameter {
                atom: "exposure".into(),
                parameter: "exposure".into(),
            }]
        );
        assert_eq!(report.primitives, 12);

        let draws = log.draws();
        assert!(matches!(
            &draws[0],
            NullCommand::Draw { atoms, .. } if atoms == &["transform".to_string()]
        ));
    }

    #[test]
    fn test_all_atoms_skipped_is_draw_failure() {
        let mut device = RenderDevice::new(Box::new(NullBackend::default()));
        let lit = atom(
            "lit",
            ShaderStage::Fragment,
            vec![EffectParameter::auto("light_dir", ParamSource::LightDirection)],
        );
        let effect = EffectBuilder::new("lit").with_atom(lit).build().unwrap();
        let camera = Camera::default();
        let render = RenderContext::new();
        let ctx = ApplyContext::new(&camera, &render, Viewport::new(64, 64));
        let op = RenderOperation::new(Arc::new(generators::cube(1.0)));
        assert!(matches!(
            effect.apply(&mut device, &op, &ctx),
            Err(GraphicsError::DrawFailed(_))
        ));
    }

    #[test]
    fn test_min_shader_model_is_max_over_atoms() {
        let pcf = Arc::new(
            EffectAtom::new("pcf", ShaderStage::Fragment, "", vec![])
                .unwrap()
                .with_shader_model(ShaderModel::SM4_0),
        );
        let effect = EffectBuilder::new("shadowed")
            .with_atom(transform())
            .with_atom(pcf)
            .build()
            .unwrap();
        assert_eq!(effect.min_shader_model(), ShaderModel::SM4_0);
    }
}
