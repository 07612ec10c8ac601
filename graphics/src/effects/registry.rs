//! Effect registry: owner of shared atoms and named effects.

use std::collections::HashMap;
use std::sync::Arc;

use slotmap::{SlotMap, new_key_type};

use crate::error::GraphicsError;

use super::atom::EffectAtom;
use super::effect::{Effect, EffectBuilder};

new_key_type! {
    /// Stable handle to a registered atom.
    pub struct AtomId;
}

/// Arena of registered atoms plus a name table of effects built from them.
///
/// Atoms are immutable once registered. Effects hold `Arc`s to the atoms,
/// so an atom shared by several effects is stored once.
#[derive(Debug, Default)]
pub struct EffectRegistry {
    atoms: SlotMap<AtomId, Arc<EffectAtom>>,
    atom_names: HashMap<String, AtomId>,
    effects: HashMap<String, Arc<Effect>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an atom. Atom names are unique within a registry.
    pub fn register_atom(&mut self, atom: EffectAtom) -> Result<AtomId, GraphicsError> {
        if self.atom_names.contains_key(atom.name()) {
            return Err(GraphicsError::InvalidParameter(format!(
                "atom '{}' is already registered",
                atom.name()
            )));
        }
        let name = atom.name().to_string();
        let id = self.atoms.insert(Arc::new(atom));
        log::debug!("EffectRegistry: registered atom '{name}'");
        self.atom_names.insert(name, id);
        Ok(id)
    }

    pub fn atom(&self, id: AtomId) -> Option<&Arc<EffectAtom>> {
        self.atoms.get(id)
    }

    pub fn atom_id(&self, name: &str) -> Option<AtomId> {
        self.atom_names.get(name).copied()
    }

    /// Build an effect from registered atoms, in the given order, and
    /// register it under `name`.
    ///
    /// # Errors
    ///
    /// Everything [`EffectBuilder::build`] reports, plus
    /// [`GraphicsError::InvalidParameter`] for a taken name or an unknown
    /// atom id.
    pub fn register_effect(
        &mut self,
        name: &str,
        atoms: &[AtomId],
    ) -> Result<Arc<Effect>, GraphicsError> {
        if self.effects.contains_key(name) {
            return Err(GraphicsError::InvalidParameter(format!(
                "effect '{name}' is already registered"
            )));
        }
        let mut builder = EffectBuilder::new(name);
        for &id in atoms {
            let atom = self.atoms.get(id).ok_or_else(|| {
                GraphicsError::InvalidParameter(format!("effect '{name}': unknown atom {id:?}"))
            })?;
            builder = builder.with_atom(atom.clone());
        }
        let effect = Arc::new(builder.build()?);
        self.effects.insert(name.to_string(), effect.clone());
        Ok(effect)
    }

    /// Register an effect built elsewhere.
    pub fn insert_effect(&mut self, effect: Effect) -> Result<Arc<Effect>, GraphicsError> {
        if self.effects.contains_key(effect.name()) {
            return Err(GraphicsError::InvalidParameter(format!(
                "effect '{}' is already registered",
                effect.name()
            )));
        }
        let effect = Arc::new(effect);
        self.effects
            .insert(effect.name().to_string(), effect.clone());
        Ok(effect)
    }

    pub fn effect(&self, name: &str) -> Option<Arc<Effect>> {
        self.effects.get(name).cloned()
    }

    pub fn has_effect(&self, name: &str) -> bool {
        self.effects.contains_key(name)
    }

    /// Registered effect names, sorted.
    pub fn effect_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.effects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectParameter, ParamSource, ShaderStage};

    fn registry() -> (EffectRegistry, AtomId, AtomId) {
        let mut registry = EffectRegistry::new();
        let transform = registry
            .register_atom(
                EffectAtom::new(
                    "transform",
                    ShaderStage::Vertex,
                    "",
                    vec![EffectParameter::auto("wvp", ParamSource::WorldViewProjection)],
                )
                .unwrap(),
            )
            .unwrap();
        let flat = registry
            .register_atom(EffectAtom::new("flat", ShaderStage::Fragment, "", vec![]).unwrap())
            .unwrap();
        (registry, transform, flat)
    }

    #[test]
    fn test_atoms_shared_between_effects() {
        let (mut registry, transform, flat) = registry();
        let a = registry.register_effect("a", &[transform, flat]).unwrap();
        let b = registry.register_effect("b", &[transform]).unwrap();
        assert!(Arc::ptr_eq(&a.atoms()[0], &b.atoms()[0]));
        assert_eq!(registry.atom_count(), 2);
        assert_eq!(registry.effect_names(), ["a", "b"]);
        assert!(registry.has_effect("a"));
        assert!(registry.effect("c").is_none());
    }

    #[test]
    fn test_names_are_unique() {
        let (mut registry, transform, _) = registry();
        assert!(
            registry
                .register_atom(EffectAtom::new("transform", ShaderStage::Vertex, "", vec![]).unwrap())
                .is_err()
        );
        registry.register_effect("a", &[transform]).unwrap();
        assert!(registry.register_effect("a", &[transform]).is_err());
        assert_eq!(registry.atom_id("transform"), Some(transform));
    }

    #[test]
    fn test_unknown_atom_id() {
        let (mut other, _, _) = registry();
        let stray = other
            .register_atom(EffectAtom::new("stray", ShaderStage::Fragment, "", vec![]).unwrap())
            .unwrap();
        let mut registry = EffectRegistry::new();
        assert!(registry.register_effect("x", &[stray]).is_err());
    }
}
