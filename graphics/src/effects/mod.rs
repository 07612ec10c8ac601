//! Composable effects.
//!
//! An [`Effect`] is an ordered list of [`EffectAtom`]s. Each atom is an
//! indivisible shader fragment that declares [`EffectParameter`]s, and each
//! parameter names the engine-level [`ParamSource`] that feeds it. Atoms
//! live in an [`EffectRegistry`] and are shared between effects.
//!
//! Applying an effect resolves every parameter through an
//! [`ApplyContext`]. Atoms with an unresolvable parameter drop out of that
//! one draw instead of failing it.

mod atom;
mod context;
mod effect;
pub mod library;
mod parameter;
mod registry;

pub use atom::{EffectAtom, ShaderStage};
pub use context::ApplyContext;
pub use effect::{ApplyReport, Effect, EffectBuilder};
pub use library::register_standard_effects;
pub use parameter::{EffectParameter, MATERIAL_TEXTURE_SLOTS, ParamSource, ParamType, ParamValue};
pub use registry::{AtomId, EffectRegistry};
