//! Scene procedures: multi-pass frame rendering.
//!
//! A [`SceneProcedure`] runs an ordered list of [`ScenePass`]es. Each pass
//! binds its output (a procedure target or the back buffer), clears it,
//! and draws either the selected renderables or a fullscreen quad. Targets
//! written by a pass become readable by later passes that declare them in
//! their `reads`. A pass with a [`PassCondition`] only runs on frames where
//! the condition holds.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ProcedureDescriptor`] | Serde form: targets, variables, passes |
//! | [`ScenePass`] | Runtime pass with resolved effects |
//! | [`SceneProcedure`] | Validated, device-bound procedure |
//! | [`FrameReport`] | Per-pass outcome of one `invoke` |

mod descriptor;
mod pass;
mod scene_procedure;
mod validation;

pub use descriptor::{
    ClearConfig, PassCondition, PassDecl, PassInput, PassKindDecl, PassOutput,
    ProcedureDescriptor, TargetDecl, TargetSize, VariableDecl, VariableValue,
};
pub use pass::{PassKind, ScenePass, Selector};
pub use scene_procedure::{FrameReport, PassReport, ProcedureState, SceneProcedure};
pub use validation::{PassIo, validate_passes};
