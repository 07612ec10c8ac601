//! Scene-side data consumed by effects and scene procedures.
//!
//! - [`Camera`] - View/projection snapshot a pass renders from
//! - [`Light`] - Directional light feeding light parameters
//! - [`Material`] - Colors, texture slots and custom values of a render operation
//! - [`Renderable`] - Anything that can hand out render operations for a LOD
//! - [`RenderContext`] - Per-frame state shared by every pass

mod camera;
mod material;
mod renderable;

pub use camera::Camera;
pub use material::Material;
pub use renderable::{Light, RenderContext, RenderOperation, RenderOperationBuffer, Renderable};
