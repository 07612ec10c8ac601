//! CPU-side geometry consumed by render operations.
//!
//! - [`VertexLayout`] - Interleaved vertex attribute description
//! - [`GeometryData`] - Vertex and index bytes plus draw counts
//! - Generators for shapes the renderer needs (fullscreen quad, cube, sphere)

mod data;
pub mod generators;
mod layout;

pub use data::{GeometryData, IndexFormat, PrimitiveTopology};
pub use layout::{VertexAttribute, VertexAttributeFormat, VertexAttributeSemantic, VertexLayout};
