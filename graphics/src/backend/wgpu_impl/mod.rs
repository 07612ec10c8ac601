//! Support code for the wgpu backend.

pub(crate) mod conversion;
pub(crate) mod shader;
