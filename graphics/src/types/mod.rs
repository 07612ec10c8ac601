//! Common types and descriptors for render targets and passes.
//!
//! This module contains format enums, clear flags, and descriptor structs
//! used throughout the graphics system.

mod common;
mod texture;

pub use common::{BlendMode, ClearFlags, ClearValue, ShaderModel, Viewport};
pub use texture::{Attachment, RenderTargetDescriptor, TextureFormat};
