//! Rendering subsystem
//!
//! The Vulkan backend lives in [`vulkan`]; [`renderers`] and
//! [`mesh_builders`] provide the per-object layer the scene graph drives
//! through the engine's render callback.

/// Geometry generators per renderer kind
pub mod mesh_builders;
/// Per-object renderers
pub mod renderers;
/// GPU-visible data layouts
pub mod vertex;
/// Vulkan backend
pub mod vulkan;

pub use mesh_builders::{FontAtlas, Glyph, MeshBuilder};
pub use renderers::{Renderer, RendererKind};
pub use vertex::{MatrixUbo, RenderingVertex};
