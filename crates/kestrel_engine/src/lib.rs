//! # Kestrel Engine
//!
//! A 3D rendering engine built on an explicit Vulkan backend.
//!
//! ## Features
//!
//! - **Explicit frame pacing**: a fixed ring of frame-in-flight slots with
//!   per-slot command buffers and sync objects
//! - **Shared pipelines**: renderers with identical settings share one
//!   cached pipeline and get private per-frame uniform/descriptor slots
//! - **RAII resources**: buffers, images and sync objects own their GPU
//!   memory and release it deterministically
//! - **Scene hook**: the engine drives acquire/submit/present and hands
//!   draw-call recording to a render callback supplied by the scene layer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kestrel_engine::core::config::EngineConfig;
//! use kestrel_engine::render::vulkan::VulkanRenderingEngine;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     kestrel_engine::foundation::logging::init();
//!
//!     let config = EngineConfig::default();
//!     let mut engine = VulkanRenderingEngine::new(&config)?;
//!     engine.set_render_callback(Box::new(|_command_buffer, _frame, _ctx| {
//!         // record per-object draw calls here
//!     }));
//!
//!     while !engine.window().should_close() {
//!         for (_, event) in engine.window_mut().poll_and_collect_events() {
//!             if let glfw::WindowEvent::FramebufferSize(width, height) = event {
//!                 engine.signal_framebuffer_resize(width as u32, height as u32);
//!             }
//!         }
//!         engine.draw_frame()?;
//!     }
//!
//!     engine.sync_device_wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod core;
pub mod foundation;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::core::config::{EngineConfig, RendererConfig, WindowConfig};
    pub use crate::foundation::math::{Mat4, Transform, Vec3};
    pub use crate::render::mesh_builders::{FontAtlas, Glyph, MeshBuilder};
    pub use crate::render::renderers::{Renderer, RendererKind};
    pub use crate::render::vertex::RenderingVertex;
    pub use crate::render::vulkan::{
        PipelineSettings, ShaderDefinition, VulkanError, VulkanRenderingEngine, VulkanResult,
    };
}
