//! Asset loading collaborators
//!
//! Load-time helpers that feed decoded asset data into the renderer's
//! blocking resource-creation interface.

pub mod texture_factory;

pub use texture_factory::{load_texture_png, solid_color_texture, AssetError};
