//! Core engine services: configuration and lifecycle plumbing

pub mod config;

pub use config::{ConfigError, EngineConfig, RendererConfig, WindowConfig};
