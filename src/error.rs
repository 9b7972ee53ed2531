//! Error types for material compilation and application startup.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building a patched material.
#[derive(Debug, Error)]
pub enum MaterialError {
    /// A patch map names an injection site the base model does not publish.
    #[error("patch point `{point}` does not exist in the {model} base model")]
    PatchPointNotFound { point: String, model: &'static str },

    /// The assembled shader failed to parse, validate, or build a pipeline.
    #[error("shader `{label}` failed to compile:\n{diagnostic}")]
    ShaderCompile { label: String, diagnostic: String },

    /// A uniform name was declared twice in the same store.
    #[error("uniform `{0}` is already declared")]
    DuplicateUniform(String),
}

/// Errors that stop the application from starting or running.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported texture formats")]
    NoSurfaceFormat,

    #[error("failed to load font {}: {reason}", path.display())]
    Font { path: PathBuf, reason: String },

    #[error(transparent)]
    Material(#[from] MaterialError),
}
