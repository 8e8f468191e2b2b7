//! Error types.
//!
//! Failures fall into three tiers:
//!
//! 1. **Fatal configuration** ([`VistaError::FatalConfig`], adapter/device
//!    failures): the engine enters a non-initialised state and every
//!    subsequent operation is a no-op.
//! 2. **Recoverable asset errors** (shader compile failures, bad texture
//!    data): logged, a fallback is substituted, the frame loop never sees
//!    them as errors.
//! 3. **Invariant violations on admission** ([`VistaError::InvalidObject`],
//!    [`VistaError::InvalidMesh`]): returned to the caller; nothing is
//!    partially admitted.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VistaError {
    // ========================================================================
    // GPU & configuration
    // ========================================================================
    /// Fatal configuration error; the engine cannot render.
    #[error("Fatal configuration error: {0}")]
    FatalConfig(String),

    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Surface creation error.
    #[error("Surface creation error: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),

    /// Window system error.
    #[error("Window system error: {0}")]
    WindowError(#[from] raw_window_handle::HandleError),

    // ========================================================================
    // Admission errors
    // ========================================================================
    /// Object rejected at admission (material slot out of range, etc.).
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Mesh rejected at registration.
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// A GPU upload ran out of memory; the resource becomes unavailable.
    #[error("GPU allocation failed: {0}")]
    GpuAllocFailed(String),
}

/// Alias for `Result<T, VistaError>`.
pub type Result<T> = std::result::Result<T, VistaError>;
