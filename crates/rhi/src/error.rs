//! RHI-specific error types.
//!
//! Construction failures carry the `vk::Result` reported by the driver so the
//! fatal message names both the failing step and the API code.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Failed to load the Vulkan loader library
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// Auxiliary Vulkan query or wait failed
    #[error("Vulkan error: {0:?}")]
    Vulkan(#[from] vk::Result),

    /// Raw window or display handle unavailable
    #[error("Window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("Validation layer requested but VK_LAYER_KHRONOS_validation is not installed")]
    ValidationLayerMissing,

    #[error("Failed to create Vulkan instance: {0:?}")]
    InstanceCreate(vk::Result),

    #[error("Failed to create window surface: {0:?}")]
    SurfaceCreate(vk::Result),

    #[error("Failed to create debug messenger: {0:?}")]
    DebugMessengerCreate(vk::Result),

    #[error("No GPU with Vulkan support found")]
    NoGpuFound,

    #[error("No suitable GPU found")]
    NoSuitableGpu,

    #[error("Failed to create logical device: {0:?}")]
    DeviceCreate(vk::Result),

    #[error("Failed to create swapchain: {0:?}")]
    SwapchainCreate(vk::Result),

    #[error("Failed to create image view {index}: {code:?}")]
    ImageViewCreate { index: usize, code: vk::Result },

    #[error("Failed to load shader {path:?}: {reason}")]
    ShaderLoad { path: PathBuf, reason: String },

    #[error("Failed to create shader module: {0:?}")]
    ShaderModuleCreate(vk::Result),

    #[error("Failed to create pipeline layout: {0:?}")]
    PipelineLayoutCreate(vk::Result),

    #[error("Failed to create graphics pipeline: {0:?}")]
    PipelineCreate(vk::Result),

    /// Graphics pipeline builder misuse (missing shader, render pass, ...)
    #[error("Invalid pipeline description: {0}")]
    InvalidPipeline(String),

    #[error("Failed to create render pass: {0:?}")]
    RenderPassCreate(vk::Result),

    #[error("Failed to create framebuffer {index}: {code:?}")]
    FramebufferCreate { index: usize, code: vk::Result },

    #[error("Failed to create command pool: {0:?}")]
    CommandPoolCreate(vk::Result),

    #[error("Failed to allocate command buffers: {0:?}")]
    CommandBufferAlloc(vk::Result),

    #[error("Failed to create synchronization object: {0:?}")]
    SyncObjectCreate(vk::Result),

    #[error("Failed to acquire swapchain image: {0:?}")]
    Acquire(vk::Result),

    #[error("Failed to record command buffer: {0:?}")]
    Record(vk::Result),

    #[error("Failed to submit draw command buffer: {0:?}")]
    Submit(vk::Result),

    #[error("Failed to present swapchain image: {0:?}")]
    Present(vk::Result),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_result_code() {
        let err = RhiError::FramebufferCreate {
            index: 2,
            code: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
        };
        let message = err.to_string();
        assert!(message.contains("framebuffer 2"));
        assert!(message.contains("ERROR_OUT_OF_HOST_MEMORY"));
    }

    #[test]
    fn test_vk_result_converts() {
        let err: RhiError = vk::Result::ERROR_DEVICE_LOST.into();
        assert!(matches!(err, RhiError::Vulkan(vk::Result::ERROR_DEVICE_LOST)));
    }
}
