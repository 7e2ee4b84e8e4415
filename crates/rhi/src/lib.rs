//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides owning wrappers over Vulkan objects using the `ash` crate.
//! It handles:
//! - Instance, debug messenger and surface creation
//! - Physical device selection and logical device creation
//! - Swapchain management
//! - Render pass, framebuffer and pipeline creation
//! - Command buffer recording and synchronization primitives
//!
//! Every wrapper destroys its handle on drop and logs the destruction. Objects
//! created from a [`device::Device`] hold an `Arc` to it, so the logical
//! device is destroyed last.

mod error;

pub mod command;
pub mod device;
pub mod framebuffer;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
