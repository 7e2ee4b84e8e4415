//! Platform abstraction layer for the triangle renderer.
//!
//! This crate provides the native window:
//! - Window creation via winit, pumped from the caller's loop
//! - Framebuffer extent and close signal
//! - Raw window handles for Vulkan surface creation

mod window;

pub use window::Window;
