//! Triangle rendering on top of the RHI.
//!
//! This crate orchestrates the rendering process:
//! - Frame slots and the frame cursor
//! - The per-frame acquire, record, submit and present sequence
//! - Command recording for the triangle pass
//! - The [`Renderer`] owning the render pass, pipeline and framebuffers

pub mod frame;
pub mod frame_manager;
pub mod recording;
pub mod renderer;

pub use frame::FrameCursor;
pub use frame_manager::{Acquired, FrameBackend, FrameStatus, Presented, draw_frame};
pub use renderer::Renderer;

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
