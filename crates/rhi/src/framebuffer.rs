//! Framebuffers binding swapchain image views to a render pass.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::render_pass::RenderPass;

/// Vulkan framebuffer wrapper with a single color attachment.
pub struct Framebuffer {
    device: Arc<Device>,
    framebuffer: vk::Framebuffer,
    attachment: vk::ImageView,
}

impl Framebuffer {
    /// Creates a one-layer framebuffer of `extent` whose only attachment is `view`.
    ///
    /// # Errors
    ///
    /// Returns the raw result code; callers attach the image index.
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<Self, vk::Result> {
        let attachments = [view];

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };

        Ok(Self {
            device,
            framebuffer,
            attachment: view,
        })
    }

    /// Returns the framebuffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    /// The image view bound as the only color attachment.
    #[inline]
    pub fn attachment(&self) -> vk::ImageView {
        self.attachment
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_framebuffer(self.framebuffer, None);
        }
        debug!("Framebuffer destroyed");
    }
}

/// Creates one framebuffer per image view, in the same order.
///
/// Framebuffers built before a failure are dropped on return.
///
/// # Errors
///
/// Returns [`RhiError::FramebufferCreate`] carrying the failing view's index.
pub fn create_framebuffers(
    device: &Arc<Device>,
    render_pass: &RenderPass,
    views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> RhiResult<Vec<Framebuffer>> {
    let framebuffers = views
        .iter()
        .enumerate()
        .map(|(index, &view)| {
            Framebuffer::new(device.clone(), render_pass, view, extent)
                .map_err(|code| RhiError::FramebufferCreate { index, code })
        })
        .collect::<RhiResult<Vec<_>>>()?;

    debug!("Created {} framebuffers", framebuffers.len());
    Ok(framebuffers)
}
