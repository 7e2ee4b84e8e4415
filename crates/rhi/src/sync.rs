//! Semaphores order queue operations against each other, fences let the host
//! wait for a submission. [`FrameSync`] bundles what one frame slot needs.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trigon_rhi::device::Device;
//! use trigon_rhi::sync::FrameSync;
//!
//! # fn example(device: Arc<Device>) -> Result<(), trigon_rhi::RhiError> {
//! let sync = FrameSync::new(device)?;
//!
//! // The fence starts signaled, so the first wait returns at once.
//! sync.in_flight_fence().wait(u64::MAX)?;
//! sync.in_flight_fence().reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Binary semaphore, created unsignaled.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// # Errors
    ///
    /// Returns [`RhiError::SyncObjectCreate`] if creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe {
            device
                .handle()
                .create_semaphore(&create_info, None)
                .map_err(RhiError::SyncObjectCreate)?
        };

        debug!("Created semaphore");

        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed semaphore");
    }
}

pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// A fence that is waited on before anything has been submitted against it
    /// must start `signaled`, or the first wait never returns.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SyncObjectCreate`] if creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe {
            device
                .handle()
                .create_fence(&create_info, None)
                .map_err(RhiError::SyncObjectCreate)?
        };

        debug!(
            "Created fence ({})",
            if signaled { "signaled" } else { "unsignaled" }
        );

        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks for at most `timeout` nanoseconds; `u64::MAX` waits forever.
    ///
    /// # Errors
    ///
    /// [`RhiError::Vulkan`] with `TIMEOUT` or `ERROR_DEVICE_LOST`.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, timeout)?
        };
        Ok(())
    }

    /// The fence must not be pending on any queue.
    pub fn reset(&self) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
        debug!("Destroyed fence");
    }
}

/// Synchronization objects for one frame slot.
///
/// ```text
/// 1. wait in_flight_fence            (slot's previous submit has finished)
/// 2. acquire  -> signals image_available
/// 3. reset in_flight_fence
/// 4. submit   waits image_available at COLOR_ATTACHMENT_OUTPUT,
///             signals render_finished and in_flight_fence
/// 5. present  waits render_finished
/// ```
///
/// Fields drop in declaration order: both semaphores, then the fence.
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready for rendering.
    image_available_semaphore: Semaphore,
    /// Signaled when the slot's draw has finished writing the image.
    render_finished_semaphore: Semaphore,
    /// Signaled when the slot's submission has completed on the GPU.
    in_flight_fence: Fence,
}

impl FrameSync {
    /// Creates two semaphores and a fence in the signaled state.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SyncObjectCreate`] if any object fails to create;
    /// objects created before the failure are destroyed.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let image_available_semaphore = Semaphore::new(device.clone())?;
        let render_finished_semaphore = Semaphore::new(device.clone())?;
        let in_flight_fence = Fence::new(device, true)?;

        Ok(Self {
            image_available_semaphore,
            render_finished_semaphore,
            in_flight_fence,
        })
    }

    #[inline]
    pub fn image_available_semaphore(&self) -> &Semaphore {
        &self.image_available_semaphore
    }

    #[inline]
    pub fn render_finished_semaphore(&self) -> &Semaphore {
        &self.render_finished_semaphore
    }

    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight_fence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_objects_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
        assert_send_sync::<FrameSync>();
    }

    #[test]
    fn test_create_failure_names_sync_object() {
        let err = RhiError::SyncObjectCreate(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let message = err.to_string();
        assert!(message.contains("synchronization object"));
        assert!(message.contains("ERROR_OUT_OF_DEVICE_MEMORY"));
    }
}
