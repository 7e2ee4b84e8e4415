//! The triangle application: window, Vulkan chain and frame loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use trigon_core::{AppConfig, Timer};
use trigon_platform::Window;
use trigon_renderer::{FrameStatus, Renderer};
use trigon_rhi::device::Device;
use trigon_rhi::instance::Instance;
use trigon_rhi::physical_device::select_physical_device;
use trigon_rhi::swapchain::Swapchain;

/// Totals reported when the frame loop ends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    /// Frames submitted and queued for presentation.
    pub presented: u64,
    /// Frames skipped because acquire reported an out-of-date swapchain.
    pub skipped: u64,
    pub average_fps: f64,
}

/// Owns the five long-lived components.
///
/// Fields are declared in reverse construction order so that they drop
/// renderer first and window last.
pub struct Application {
    renderer: Renderer,
    swapchain: Swapchain,
    device: Arc<Device>,
    instance: Instance,
    window: Window,
}

impl Application {
    /// Builds the window and the Vulkan chain in dependency order.
    ///
    /// On failure every component built so far is dropped in reverse order.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let window = Window::create(
            config.window.width,
            config.window.height,
            &config.window.title,
        )
        .context("Failed to create window")?;

        let validation = config.validation_enabled();
        info!(
            "Validation layer {}",
            if validation { "enabled" } else { "disabled" }
        );

        let instance = Instance::new(&window, validation)?;
        let selection = select_physical_device(&instance)?;
        let device = Device::new(&instance, &selection, validation)?;
        let swapchain = Swapchain::new(&instance, device.clone(), window.framebuffer_extent())?;
        let renderer = Renderer::new(
            device.clone(),
            &swapchain,
            &config.shaders.vertex,
            &config.shaders.fragment,
        )?;

        info!("Initialization complete, entering main loop");

        Ok(Self {
            renderer,
            swapchain,
            device,
            instance,
            window,
        })
    }

    /// Pumps events and draws frames until the window is closed, or until
    /// `frame_limit` frames have been presented.
    ///
    /// Waits for the device to go idle before returning.
    pub fn run(&mut self, frame_limit: Option<u64>) -> Result<FrameStats> {
        let mut timer = Timer::new();
        let mut skipped = 0;

        loop {
            if frame_limit.is_some_and(|limit| self.renderer.frames_drawn() >= limit) {
                info!("Frame limit reached");
                break;
            }

            self.window.poll_events();
            if self.window.should_close() {
                break;
            }

            match self.renderer.draw_frame(&self.swapchain)? {
                FrameStatus::Presented { .. } => timer.tick(),
                FrameStatus::Skipped => skipped += 1,
            }
        }

        self.device
            .wait_idle()
            .context("Failed to wait for device idle")?;

        let stats = FrameStats {
            presented: timer.frames(),
            skipped,
            average_fps: timer.average_fps(),
        };

        info!(
            "Presented {} frames ({} skipped) in {:.2}s, {:.1} fps average",
            stats.presented,
            stats.skipped,
            timer.elapsed().as_secs_f64(),
            stats.average_fps
        );

        Ok(stats)
    }

    /// Frames presented since construction.
    pub fn frames_drawn(&self) -> u64 {
        self.renderer.frames_drawn()
    }

    #[inline]
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Whether the instance was created with the validation layer.
    pub fn has_validation(&self) -> bool {
        self.instance.has_validation()
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during shutdown: {:?}", e);
        }
        info!("Application shutting down");
    }
}
