//! Logical device and its queues.
//!
//! [`Device::new`] asks for one queue at priority 1.0 from each distinct
//! family of the [`PhysicalDeviceSelection`], enables exactly the extensions
//! the selection recorded and no optional features.
//!
//! # Example
//!
//! ```no_run
//! use trigon_platform::Window;
//! use trigon_rhi::instance::Instance;
//! use trigon_rhi::physical_device::select_physical_device;
//! use trigon_rhi::device::Device;
//!
//! let window = Window::create(800, 600, "Vulkan App").expect("window");
//! let instance = Instance::new(&window, false).expect("Failed to create instance");
//! let selection = select_physical_device(&instance).expect("No suitable GPU found");
//!
//! let device = Device::new(&instance, &selection, false)
//!     .expect("Failed to create logical device");
//!
//! let graphics_queue = device.graphics_queue();
//! let present_queue = device.present_queue();
//! ```

use std::ffi::c_char;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::{Instance, validation_layer_names};
use crate::physical_device::{PhysicalDeviceSelection, QueueFamilies};

/// Shared via `Arc` by every object that must destroy handles it created,
/// so the device is always the last of them to go.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    graphics_queue: vk::Queue,
    /// Same handle as `graphics_queue` when the families coincide.
    present_queue: vk::Queue,
    queue_families: QueueFamilies,
}

impl Device {
    /// `enable_validation` repeats the validation layer at device level, which
    /// only older loaders look at.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::DeviceCreate`] if `vkCreateDevice` fails.
    pub fn new(
        instance: &Instance,
        selection: &PhysicalDeviceSelection,
        enable_validation: bool,
    ) -> RhiResult<Arc<Self>> {
        let queue_families = selection.queue_families;

        let unique_families = queue_families.unique();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let features = vk::PhysicalDeviceFeatures::default();

        let extension_names: Vec<*const c_char> =
            selection.extensions.iter().map(|ext| ext.as_ptr()).collect();
        let layer_names = validation_layer_names(enable_validation);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(selection.device, &create_info, None)
                .map_err(RhiError::DeviceCreate)?
        };

        info!(
            "Logical device created with extensions {:?}",
            selection.extensions
        );

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        debug!(
            "Graphics queue retrieved from family {}",
            queue_families.graphics
        );

        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };
        debug!(
            "Present queue retrieved from family {}",
            queue_families.present
        );

        Ok(Arc::new(Self {
            device,
            physical_device: selection.device,
            graphics_queue,
            present_queue,
            queue_families,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    /// Blocks until every queue has drained.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}
