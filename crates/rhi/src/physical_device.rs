//! Physical device (GPU) selection.
//!
//! Selection is deterministic and first-fit: devices are visited in
//! enumeration order and the first one that has a graphics queue family, a
//! family that can present to the surface, and every required device
//! extension wins.
//!
//! # Example
//!
//! ```no_run
//! use trigon_platform::Window;
//! use trigon_rhi::instance::Instance;
//! use trigon_rhi::physical_device::select_physical_device;
//!
//! let window = Window::create(800, 600, "Vulkan App").expect("window");
//! let instance = Instance::new(&window, false).expect("Failed to create instance");
//!
//! let selection = select_physical_device(&instance).expect("Failed to select physical device");
//! println!("Selected GPU: {}", selection.device_name());
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Queue family indices discovered on a physical device.
///
/// Either index may be missing until the device has been fully inspected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// First family that can present to the surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if both required queue families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Converts into resolved indices when complete.
    pub fn resolve(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics_family?,
            present: self.present_family?,
        })
    }
}

/// Resolved graphics and present family indices. The two may coincide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Returns the unique family indices, graphics first.
    ///
    /// Used when creating the logical device so that one queue is requested
    /// per distinct family.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Whether graphics and presentation use the same family.
    #[inline]
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// The device chosen by [`select_physical_device`].
#[derive(Clone)]
pub struct PhysicalDeviceSelection {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, type, API version).
    pub properties: vk::PhysicalDeviceProperties,
    /// Graphics and present queue families.
    pub queue_families: QueueFamilies,
    /// Device extensions to enable.
    pub extensions: Vec<&'static CStr>,
}

impl PhysicalDeviceSelection {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        device_name(&self.properties)
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }
}

impl std::fmt::Debug for PhysicalDeviceSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceSelection")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// Selects the first physical device that can render to the instance's surface.
///
/// # Errors
///
/// - [`RhiError::NoGpuFound`] if the instance reports no physical devices
/// - [`RhiError::NoSuitableGpu`] if no device has both queue families and the
///   required extensions
pub fn select_physical_device(instance: &Instance) -> RhiResult<PhysicalDeviceSelection> {
    let devices = unsafe { instance.handle().enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoGpuFound);
    }

    info!("Found {} GPU(s)", devices.len());

    for device in devices {
        if let Some(selection) = check_device_suitability(instance, device)? {
            let (major, minor, patch) = selection.api_version();
            info!(
                "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}",
                selection.device_name(),
                selection.device_type_name(),
                major,
                minor,
                patch
            );
            return Ok(selection);
        }
    }

    warn!("No suitable GPU found with required capabilities");
    Err(RhiError::NoSuitableGpu)
}

/// A failed surface support query counts as "cannot present".
fn presents(support: Result<bool, vk::Result>, family: u32) -> bool {
    match support {
        Ok(supported) => supported,
        Err(code) => {
            debug!(
                "Surface support query failed for queue family {}: {:?}",
                family, code
            );
            false
        }
    }
}

/// Returns `Some` if the device meets every requirement.
fn check_device_suitability(
    instance: &Instance,
    device: vk::PhysicalDevice,
) -> RhiResult<Option<PhysicalDeviceSelection>> {
    let vk_instance = instance.handle();
    let properties = unsafe { vk_instance.get_physical_device_properties(device) };
    let name = device_name(&properties).to_owned();

    let family_properties =
        unsafe { vk_instance.get_physical_device_queue_family_properties(device) };
    let indices = find_queue_families(&family_properties, |index| {
        let support = unsafe {
            instance
                .surface_loader()
                .get_physical_device_surface_support(device, index, instance.surface())
        };
        presents(support, index)
    });

    let Some(queue_families) = indices.resolve() else {
        debug!(
            "GPU '{}' skipped: missing required queue families (graphics={}, present={})",
            name,
            indices.graphics_family.is_some(),
            indices.present_family.is_some()
        );
        return Ok(None);
    };

    let available_properties =
        unsafe { vk_instance.enumerate_device_extension_properties(device)? };
    let available: Vec<&CStr> = available_properties
        .iter()
        // SAFETY: the driver null-terminates extension names within the fixed array.
        .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
        .collect();

    let extensions = required_device_extensions(&available);
    let missing = missing_extensions(&extensions, &available);
    if !missing.is_empty() {
        debug!(
            "GPU '{}' skipped: missing device extensions {:?}",
            name, missing
        );
        return Ok(None);
    }

    Ok(Some(PhysicalDeviceSelection {
        device,
        properties,
        queue_families,
        extensions,
    }))
}

/// Finds the first graphics family and the first family that can present.
///
/// `supports_present` is queried once per family index until a presenting
/// family is found.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> bool,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;

        if indices.graphics_family.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(i);
        }

        if indices.present_family.is_none() && supports_present(i) {
            indices.present_family = Some(i);
        }

        if indices.is_complete() {
            break;
        }
    }

    indices
}

/// The swapchain extension, plus portability subset when the device advertises it.
pub fn required_device_extensions(available: &[&CStr]) -> Vec<&'static CStr> {
    let mut extensions = vec![ash::khr::swapchain::NAME];
    if available.contains(&ash::khr::portability_subset::NAME) {
        extensions.push(ash::khr::portability_subset::NAME);
    }
    extensions
}

/// Returns the required extensions not present in `available`.
pub fn missing_extensions<'a>(required: &[&'a CStr], available: &[&CStr]) -> Vec<&'a CStr> {
    required
        .iter()
        .filter(|ext| !available.contains(ext))
        .copied()
        .collect()
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> &str {
    // SAFETY: the driver null-terminates the device name within the fixed array.
    unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_str()
            .unwrap_or("Unknown Device")
    }
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());
        assert_eq!(indices.resolve(), None);
    }

    #[test]
    fn test_queue_family_indices_incomplete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!indices.is_complete());

        let indices = QueueFamilyIndices {
            graphics_family: None,
            present_family: Some(0),
        };
        assert!(!indices.is_complete());
        assert_eq!(indices.resolve(), None);
    }

    #[test]
    fn test_shared_family() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let indices = find_queue_families(&families, |_| true);
        let resolved = indices.resolve().unwrap();

        assert_eq!(resolved, QueueFamilies { graphics: 0, present: 0 });
        assert!(resolved.is_shared());
        assert_eq!(resolved.unique(), vec![0]);
    }

    #[test]
    fn test_split_families() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let indices = find_queue_families(&families, |i| i == 2);
        let resolved = indices.resolve().unwrap();

        assert_eq!(resolved.graphics, 1);
        assert_eq!(resolved.present, 2);
        assert!(!resolved.is_shared());
        assert_eq!(resolved.unique(), vec![1, 2]);
    }

    #[test]
    fn test_first_graphics_family_wins() {
        let families = [
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let indices = find_queue_families(&families, |i| i >= 1);
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, Some(1));
    }

    #[test]
    fn test_no_present_support() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let indices = find_queue_families(&families, |_| false);
        assert_eq!(indices.graphics_family, Some(0));
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_present_query_stops_once_found() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut queried = Vec::new();
        find_queue_families(&families, |i| {
            queried.push(i);
            true
        });
        assert_eq!(queried, vec![0]);
    }

    #[test]
    fn test_required_extensions_without_portability() {
        let available = [ash::khr::swapchain::NAME];
        let required = required_device_extensions(&available);
        assert_eq!(required, vec![ash::khr::swapchain::NAME]);
        assert!(missing_extensions(&required, &available).is_empty());
    }

    #[test]
    fn test_required_extensions_with_portability() {
        let available = [
            ash::khr::portability_subset::NAME,
            ash::khr::swapchain::NAME,
        ];
        let required = required_device_extensions(&available);
        assert_eq!(required.len(), 2);
        assert!(required.contains(&ash::khr::portability_subset::NAME));
        assert!(missing_extensions(&required, &available).is_empty());
    }

    #[test]
    fn test_missing_swapchain_extension() {
        let available: [&CStr; 0] = [];
        let required = required_device_extensions(&available);
        assert_eq!(
            missing_extensions(&required, &available),
            vec![ash::khr::swapchain::NAME]
        );
    }

    #[test]
    fn test_device_type_names() {
        assert_eq!(
            device_type_name(vk::PhysicalDeviceType::DISCRETE_GPU),
            "Discrete GPU"
        );
        assert_eq!(device_type_name(vk::PhysicalDeviceType::CPU), "CPU");
        assert_eq!(device_type_name(vk::PhysicalDeviceType::OTHER), "Other");
    }

    #[test]
    fn test_failed_surface_query_does_not_present() {
        assert!(presents(Ok(true), 0));
        assert!(!presents(Ok(false), 0));
        assert!(!presents(Err(vk::Result::ERROR_SURFACE_LOST_KHR), 1));
    }
}
