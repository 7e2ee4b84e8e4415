//! Vulkan instance management.
//!
//! This module handles VkInstance creation, the validation layer, the debug
//! messenger and the presentation surface.
//!
//! # Overview
//!
//! [`Instance`] owns three handles that are torn down in a fixed order:
//! surface, then debug messenger, then the instance itself.
//!
//! # Example
//!
//! ```no_run
//! use trigon_platform::Window;
//! use trigon_rhi::instance::Instance;
//!
//! let window = Window::create(800, 600, "Vulkan App").expect("window");
//! let instance = Instance::new(&window, cfg!(debug_assertions)).expect("instance");
//!
//! let vk_instance = instance.handle();
//! let surface = instance.surface();
//! ```

use std::ffi::{CStr, c_char};

use ash::{Entry, vk};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, error, info, trace, warn};

use crate::error::{RhiError, RhiResult};

/// The Khronos validation layer name.
pub const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Extensions enabled regardless of platform so that portability
/// implementations (MoltenVK) are enumerated.
const PORTABILITY_EXTENSIONS: [&CStr; 2] = [
    ash::khr::portability_enumeration::NAME,
    ash::khr::get_physical_device_properties2::NAME,
];

/// Debug utils loader plus the messenger created from it.
///
/// The loader resolves the create/destroy entry points once; the same loader
/// is used again at destruction time.
struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    fn new(entry: &Entry, instance: &ash::Instance) -> RhiResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe {
            loader
                .create_debug_utils_messenger(&create_info, None)
                .map_err(RhiError::DebugMessengerCreate)?
        };

        info!("Debug messenger created");
        Ok(Self { loader, messenger })
    }
}

/// Vulkan instance wrapper owning the debug messenger and window surface.
pub struct Instance {
    /// Vulkan entry point loader
    entry: Entry,
    /// Vulkan instance handle
    instance: ash::Instance,
    /// Present iff validation is enabled
    debug_messenger: Option<DebugMessenger>,
    /// Surface extension loader
    surface_loader: ash::khr::surface::Instance,
    /// Presentation surface bound to one window; null until created
    surface: vk::SurfaceKHR,
}

impl Instance {
    /// Creates a new Vulkan instance and a presentation surface for `window`.
    ///
    /// # Arguments
    ///
    /// * `window` - Source of the native display and window handles
    /// * `enable_validation` - Require the Khronos validation layer and attach a debug messenger
    ///
    /// # Errors
    ///
    /// - [`RhiError::Loading`] if the Vulkan loader cannot be found
    /// - [`RhiError::ValidationLayerMissing`] if validation is requested but not installed
    /// - [`RhiError::InstanceCreate`], [`RhiError::DebugMessengerCreate`],
    ///   [`RhiError::SurfaceCreate`] carrying the driver's result code
    pub fn new<W>(window: &W, enable_validation: bool) -> RhiResult<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { Entry::load()? };

        if enable_validation && !Self::is_validation_layer_available(&entry)? {
            return Err(RhiError::ValidationLayerMissing);
        }

        let display_handle = window.display_handle()?;
        let window_handle = window.window_handle()?;

        let window_extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())?
            .iter()
            // SAFETY: ash_window returns pointers to static, null-terminated names.
            .map(|&ext| unsafe { CStr::from_ptr(ext) })
            .collect::<Vec<_>>();

        let extensions = instance_extensions(&window_extensions, enable_validation);
        debug!("Enabling instance extensions: {:?}", extensions);
        let extension_names: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();
        let layer_names = validation_layer_names(enable_validation);

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"Vulkan App")
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"No Engine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .flags(vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(RhiError::InstanceCreate)?
        };

        info!(
            "Vulkan instance created (validation {})",
            if enable_validation { "on" } else { "off" }
        );

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        // From here on Drop releases whatever has been created so far.
        let mut this = Self {
            entry,
            instance,
            debug_messenger: None,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
        };

        if enable_validation {
            this.debug_messenger = Some(DebugMessenger::new(&this.entry, &this.instance)?);
        }

        this.surface = unsafe {
            ash_window::create_surface(
                &this.entry,
                &this.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(RhiError::SurfaceCreate)?
        };

        info!("Vulkan surface created");
        Ok(this)
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the presentation surface.
    #[inline]
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Returns the surface extension loader used for support queries.
    #[inline]
    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    /// Returns whether the debug messenger is attached.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }

    /// Checks if the Khronos validation layer is available.
    fn is_validation_layer_available(entry: &Entry) -> RhiResult<bool> {
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
        Ok(has_layer(&available_layers, VALIDATION_LAYER_NAME))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
                info!("Vulkan surface destroyed");
            }

            if let Some(debug) = self.debug_messenger.take() {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.messenger, None);
                info!("Debug messenger destroyed");
            }

            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Builds the instance extension set: the windowing backend's requirements,
/// the portability pair, and debug utils when validating.
pub fn instance_extensions(
    window_extensions: &[&'static CStr],
    enable_validation: bool,
) -> Vec<&'static CStr> {
    let mut extensions = window_extensions.to_vec();

    for ext in PORTABILITY_EXTENSIONS {
        if !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }

    if enable_validation && !extensions.contains(&ash::ext::debug_utils::NAME) {
        extensions.push(ash::ext::debug_utils::NAME);
    }

    extensions
}

/// Layer names passed at instance and device creation.
pub fn validation_layer_names(enable_validation: bool) -> Vec<*const c_char> {
    if enable_validation {
        vec![VALIDATION_LAYER_NAME.as_ptr()]
    } else {
        Vec::new()
    }
}

/// Whether `name` appears among the enumerated layers.
fn has_layer(available: &[vk::LayerProperties], name: &CStr) -> bool {
    available.iter().any(|layer| {
        // SAFETY: the loader null-terminates layer names within the fixed array.
        let layer_name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        layer_name == name
    })
}

/// Tracing target of forwarded validation messages.
///
/// The default log filter passes this target at every level, so nothing the
/// messenger subscribes to is filtered out.
pub const VALIDATION_TARGET: &str = "validation";

/// Forwards each validation message to tracing at a level matching its
/// severity.
///
/// # Safety
///
/// Called by the Vulkan loader; `p_callback_data` is either null or valid for
/// the duration of the call.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            error!(target: VALIDATION_TARGET, "Validation layer: {}", message)
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            warn!(target: VALIDATION_TARGET, "Validation layer: {}", message)
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            info!(target: VALIDATION_TARGET, "Validation layer: {}", message)
        }
        _ => trace!(target: VALIDATION_TARGET, "Validation layer: {}", message),
    }

    vk::FALSE
}
