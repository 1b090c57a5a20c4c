//! Vulkan instance creation and physical device selection.

use crate::error::{GpuError, Result};
use crate::surface::SurfaceContext;
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr, CString};

/// Khronos validation layer.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// A created instance plus whether validation ended up enabled.
pub struct InstanceInfo {
    pub instance: ash::Instance,
    pub validation: bool,
}

/// Whether the validation layer is installed.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn validation_layer_available(entry: &ash::Entry) -> Result<bool> {
    let available = entry.enumerate_instance_layer_properties()?;
    Ok(available.iter().any(|props| {
        CStr::from_ptr(props.layer_name.as_ptr()) == VALIDATION_LAYER
    }))
}

/// Create a Vulkan instance able to present to the given display.
///
/// When validation is requested but the layer is missing, a warning is
/// logged and the instance is created without it.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display: RawDisplayHandle,
    enable_validation: bool,
) -> Result<InstanceInfo> {
    let app_name = CString::new(app_name).unwrap_or_else(|_| c"Qoal".to_owned());

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"Qoal")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_1);

    let validation = if enable_validation {
        let available = validation_layer_available(entry)?;
        if !available {
            tracing::warn!(
                "Validation layer {} not available, continuing without it",
                VALIDATION_LAYER.to_string_lossy()
            );
        }
        available
    } else {
        false
    };

    let mut extension_names: Vec<*const c_char> = ash_window::enumerate_required_extensions(display)
        .map_err(|e| GpuError::ExtensionNotSupported(format!("surface extensions: {e}")))?
        .to_vec();
    if validation {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
    }
    #[cfg(target_os = "macos")]
    extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());

    let layer_names: Vec<*const c_char> = if validation {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    let instance = entry.create_instance(&create_info, None)?;

    Ok(InstanceInfo {
        instance,
        validation,
    })
}

/// Queue family indices used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Find a graphics family and a family able to present to the surface.
///
/// A family that does both is preferred.
///
/// # Safety
/// The instance, physical device and surface must be valid.
pub unsafe fn find_queue_families(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    surface: &SurfaceContext,
) -> Result<Option<QueueFamilies>> {
    let families = instance.get_physical_device_queue_family_properties(physical_device);

    let mut graphics = None;
    let mut present = None;

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let can_present = surface.supports_present(physical_device, i)?;

        if has_graphics && can_present {
            return Ok(Some(QueueFamilies {
                graphics: i,
                present: i,
            }));
        }
        if has_graphics && graphics.is_none() {
            graphics = Some(i);
        }
        if can_present && present.is_none() {
            present = Some(i);
        }
    }

    Ok(graphics
        .zip(present)
        .map(|(graphics, present)| QueueFamilies { graphics, present }))
}

/// Select the best physical device that can render to the surface.
///
/// # Safety
/// The instance and surface must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface: &SurfaceContext,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let devices = instance.enumerate_physical_devices()?;

    let mut best = None;
    let mut best_score = -1i32;

    for device in devices {
        if !supports_swapchain(instance, device)? {
            continue;
        }
        let Some(families) = find_queue_families(instance, device, surface)? else {
            continue;
        };
        let score = score_physical_device(instance, device);
        if score > best_score {
            best_score = score;
            best = Some((device, families));
        }
    }

    best.ok_or(GpuError::NoSuitableDevice)
}

unsafe fn supports_swapchain(instance: &ash::Instance, device: vk::PhysicalDevice) -> Result<bool> {
    let extensions = instance.enumerate_device_extension_properties(device)?;
    Ok(extensions.iter().any(|ext| {
        CStr::from_ptr(ext.extension_name.as_ptr()) == ash::khr::swapchain::NAME
    }))
}

/// Score a physical device for selection.
unsafe fn score_physical_device(instance: &ash::Instance, device: vk::PhysicalDevice) -> i32 {
    let properties = instance.get_physical_device_properties(device);

    let mut score = match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
        _ => 0,
    };

    let memory = instance.get_physical_device_memory_properties(device);
    let vram_gb: u64 = memory
        .memory_heaps
        .iter()
        .take(memory.memory_heap_count as usize)
        .filter(|h| h.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|h| h.size / (1024 * 1024 * 1024))
        .sum();
    score += i32::try_from(vram_gb).unwrap_or(i32::MAX / 2);

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_family_is_listed_once() {
        let families = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        assert_eq!(families.unique(), vec![0]);
    }

    #[test]
    fn split_families_list_graphics_first() {
        let families = QueueFamilies {
            graphics: 2,
            present: 1,
        };
        assert_eq!(families.unique(), vec![2, 1]);
    }
}
