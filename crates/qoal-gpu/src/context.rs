//! GPU context management.

use crate::debug::DebugMessenger;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, select_physical_device, QueueFamilies};
use crate::memory::GpuAllocator;
use crate::surface::SurfaceContext;
use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

/// Main GPU context holding Vulkan resources.
///
/// Surfaces created against this context's instance must be destroyed
/// before the context is dropped.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,
    allocator: Mutex<GpuAllocator>,

    queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl GpuContext {
    /// Get the Vulkan entry point.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Get the queue family indices.
    pub fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    /// Whether the debug messenger is installed.
    pub fn validation_enabled(&self) -> bool {
        self.debug_messenger.is_some()
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Allocations must go before the device they live on
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        tracing::debug!("GPU context destroyed");
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Qoal".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the GPU context and a surface for the window.
    ///
    /// Construction order is instance, debug messenger, surface, device.
    /// On failure everything created so far is released.
    pub fn build<W>(self, window: &W) -> Result<(GpuContext, SurfaceContext)>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();

        let info = unsafe { create_instance(&entry, &self.app_name, display, self.enable_validation) }?;
        let instance = info.instance;

        let debug_messenger = if info.validation {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    tracing::warn!("Debug messenger unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let destroy_instance = |messenger: Option<DebugMessenger>| unsafe {
            if let Some(messenger) = messenger {
                messenger.destroy();
            }
            instance.destroy_instance(None);
        };

        let surface = match unsafe { SurfaceContext::from_window(&entry, &instance, window) } {
            Ok(surface) => surface,
            Err(e) => {
                destroy_instance(debug_messenger);
                return Err(e);
            }
        };

        let created = unsafe { create_device_and_queues(&instance, &surface) };
        let (physical_device, queue_families, device, graphics_queue, present_queue) = match created {
            Ok(parts) => parts,
            Err(e) => {
                unsafe { surface.destroy() };
                destroy_instance(debug_messenger);
                return Err(e);
            }
        };

        let device = Arc::new(device);
        let allocator = match unsafe { GpuAllocator::new(&instance, device.clone(), physical_device) } {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe {
                    device.destroy_device(None);
                    surface.destroy();
                }
                destroy_instance(debug_messenger);
                return Err(e);
            }
        };

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = unsafe { std::ffi::CStr::from_ptr(properties.device_name.as_ptr()) };
        tracing::info!(
            "Selected GPU: {} (graphics family {}, present family {})",
            name.to_string_lossy(),
            queue_families.graphics,
            queue_families.present
        );

        Ok((
            GpuContext {
                entry,
                instance,
                debug_messenger,
                physical_device,
                device,
                allocator: Mutex::new(allocator),
                queue_families,
                graphics_queue,
                present_queue,
            },
            surface,
        ))
    }
}

type DeviceParts = (vk::PhysicalDevice, QueueFamilies, ash::Device, vk::Queue, vk::Queue);

/// Pick a device that can present to the surface and create the logical device.
///
/// # Safety
/// The instance and surface must be valid.
unsafe fn create_device_and_queues(
    instance: &ash::Instance,
    surface: &SurfaceContext,
) -> Result<DeviceParts> {
    let (physical_device, families) = select_physical_device(instance, surface)?;

    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names = [ash::khr::swapchain::NAME.as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(GpuError::from)?;

    let graphics_queue = device.get_device_queue(families.graphics, 0);
    let present_queue = device.get_device_queue(families.present, 0);

    Ok((physical_device, families, device, graphics_queue, present_queue))
}
