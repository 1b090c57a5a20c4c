//! Swapchain, render pass and framebuffer management.

use crate::error::{GpuError, Result};
use crate::instance::QueueFamilies;
use ash::vk;

/// Swapchain wrapper.
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

/// Result of [`Swapchain::acquire_next_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAcquire {
    Image { index: u32, suboptimal: bool },
    /// The swapchain is out of date; no image was acquired.
    OutOfDate,
    /// No image became available before the timeout.
    NotReady,
}

fn acquire_result(result: std::result::Result<(u32, bool), vk::Result>) -> Result<ImageAcquire> {
    match result {
        Ok((index, suboptimal)) => Ok(ImageAcquire::Image { index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(ImageAcquire::OutOfDate),
        Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => Ok(ImageAcquire::NotReady),
        Err(e) => Err(GpuError::from(e)),
    }
}

impl Swapchain {
    /// Create a new swapchain.
    ///
    /// # Safety
    /// All handles must be valid.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn new(
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        surface_format: vk::SurfaceFormatKHR,
        present_mode: vk::PresentModeKHR,
        extent: vk::Extent2D,
        queue_families: QueueFamilies,
    ) -> Result<Self> {
        let image_count = choose_image_count(surface_capabilities);

        let family_indices = queue_families.unique();
        let sharing_mode = if family_indices.len() > 1 {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let images = match swapchain_loader.get_swapchain_images(swapchain) {
            Ok(images) => images,
            Err(e) => {
                swapchain_loader.destroy_swapchain(swapchain, None);
                return Err(e.into());
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(surface_format.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );

            match device.create_image_view(&view_info, None) {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    for view in image_views {
                        device.destroy_image_view(view, None);
                    }
                    swapchain_loader.destroy_swapchain(swapchain, None);
                    return Err(e.into());
                }
            }
        }

        tracing::info!(
            "Created swapchain: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            images.len(),
            surface_format.format,
            present_mode
        );

        Ok(Self {
            swapchain,
            images,
            image_views,
            format: surface_format.format,
            extent,
        })
    }

    /// Acquire the next image, waiting at most `timeout_ns`.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn acquire_next_image(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<ImageAcquire> {
        let result = swapchain_loader.acquire_next_image(
            self.swapchain,
            timeout_ns,
            semaphore,
            vk::Fence::null(),
        );
        acquire_result(result)
    }

    /// Present an image.
    ///
    /// Returns `None` when the swapchain is out of date, otherwise whether it
    /// is suboptimal.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn present(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<Option<bool>> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match swapchain_loader.queue_present(queue, &present_info) {
            Ok(suboptimal) => Ok(Some(suboptimal)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Destroy the image views, then the swapchain.
    ///
    /// # Safety
    /// All handles must be valid and swapchain must not be in use.
    pub unsafe fn destroy(
        &self,
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
    ) {
        for &view in &self.image_views {
            device.destroy_image_view(view, None);
        }
        swapchain_loader.destroy_swapchain(self.swapchain, None);
    }
}

/// Everything a frame renders into: swapchain, render pass and one
/// framebuffer per swapchain image.
pub struct PresentTargets {
    pub swapchain: Swapchain,
    pub render_pass: vk::RenderPass,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl PresentTargets {
    /// Build the swapchain, render pass and framebuffers.
    ///
    /// # Safety
    /// All handles must be valid.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn new(
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        surface_format: vk::SurfaceFormatKHR,
        present_mode: vk::PresentModeKHR,
        extent: vk::Extent2D,
        queue_families: QueueFamilies,
    ) -> Result<Self> {
        let swapchain = Swapchain::new(
            device,
            swapchain_loader,
            surface,
            surface_capabilities,
            surface_format,
            present_mode,
            extent,
            queue_families,
        )?;

        let render_pass = match create_colour_render_pass(device, swapchain.format) {
            Ok(render_pass) => render_pass,
            Err(e) => {
                swapchain.destroy(device, swapchain_loader);
                return Err(e);
            }
        };

        let framebuffers =
            match create_framebuffers(device, render_pass, &swapchain.image_views, swapchain.extent) {
                Ok(framebuffers) => framebuffers,
                Err(e) => {
                    device.destroy_render_pass(render_pass, None);
                    swapchain.destroy(device, swapchain_loader);
                    return Err(e);
                }
            };

        Ok(Self {
            swapchain,
            render_pass,
            framebuffers,
        })
    }

    /// Number of swapchain images.
    pub fn image_count(&self) -> usize {
        self.swapchain.images.len()
    }

    /// Destroy framebuffers, render pass, image views and swapchain, in that order.
    ///
    /// # Safety
    /// The device must be idle with respect to these objects.
    pub unsafe fn destroy(
        &self,
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
    ) {
        for &framebuffer in &self.framebuffers {
            device.destroy_framebuffer(framebuffer, None);
        }
        device.destroy_render_pass(self.render_pass, None);
        self.swapchain.destroy(device, swapchain_loader);
    }
}

/// Single-subpass render pass with one colour attachment that is cleared on
/// load and left ready for presentation.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_colour_render_pass(
    device: &ash::Device,
    format: vk::Format,
) -> Result<vk::RenderPass> {
    let attachments = [vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

    let colour_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&colour_refs)];

    // Image layout transition waits for the acquire semaphore stage
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    Ok(device.create_render_pass(&create_info, None)?)
}

/// One framebuffer per image view.
///
/// # Safety
/// The device, render pass and views must be valid.
pub unsafe fn create_framebuffers(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    image_views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(image_views.len());
    for view in image_views {
        let attachments = [*view];
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        match device.create_framebuffer(&create_info, None) {
            Ok(framebuffer) => framebuffers.push(framebuffer),
            Err(e) => {
                for framebuffer in framebuffers {
                    device.destroy_framebuffer(framebuffer, None);
                }
                return Err(e.into());
            }
        }
    }
    Ok(framebuffers)
}

/// One image more than the minimum, capped by the maximum when there is one.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        wanted.min(capabilities.max_image_count)
    } else {
        wanted
    }
}

/// Select the best surface format.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
        .ok_or_else(|| GpuError::SwapchainCreation("Surface reports no formats".to_string()))
}

/// Select the best present mode.
pub fn select_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Calculate swapchain extent.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn image_count_respects_maximum() {
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
        assert_eq!(choose_image_count(&caps(2, 2)), 2);
        assert_eq!(choose_image_count(&caps(2, 8)), 3);
    }

    #[test]
    fn srgb_format_preferred() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(select_surface_format(&[unorm, srgb]).unwrap().format, srgb.format);
        assert_eq!(select_surface_format(&[unorm]).unwrap().format, unorm.format);
        assert!(select_surface_format(&[]).is_err());
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(select_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
        assert_eq!(select_present_mode(&modes, false), vk::PresentModeKHR::IMMEDIATE);
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::FIFO], false),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_clamped_when_surface_is_flexible() {
        let extent = calculate_extent(&caps(2, 0), 8000, 600);
        assert_eq!((extent.width, extent.height), (4096, 600));
    }

    #[test]
    fn extent_follows_surface_when_fixed() {
        let mut fixed = caps(2, 0);
        fixed.current_extent = vk::Extent2D {
            width: 800,
            height: 0,
        };
        let extent = calculate_extent(&fixed, 1024, 768);
        assert_eq!((extent.width, extent.height), (800, 0));
    }

    #[test]
    fn acquire_timeout_is_not_an_error() {
        assert_eq!(acquire_result(Err(vk::Result::TIMEOUT)).unwrap(), ImageAcquire::NotReady);
        assert_eq!(acquire_result(Err(vk::Result::NOT_READY)).unwrap(), ImageAcquire::NotReady);
        assert_eq!(
            acquire_result(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            ImageAcquire::OutOfDate
        );
        assert_eq!(
            acquire_result(Ok((2, true))).unwrap(),
            ImageAcquire::Image { index: 2, suboptimal: true }
        );
        assert!(matches!(
            acquire_result(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST))
        ));
    }
}
