//! Synchronization primitives.

use crate::error::Result;
use ash::vk;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    Ok(device.create_semaphore(&create_info, None)?)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    Ok(device.create_fence(&create_info, None)?)
}

/// Outcome of a bounded fence wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceWait {
    Signaled,
    TimedOut,
}

/// Wait for a fence with a timeout.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(
    device: &ash::Device,
    fence: vk::Fence,
    timeout_ns: u64,
) -> Result<FenceWait> {
    match device.wait_for_fences(&[fence], true, timeout_ns) {
        Ok(()) => Ok(FenceWait::Signaled),
        Err(vk::Result::TIMEOUT) => Ok(FenceWait::TimedOut),
        Err(e) => Err(e.into()),
    }
}

/// One ring slot: a fence plus the acquire and render semaphores.
pub struct FrameSync {
    /// Signaled when the acquired image is available
    pub image_available: vk::Semaphore,
    /// Signaled when rendering is complete
    pub render_finished: vk::Semaphore,
    /// Signaled when the slot's submitted work completes
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create a slot with its fence already signaled.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        let image_available = create_semaphore(device)?;
        let render_finished = match create_semaphore(device) {
            Ok(semaphore) => semaphore,
            Err(e) => {
                device.destroy_semaphore(image_available, None);
                return Err(e);
            }
        };
        let in_flight = match create_fence(device, true) {
            Ok(fence) => fence,
            Err(e) => {
                device.destroy_semaphore(image_available, None);
                device.destroy_semaphore(render_finished, None);
                return Err(e);
            }
        };

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// Wait for the slot's previous submission.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &ash::Device, timeout_ns: u64) -> Result<FenceWait> {
        wait_for_fence(device, self.in_flight, timeout_ns)
    }

    /// Reset the fence before resubmitting.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        device.reset_fences(&[self.in_flight])?;
        Ok(())
    }

    /// Destroy synchronization resources.
    ///
    /// # Safety
    /// The device must be valid and resources must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_fence(self.in_flight, None);
    }
}

/// Fixed-size ring of frame sync slots.
pub struct FrameSyncRing {
    slots: Vec<FrameSync>,
}

impl FrameSyncRing {
    /// Create a ring with one slot per frame in flight.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, frames_in_flight: usize) -> Result<Self> {
        let mut ring = Self {
            slots: Vec::with_capacity(frames_in_flight),
        };
        for _ in 0..frames_in_flight {
            match FrameSync::new(device) {
                Ok(sync) => ring.slots.push(sync),
                Err(e) => {
                    ring.destroy(device);
                    return Err(e);
                }
            }
        }
        Ok(ring)
    }

    /// Sync resources of a slot, if the ring has that many.
    pub fn slot(&self, index: usize) -> Option<&FrameSync> {
        self.slots.get(index)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the ring has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Destroy all resources.
    ///
    /// # Safety
    /// The device must be valid and all resources must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        for sync in self.slots.drain(..) {
            sync.destroy(device);
        }
    }
}
