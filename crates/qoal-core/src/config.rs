//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::CLEAR_COLOUR;
use crate::error::{Error, Result};

/// What happens when a snapshot names a renderer kind that is already live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepublishPolicy {
    /// The newest entity list replaces the live one.
    #[default]
    Replace,
    /// The newest entity list is appended to the live one.
    Append,
    /// The live list is left untouched.
    Keep,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Enable vsync.
    pub vsync: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Directory holding the compiled `.spv` shader pairs.
    pub shader_dir: PathBuf,
    /// Colour the swapchain image is cleared to every frame.
    pub clear_colour: [f32; 4],
    /// Handling of snapshots that name an already-live renderer kind.
    pub republish_policy: RepublishPolicy,
    /// Upper bound on a single in-flight fence wait.
    pub fence_timeout: Duration,
    /// Upper bound on gate waits (pause acknowledgement, parked polling).
    pub gate_timeout: Duration,
    /// Consecutive stalled frames tolerated before the render thread aborts.
    pub max_stalled_frames: u32,
    /// Capacity of the producer to render thread command channel.
    pub command_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Qoal Engine".to_string(),
            width: 1900,
            height: 1000,
            vsync: false,
            validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from("shaders/spirv"),
            clear_colour: CLEAR_COLOUR,
            republish_policy: RepublishPolicy::default(),
            fence_timeout: Duration::from_secs(2),
            gate_timeout: Duration::from_secs(5),
            max_stalled_frames: 5,
            command_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the shader directory.
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    /// Set the clear colour.
    pub fn with_clear_colour(mut self, colour: [f32; 4]) -> Self {
        self.clear_colour = colour;
        self
    }

    /// Set the republish policy.
    pub fn with_republish_policy(mut self, policy: RepublishPolicy) -> Self {
        self.republish_policy = policy;
        self
    }

    /// Set the fence wait timeout.
    pub fn with_fence_timeout(mut self, timeout: Duration) -> Self {
        self.fence_timeout = timeout;
        self
    }

    /// Set the gate timeout.
    pub fn with_gate_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout = timeout;
        self
    }

    /// Set how many consecutive stalled frames are tolerated.
    pub fn with_max_stalled_frames(mut self, frames: u32) -> Self {
        self.max_stalled_frames = frames;
        self
    }

    /// Set the command channel capacity.
    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    /// Fence timeout in nanoseconds, as Vulkan expects it.
    pub fn fence_timeout_ns(&self) -> u64 {
        u64::try_from(self.fence_timeout.as_nanos()).unwrap_or(u64::MAX)
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.max_stalled_frames == 0 {
            return Err(Error::InvalidConfig(
                "max_stalled_frames must be at least 1".to_string(),
            ));
        }
        if self.command_capacity == 0 {
            return Err(Error::InvalidConfig(
                "command_capacity must be at least 1".to_string(),
            ));
        }
        if self.gate_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "gate_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
