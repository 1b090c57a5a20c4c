//! Render thread coordination for the Qoal engine.
//!
//! This crate provides:
//! - The pause/resume gate between the producer and the render thread
//! - Render commands sent from the producer over a bounded channel
//! - The coordinator that owns the render thread from init to shutdown
//! - Vulkan bootstrap for the render thread
//!
//! The producer never touches GPU objects. It allocates mesh handles,
//! builds scene state and publishes renderer assignments under a pause;
//! the render thread applies everything between frames.

mod bootstrap;
mod command;
mod coordinator;
mod error;
mod gate;
mod stats;

pub use bootstrap::vulkan_init;
pub use command::RenderCommand;
pub use coordinator::RenderCoordinator;
pub use error::{CoordinatorError, Result};
pub use gate::{Gate, GateError, GateWait, PauseGuard, RenderThreadState};
pub use stats::RenderStats;
