//! Coordinator error types.

use qoal_render::RenderError;
use thiserror::Error;

use crate::gate::GateError;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Invalid engine configuration: {0}")]
    Config(#[from] qoal_core::Error),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Gate(#[from] GateError),

    /// Too many consecutive frames timed out waiting on a fence.
    #[error("Render thread stalled for {0} consecutive frames")]
    Stalled(u32),

    #[error("Render command channel stayed full")]
    ChannelFull,

    #[error("Render thread is not running")]
    Disconnected,

    #[error("Failed to spawn render thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Render thread panicked")]
    ThreadPanicked,
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
