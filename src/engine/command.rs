//! Track handoff from the control thread to the audio thread
//!
//! Tracks travel over an `rtrb` SPSC ring as `basedrop::Shared` pointers.
//! When the audio thread drops its last reference it only enqueues the
//! buffer; the engine's collector frees it later on the control thread.

use crate::track::SampleBuffer;
use basedrop::Shared;
use rtrb::{Consumer, Producer, RingBuffer};

/// Commands in flight at once; the renderer drains all of them every block
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

pub enum RenderCommand {
    /// Replace the current track and rewind
    Load {
        track: Shared<SampleBuffer>,
        generation: u64,
    },
    /// Drop the current track
    Unload { generation: u64 },
}

impl RenderCommand {
    pub fn generation(&self) -> u64 {
        match self {
            RenderCommand::Load { generation, .. } | RenderCommand::Unload { generation } => {
                *generation
            }
        }
    }
}

pub fn command_channel(capacity: usize) -> (Producer<RenderCommand>, Consumer<RenderCommand>) {
    RingBuffer::new(capacity.max(1))
}
