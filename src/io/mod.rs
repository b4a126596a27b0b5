// Purpose - boundary contracts toward the excluded collaborators.
// Real transports (cpal streams, WAV writers) live in the host shells.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("audio sink rejected block: {0}")]
    Rejected(String),
    #[error("audio sink closed")]
    Closed,
}

/// Where finished blocks go: mono f32 samples at a fixed rate.
///
/// `submit` may block briefly while the device drains its buffer - that is
/// the sink's real-time pacing, outside the render call itself. A rejected
/// block is this iteration's loss only; the render loop logs it and moves on
/// without buffering missed blocks.
pub trait AudioSink {
    fn submit(&mut self, block: &[f32]) -> Result<(), SinkError>;
}

/// Sink that appends every block to a growing buffer. Used by offline
/// bounces and tests.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub samples: Vec<f32>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioSink for BufferSink {
    fn submit(&mut self, block: &[f32]) -> Result<(), SinkError> {
        self.samples.extend_from_slice(block);
        Ok(())
    }
}
