//! Low-level DSP primitives used by the mixdown stage.
//!
//! These components are allocation-free on the steady-state path and
//! realtime-safe, so they can run inside the per-block render deadline. They
//! stay focused on the signal math; the `synth` layer handles orchestration
//! and note lifecycle.

/// Block-rate amplitude envelope state machine.
pub mod envelope;
/// Moving-average low-pass filter with cross-block state.
pub mod filter;
/// Pure time-domain waveform generators.
pub mod waveform;

pub use envelope::{Envelope, EnvelopeState};
pub use filter::MovingAverage;
pub use waveform::Waveform;
