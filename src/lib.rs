pub mod dsp;
pub mod io; // Boundary contracts (audio sink)
pub mod patch; // Swappable waveform/FX/envelope logic
pub mod runtime; // Render loop and patch host
pub mod synth; // Note registry, mixdown, polyphony

pub const MAX_BLOCK_SIZE: usize = 2048;
pub const DEFAULT_BLOCK_SIZE: usize = 256;
pub const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;
