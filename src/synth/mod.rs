// Purpose: note lifecycle, polyphony, and the per-block mixdown stage.
// This layer owns the registry and drives the dsp primitives.

pub mod message;
pub mod note;
pub mod poly;

pub use message::{event_queue, EventSender, NoteEvent};
pub use note::{midi_to_freq, Note, NoteRegistry};
pub use poly::PolySynth;
