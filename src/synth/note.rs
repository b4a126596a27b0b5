use crate::dsp::envelope::EnvelopeState;

/// Convert a MIDI pitch number (0-127) to frequency in Hz.
///
/// `13.75 * 2^((pitch + 3) / 12)`: pitch 57 maps to 440 Hz and every +12
/// doubles. The whole keyboard sits one octave above concert tuning, which
/// is the voicing the synth is built around.
#[inline]
pub fn midi_to_freq(pitch: u8) -> f32 {
    13.75 * 2.0_f32.powf((pitch as f32 + 3.0) / 12.0)
}

/// One sounding pitch instance with its own envelope state.
///
/// Two notes at the same pitch are independent: a duplicate note-on appends a
/// second instance rather than retriggering the first.
#[derive(Debug, Clone, Copy)]
pub struct Note {
    pub frequency: f32,
    pub env: EnvelopeState,
}

impl Note {
    pub fn from_pitch(pitch: u8) -> Self {
        Self {
            frequency: midi_to_freq(pitch),
            env: EnvelopeState::struck(),
        }
    }

    pub fn amplitude(&self) -> f32 {
        self.env.level
    }

    pub fn key_held(&self) -> bool {
        self.env.key_held
    }

    pub fn attacking(&self) -> bool {
        self.env.attacking
    }
}

/// The authoritative set of currently-sounding notes, in arrival order.
///
/// Owned exclusively by the render thread between render calls; mutated only
/// by event ingestion (append / flag) and the post-update prune.
#[derive(Debug, Default)]
pub struct NoteRegistry {
    notes: Vec<Note>,
}

impl NoteRegistry {
    pub fn new() -> Self {
        Self {
            notes: Vec::with_capacity(64),
        }
    }

    pub fn note_on(&mut self, pitch: u8) {
        self.notes.push(Note::from_pitch(pitch));
    }

    /// Flag the first still-held note at this pitch as released. With
    /// duplicate notes this removes exactly one instance per note-off,
    /// last-in-wins on the remainder.
    pub fn note_off(&mut self, pitch: u8) {
        let freq = midi_to_freq(pitch);
        // Exact comparison: both sides come from the same mapping.
        if let Some(note) = self
            .notes
            .iter_mut()
            .find(|n| n.frequency == freq && n.env.key_held)
        {
            note.env.release();
        }
    }

    pub fn release_all(&mut self) {
        for note in &mut self.notes {
            note.env.release();
        }
    }

    /// Drop every note whose envelope has fully released.
    pub fn prune(&mut self) {
        self.notes.retain(|n| !n.env.finished());
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Note> {
        self.notes.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_mapping_doubles_every_octave() {
        let a = midi_to_freq(57);
        assert!((a - 440.0).abs() < 0.01, "expected 440 Hz, got {a}");
        assert!((midi_to_freq(69) - 880.0).abs() < 0.01);
        assert!((midi_to_freq(45) - 220.0).abs() < 0.01);
        assert!((midi_to_freq(9) - 27.5).abs() < 0.001, "mapping floor");
    }

    #[test]
    fn duplicate_note_on_appends_independent_notes() {
        let mut registry = NoteRegistry::new();
        registry.note_on(60);
        registry.note_on(60);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn note_off_releases_first_held_match_only() {
        let mut registry = NoteRegistry::new();
        registry.note_on(60);
        registry.note_on(60);
        registry.note_off(60);

        let held: Vec<bool> = registry.iter().map(|n| n.key_held()).collect();
        assert_eq!(held, vec![false, true], "registry order decides the match");

        // A second note-off finds the remaining held instance.
        registry.note_off(60);
        assert!(registry.iter().all(|n| !n.key_held()));
    }

    #[test]
    fn note_off_for_unknown_pitch_is_ignored() {
        let mut registry = NoteRegistry::new();
        registry.note_on(60);
        registry.note_off(72);
        assert!(registry.iter().all(|n| n.key_held()));
    }

    #[test]
    fn prune_keeps_held_notes_at_zero_level() {
        let mut registry = NoteRegistry::new();
        registry.note_on(60); // still held at level 0: must survive
        registry.note_on(64);
        registry.note_off(64); // released before ever sounding: finished

        registry.prune();
        assert_eq!(registry.len(), 1);
        assert!(registry.iter().next().unwrap().key_held());
    }
}
