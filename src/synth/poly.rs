use rtrb::Consumer;

use crate::dsp::{envelope::Envelope, filter::MovingAverage};
use crate::patch::Patch;
use crate::synth::message::NoteEvent;
use crate::synth::note::NoteRegistry;
use crate::MAX_BLOCK_SIZE;

/// Polyphonic mixdown and filter stage.
///
/// Owns the note registry, the sample cursor, the carried filter state, and
/// the active patch - all exclusively on the render thread. Events arrive
/// through the SPSC queue and are applied only in [`PolySynth::pump_events`],
/// which the host calls at the top of a render iteration; nothing here ever
/// blocks or takes a lock.
///
/// One render call:
/// 1. sum each note's oscillator-stack contribution at its current amplitude
/// 2. advance every note's envelope by one block-step
/// 3. apply clip FX, then the master gain
/// 4. run the cross-block moving-average filter (silence included)
/// 5. advance the sample cursor and prune fully released notes
pub struct PolySynth {
    registry: NoteRegistry,
    patch: Patch,
    envelope: Envelope,
    filter: MovingAverage,
    rx: Consumer<NoteEvent>,
    sample_cursor: u64,
    sample_rate: f64,
}

impl PolySynth {
    pub fn new(sample_rate: f64, patch: Patch, rx: Consumer<NoteEvent>) -> Self {
        let envelope = patch.envelope();
        let filter = MovingAverage::new(patch.spec.filter.window);
        Self {
            registry: NoteRegistry::new(),
            patch,
            envelope,
            filter,
            rx,
            sample_cursor: 0,
            sample_rate,
        }
    }

    /// Drain pending note events into the registry. Called at the top of a
    /// render iteration, never mid-block.
    pub fn pump_events(&mut self) {
        while let Ok(event) = self.rx.pop() {
            match event {
                NoteEvent::NoteOn { pitch, .. } => self.registry.note_on(pitch),
                NoteEvent::NoteOff { pitch } => self.registry.note_off(pitch),
                NoteEvent::AllNotesOff => self.registry.release_all(),
            }
        }
    }

    /// Swap in a new patch between blocks. Registry and cursor survive; the
    /// filter state survives too unless the window changed, which forces a
    /// reinitialization.
    pub fn set_patch(&mut self, patch: Patch) {
        self.envelope = patch.envelope();
        let window = patch.spec.filter.window;
        if window != self.filter.window() {
            self.filter = MovingAverage::new(window);
        }
        self.patch = patch;
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn registry(&self) -> &NoteRegistry {
        &self.registry
    }

    pub fn filter(&self) -> &MovingAverage {
        &self.filter
    }

    pub fn sample_cursor(&self) -> u64 {
        self.sample_cursor
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Render one block. The output slice's length is the block length; time
    /// values are derived from the monotonic sample cursor, so consecutive
    /// calls produce one continuous signal.
    pub fn render_block(&mut self, out: &mut [f32]) {
        debug_assert!(out.len() <= MAX_BLOCK_SIZE);

        out.fill(0.0);
        let t0 = self.sample_cursor;

        for note in self.registry.iter() {
            let freq = note.frequency as f64;
            // Transient numeric edge case: a non-finite or non-positive
            // frequency contributes nothing, never an error.
            if !freq.is_finite() || freq <= 0.0 {
                continue;
            }
            let amp = note.amplitude();
            if amp == 0.0 {
                continue;
            }
            for (i, sample) in out.iter_mut().enumerate() {
                let t = (t0 + i as u64) as f64 / self.sample_rate;
                *sample += self.patch.oscillator_sample(t, freq) * amp;
            }
        }

        for note in self.registry.iter_mut() {
            self.envelope.step(&mut note.env);
        }

        if let Some(clip) = self.patch.spec.fx.clip {
            for sample in out.iter_mut() {
                *sample = sample.clamp(-clip, clip);
            }
        }
        let gain = self.patch.spec.gain;
        for sample in out.iter_mut() {
            *sample *= gain;
        }

        self.filter.process(out);

        self.sample_cursor += out.len() as u64;
        self.registry.prune();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::message::{event_queue, EventSender};

    const SAMPLE_RATE: f64 = 48_000.0;
    const BLOCK: usize = 256;

    fn test_synth(source: &str) -> (EventSender, PolySynth) {
        let (tx, rx) = event_queue(64);
        let patch = Patch::from_source(source).expect("test patch must compile");
        (tx, PolySynth::new(SAMPLE_RATE, patch, rx))
    }

    // Sine, instant attack, no decay, no filter: deterministic output from
    // the second block on.
    const PLAIN_SINE: &str = r#"{
        "oscillators": [{ "waveform": "sine" }],
        "envelope": { "attack": 1, "decay": 0, "sustain": 1.0, "release": 4 },
        "gain": 1.0,
        "filter": { "window": 1 }
    }"#;

    #[test]
    fn empty_registry_renders_exact_silence() {
        let (_tx, mut synth) = test_synth(PLAIN_SINE);
        let mut block = [0.1f32; BLOCK];
        synth.render_block(&mut block);
        assert!(block.iter().all(|&s| s == 0.0));
        assert_eq!(synth.sample_cursor(), BLOCK as u64);
    }

    #[test]
    fn held_note_produces_the_closed_form_signal() {
        let (mut tx, mut synth) = test_synth(PLAIN_SINE);
        tx.send(NoteEvent::NoteOn { pitch: 69, velocity: 100 });
        synth.pump_events();

        // First block: amplitude still 0 (struck notes ramp from silence).
        let mut block = [0.0f32; BLOCK];
        synth.render_block(&mut block);
        assert!(block.iter().all(|&s| s == 0.0));

        // Second block: amplitude 1, pure sine from the cursor's time base.
        synth.render_block(&mut block);
        let freq = crate::synth::note::midi_to_freq(69) as f64;
        for (i, &actual) in block.iter().enumerate() {
            let t = (BLOCK + i) as f64 / SAMPLE_RATE;
            let expected = ((t * std::f64::consts::PI * freq).sin() * 0.5) as f32;
            assert!(
                (actual - expected).abs() < 1e-5,
                "sample {i}: expected {expected}, got {actual}"
            );
        }
    }

    #[test]
    fn cursor_time_is_continuous_across_blocks() {
        let (mut tx, mut synth) = test_synth(PLAIN_SINE);
        tx.send(NoteEvent::NoteOn { pitch: 60, velocity: 100 });
        synth.pump_events();

        let mut blocks = Vec::new();
        for _ in 0..4 {
            let mut block = [0.0f32; BLOCK];
            synth.render_block(&mut block);
            blocks.extend_from_slice(&block);
        }

        // Compare against one long render at the same time base.
        let (mut tx2, mut synth2) = test_synth(PLAIN_SINE);
        tx2.send(NoteEvent::NoteOn { pitch: 60, velocity: 100 });
        synth2.pump_events();
        let mut long = [0.0f32; BLOCK];
        synth2.render_block(&mut long); // silent attack block
        // Remaining three blocks rendered in one call of triple length.
        let mut rest = vec![0.0f32; BLOCK * 3];
        synth2.render_block(&mut rest);

        assert_eq!(&blocks[BLOCK..], &rest[..]);
    }

    #[test]
    fn clip_fx_bounds_the_mix_before_gain() {
        let loud = r#"{
            "oscillators": [{ "waveform": "square", "gain": 3.0 }],
            "envelope": { "attack": 1, "decay": 0, "sustain": 1.0, "release": 1 },
            "fx": { "clip": 0.9 },
            "gain": 1.0,
            "filter": { "window": 1 }
        }"#;
        let (mut tx, mut synth) = test_synth(loud);
        tx.send(NoteEvent::NoteOn { pitch: 60, velocity: 100 });
        synth.pump_events();

        let mut block = [0.0f32; BLOCK];
        synth.render_block(&mut block); // silent attack block
        synth.render_block(&mut block);
        assert!(block.iter().all(|&s| s.abs() <= 0.9 + 1e-6));
        assert!(block.iter().any(|&s| s.abs() > 0.89), "clip must engage");
    }

    #[test]
    fn patch_swap_keeps_registry_and_cursor() {
        let (mut tx, mut synth) = test_synth(PLAIN_SINE);
        tx.send(NoteEvent::NoteOn { pitch: 64, velocity: 100 });
        synth.pump_events();
        let mut block = [0.0f32; BLOCK];
        synth.render_block(&mut block);

        let square = Patch::from_source(
            r#"{
                "oscillators": [{ "waveform": "square" }],
                "envelope": { "attack": 1, "decay": 0, "sustain": 1.0, "release": 4 },
                "gain": 1.0,
                "filter": { "window": 1 }
            }"#,
        )
        .unwrap();
        let old_print = synth.patch().fingerprint();
        synth.set_patch(square);

        assert_ne!(synth.patch().fingerprint(), old_print);
        assert_eq!(synth.registry().len(), 1, "in-flight note survives the swap");
        assert_eq!(synth.sample_cursor(), BLOCK as u64);
    }

    #[test]
    fn patch_swap_resets_filter_only_on_window_change() {
        let windowed = r#"{
            "oscillators": [{ "waveform": "sine" }],
            "filter": { "window": 8 }
        }"#;
        let (_tx, mut synth) = test_synth(windowed);
        let mut block = [0.25f32; BLOCK];
        synth.render_block(&mut block);
        assert_eq!(synth.filter().state().len(), 7);

        // Same window: carried state survives.
        let same = Patch::from_source(&windowed.replace("sine", "saw")).unwrap();
        synth.set_patch(same);
        assert_eq!(synth.filter().state().len(), 7);

        // Different window: explicit reinitialization.
        let wider = Patch::from_source(&windowed.replace("8", "16")).unwrap();
        synth.set_patch(wider);
        assert!(synth.filter().state().is_empty());
        assert_eq!(synth.filter().window(), 16);
    }
}
