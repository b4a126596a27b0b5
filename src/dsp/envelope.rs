/*
Block-Rate ADSR Envelope
========================

This envelope advances once per render call, not once per sample. Every note
carries an `EnvelopeState`; the shared `Envelope` (built from the patch's
constants) steps all of them between the waveform pass and the prune pass.

The four phases map onto two booleans plus the level:

  Attack    key_held && attacking && level < 1     -> level += 1/attack
  Hold      key_held && attacking && level >= 1    -> clear `attacking`
  Decay     key_held && !attacking && level > sustain && decay enabled
                                                   -> level -= 1/decay
  Release   !key_held                              -> level -= 1/release

Release overrides everything: the moment the key goes up, the level ramps
toward zero regardless of phase. After every step the level is clamped to
[0, LEVEL_CEILING], which also guarantees a released note lands on exactly 0.0
so the prune predicate can compare against zero.

Rates are reciprocal integer constants measured in render-call counts, not
seconds. Envelope timing therefore scales with block size and sample rate.
That is intentional and must stay: patches tune these counts against the
configured block length.
*/

/// Upper clamp for the envelope level. Slightly above 1.0 so a completed
/// attack can sit at full volume without the decay branch oscillating around
/// the sustain ceiling.
pub const LEVEL_CEILING: f32 = 1.01;

/// Per-note envelope state. Owned by a `Note`, mutated only by
/// [`Envelope::step`] and by note-off handling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeState {
    /// Current amplitude in [0, LEVEL_CEILING].
    pub level: f32,
    /// True while the originating key is down.
    pub key_held: bool,
    /// True while still ramping up (attack) or holding at full volume.
    pub attacking: bool,
}

impl EnvelopeState {
    /// State of a freshly struck note: silent, held, attacking.
    pub fn struck() -> Self {
        Self {
            level: 0.0,
            key_held: true,
            attacking: true,
        }
    }

    /// The key went up; the next steps will ramp the level to zero.
    pub fn release(&mut self) {
        self.key_held = false;
    }

    /// Fully released: eligible for removal from the registry. Held notes are
    /// never finished, even at zero level.
    pub fn finished(&self) -> bool {
        self.level == 0.0 && !self.key_held
    }
}

/// Envelope shape derived from a patch's integer constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    attack_rate: f32,
    decay_rate: f32,
    sustain: f32,
    release_rate: f32,
}

impl Envelope {
    /// Build an envelope from render-call counts. `decay == 0` disables the
    /// decay branch (the level holds wherever the attack left it).
    ///
    /// `attack` and `release` must be >= 1; patch validation enforces this.
    pub fn from_counts(attack: u32, decay: u32, sustain: f32, release: u32) -> Self {
        Self {
            attack_rate: 1.0 / attack as f32,
            decay_rate: if decay == 0 { 0.0 } else { 1.0 / decay as f32 },
            sustain,
            release_rate: 1.0 / release as f32,
        }
    }

    pub fn sustain(&self) -> f32 {
        self.sustain
    }

    /// Advance one render call. Exactly one branch fires per step.
    pub fn step(&self, state: &mut EnvelopeState) {
        if !state.key_held {
            state.level -= self.release_rate;
        } else if state.attacking && state.level < 1.0 {
            state.level += self.attack_rate;
        } else if state.attacking {
            state.attacking = false;
        } else if state.level > self.sustain && self.decay_rate != 0.0 {
            state.level -= self.decay_rate;
        }

        state.level = state.level.clamp(0.0, LEVEL_CEILING);
    }
}
