//! The swappable unit of waveform, FX, and envelope-constant logic.
//!
//! A patch is compiled from a watched JSON source artifact. Compilation is
//! parse + validate; the render thread only ever receives patches that came
//! out of that pipeline whole, so a block is always rendered with one
//! consistent patch - never old waveform code with new envelope constants.

/// Source artifact polling, invalid-marker annotation, and the watcher thread.
pub mod source;

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dsp::envelope::Envelope;
use crate::dsp::waveform::{detuned, Waveform};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to read patch source: {0}")]
    Io(#[from] std::io::Error),
    #[error("patch source is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid patch: {0}")]
    Invalid(String),
}

/// Content fingerprint of a patch's source definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn of(source: &str) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        source.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// One oscillator in the patch's stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscillatorSpec {
    pub waveform: Waveform,
    /// Frequency ratio relative to the note pitch (0.5 = octave down,
    /// 2.0 = octave up). A stack of sines at 1.0 / 0.5 / 2.0 is the classic
    /// drawbar organ.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_osc_gain")]
    pub gain: f32,
    /// Fan this oscillator out into `2 * spread + 1` detuned copies.
    #[serde(default)]
    pub detune: Option<DetuneSpec>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetuneSpec {
    /// Multiplier offset of the outermost copies.
    pub amount: f64,
    /// Copies on each side of the base multiplier; must be >= 1.
    pub spread: u32,
}

/// Envelope constants in render-call counts (not seconds). Timing scales
/// with block size and sample rate; patches are tuned against the configured
/// block length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeSpec {
    pub attack: u32,
    /// 0 disables decay.
    pub decay: u32,
    pub sustain: f32,
    pub release: u32,
}

impl Default for EnvelopeSpec {
    fn default() -> Self {
        Self {
            attack: 10,
            decay: 10,
            sustain: 1.0,
            release: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FxSpec {
    /// Hard clip at +/- this value, applied to the mixed block before the
    /// master gain.
    #[serde(default)]
    pub clip: Option<f32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Moving-average window in samples; <= 1 disables the filter.
    pub window: usize,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self { window: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSpec {
    #[serde(default)]
    pub name: String,
    pub oscillators: Vec<OscillatorSpec>,
    #[serde(default)]
    pub envelope: EnvelopeSpec,
    #[serde(default)]
    pub fx: FxSpec,
    /// Master mixdown gain.
    #[serde(default = "default_gain")]
    pub gain: f32,
    #[serde(default)]
    pub filter: FilterSpec,
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_osc_gain() -> f32 {
    1.0
}

fn default_gain() -> f32 {
    0.5
}

impl Default for PatchSpec {
    /// The shipped preset: a half-gain square wave, 10-call attack and
    /// release, unity sustain, 10-sample filter window.
    fn default() -> Self {
        Self {
            name: "square".into(),
            oscillators: vec![OscillatorSpec {
                waveform: Waveform::Square,
                multiplier: 1.0,
                gain: 0.5,
                detune: None,
            }],
            envelope: EnvelopeSpec::default(),
            fx: FxSpec::default(),
            gain: 0.5,
            filter: FilterSpec::default(),
        }
    }
}

/// A compiled, validated patch plus the fingerprint of the source it came
/// from.
#[derive(Debug, Clone)]
pub struct Patch {
    pub spec: PatchSpec,
    fingerprint: Fingerprint,
}

impl Patch {
    /// Compile a patch from its JSON source text.
    pub fn from_source(source: &str) -> Result<Self, PatchError> {
        let spec: PatchSpec = serde_json::from_str(source)?;
        validate(&spec)?;
        Ok(Self {
            spec,
            fingerprint: Fingerprint::of(source),
        })
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn envelope(&self) -> Envelope {
        let env = &self.spec.envelope;
        Envelope::from_counts(env.attack, env.decay, env.sustain, env.release)
    }

    /// Sum the oscillator stack for one sample at absolute time `t`.
    #[inline]
    pub fn oscillator_sample(&self, t: f64, freq: f64) -> f32 {
        let mut sum = 0.0f32;
        for osc in &self.spec.oscillators {
            let s = match osc.detune {
                Some(d) => detuned(osc.waveform, t, freq, osc.multiplier, d.amount, d.spread),
                None => osc.waveform.sample(t, freq, osc.multiplier),
            };
            sum += s * osc.gain;
        }
        sum
    }
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            spec: PatchSpec::default(),
            fingerprint: Fingerprint::of("builtin:square"),
        }
    }
}

fn validate(spec: &PatchSpec) -> Result<(), PatchError> {
    let invalid = |msg: String| Err(PatchError::Invalid(msg));

    if spec.oscillators.is_empty() {
        return invalid("patch needs at least one oscillator".into());
    }
    for (i, osc) in spec.oscillators.iter().enumerate() {
        if !osc.multiplier.is_finite() || osc.multiplier <= 0.0 {
            return invalid(format!("oscillator {i}: multiplier must be positive"));
        }
        if !osc.gain.is_finite() {
            return invalid(format!("oscillator {i}: gain must be finite"));
        }
        if let Some(d) = osc.detune {
            if d.spread < 1 {
                return invalid(format!("oscillator {i}: detune spread must be >= 1"));
            }
            if !d.amount.is_finite() {
                return invalid(format!("oscillator {i}: detune amount must be finite"));
            }
        }
    }

    let env = &spec.envelope;
    if env.attack < 1 {
        return invalid("envelope attack must be >= 1 render call".into());
    }
    if env.release < 1 {
        return invalid("envelope release must be >= 1 render call".into());
    }
    if !(0.0..=1.0).contains(&env.sustain) {
        return invalid("envelope sustain must be in [0, 1]".into());
    }

    if !spec.gain.is_finite() {
        return invalid("master gain must be finite".into());
    }
    if let Some(clip) = spec.fx.clip {
        if !clip.is_finite() || clip <= 0.0 {
            return invalid("fx clip threshold must be positive".into());
        }
    }

    Ok(())
}
