use serde::{Deserialize, Serialize};

/*
Waveform Generators
===================

Every generator is a pure function of absolute sample time: no phase
accumulator, no per-voice state. The caller hands in time values derived from
the global sample cursor, which is what keeps the output continuous across
block boundaries - sample N of one block and sample 0 of the next are adjacent
points on the same curve.

All generators share one phase convention: the ramp `(t * freq * mul) mod 2`,
which completes a cycle every `2 / (freq * mul)` seconds. The sine generator
uses `sin(pi * t * freq * mul)` so it lines up with the same convention.

Time is f64 (the cursor grows without bound and f32 runs out of mantissa after
a few minutes at 48kHz); sample values are f32.
*/

/// Fixed headroom applied to the sine generator so a full-amplitude note
/// leaves room when several oscillators are stacked.
const SINE_HEADROOM: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Saw,
    Square,
}

impl Waveform {
    /// Sample this waveform at absolute time `t` (seconds) for a note at
    /// `freq` Hz, with `mul` as the frequency multiplier.
    #[inline]
    pub fn sample(self, t: f64, freq: f64, mul: f64) -> f32 {
        match self {
            Waveform::Sine => ((t * std::f64::consts::PI * freq * mul).sin() * SINE_HEADROOM) as f32,
            Waveform::Saw => ((t * freq * mul).rem_euclid(2.0) - 1.0) as f32,
            Waveform::Square => {
                let ramp = (t * freq * mul).rem_euclid(2.0) - 1.0;
                if ramp < 0.0 {
                    -1.0
                } else {
                    1.0
                }
            }
        }
    }
}

/// Sum `2 * spread + 1` copies of `wave` at multipliers fanned out around
/// `mul` by `(i / spread) * amount` for `i` in `[-spread, spread]`.
///
/// `spread` must be >= 1; patch validation enforces this.
#[inline]
pub fn detuned(wave: Waveform, t: f64, freq: f64, mul: f64, amount: f64, spread: u32) -> f32 {
    let spread = spread as i64;
    let mut sum = 0.0f32;
    for i in -spread..=spread {
        let offset = (i as f64 / spread as f64) * amount;
        sum += wave.sample(t, freq, mul + offset);
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 48_000.0;

    #[test]
    fn sine_matches_closed_form() {
        let freq = 440.0;
        for n in [0u64, 17, 255, 48_000] {
            let t = n as f64 / SAMPLE_RATE;
            let expected = ((t * std::f64::consts::PI * freq).sin() * 0.5) as f32;
            let actual = Waveform::Sine.sample(t, freq, 1.0);
            assert!(
                (actual - expected).abs() < 1e-6,
                "expected {expected}, got {actual} at sample {n}"
            );
        }
    }

    #[test]
    fn saw_stays_in_range_and_ramps() {
        let freq = 100.0;
        let mut last = Waveform::Saw.sample(0.0, freq, 1.0);
        assert!((last - -1.0).abs() < 1e-6, "ramp starts at -1");

        for n in 1..2_000u64 {
            let t = n as f64 / SAMPLE_RATE;
            let s = Waveform::Saw.sample(t, freq, 1.0);
            assert!((-1.0..1.0).contains(&s), "saw escaped [-1, 1): {s}");
            // Within one cycle the ramp only ever rises.
            if s < last {
                let step = last - s;
                assert!(step > 1.5, "non-wrap discontinuity of {step}");
            }
            last = s;
        }
    }

    #[test]
    fn square_is_bipolar() {
        let freq = 220.0;
        let mut seen_high = false;
        let mut seen_low = false;
        for n in 0..1_000u64 {
            let t = n as f64 / SAMPLE_RATE;
            let s = Waveform::Square.sample(t, freq, 1.0);
            assert!(s == 1.0 || s == -1.0, "square must be +/-1, got {s}");
            seen_high |= s == 1.0;
            seen_low |= s == -1.0;
        }
        assert!(seen_high && seen_low, "square never toggled");
    }

    #[test]
    fn detune_with_zero_amount_stacks_copies() {
        let t = 123.0 / SAMPLE_RATE;
        let base = Waveform::Saw.sample(t, 440.0, 1.0);
        let stacked = detuned(Waveform::Saw, t, 440.0, 1.0, 0.0, 2);
        assert!(
            (stacked - base * 5.0).abs() < 1e-5,
            "spread=2 should sum 5 instances"
        );
    }

    #[test]
    fn detune_offsets_are_symmetric() {
        // amount spreads multipliers evenly around the base; the extremes sit
        // exactly at mul +/- amount.
        let t = 1.0;
        let amount = 0.01;
        let manual: f32 = [-1.0f64, -0.5, 0.0, 0.5, 1.0]
            .iter()
            .map(|frac| Waveform::Sine.sample(t, 440.0, 1.0 + frac * amount))
            .sum();
        let fanned = detuned(Waveform::Sine, t, 440.0, 1.0, amount, 2);
        assert!((fanned - manual).abs() < 1e-5);
    }
}
