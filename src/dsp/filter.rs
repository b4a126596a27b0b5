use crate::MAX_BLOCK_SIZE;

/// Streaming moving-average low-pass filter.
///
/// Output sample `i` is the mean of raw input sample `i` and the `window - 1`
/// raw samples before it. The trailing `window - 1` raw (pre-filter) input
/// samples are carried across calls, so the first samples of a block are
/// averaged together with the end of the previous block and no discontinuity
/// is introduced at the boundary.
///
/// The very first call passes the raw block through untouched and only primes
/// the carried tail; state is otherwise reset solely by [`MovingAverage::reset`]
/// (patch reinitialization). A window of 1 or less disables filtering.
pub struct MovingAverage {
    window: usize,
    /// Last `window - 1` raw input samples, oldest first.
    tail: Vec<f32>,
    /// Reused per call for the tail + block concatenation and its prefix sums.
    scratch: Vec<f32>,
    primed: bool,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            tail: Vec::with_capacity(window.saturating_sub(1)),
            scratch: Vec::with_capacity(MAX_BLOCK_SIZE + window),
            primed: false,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Carried raw samples from the previous call (empty until primed).
    pub fn state(&self) -> &[f32] {
        &self.tail
    }

    /// Drop all carried state, as if no block had ever been processed.
    pub fn reset(&mut self) {
        self.tail.clear();
        self.primed = false;
    }

    /// Filter one block in place. Runs identically for silent input; silence
    /// is a signal, not a skip condition.
    pub fn process(&mut self, block: &mut [f32]) {
        let w = self.window;
        if w <= 1 || block.is_empty() {
            return;
        }

        if !self.primed {
            self.primed = true;
            self.remember(block);
            return;
        }

        self.scratch.clear();
        self.scratch.extend_from_slice(&self.tail);
        self.scratch.extend_from_slice(block);
        let tail_len = self.tail.len();

        self.remember(block);

        // Prefix sums over the raw concatenation, then each output is a
        // windowed difference. Windows that reach past the start of recorded
        // history (only possible while the tail is still filling from very
        // short blocks) simply sum fewer samples.
        let mut acc = 0.0f32;
        for s in self.scratch.iter_mut() {
            acc += *s;
            *s = acc;
        }

        let inv = 1.0 / w as f32;
        for (i, out) in block.iter_mut().enumerate() {
            let pos = tail_len + i;
            let start = (pos + 1).saturating_sub(w);
            let lower = if start == 0 {
                0.0
            } else {
                self.scratch[start - 1]
            };
            *out = (self.scratch[pos] - lower) * inv;
        }
    }

    /// Keep the last `window - 1` raw input samples as the next call's tail.
    fn remember(&mut self, block: &[f32]) {
        self.tail.extend_from_slice(block);
        let excess = self.tail.len().saturating_sub(self.window - 1);
        if excess > 0 {
            self.tail.drain(..excess);
        }
    }
}
