//! The render loop and patch host.
//!
//! Drives an unbounded sequence of fixed-size blocks through three states:
//!
//! ```text
//! Running --(shutdown requested, checked at iteration top)--> Draining
//! Draining --(final block submitted, sink released)---------> Stopped
//! ```
//!
//! There is no mid-block cancellation and no mid-block patch swap: every
//! block is rendered under one consistent patch, and shutdown only takes
//! effect at an iteration boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rtrb::Consumer;

use crate::io::AudioSink;
use crate::patch::Patch;
use crate::synth::PolySynth;
use crate::DEFAULT_BLOCK_SIZE;

/// How many iterations pass between patch-feed polls.
const DEFAULT_RELOAD_INTERVAL: u64 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Draining,
    Stopped,
}

/// Cloneable handle that asks the loop to wind down. The request is honored
/// at the top of the next iteration, never mid-block.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    fn requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct RenderLoop {
    synth: PolySynth,
    patch_rx: Option<Consumer<Patch>>,
    state: LoopState,
    block: Vec<f32>,
    reload_interval: u64,
    iteration: u64,
    shutdown: ShutdownHandle,
}

impl RenderLoop {
    pub fn new(synth: PolySynth) -> Self {
        Self {
            synth,
            patch_rx: None,
            state: LoopState::Running,
            block: vec![0.0; DEFAULT_BLOCK_SIZE],
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            iteration: 0,
            shutdown: ShutdownHandle::default(),
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block = vec![0.0; block_size];
        self
    }

    /// Attach the queue a [`crate::patch::source::PatchWatcher`] feeds.
    pub fn with_patch_feed(mut self, rx: Consumer<Patch>) -> Self {
        self.patch_rx = Some(rx);
        self
    }

    pub fn with_reload_interval(mut self, iterations: u64) -> Self {
        self.reload_interval = iterations.max(1);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn block_size(&self) -> usize {
        self.block.len()
    }

    pub fn synth(&self) -> &PolySynth {
        &self.synth
    }

    /// Run to completion. Returns once a shutdown request has drained the
    /// loop; the sink is released when this returns.
    pub fn run(&mut self, sink: &mut dyn AudioSink) {
        while self.state != LoopState::Stopped {
            self.step(sink);
        }
    }

    /// One iteration of the loop state machine. Public so hosts and tests
    /// can pace the loop themselves (an audio callback, a bounce loop).
    pub fn step(&mut self, sink: &mut dyn AudioSink) {
        match self.state {
            LoopState::Running => {
                if self.shutdown.requested() {
                    self.state = LoopState::Draining;
                    return;
                }

                self.synth.pump_events();
                if self.iteration % self.reload_interval == 0 {
                    self.poll_patch();
                }
                self.render_and_submit(sink);
                self.iteration += 1;
            }
            LoopState::Draining => {
                // Stop accepting events; finish one final block, then stop.
                self.render_and_submit(sink);
                self.state = LoopState::Stopped;
                log::info!("render loop drained after {} iterations", self.iteration);
            }
            LoopState::Stopped => {}
        }
    }

    /// Take the newest compiled patch off the feed, if any, and swap it in
    /// between blocks. Compilation already happened on the watcher thread;
    /// this is just the swap.
    fn poll_patch(&mut self) {
        let Some(rx) = self.patch_rx.as_mut() else {
            return;
        };
        let mut latest = None;
        while let Ok(patch) = rx.pop() {
            latest = Some(patch);
        }
        if let Some(patch) = latest {
            if patch.fingerprint() != self.synth.patch().fingerprint() {
                log::info!("swapping in patch '{}'", patch.spec.name);
                self.synth.set_patch(patch);
            }
        }
    }

    fn render_and_submit(&mut self, sink: &mut dyn AudioSink) {
        self.synth.render_block(&mut self.block);
        if let Err(err) = sink.submit(&self.block) {
            // This iteration's loss only; the next block renders normally.
            log::warn!("audio sink refused block: {err}");
        }
    }
}
