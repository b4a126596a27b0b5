//! Live playback host: cpal output, a watched patch artifact, and a scripted
//! arpeggio standing in for a MIDI keyboard.
//!
//! Edit `demos/patch.json` while this runs and save - the watcher compiles
//! it off the audio path and the render loop swaps it in between blocks. A
//! broken edit gets the invalid marker appended and the previous patch keeps
//! playing.

use std::time::Duration;

use color_eyre::eyre::{eyre, Result, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use polypatch::io::{AudioSink, SinkError};
use polypatch::patch::source::PatchWatcher;
use polypatch::patch::Patch;
use polypatch::runtime::RenderLoop;
use polypatch::synth::{event_queue, NoteEvent, PolySynth};
use polypatch::DEFAULT_BLOCK_SIZE;

/// Sink that feeds a lock-free ring the audio callback drains. `submit`
/// waits for space, which paces the render loop to the device clock.
struct RingSink {
    tx: rtrb::Producer<f32>,
}

impl AudioSink for RingSink {
    fn submit(&mut self, block: &[f32]) -> Result<(), SinkError> {
        loop {
            if self.tx.is_abandoned() {
                return Err(SinkError::Closed);
            }
            if self.tx.slots() >= block.len() {
                for &sample in block {
                    let _ = self.tx.push(sample);
                }
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;
    let sample_rate = config.sample_rate().0 as f64;
    let channels = config.channels() as usize;

    println!("=== polypatch live ===");
    println!("Device: {}", device.name().unwrap_or_else(|_| "?".into()));
    println!("Sample rate: {sample_rate} Hz, {channels} channel(s)");
    println!("Watching: demos/patch.json (edit + save to swap the sound)");

    let (mut events, event_rx) = event_queue(256);
    let (_watcher, patch_rx) = PatchWatcher::spawn("demos/patch.json", Duration::from_millis(100));

    let synth = PolySynth::new(sample_rate, Patch::default(), event_rx);
    let mut render = RenderLoop::new(synth)
        .with_block_size(DEFAULT_BLOCK_SIZE)
        .with_patch_feed(patch_rx);
    let shutdown = render.shutdown_handle();

    // Ring holds ~4 blocks of lead; enough to ride out scheduling hiccups.
    let (audio_tx, mut audio_rx) = rtrb::RingBuffer::<f32>::new(DEFAULT_BLOCK_SIZE * 4);
    let mut sink = RingSink { tx: audio_tx };

    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _| {
            for frame in data.chunks_mut(channels) {
                let sample = audio_rx.pop().unwrap_or(0.0);
                for out in frame.iter_mut() {
                    *out = sample;
                }
            }
        },
        |err| log::error!("audio stream error: {err}"),
        None,
    )?;
    stream.play()?;

    let render_thread = std::thread::spawn(move || render.run(&mut sink));

    // A looping minor arpeggio stands in for the keyboard player.
    let pattern = [57u8, 60, 64, 69, 64, 60];
    for _ in 0..8 {
        for &pitch in &pattern {
            events.send(NoteEvent::NoteOn { pitch, velocity: 100 });
            std::thread::sleep(Duration::from_millis(220));
            events.send(NoteEvent::NoteOff { pitch });
        }
    }
    events.send(NoteEvent::AllNotesOff);
    std::thread::sleep(Duration::from_millis(500));

    shutdown.request();
    render_thread
        .join()
        .map_err(|_| eyre!("render thread panicked"))?;
    Ok(())
}
