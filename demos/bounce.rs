//! Offline bounce: render a scripted chord progression through the full
//! render loop and write the result to `bounce.wav`.

use color_eyre::eyre::Result;
use hound::{SampleFormat, WavSpec, WavWriter};

use polypatch::io::BufferSink;
use polypatch::patch::Patch;
use polypatch::runtime::RenderLoop;
use polypatch::synth::{event_queue, NoteEvent, PolySynth};
use polypatch::{DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE};

/// Blocks per musical step at 256 samples / 48kHz (~0.4s).
const BLOCKS_PER_STEP: usize = 75;

fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let (mut events, event_rx) = event_queue(256);
    let synth = PolySynth::new(DEFAULT_SAMPLE_RATE, Patch::default(), event_rx);
    let mut render = RenderLoop::new(synth).with_block_size(DEFAULT_BLOCK_SIZE);
    let shutdown = render.shutdown_handle();
    let mut sink = BufferSink::new();

    let progression: &[&[u8]] = &[
        &[57, 60, 64], // Am
        &[53, 57, 60], // F
        &[48, 52, 55], // C
        &[55, 59, 62], // G
    ];

    for chord in progression {
        for &pitch in *chord {
            events.send(NoteEvent::NoteOn { pitch, velocity: 100 });
        }
        for _ in 0..BLOCKS_PER_STEP {
            render.step(&mut sink);
        }
        for &pitch in *chord {
            events.send(NoteEvent::NoteOff { pitch });
        }
        // Let the releases ring out before the next chord.
        for _ in 0..BLOCKS_PER_STEP / 4 {
            render.step(&mut sink);
        }
    }

    shutdown.request();
    render.run(&mut sink);

    let spec = WavSpec {
        channels: 1,
        sample_rate: DEFAULT_SAMPLE_RATE as u32,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create("bounce.wav", spec)?;
    for &sample in &sink.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    println!(
        "wrote bounce.wav: {:.1}s of audio",
        sink.samples.len() as f64 / DEFAULT_SAMPLE_RATE
    );
    Ok(())
}
