//! Oscillator through a delay into an analyser and the speakers.
//!
//! Run with: cargo run --example patch_demo
//! or, to hear it: cargo run --example patch_demo --features cpal_sink

use audiopatch::nodes::{Analyser, AudioDestination, Delay, Oscillator};
use audiopatch::{Engine, NodeId, Patch};

type DemoResult<T> = Result<T, Box<dyn std::error::Error>>;

fn link(patch: &mut Patch, from: NodeId, output: &str, to: NodeId, input: &str) -> DemoResult<()> {
    let a = patch.find_output(from, output).ok_or("no such output")?;
    let b = patch.find_input(to, input).ok_or("no such input")?;
    patch.connect(from, a, to, b)?;
    Ok(())
}

#[cfg(feature = "cpal_sink")]
fn engine() -> Engine {
    match audiopatch::CpalDevice::default_output() {
        Some(device) => {
            let (producer, _stats) = device.spawn_output();
            Engine::with_config(device.engine_config()).with_output(producer)
        }
        None => Engine::new(48_000),
    }
}

#[cfg(not(feature = "cpal_sink"))]
fn engine() -> Engine {
    Engine::new(48_000)
}

fn main() -> DemoResult<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let mut engine = engine();
    let mut patch = Patch::new();

    let osc = patch.add(&mut engine, Oscillator::new())?;
    let delay = patch.add(&mut engine, Delay::new())?;
    let analyser = patch.add(&mut engine, Analyser::with_fft_size(256))?;
    let out = patch.add(&mut engine, AudioDestination::new())?;

    link(&mut patch, osc, "Output 1", delay, "Input 1")?;
    link(&mut patch, delay, "Output 1", analyser, "Input 1")?;
    link(&mut patch, analyser, "Output 1", out, "Input 1")?;

    let freq = patch.find_input(osc, "frequency").ok_or("no frequency pin")?;
    let delay_time = patch.find_input(delay, "delay Time").ok_or("no delay pin")?;
    patch.set_input(delay, delay_time, 0.25)?;

    // one patch tick per 60 Hz frame, roughly 12 blocks of audio each
    for frame in 0..180u32 {
        let hz = 220.0 * 2f64.powf(f64::from(frame / 30) / 12.0);
        patch.set_input(osc, freq, hz)?;
        patch.tick(&mut engine);
        engine.render_blocks(12);

        if frame % 30 == 29 {
            let spectrum = patch
                .node(analyser)
                .and_then(|n| n.pins().output("FFT").and_then(|p| n.pins().get(p)))
                .map(|p| p.values().iter().filter_map(|v| v.as_number()).collect::<Vec<_>>())
                .unwrap_or_default();
            let loudest = (0..spectrum.len()).max_by(|&a, &b| spectrum[a].total_cmp(&spectrum[b]));
            println!(
                "t={:.2}s  {:.1} Hz  loudest bin {:?} of {}",
                frame as f32 / 60.0,
                hz,
                loudest,
                spectrum.len()
            );
        }
    }

    Ok(())
}
