//! CPAL device discovery and hardware output

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfig};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, error, warn};

use super::EngineConfig;

/// A discovered audio output device
pub struct CpalDevice {
    device: cpal::Device,
    config: SupportedStreamConfig,
    name: String,
    sample_rate: u32,
    channels: u16,
}

/// Playback counters shared with the stream thread
#[derive(Clone, Default)]
pub struct OutputStats {
    samples_consumed: Arc<AtomicUsize>,
    had_underrun: Arc<AtomicBool>,
}

impl OutputStats {
    /// How many samples the device has played
    #[inline]
    pub fn samples_consumed(&self) -> usize {
        self.samples_consumed.load(Ordering::Relaxed)
    }

    /// Check and clear the underrun flag
    pub fn check_underrun(&self) -> bool {
        self.had_underrun.swap(false, Ordering::Relaxed)
    }
}

impl CpalDevice {
    /// Get the default output device
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        Self::probe(device)
    }

    /// List all available output devices
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(Self::probe).collect())
            .unwrap_or_default()
    }

    fn probe(device: cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            name,
            device,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Engine settings matching this device
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            sample_rate: self.sample_rate,
            channels: usize::from(self.channels),
        }
    }

    /// Start a stream on this device and return the ring buffer feeding it.
    ///
    /// The stream lives on its own thread. Hand the producer to
    /// [`Engine::with_output`](super::Engine::with_output).
    pub fn spawn_output(&self) -> (Producer<f32>, OutputStats) {
        let channels = usize::from(self.channels);
        let sample_format = self.config.sample_format();
        let stream_config = self.config.config();

        // ~100ms of audio to ride out scheduling jitter
        let buffer_samples = ((self.sample_rate as f32 * 0.1) as usize) * channels;
        let buffer_size = buffer_samples.next_power_of_two().max(8192);
        let (producer, consumer) = RingBuffer::<f32>::new(buffer_size);

        let stats = OutputStats::default();
        let thread_stats = stats.clone();
        let device = self.device.clone();
        let name = self.name.clone();

        std::thread::spawn(move || {
            let stream = match build_stream(&device, sample_format, &stream_config, consumer, thread_stats) {
                Ok(stream) => stream,
                Err(e) => {
                    error!(device = %name, error = %e, "failed to build output stream");
                    return;
                }
            };
            if let Err(e) = stream.play() {
                error!(device = %name, error = %e, "failed to start output stream");
                return;
            }
            debug!(device = %name, "output stream running");

            // the stream lives as long as this thread
            loop {
                std::thread::park();
            }
        });

        (producer, stats)
    }
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    stream_config: &cpal::StreamConfig,
    consumer: Consumer<f32>,
    stats: OutputStats,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    match sample_format {
        SampleFormat::F32 => build_typed(device, stream_config, consumer, stats, |s| s),
        SampleFormat::I16 => build_typed(device, stream_config, consumer, stats, |s: f32| {
            (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        }),
        SampleFormat::U16 => build_typed(device, stream_config, consumer, stats, |s: f32| {
            ((s.clamp(-1.0, 1.0) + 1.0) * 0.5 * u16::MAX as f32) as u16
        }),
        other => {
            warn!(format = ?other, "unsupported sample format");
            Err(cpal::BuildStreamError::StreamConfigNotSupported)
        }
    }
}

fn build_typed<T, F>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut consumer: Consumer<f32>,
    stats: OutputStats,
    convert: F,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    F: Fn(f32) -> T + Send + 'static,
{
    device.build_output_stream(
        stream_config,
        move |data: &mut [T], _| {
            let mut underrun = false;
            for sample in data.iter_mut() {
                let s = consumer.pop().unwrap_or_else(|_| {
                    underrun = true;
                    0.0
                });
                *sample = convert(s);
            }
            if underrun {
                stats.had_underrun.store(true, Ordering::Relaxed);
            }
            stats.samples_consumed.fetch_add(data.len(), Ordering::Relaxed);
        },
        |err| error!(error = %err, "output stream error"),
        None,
    )
}
