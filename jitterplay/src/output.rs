//! Audio device output using cpal
//!
//! Drives a `PlaybackDriver` from the device callback: each callback pulls exactly as many
//! mono samples as the buffer has frames and copies them to every channel.
//!
//! The stream's output rate is the device's rate, so open the device first and build the
//! `StreamConfig` from [`DeviceOutput::sample_rate`].

use crate::error::{Error, Result};
use crate::playback::PlaybackDriver;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Scratch buffer size allocated up front for the callback
const INITIAL_SCRATCH_FRAMES: usize = 8192;

/// Output device wrapper
pub struct DeviceOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    error_count: Arc<AtomicU32>,
}

impl DeviceOutput {
    /// Names of the available output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device by name, falling back to the default device
    pub fn open(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let named = match device_name {
            Some(name) => {
                let found = host
                    .output_devices()
                    .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
                    .find(|d| d.name().ok().as_deref() == Some(name));
                if found.is_none() {
                    warn!("Requested device '{}' not found, falling back to default device", name);
                }
                found
            }
            None => None,
        };

        let device = match named {
            Some(device) => device,
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };
        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config = supported.config();

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            error_count: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Device sample rate (Hz)
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Device channel count
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Stream errors reported by the device since `start`
    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Start the device stream, moving the driver into the callback
    pub fn start(&mut self, driver: PlaybackDriver) -> Result<()> {
        if driver.config().output_sample_rate != self.sample_rate() {
            return Err(Error::AudioOutput(format!(
                "stream output rate {}Hz does not match device rate {}Hz",
                driver.config().output_sample_rate,
                self.sample_rate()
            )));
        }

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(driver)?,
            SampleFormat::I16 => self.build_stream::<i16>(driver)?,
            SampleFormat::U16 => self.build_stream::<u16>(driver)?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
        self.stream = Some(stream);

        info!("Audio stream started");
        Ok(())
    }

    /// Stop and release the device stream
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            info!("Audio stream stopped");
        }
    }

    fn build_stream<T>(&self, mut driver: PlaybackDriver) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = (self.config.channels as usize).max(1);
        let error_count = Arc::clone(&self.error_count);
        let mut scratch = vec![0.0f32; INITIAL_SCRATCH_FRAMES];

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    if scratch.len() < frames {
                        // Only if the device hands out a larger buffer than ever before
                        scratch.resize(frames, 0.0);
                    }
                    let mono = &mut scratch[..frames];
                    driver.pull_into(mono);

                    for (frame, &sample) in data.chunks_mut(channels).zip(mono.iter()) {
                        let value = T::from_sample(sample);
                        for slot in frame.iter_mut() {
                            *slot = value;
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_count.fetch_add(1, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

impl Drop for DeviceOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
