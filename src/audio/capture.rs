use super::format::AudioFormat;
use crate::error::PipelineError;
use crate::models::DeviceInfo;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use ringbuf::{HeapRb, traits::*};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};

pub struct AudioCapture;

impl AudioCapture {
    /// Enumerate devices that expose input channels.
    ///
    /// Indices are positions in this list and are what `resolve_device` accepts.
    pub fn list_devices() -> Result<Vec<DeviceInfo>> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let devices = host
            .input_devices()
            .context("Failed to enumerate input devices")?
            .enumerate()
            .filter_map(|(index, device)| {
                let config = device.default_input_config().ok()?;
                if config.channels() == 0 {
                    return None;
                }
                let name = device.name().unwrap_or_else(|_| format!("device {}", index));
                Some(DeviceInfo {
                    index,
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    name,
                    channels: config.channels(),
                    sample_rate: config.sample_rate().0,
                })
            })
            .collect();

        Ok(devices)
    }

    /// Pick the capture device: explicit index, else the platform default,
    /// else the first device with input channels.
    pub fn resolve_device(index: Option<usize>) -> Result<cpal::Device, PipelineError> {
        let host = cpal::default_host();

        if let Some(index) = index {
            return host
                .input_devices()
                .ok()
                .and_then(|mut devices| devices.nth(index))
                .ok_or(PipelineError::DeviceNotFound(index));
        }

        if let Some(device) = host.default_input_device() {
            return Ok(device);
        }

        tracing::warn!("No default input device, looking for any device with input channels");
        host.input_devices()
            .ok()
            .and_then(|mut devices| {
                devices.find(|d| {
                    d.default_input_config()
                        .map(|c| c.channels() > 0)
                        .unwrap_or(false)
                })
            })
            .ok_or(PipelineError::NoInputDevice)
    }

    /// Start audio capture on `device`
    ///
    /// Returns the stream which must be kept alive for audio capture to continue.
    /// Blocks of `AudioFormat::BLOCK_SAMPLES` samples are sent via chunk_tx.
    pub fn start(
        device: &cpal::Device,
        format: AudioFormat,
        chunk_tx: mpsc::Sender<Vec<f32>>,
    ) -> Result<cpal::Stream> {
        let ring = HeapRb::<f32>::new(format.samples_for_duration(10.0));
        let (mut producer, consumer) = ring.split();

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let notify = Arc::new(Notify::new());
        let notify_callback = notify.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    producer.push_slice(data);
                    notify_callback.notify_one();
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            )
            .context("Failed to build input stream")?;

        stream.play().context("Failed to start audio stream")?;

        tokio::task::spawn_local(Self::bridge_task(
            consumer,
            chunk_tx,
            AudioFormat::BLOCK_SAMPLES,
            notify,
        ));

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            "Audio capture started"
        );
        Ok(stream)
    }

    async fn bridge_task(
        mut consumer: impl Consumer<Item = f32>,
        tx: mpsc::Sender<Vec<f32>>,
        chunk_size: usize,
        notify: Arc<Notify>,
    ) {
        loop {
            tokio::select! {
                _ = notify.notified() => {}
                // Recorder dropped its receiver, the recording is over
                _ = tx.closed() => return,
            }

            while consumer.occupied_len() >= chunk_size {
                let mut chunk = vec![0.0f32; chunk_size];
                let n = consumer.pop_slice(&mut chunk);
                chunk.truncate(n);

                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        }
    }
}
