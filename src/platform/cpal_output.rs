use super::{AudioOutput, DeviceStatus};
use crate::effects::StereoFrame;
use crate::engine::{Renderer, RENDER_CHANNELS};
use crate::error::DeviceError;
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
    StreamError, SupportedBufferSize, SupportedStreamConfig,
};

/// Output through the platform's default device
pub struct CpalOutput {
    stream: Option<Stream>,
    device: Option<Device>,
    config: Option<StreamConfig>,
    sample_format: SampleFormat,
    sample_rate: u32,
    block_size: u32,
    is_active: bool,
}

impl CpalOutput {
    pub fn new() -> Self {
        Self {
            stream: None,
            device: None,
            config: None,
            sample_format: SampleFormat::F32,
            sample_rate: 0,
            block_size: 0,
            is_active: false,
        }
    }

    /// Setup the CPAL host and device
    fn setup_host_device(&mut self, sample_rate: u32, block_size: u32) -> Result<(), DeviceError> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| DeviceError::OpenFailed("no default output device".to_string()))?;

        log::info!(
            "Output device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string())
        );

        let supported = Self::pick_config(&device, sample_rate)?;
        log::info!("Output config: {:?}", supported);

        self.sample_format = supported.sample_format();
        self.sample_rate = supported.sample_rate().0;
        self.block_size = block_size;

        // Ask for the block size only when the device advertises it
        let buffer_size = match supported.buffer_size() {
            SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&block_size) => {
                BufferSize::Fixed(block_size)
            }
            _ => BufferSize::Default,
        };
        let mut config: StreamConfig = supported.into();
        config.buffer_size = buffer_size;
        self.device = Some(device);
        self.config = Some(config);
        Ok(())
    }

    /// Prefer a config that runs at the working rate; otherwise fall back to
    /// the device default and let the engine resample
    fn pick_config(device: &Device, sample_rate: u32) -> Result<SupportedStreamConfig, DeviceError> {
        let open_err = |e: &dyn std::fmt::Display| DeviceError::OpenFailed(e.to_string());

        let exact = device
            .supported_output_configs()
            .map_err(|e| open_err(&e))?
            .filter(|c| {
                sample_rate >= c.min_sample_rate().0 && sample_rate <= c.max_sample_rate().0
            })
            .max_by_key(|c| {
                (
                    c.sample_format() == SampleFormat::F32,
                    c.channels() == RENDER_CHANNELS as u16,
                )
            });

        if let Some(range) = exact {
            return Ok(range.with_sample_rate(cpal::SampleRate(sample_rate)));
        }

        let fallback = device.default_output_config().map_err(|e| open_err(&e))?;
        log::warn!(
            "Audio device doesn't support {} Hz, using {} Hz (track will be resampled)",
            sample_rate,
            fallback.sample_rate().0
        );
        Ok(fallback)
    }

    /// Create a typed stream for the given sample format
    fn make_stream<T>(
        device: &Device,
        config: &StreamConfig,
        block_size: usize,
        mut renderer: Renderer,
        status: DeviceStatus,
    ) -> Result<Stream, DeviceError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        // Scratch for one block of renderer output, allocated here and
        // never resized inside the callback
        let mut scratch = vec![0.0f32; block_size.max(1) * RENDER_CHANNELS];

        let err_fn = move |err: StreamError| match err {
            StreamError::DeviceNotAvailable => status.report(DeviceError::StreamAborted(
                "output device is no longer available".to_string(),
            )),
            StreamError::BackendSpecific { err } => {
                status.report(DeviceError::Backend(err.to_string()))
            }
        };

        device
            .build_output_stream(
                config,
                move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                    Self::process_block(output, channels, &mut renderer, &mut scratch);
                },
                err_fn,
                None,
            )
            .map_err(|e| DeviceError::OpenFailed(e.to_string()))
    }

    /// Fill a device buffer, rendering as many scratch-sized chunks as needed
    fn process_block<T>(
        output: &mut [T],
        channels: usize,
        renderer: &mut Renderer,
        scratch: &mut [f32],
    ) where
        T: Sample + FromSample<f32>,
    {
        if channels == 0 {
            return;
        }
        let chunk_frames = scratch.len() / RENDER_CHANNELS;

        for device_chunk in output.chunks_mut(chunk_frames * channels) {
            let frames = device_chunk.len() / channels;
            let rendered = &mut scratch[..frames * RENDER_CHANNELS];
            renderer.render(rendered);

            for (frame, stereo) in device_chunk
                .chunks_exact_mut(channels)
                .zip(rendered.chunks_exact(RENDER_CHANNELS))
            {
                Self::write_frame(frame, StereoFrame::new(stereo[0], stereo[1]));
            }
        }
    }

    /// Map a stereo pair onto the device's channel layout
    #[inline]
    fn write_frame<T>(frame: &mut [T], stereo: StereoFrame)
    where
        T: Sample + FromSample<f32>,
    {
        match frame {
            [mono] => *mono = T::from_sample(stereo.downmix()),
            [l, r, rest @ ..] => {
                *l = T::from_sample(stereo.left);
                *r = T::from_sample(stereo.right);
                for sample in rest {
                    *sample = T::EQUILIBRIUM;
                }
            }
            [] => {}
        }
    }
}

impl Default for CpalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for CpalOutput {
    fn initialize(&mut self, sample_rate: u32, block_size: u32) -> Result<(), DeviceError> {
        self.setup_host_device(sample_rate, block_size)
    }

    fn open(&mut self, renderer: Renderer, status: DeviceStatus) -> Result<(), DeviceError> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| DeviceError::OpenFailed("device not initialized".to_string()))?;
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| DeviceError::OpenFailed("config not initialized".to_string()))?;
        let block = self.block_size as usize;

        let stream = match self.sample_format {
            SampleFormat::I8 => Self::make_stream::<i8>(device, config, block, renderer, status)?,
            SampleFormat::I16 => Self::make_stream::<i16>(device, config, block, renderer, status)?,
            SampleFormat::I32 => Self::make_stream::<i32>(device, config, block, renderer, status)?,
            SampleFormat::I64 => Self::make_stream::<i64>(device, config, block, renderer, status)?,
            SampleFormat::U8 => Self::make_stream::<u8>(device, config, block, renderer, status)?,
            SampleFormat::U16 => Self::make_stream::<u16>(device, config, block, renderer, status)?,
            SampleFormat::U32 => Self::make_stream::<u32>(device, config, block, renderer, status)?,
            SampleFormat::U64 => Self::make_stream::<u64>(device, config, block, renderer, status)?,
            SampleFormat::F32 => Self::make_stream::<f32>(device, config, block, renderer, status)?,
            SampleFormat::F64 => Self::make_stream::<f64>(device, config, block, renderer, status)?,
            sample_format => {
                return Err(DeviceError::OpenFailed(format!(
                    "Unsupported sample format '{}'",
                    sample_format
                )))
            }
        };

        self.stream = Some(stream);
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        let stream = self.stream.as_ref().ok_or_else(|| {
            DeviceError::OpenFailed("Stream not created. Call open first.".to_string())
        })?;
        stream
            .play()
            .map_err(|e| DeviceError::OpenFailed(e.to_string()))?;
        self.is_active = true;
        log::info!("Audio stream started at {} Hz", self.sample_rate);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| DeviceError::Backend(e.to_string()))?;
            self.is_active = false;
            log::info!("Audio stream paused");
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("Pause before close failed: {}", e);
            }
            drop(stream);
            log::info!("Audio stream closed");
        }
        self.is_active = false;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}
