//! Microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::source::AudioSource;
use crate::audio::wav::{mix_to_mono, resample};
use crate::error::{Result, VoxbridgeError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::time::Duration;

/// How long a block read may wait for the device before reporting a glitch.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Callback buffers held between the device thread and the capture loop.
const CALLBACK_QUEUE: usize = 256;

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Suppress noisy JACK/ALSA messages that occur during audio backend probing.
///
/// # Safety
/// Modifies environment variables; call at startup before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device names for PipeWire/PulseAudio desktops.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns to filter out (not useful for voice input).
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List usable audio input devices.
///
/// Preferred devices are marked with "\[recommended\]"; surround channels,
/// HDMI and similar outputs are left out.
pub fn list_devices() -> Result<Vec<String>> {
    let devices = with_suppressed_stderr(|| cpal::default_host().input_devices());
    let devices = devices.map_err(|e| VoxbridgeError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Get the best default input device, preferring PipeWire/PulseAudio.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| VoxbridgeError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

fn find_device(name: &str) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let devices =
            cpal::default_host()
                .input_devices()
                .map_err(|e| VoxbridgeError::AudioCapture {
                    message: format!("Failed to enumerate devices: {}", e),
                })?;

        for dev in devices {
            if let Ok(dev_name) = dev.name()
                && dev_name == name
            {
                return Ok(dev);
            }
        }

        Err(VoxbridgeError::AudioDeviceNotFound {
            device: name.to_string(),
        })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is created, paused and dropped by whichever thread
/// owns the `CpalAudioSource`; it is never shared.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone source producing 16-bit mono blocks at the configured rate.
///
/// Captures at the device's native config and converts in software
/// (channel mixing + resampling), so any device that opens at all works.
pub struct CpalAudioSource {
    device: cpal::Device,
    sample_rate: u32,
    stream: Option<SendableStream>,
    samples_rx: Option<Receiver<Vec<i16>>>,
    pending: Vec<i16>,
}

impl CpalAudioSource {
    /// Create a new CPAL audio source.
    ///
    /// # Arguments
    /// * `device_name` - Optional device name. If None, uses the best default input device.
    /// * `sample_rate` - Rate of the blocks handed to the recognizer
    pub fn new(device_name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let device = match device_name {
            Some(name) => find_device(name)?,
            None => get_best_default_device()?,
        };

        Ok(Self {
            device,
            sample_rate,
            stream: None,
            samples_rx: None,
            pending: Vec::new(),
        })
    }

    fn build_stream(&self, samples_tx: Sender<Vec<i16>>) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| VoxbridgeError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = u32::from(default_config.sample_rate());
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;
        let stream_config = default_config.config();

        tracing::debug!(
            channels = native_channels,
            rate = native_rate,
            format = ?default_config.sample_format(),
            "opening input stream"
        );

        let err_callback = |err| {
            tracing::warn!(error = %err, "audio stream error");
        };

        let convert = move |interleaved: &[i16]| {
            let mono = mix_to_mono(interleaved, native_channels);
            resample(&mono, native_rate, target_rate)
        };

        let stream = match default_config.sample_format() {
            SampleFormat::I16 => self.device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    // Full queue: drop the buffer rather than block the device thread
                    if samples_tx.try_send(convert(data)).is_err() {
                        tracing::trace!("capture queue full, dropping buffer");
                    }
                },
                err_callback,
                None,
            ),
            SampleFormat::F32 => self.device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let i16_data: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    if samples_tx.try_send(convert(&i16_data)).is_err() {
                        tracing::trace!("capture queue full, dropping buffer");
                    }
                },
                err_callback,
                None,
            ),
            fmt => {
                return Err(VoxbridgeError::AudioCapture {
                    message: format!(
                        "Unsupported native sample format: {:?}. \
                         Try specifying a device with --device.",
                        fmt
                    ),
                });
            }
        };

        stream.map_err(|e| VoxbridgeError::AudioCapture {
            message: format!("Failed to build input stream: {}", e),
        })
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (samples_tx, samples_rx) = bounded(CALLBACK_QUEUE);
        let stream = self.build_stream(samples_tx)?;
        stream.play().map_err(|e| VoxbridgeError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        self.pending.clear();
        self.samples_rx = Some(samples_rx);
        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.samples_rx = None;
        self.pending.clear();

        if let Some(sendable_stream) = self.stream.take() {
            sendable_stream
                .0
                .pause()
                .map_err(|e| VoxbridgeError::AudioCapture {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
        }
        Ok(())
    }

    fn read_block(&mut self, len: usize) -> Result<Vec<i16>> {
        let samples_rx = self
            .samples_rx
            .as_ref()
            .ok_or_else(|| VoxbridgeError::AudioCapture {
                message: "audio stream is not started".to_string(),
            })?;

        while self.pending.len() < len {
            match samples_rx.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(VoxbridgeError::AudioCapture {
                        message: format!(
                            "no audio received from input device within {}s",
                            READ_TIMEOUT.as_secs()
                        ),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(VoxbridgeError::AudioStreamClosed);
                }
            }
        }

        let rest = self.pending.split_off(len);
        Ok(std::mem::replace(&mut self.pending, rest))
    }
}
