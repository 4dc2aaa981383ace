//! WAV file audio source for replaying recorded queries through the assistant.

use crate::audio::source::AudioSource;
use crate::clock::ManualClock;
use crate::error::{Result, VoxbridgeError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

/// Audio source that reads from WAV file data.
/// Supports arbitrary sample rates and channels, converting to mono at the
/// requested rate.
pub struct WavAudioSource {
    samples: Vec<i16>,
    position: usize,
    sample_rate: u32,
    clock: Option<ManualClock>,
}

impl WavAudioSource {
    /// Open a WAV file from disk.
    pub fn open(path: &Path, target_rate: u32) -> Result<Self> {
        let file = File::open(path).map_err(|e| VoxbridgeError::AudioCapture {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Self::from_reader(Box::new(BufReader::new(file)), target_rate)
    }

    /// Create from any reader (for testing/flexibility).
    pub fn from_reader(reader: Box<dyn Read + Send>, target_rate: u32) -> Result<Self> {
        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| VoxbridgeError::AudioCapture {
                message: format!("Failed to parse WAV file: {}", e),
            })?;

        let spec = wav_reader.spec();

        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VoxbridgeError::AudioCapture {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        let mono = mix_to_mono(&raw_samples, spec.channels as usize);

        Ok(Self {
            samples: resample(&mono, spec.sample_rate, target_rate),
            position: 0,
            sample_rate: target_rate,
            clock: None,
        })
    }

    /// Advance `clock` by the duration of every block read, so timeouts
    /// follow the recording rather than how fast it is decoded.
    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Total number of samples after conversion.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl AudioSource for WavAudioSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// The final block is padded with silence to the full block length.
    fn read_block(&mut self, len: usize) -> Result<Vec<i16>> {
        if self.position >= self.samples.len() {
            return Ok(Vec::new());
        }

        let end = std::cmp::min(self.position + len, self.samples.len());
        let mut block = self.samples[self.position..end].to_vec();
        block.resize(len, 0);
        self.position = end;

        if let Some(clock) = &self.clock
            && self.sample_rate > 0
        {
            clock.advance(Duration::from_secs_f64(len as f64 / self.sample_rate as f64));
        }

        Ok(block)
    }

    fn is_finite(&self) -> bool {
        true
    }
}

/// Mix interleaved multi-channel audio to mono by averaging channels.
pub(crate) fn mix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
pub(crate) fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    fn source_from(sample_rate: u32, channels: u16, samples: &[i16]) -> WavAudioSource {
        let data = make_wav_data(sample_rate, channels, samples);
        WavAudioSource::from_reader(Box::new(Cursor::new(data)), 16000).unwrap()
    }

    #[test]
    fn from_reader_16khz_mono_matches_exactly() {
        let source = source_from(16000, 1, &[100, 200, 300, 400, 500]);
        assert_eq!(source.samples, vec![100, 200, 300, 400, 500]);
        assert_eq!(source.position, 0);
    }

    #[test]
    fn from_reader_stereo_downmixes_to_mono() {
        let source = source_from(16000, 2, &[100, 200, 300, 400, -100, 100]);
        assert_eq!(source.samples, vec![150, 350, 0]);
    }

    #[test]
    fn from_reader_48khz_resamples_to_target_rate() {
        let source = source_from(48000, 1, &vec![0i16; 48000]);
        assert!(source.len() >= 15900 && source.len() <= 16100);
    }

    #[test]
    fn read_block_pads_final_block_then_reports_exhausted() {
        let mut source = source_from(16000, 1, &[1, 2, 3, 4, 5]);

        assert_eq!(source.read_block(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(source.read_block(3).unwrap(), vec![4, 5, 0]);
        assert!(source.read_block(3).unwrap().is_empty());
        assert!(source.is_finite());
    }

    #[test]
    fn malformed_wav_is_capture_error() {
        let bad_data = b"XXXX\x00\x00\x00\x00WAVEfmt ".to_vec();
        let result = WavAudioSource::from_reader(Box::new(Cursor::new(bad_data)), 16000);

        match result {
            Err(VoxbridgeError::AudioCapture { message }) => {
                assert!(message.contains("Failed to parse WAV"), "got: {message}");
            }
            _ => panic!("Expected AudioCapture error"),
        }
    }

    #[test]
    fn open_missing_file_names_path() {
        let result = WavAudioSource::open(Path::new("/nonexistent/query.wav"), 16000);
        match result {
            Err(VoxbridgeError::AudioCapture { message }) => {
                assert!(message.contains("/nonexistent/query.wav"), "got: {message}");
            }
            _ => panic!("Expected AudioCapture error"),
        }
    }

    #[test]
    fn resample_upsample_interpolates() {
        let resampled = resample(&[0, 1000, 2000], 8000, 16000);
        assert_eq!(resampled.len(), 6);
        assert_eq!(resampled[0], 0);
        assert!(resampled[1] > 0 && resampled[1] < 1000);
        assert_eq!(resampled[2], 1000);
    }

    #[test]
    fn resample_handles_edge_cases() {
        assert!(resample(&[], 16000, 8000).is_empty());
        assert_eq!(resample(&[100], 16000, 8000), vec![100]);
    }

    #[test]
    fn mix_to_mono_averages_frames() {
        assert_eq!(mix_to_mono(&[10, 20, 30, 40], 2), vec![15, 35]);
        assert_eq!(mix_to_mono(&[1, 2, 3], 1), vec![1, 2, 3]);
    }

    #[test]
    fn read_block_advances_attached_clock_by_block_duration() {
        use crate::clock::Clock;

        let clock = ManualClock::new();
        let before = clock.now();
        let mut source = source_from(16000, 1, &[0; 8000]).with_clock(clock.clone());

        source.read_block(4000).unwrap();
        source.read_block(4000).unwrap();

        assert_eq!(clock.now() - before, Duration::from_millis(500));
    }
}
