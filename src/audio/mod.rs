//! Audio input: a blocking pull source of fixed-size PCM blocks.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod source;
pub mod wav;

pub use source::{AudioSource, MockAudioSource};
pub use wav::WavAudioSource;
