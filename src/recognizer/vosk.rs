//! Vosk (Kaldi) offline recognizer.

use crate::error::{Result, VoxbridgeError};
use crate::recognizer::{Feed, Recognizer, RecognizerLoader};
use std::path::{Path, PathBuf};
use vosk::{DecodingState, Model};

/// Loads a Vosk model from disk at the start of every listening session.
#[derive(Debug, Clone)]
pub struct VoskLoader {
    model_path: PathBuf,
}

impl VoskLoader {
    pub fn new(model_path: &Path) -> Self {
        Self {
            model_path: model_path.to_path_buf(),
        }
    }
}

impl RecognizerLoader for VoskLoader {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn Recognizer>> {
        if !self.model_path.is_dir() {
            return Err(VoxbridgeError::RecognizerModelNotFound {
                path: self.model_path.display().to_string(),
            });
        }

        let model = Model::new(self.model_path.to_string_lossy().into_owned()).ok_or_else(|| {
            VoxbridgeError::RecognizerInit {
                message: format!("Vosk rejected model at {}", self.model_path.display()),
            }
        })?;

        let mut recognizer = vosk::Recognizer::new(&model, sample_rate as f32).ok_or_else(|| {
            VoxbridgeError::RecognizerInit {
                message: format!("could not create recognizer at {sample_rate}Hz"),
            }
        })?;
        recognizer.set_words(true);

        tracing::debug!(model = %self.model_path.display(), sample_rate, "recognizer opened");

        Ok(Box::new(VoskRecognizer {
            recognizer,
            _model: model,
        }))
    }

    fn model_name(&self) -> String {
        self.model_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.model_path.display().to_string())
    }
}

/// One recognizer session; keeps its model alive for its whole lifetime.
pub struct VoskRecognizer {
    recognizer: vosk::Recognizer,
    _model: Model,
}

impl Recognizer for VoskRecognizer {
    fn feed(&mut self, samples: &[i16]) -> Result<Feed> {
        let state = self
            .recognizer
            .accept_waveform(samples)
            .map_err(|e| VoxbridgeError::Recognition {
                message: format!("{e:?}"),
            })?;

        let is_final = match state {
            DecodingState::Finalized => true,
            DecodingState::Running => false,
            DecodingState::Failed => {
                return Err(VoxbridgeError::Recognition {
                    message: "decoder failed on audio block".to_string(),
                });
            }
        };

        let partial = self.recognizer.partial_result().partial.to_string();
        Ok(Feed { is_final, partial })
    }

    fn final_result(&mut self) -> Result<String> {
        Ok(self
            .recognizer
            .result()
            .single()
            .map(|single| single.text.to_string())
            .unwrap_or_default())
    }

    fn reset(&mut self) {
        self.recognizer.reset();
    }
}
