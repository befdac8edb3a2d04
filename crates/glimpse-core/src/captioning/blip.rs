//! BLIP ONNX session management and caption generation.
//!
//! Loads the BLIP vision encoder and text decoder exported to ONNX, plus the
//! BERT tokenizer, and turns an image into a caption with beam search.

use std::path::Path;
use std::sync::Mutex;

use ort::session::builder::SessionBuilder;
use ort::session::Session;
use ort::value::Value;

use crate::config::{CaptioningConfig, Device};
use crate::error::CaptionError;

use super::beam::{beam_search, BeamConfig};
use super::preprocess::preprocess;
use super::{DECODER_MODEL_FILENAME, TOKENIZER_FILENAME, VISION_MODEL_FILENAME};

/// Encoder output for a single image, flattened row-major `[seq_len, hidden]`.
struct EncoderOutput {
    data: Vec<f32>,
    seq_len: usize,
    hidden: usize,
}

/// Loaded BLIP model: vision encoder, text decoder and tokenizer.
///
/// Sessions sit behind a `Mutex` because `Session::run` requires `&mut self`.
pub struct BlipModel {
    vision: Mutex<Session>,
    decoder: Mutex<Session>,
    /// Whether the decoder export takes an explicit encoder attention mask.
    decoder_takes_encoder_mask: bool,
    tokenizer: tokenizers::Tokenizer,
    config: CaptioningConfig,
}

impl BlipModel {
    /// Load all model files from `model_dir`.
    pub fn load(model_dir: &Path, config: &CaptioningConfig) -> Result<Self, CaptionError> {
        for file in [VISION_MODEL_FILENAME, DECODER_MODEL_FILENAME, TOKENIZER_FILENAME] {
            let path = model_dir.join(file);
            if !path.exists() {
                return Err(CaptionError::ModelLoad {
                    message: format!(
                        "{} not found. Run `glimpse models download` first.",
                        path.display()
                    ),
                });
            }
        }

        let device = resolve_device(config.device);
        tracing::info!("Loading BLIP model from {:?} on {:?}", model_dir, device);

        let vision = load_session(&model_dir.join(VISION_MODEL_FILENAME), device)?;
        let decoder = load_session(&model_dir.join(DECODER_MODEL_FILENAME), device)?;

        let tokenizer = tokenizers::Tokenizer::from_file(model_dir.join(TOKENIZER_FILENAME))
            .map_err(|e| CaptionError::ModelLoad {
                message: format!("Failed to load tokenizer: {e}"),
            })?;

        let decoder_takes_encoder_mask = decoder
            .inputs()
            .iter()
            .any(|i| i.name() == "encoder_attention_mask");

        tracing::debug!(
            "BLIP decoder inputs: {:?}",
            decoder.inputs().iter().map(|i| i.name()).collect::<Vec<_>>()
        );
        tracing::info!("BLIP model loaded successfully");

        Ok(Self {
            vision: Mutex::new(vision),
            decoder: Mutex::new(decoder),
            decoder_takes_encoder_mask,
            tokenizer,
            config: config.clone(),
        })
    }

    /// Generate a caption for the image at `path`. Blocking; run it on the
    /// blocking thread pool.
    pub fn caption(&self, path: &Path) -> Result<String, CaptionError> {
        let image = image::open(path).map_err(|e| CaptionError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let pixels = preprocess(&image, self.config.image_size);
        let encoded = self.encode(pixels)?;

        let beam_config = BeamConfig {
            num_beams: self.config.num_beams,
            max_length: self.config.max_length,
            eos_token_id: self.config.eos_token_id,
            length_penalty: 1.0,
        };
        let tokens = beam_search(&beam_config, vec![self.config.bos_token_id], |sequences| {
            self.next_token_logits(&encoded, sequences)
        })?;

        let ids: Vec<u32> = tokens
            .into_iter()
            .filter(|&t| t != self.config.pad_token_id && t >= 0)
            .map(|t| t as u32)
            .collect();

        let text = self
            .tokenizer
            .decode(&ids, true)
            .map_err(|e| CaptionError::Inference {
                message: format!("Token decoding failed: {e}"),
            })?;

        Ok(text.trim().to_string())
    }

    /// Run the vision encoder on a preprocessed `[1, 3, H, W]` tensor.
    fn encode(&self, pixels: ndarray::Array4<f32>) -> Result<EncoderOutput, CaptionError> {
        let shape: Vec<i64> = pixels.shape().iter().map(|&d| d as i64).collect();
        let flat: Vec<f32> = pixels.iter().copied().collect();

        let input = Value::from_array((shape, flat))
            .map_err(|e| inference(format!("Failed to create pixel tensor: {e}")))?;

        let mut session = self
            .vision
            .lock()
            .map_err(|e| inference(format!("Vision session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs!["pixel_values" => input])
            .map_err(|e| inference(format!("Vision encoder inference failed: {e}")))?;

        let hidden_state = outputs
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| inference("Vision encoder produced no outputs".to_string()))?;

        let (shape, data) = hidden_state
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| inference(format!("Failed to extract encoder output: {e}")))?;

        // last_hidden_state is [1, seq_len, hidden]
        if shape.len() != 3 {
            return Err(inference(format!(
                "Unexpected encoder output shape: {:?}",
                shape
            )));
        }

        Ok(EncoderOutput {
            data: data.to_vec(),
            seq_len: shape[1] as usize,
            hidden: shape[2] as usize,
        })
    }

    /// Run the text decoder over every live beam and return the logits of
    /// the last position for each.
    fn next_token_logits(
        &self,
        encoded: &EncoderOutput,
        sequences: &[Vec<i64>],
    ) -> Result<Vec<Vec<f32>>, CaptionError> {
        let batch = sequences.len();
        let seq_len = sequences.first().map(Vec::len).unwrap_or(0);

        let input_ids: Vec<i64> = sequences.iter().flatten().copied().collect();
        let attention_mask = vec![1i64; batch * seq_len];

        let mut encoder_states = Vec::with_capacity(batch * encoded.data.len());
        for _ in 0..batch {
            encoder_states.extend_from_slice(&encoded.data);
        }

        let ids_value = Value::from_array((vec![batch as i64, seq_len as i64], input_ids))
            .map_err(|e| inference(format!("Failed to create input_ids tensor: {e}")))?;
        let mask_value = Value::from_array((vec![batch as i64, seq_len as i64], attention_mask))
            .map_err(|e| inference(format!("Failed to create attention_mask tensor: {e}")))?;
        let states_value = Value::from_array((
            vec![batch as i64, encoded.seq_len as i64, encoded.hidden as i64],
            encoder_states,
        ))
        .map_err(|e| inference(format!("Failed to create encoder states tensor: {e}")))?;

        let mut session = self
            .decoder
            .lock()
            .map_err(|e| inference(format!("Decoder session lock poisoned: {e}")))?;

        let result = if self.decoder_takes_encoder_mask {
            let encoder_mask = Value::from_array((
                vec![batch as i64, encoded.seq_len as i64],
                vec![1i64; batch * encoded.seq_len],
            ))
            .map_err(|e| inference(format!("Failed to create encoder mask tensor: {e}")))?;
            session.run(ort::inputs![
                "input_ids" => ids_value,
                "attention_mask" => mask_value,
                "encoder_hidden_states" => states_value,
                "encoder_attention_mask" => encoder_mask
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_value,
                "attention_mask" => mask_value,
                "encoder_hidden_states" => states_value
            ])
        };
        let outputs = result.map_err(|e| inference(format!("Decoder inference failed: {e}")))?;

        let logits = outputs
            .iter()
            .find(|(name, _)| *name == "logits")
            .ok_or_else(|| inference("Decoder did not produce logits".to_string()))?;

        let (shape, data) = logits
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| inference(format!("Failed to extract logits: {e}")))?;

        // logits is [batch, seq_len, vocab]; keep the last position per row.
        if shape.len() != 3 || shape[0] as usize != batch {
            return Err(inference(format!("Unexpected logits shape: {:?}", shape)));
        }
        let steps = shape[1] as usize;
        let vocab = shape[2] as usize;

        Ok((0..batch)
            .map(|b| {
                let start = (b * steps + steps - 1) * vocab;
                data[start..start + vocab].to_vec()
            })
            .collect())
    }
}

fn inference(message: String) -> CaptionError {
    CaptionError::Inference { message }
}

/// Resolve `auto` to the best device this build supports.
pub fn resolve_device(requested: Device) -> Device {
    match requested {
        Device::Auto if cfg!(feature = "cuda") => Device::Cuda,
        Device::Auto => Device::Cpu,
        Device::Cuda if !cfg!(feature = "cuda") => {
            tracing::warn!("CUDA requested but this build lacks the `cuda` feature; using CPU");
            Device::Cpu
        }
        other => other,
    }
}

fn load_session(model_path: &Path, device: Device) -> Result<Session, CaptionError> {
    let builder = Session::builder()
        .map_err(|e| load_error("Failed to create ONNX session builder", model_path, e))?;
    let mut builder = with_device(builder, device)
        .map_err(|e| load_error("Failed to register execution provider", model_path, e))?;

    builder
        .commit_from_file(model_path)
        .map_err(|e| load_error("Failed to load ONNX model", model_path, e))
}

fn load_error(stage: &str, model_path: &Path, e: impl std::fmt::Display) -> CaptionError {
    CaptionError::ModelLoad {
        message: format!("{stage} from {}: {e}", model_path.display()),
    }
}

#[cfg(feature = "cuda")]
fn with_device(builder: SessionBuilder, device: Device) -> Result<SessionBuilder, String> {
    use ort::execution_providers::CUDAExecutionProvider;

    match device {
        Device::Cuda => builder
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .map_err(|e| e.to_string()),
        _ => Ok(builder),
    }
}

#[cfg(not(feature = "cuda"))]
fn with_device(builder: SessionBuilder, _device: Device) -> Result<SessionBuilder, String> {
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_device_explicit_cpu() {
        assert_eq!(resolve_device(Device::Cpu), Device::Cpu);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_resolve_device_without_cuda_feature() {
        assert_eq!(resolve_device(Device::Auto), Device::Cpu);
        assert_eq!(resolve_device(Device::Cuda), Device::Cpu);
    }

    #[test]
    fn test_load_missing_model_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = BlipModel::load(dir.path(), &CaptioningConfig::default());
        assert!(matches!(result, Err(CaptionError::ModelLoad { .. })));
    }
}
