#![cfg(feature = "backend-tract")]

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::{softmax, ClassifierBackend};

/// CLIP normalization constants (RGB).
const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Tract-based backend for CLIP-style zero-shot scoring.
///
/// Loads a local ONNX image encoder and a JSON file of precomputed text
/// embeddings (`{ "label": [f32, ...] }`). A region is resized to the encoder
/// input, embedded, and compared by cosine similarity with each requested
/// label; similarities are scaled by `logit_scale` and normalized jointly.
/// Labels without an embedding fail the call.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    embeddings: HashMap<String, Vec<f32>>,
    logit_scale: f32,
}

impl TractBackend {
    pub fn new<P: AsRef<Path>, E: AsRef<Path>>(
        model_path: P,
        embeddings_path: E,
        input_size: u32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let embeddings_path = embeddings_path.as_ref();
        let raw = std::fs::read_to_string(embeddings_path).with_context(|| {
            format!(
                "failed to read label embeddings {}",
                embeddings_path.display()
            )
        })?;
        let embeddings: HashMap<String, Vec<f32>> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid label embeddings {}", embeddings_path.display()))?;
        let embeddings = embeddings
            .into_iter()
            .map(|(label, v)| (label, normalize(v)))
            .collect();

        Ok(Self {
            model,
            input_size,
            embeddings,
            logit_scale: 100.0,
        })
    }

    /// Override the default logit scale.
    pub fn with_logit_scale(mut self, logit_scale: f32) -> Self {
        self.logit_scale = logit_scale;
        self
    }

    fn build_input(&self, region: &RgbImage) -> Tensor {
        let size = self.input_size;
        let resized = imageops::resize(region, size, size, imageops::FilterType::Triangle);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size as usize, size as usize),
            |(_, channel, y, x)| {
                let value = resized.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0;
                (value - CLIP_MEAN[channel]) / CLIP_STD[channel]
            },
        );
        input.into_tensor()
    }

    fn embed(&self, region: &RgbImage) -> Result<Vec<f32>> {
        let outputs = self
            .model
            .run(tvec!(self.build_input(region).into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        Ok(normalize(view.iter().cloned().collect()))
    }
}

impl ClassifierBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn score(&mut self, region: &RgbImage, labels: &[String]) -> Result<Vec<f32>> {
        if region.width() == 0 || region.height() == 0 {
            return Err(anyhow!("cannot score an empty region"));
        }
        let image_embedding = self.embed(region)?;
        let logits = labels
            .iter()
            .map(|label| {
                let text = self
                    .embeddings
                    .get(label)
                    .ok_or_else(|| anyhow!("no text embedding for label {:?}", label))?;
                if text.len() != image_embedding.len() {
                    return Err(anyhow!(
                        "embedding size mismatch for {:?}: image {}, text {}",
                        label,
                        image_embedding.len(),
                        text.len()
                    ));
                }
                let cosine: f32 = text.iter().zip(&image_embedding).map(|(a, b)| a * b).sum();
                Ok(cosine * self.logit_scale)
            })
            .collect::<Result<Vec<f32>>>()?;
        Ok(softmax(&logits))
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RgbImage::new(self.input_size, self.input_size);
        self.embed(&blank).map(|_| ())
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}
