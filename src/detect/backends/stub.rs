use anyhow::{anyhow, Result};
use image::RgbImage;
use sha2::{Digest, Sha256};

use crate::detect::backend::{softmax, ClassifierBackend};

/// Stub backend for testing and dry runs.
///
/// Scores are derived from a hash of the region's pixels and each label, so the
/// same region and label set always produce the same scores. Logits are scaled
/// by `TEMPERATURE` before the joint softmax.
pub struct StubBackend;

const TEMPERATURE: f32 = 4.0;

impl StubBackend {
    pub fn new() -> Self {
        Self
    }

    fn logit(region_hash: &[u8; 32], label: &str) -> f32 {
        let mut hasher = Sha256::new();
        hasher.update(region_hash);
        hasher.update(label.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        let raw = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        raw as f32 / u32::MAX as f32
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn score(&mut self, region: &RgbImage, labels: &[String]) -> Result<Vec<f32>> {
        if region.width() == 0 || region.height() == 0 {
            return Err(anyhow!("cannot score an empty region"));
        }
        let region_hash: [u8; 32] = Sha256::digest(region.as_raw()).into();
        let logits: Vec<f32> = labels
            .iter()
            .map(|label| Self::logit(&region_hash, label) * TEMPERATURE)
            .collect();
        Ok(softmax(&logits))
    }
}
