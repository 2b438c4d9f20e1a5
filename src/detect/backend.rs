use anyhow::Result;
use image::RgbImage;

/// Region classifier backend trait.
///
/// Given one image region and an ordered list of text labels, a backend returns
/// one score per label, in label order. Scores from one call must be jointly
/// normalized (e.g. a softmax over all labels) so that means over label subsets
/// can be compared. Scores from different calls are not comparable.
///
/// Backends are driven from the background detection worker only, behind a
/// `Mutex`, which is why `score` takes `&mut self`.
pub trait ClassifierBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Score `region` against every entry of `labels`.
    fn score(&mut self, region: &RgbImage, labels: &[String]) -> Result<Vec<f32>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Numerically stable softmax. Empty input yields empty output.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
