//! Score aggregation and the three-way presence verdict.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};

/// Classifier output for one label against one region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub raw_score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, raw_score: f32) -> Self {
        Self {
            label: label.into(),
            raw_score,
        }
    }
}

/// Pair labels with the scores of one joint classifier call.
pub fn zip_scores(labels: &[String], scores: &[f32]) -> MonitorResult<Vec<LabelScore>> {
    if labels.len() != scores.len() {
        return Err(MonitorError::ClassifierFailure(format!(
            "classifier returned {} scores for {} labels",
            scores.len(),
            labels.len()
        )));
    }
    if let Some((label, score)) = labels.iter().zip(scores).find(|(_, s)| !s.is_finite()) {
        return Err(MonitorError::ClassifierFailure(format!(
            "non-finite score {} for label {:?}",
            score, label
        )));
    }
    Ok(labels
        .iter()
        .zip(scores)
        .map(|(label, score)| LabelScore::new(label.clone(), *score))
        .collect())
}

/// Positive and negative means for one region.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contrast {
    pub positive_mean: f32,
    pub negative_mean: f32,
}

impl Contrast {
    /// `positive_mean - negative_mean`. Not clamped.
    pub fn value(&self) -> f32 {
        self.positive_mean - self.negative_mean
    }
}

/// Reduce a joint label-score set to a contrast for one item class.
///
/// `scores` must come from a single classifier call covering every label in
/// `positive` and `negative`; scores from separate calls are not comparable.
pub fn aggregate(
    scores: &[LabelScore],
    positive: &[String],
    negative: &[String],
) -> MonitorResult<Contrast> {
    if positive.is_empty() || negative.is_empty() {
        return Err(MonitorError::InsufficientLabels(format!(
            "need both positive and negative labels (got {} positive, {} negative)",
            positive.len(),
            negative.len()
        )));
    }

    let mut by_label: HashMap<&str, f32> = HashMap::with_capacity(scores.len());
    for s in scores {
        by_label.entry(s.label.as_str()).or_insert(s.raw_score);
    }

    let mean = |labels: &[String]| -> MonitorResult<f32> {
        let mut sum = 0.0f64;
        for label in labels {
            let score = by_label.get(label.as_str()).ok_or_else(|| {
                MonitorError::InsufficientLabels(format!("no score for label {:?}", label))
            })?;
            sum += *score as f64;
        }
        Ok((sum / labels.len() as f64) as f32)
    };

    Ok(Contrast {
        positive_mean: mean(positive)?,
        negative_mean: mean(negative)?,
    })
}

/// Highest scoring label among `labels`, if any was scored.
pub fn best_label<'a>(scores: &'a [LabelScore], labels: &[String]) -> Option<&'a LabelScore> {
    scores
        .iter()
        .filter(|s| labels.contains(&s.label))
        .fold(None, |best: Option<&LabelScore>, s| match best {
            Some(b) if b.raw_score >= s.raw_score => Some(b),
            _ => Some(s),
        })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Present,
    Uncertain,
    Missing,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "present",
            Status::Uncertain => "uncertain",
            Status::Missing => "missing",
            Status::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_PRESENT_THRESHOLD: f32 = 0.0001;
pub const DEFAULT_UNCERTAIN_THRESHOLD: f32 = -0.0003;

/// Presence thresholds. Only `present >= uncertain` is assumed; either may be
/// negative.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Thresholds {
    present: f32,
    uncertain: f32,
}

impl Thresholds {
    pub fn new(present: f32, uncertain: f32) -> MonitorResult<Self> {
        if !present.is_finite() || !uncertain.is_finite() || present < uncertain {
            return Err(MonitorError::InvalidThresholds { present, uncertain });
        }
        Ok(Self { present, uncertain })
    }

    pub fn present(&self) -> f32 {
        self.present
    }

    pub fn uncertain(&self) -> f32 {
        self.uncertain
    }

    pub fn classify(&self, contrast: f32) -> Status {
        if contrast > self.present {
            Status::Present
        } else if contrast > self.uncertain {
            Status::Uncertain
        } else {
            Status::Missing
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            present: DEFAULT_PRESENT_THRESHOLD,
            uncertain: DEFAULT_UNCERTAIN_THRESHOLD,
        }
    }
}
