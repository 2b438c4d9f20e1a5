use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;
use crate::scoring::Status;

/// What a verdict is about: a named catalog position or an anonymous proposal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum VerdictSubject {
    Position(String),
    Proposal(usize),
}

impl VerdictSubject {
    pub fn position_id(&self) -> Option<&str> {
        match self {
            VerdictSubject::Position(id) => Some(id),
            VerdictSubject::Proposal(_) => None,
        }
    }
}

impl std::fmt::Display for VerdictSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictSubject::Position(id) => f.write_str(id),
            VerdictSubject::Proposal(idx) => write!(f, "proposal_{}", idx),
        }
    }
}

/// Outcome of classifying one region in one pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionVerdict {
    pub subject: VerdictSubject,
    /// Expected class for catalog positions, best class for sliding-window hits.
    pub item_class: String,
    pub status: Status,
    pub contrast: f32,
    pub bbox: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_label: Option<String>,
    /// Class the region looks most like, when identification ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identified_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identified_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionVerdict {
    pub fn failed(
        subject: VerdictSubject,
        item_class: impl Into<String>,
        bbox: BoundingBox,
        error: impl std::fmt::Display,
    ) -> Self {
        Self {
            subject,
            item_class: item_class.into(),
            status: Status::Error,
            contrast: 0.0,
            bbox,
            best_label: None,
            identified_class: None,
            identified_score: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Correct,
    Misplaced,
    Missing,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Correct => "correct",
            Placement::Misplaced => "misplaced",
            Placement::Missing => "missing",
        }
    }
}

impl std::fmt::Display for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MisplacementVerdict {
    pub expected_position_id: String,
    pub item_class: String,
    pub actual_status: Placement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_at_position_id: Option<String>,
    /// Box of the expected position.
    pub bbox: BoundingBox,
}
