//! Published pass results.
//!
//! A `ResultSet` is built once when a pass ends and is shared read-only as
//! `Arc<ResultSet>`. The next pass publishes a new set; nothing is merged or
//! edited in place.

use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::summary::WorkspaceSummary;
use crate::verdict::{DetectionVerdict, MisplacementVerdict};

/// Everything one successful pass produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PassOutput {
    pub verdicts: Vec<DetectionVerdict>,
    /// Present when the pass ran in catalog mode with misplacement resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub misplacements: Option<Vec<MisplacementVerdict>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed(PassOutput),
    Failed { error: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct ResultSet {
    /// Increases by one per admitted pass, in start order.
    pub pass_id: u64,
    pub frame_sequence: u64,
    #[serde(with = "epoch_millis")]
    pub started_at: SystemTime,
    #[serde(with = "epoch_millis")]
    pub finished_at: SystemTime,
    pub elapsed: Duration,
    #[serde(flatten)]
    pub outcome: PassOutcome,
}

impl ResultSet {
    pub fn output(&self) -> Option<&PassOutput> {
        match &self.outcome {
            PassOutcome::Completed(output) => Some(output),
            PassOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            PassOutcome::Completed(_) => None,
            PassOutcome::Failed { error } => Some(error),
        }
    }

    pub fn verdicts(&self) -> &[DetectionVerdict] {
        self.output().map(|o| o.verdicts.as_slice()).unwrap_or(&[])
    }

    pub fn misplacements(&self) -> Option<&[MisplacementVerdict]> {
        self.output().and_then(|o| o.misplacements.as_deref())
    }

    pub fn summary(&self) -> WorkspaceSummary {
        WorkspaceSummary::from_results(self.verdicts(), self.misplacements())
    }
}

mod epoch_millis {
    use std::time::{SystemTime, UNIX_EPOCH};

    use serde::Serializer;

    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        serializer.serialize_u64(millis)
    }
}
