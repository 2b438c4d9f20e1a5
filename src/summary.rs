//! Board-level roll-up of one pass: counts, completeness, alerts, advice.

use serde::Serialize;

use crate::scoring::Status;
use crate::verdict::{DetectionVerdict, MisplacementVerdict, Placement};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl OverallGrade {
    fn from_completeness(rate: f64) -> Self {
        if rate >= 90.0 {
            OverallGrade::Excellent
        } else if rate >= 75.0 {
            OverallGrade::Good
        } else if rate >= 50.0 {
            OverallGrade::Fair
        } else {
            OverallGrade::Poor
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    MissingTool,
    MisplacedTool,
    DetectionError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub subject: String,
    pub item_class: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkspaceSummary {
    pub total: usize,
    pub present: usize,
    pub uncertain: usize,
    pub missing: usize,
    pub errors: usize,
    pub correct: usize,
    pub misplaced: usize,
    /// Present verdicts as a percentage of non-error verdicts.
    pub completeness_rate: f64,
    /// Mean absolute contrast over non-error verdicts.
    pub confidence_score: f64,
    pub overall: OverallGrade,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<String>,
}

impl WorkspaceSummary {
    pub fn from_results(
        verdicts: &[DetectionVerdict],
        misplacements: Option<&[MisplacementVerdict]>,
    ) -> Self {
        let count = |status: Status| verdicts.iter().filter(|v| v.status == status).count();
        let present = count(Status::Present);
        let uncertain = count(Status::Uncertain);
        let missing = count(Status::Missing);
        let errors = count(Status::Error);

        let valid: Vec<&DetectionVerdict> = verdicts
            .iter()
            .filter(|v| v.status != Status::Error)
            .collect();
        let (completeness_rate, confidence_score) = if valid.is_empty() {
            (0.0, 0.0)
        } else {
            let n = valid.len() as f64;
            let abs_sum: f64 = valid.iter().map(|v| v.contrast.abs() as f64).sum();
            (present as f64 / n * 100.0, abs_sum / n)
        };

        let placements = misplacements.unwrap_or(&[]);
        let correct = placements
            .iter()
            .filter(|m| m.actual_status == Placement::Correct)
            .count();
        let misplaced = placements
            .iter()
            .filter(|m| m.actual_status == Placement::Misplaced)
            .count();

        let mut summary = Self {
            total: verdicts.len(),
            present,
            uncertain,
            missing,
            errors,
            correct,
            misplaced,
            completeness_rate,
            confidence_score,
            overall: OverallGrade::from_completeness(completeness_rate),
            alerts: build_alerts(verdicts, placements),
            recommendations: Vec::new(),
        };
        summary.recommendations = summary.build_recommendations(verdicts);
        summary
    }

    fn build_recommendations(&self, verdicts: &[DetectionVerdict]) -> Vec<String> {
        let mut out = Vec::new();
        if self.completeness_rate < 75.0 {
            out.push("check the board layout: not all items are in their assigned slots".to_string());
        }
        if self.missing > 0 {
            let names: Vec<&str> = verdicts
                .iter()
                .filter(|v| v.status == Status::Missing)
                .map(|v| v.item_class.as_str())
                .collect();
            out.push(format!("return missing items: {}", names.join(", ")));
        }
        if self.misplaced > 0 {
            out.push(format!(
                "{} item(s) are on the board but in the wrong slot",
                self.misplaced
            ));
        }
        if self.uncertain > 2 {
            out.push("many uncertain results: improve lighting or item placement".to_string());
        }
        if self.confidence_score < 0.01 {
            out.push("overall confidence is low: check image quality or position boxes".to_string());
        }
        if self.errors > 0 {
            out.push("some regions failed to classify: check classifier and catalog".to_string());
        }
        out
    }
}

fn build_alerts(verdicts: &[DetectionVerdict], placements: &[MisplacementVerdict]) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for v in verdicts {
        match v.status {
            Status::Missing => alerts.push(Alert {
                kind: AlertKind::MissingTool,
                severity: Severity::Medium,
                subject: v.subject.to_string(),
                item_class: v.item_class.clone(),
                message: format!("missing: {} ({})", v.item_class, v.subject),
            }),
            Status::Error => alerts.push(Alert {
                kind: AlertKind::DetectionError,
                severity: Severity::High,
                subject: v.subject.to_string(),
                item_class: v.item_class.clone(),
                message: format!(
                    "detection error: {} ({}): {}",
                    v.item_class,
                    v.subject,
                    v.error.as_deref().unwrap_or("unknown")
                ),
            }),
            Status::Present | Status::Uncertain => {}
        }
    }
    for m in placements {
        if m.actual_status == Placement::Misplaced {
            alerts.push(Alert {
                kind: AlertKind::MisplacedTool,
                severity: Severity::Medium,
                subject: m.expected_position_id.clone(),
                item_class: m.item_class.clone(),
                message: format!(
                    "misplaced: {} expected at {}, found at {}",
                    m.item_class,
                    m.expected_position_id,
                    m.found_at_position_id.as_deref().unwrap_or("?")
                ),
            });
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::verdict::VerdictSubject;

    fn v(id: &str, status: Status, contrast: f32) -> DetectionVerdict {
        DetectionVerdict {
            subject: VerdictSubject::Position(id.to_string()),
            item_class: format!("class_{}", id),
            status,
            contrast,
            bbox: BoundingBox::new(0, 0, 10, 10),
            best_label: None,
            identified_class: None,
            identified_score: None,
            error: (status == Status::Error).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn errors_are_counted_apart_from_missing() {
        let verdicts = vec![
            v("a", Status::Present, 0.02),
            v("b", Status::Present, 0.04),
            v("c", Status::Missing, -0.03),
            v("d", Status::Error, 0.0),
        ];
        let s = WorkspaceSummary::from_results(&verdicts, None);
        assert_eq!(s.total, 4);
        assert_eq!(s.present, 2);
        assert_eq!(s.missing, 1);
        assert_eq!(s.errors, 1);
        // 2 present out of 3 non-error verdicts
        assert!((s.completeness_rate - 200.0 / 3.0).abs() < 1e-9);
        assert!((s.confidence_score - 0.03).abs() < 1e-6);
        assert_eq!(s.overall, OverallGrade::Fair);

        let kinds: Vec<AlertKind> = s.alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::MissingTool, AlertKind::DetectionError]);
        assert_eq!(s.alerts[1].severity, Severity::High);
    }

    #[test]
    fn all_present_is_excellent() {
        let verdicts = vec![v("a", Status::Present, 0.02), v("b", Status::Present, 0.02)];
        let s = WorkspaceSummary::from_results(&verdicts, None);
        assert_eq!(s.overall, OverallGrade::Excellent);
        assert!(s.alerts.is_empty());
        assert!(s.recommendations.is_empty());
    }

    #[test]
    fn misplacements_raise_alerts() {
        let verdicts = vec![v("a", Status::Present, 0.02)];
        let placements = vec![MisplacementVerdict {
            expected_position_id: "a".to_string(),
            item_class: "hammer".to_string(),
            actual_status: Placement::Misplaced,
            found_at_position_id: Some("b".to_string()),
            bbox: BoundingBox::new(0, 0, 10, 10),
        }];
        let s = WorkspaceSummary::from_results(&verdicts, Some(&placements));
        assert_eq!(s.misplaced, 1);
        assert_eq!(s.alerts[0].kind, AlertKind::MisplacedTool);
        assert!(s.alerts[0].message.contains("found at b"));
    }

    #[test]
    fn empty_pass_is_poor() {
        let s = WorkspaceSummary::from_results(&[], None);
        assert_eq!(s.completeness_rate, 0.0);
        assert_eq!(s.overall, OverallGrade::Poor);
    }
}
