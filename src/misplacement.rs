//! Cross-references per-position identifications to find relocated items.
//!
//! An expected item is `correct` when its own position holds a matching class,
//! `misplaced` when some other position does, and `missing` otherwise. The
//! search takes the first matching position in catalog order. Assignment is
//! not exclusive: two expected items may both report the same `found_at`
//! position.

use std::collections::{BTreeMap, HashMap};

use crate::catalog::WorkspaceCatalog;
use crate::error::{MonitorError, MonitorResult};
use crate::verdict::{DetectionVerdict, MisplacementVerdict, Placement};

/// Class equivalence table used by [`MatchRules::is_match`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRules {
    synonyms: BTreeMap<String, Vec<String>>,
}

impl MatchRules {
    pub fn empty() -> Self {
        Self {
            synonyms: BTreeMap::new(),
        }
    }

    pub fn with_synonyms<I, S>(mut self, class: impl Into<String>, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(class, synonyms);
        self
    }

    pub fn insert<I, S>(&mut self, class: impl Into<String>, synonyms: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let class = class.into().to_lowercase();
        let entry = self.synonyms.entry(class).or_default();
        entry.extend(synonyms.into_iter().map(|s| s.into().to_lowercase()));
    }

    pub fn synonyms_of(&self, class: &str) -> &[String] {
        self.synonyms
            .get(&class.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Does a region identified as `detected` satisfy an expectation of `expected`?
    ///
    /// Case-insensitive equality or substring containment in either direction,
    /// tried against `expected` and then against each of its synonyms.
    pub fn is_match(&self, expected: &str, detected: &str) -> bool {
        let expected = expected.to_lowercase();
        let detected = detected.to_lowercase();
        if detected.is_empty() {
            return false;
        }
        direct_match(&expected, &detected)
            || self
                .synonyms_of(&expected)
                .iter()
                .any(|syn| direct_match(syn, &detected))
    }
}

impl Default for MatchRules {
    fn default() -> Self {
        Self::empty()
            .with_synonyms("flat_screwdriver", ["screwdriver"])
            .with_synonyms("cross_screwdriver", ["screwdriver"])
            .with_synonyms("tape_measure", ["tape measure"])
            .with_synonyms("hex_key_set", ["hex key"])
            .with_synonyms("screw_box", ["screw box"])
    }
}

fn direct_match(expected: &str, detected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    expected == detected || expected.contains(detected) || detected.contains(expected)
}

/// Resolve placement for every catalog position from one completed pass.
///
/// Requires exactly one verdict per catalog position.
pub fn resolve(
    verdicts: &[DetectionVerdict],
    catalog: &WorkspaceCatalog,
    rules: &MatchRules,
) -> MonitorResult<Vec<MisplacementVerdict>> {
    let mut by_position: HashMap<&str, &DetectionVerdict> = HashMap::new();
    for verdict in verdicts {
        let Some(id) = verdict.subject.position_id() else {
            continue;
        };
        if by_position.insert(id, verdict).is_some() {
            return Err(MonitorError::IncompletePass(format!(
                "position {} has more than one verdict",
                id
            )));
        }
    }

    // identified class per position, in catalog order
    let identified = catalog
        .positions()
        .iter()
        .map(|p| {
            by_position
                .get(p.id.as_str())
                .map(|v| (p.id.as_str(), v.identified_class.as_deref()))
                .ok_or_else(|| {
                    MonitorError::IncompletePass(format!("no verdict for position {}", p.id))
                })
        })
        .collect::<MonitorResult<Vec<_>>>()?;

    let results = catalog
        .positions()
        .iter()
        .zip(&identified)
        .map(|(position, (_, here))| {
            let expected = position.label.as_str();
            let matches = |d: Option<&str>| d.is_some_and(|d| rules.is_match(expected, d));

            let (actual_status, found_at_position_id) = if matches(*here) {
                (Placement::Correct, None)
            } else if let Some((other, _)) = identified
                .iter()
                .find(|(id, d)| *id != position.id && matches(*d))
            {
                (Placement::Misplaced, Some(other.to_string()))
            } else {
                (Placement::Missing, None)
            };

            MisplacementVerdict {
                expected_position_id: position.id.clone(),
                item_class: position.label.clone(),
                actual_status,
                found_at_position_id,
                bbox: position.bbox,
            }
        })
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WorkspacePosition;
    use crate::geometry::BoundingBox;
    use crate::scoring::Status;
    use crate::verdict::VerdictSubject;

    fn catalog(entries: &[(&str, &str)]) -> WorkspaceCatalog {
        WorkspaceCatalog::new(
            entries
                .iter()
                .enumerate()
                .map(|(i, (id, label))| WorkspacePosition {
                    id: id.to_string(),
                    label: label.to_string(),
                    bbox: BoundingBox::new(i as u32 * 100, 0, 80, 80),
                })
                .collect(),
        )
        .unwrap()
    }

    fn verdict(position: &str, identified: Option<&str>) -> DetectionVerdict {
        DetectionVerdict {
            subject: VerdictSubject::Position(position.to_string()),
            item_class: String::new(),
            status: Status::Present,
            contrast: 0.001,
            bbox: BoundingBox::new(0, 0, 1, 1),
            best_label: None,
            identified_class: identified.map(str::to_string),
            identified_score: identified.map(|_| 0.5),
            error: None,
        }
    }

    #[test]
    fn match_rules_cover_equality_substring_and_synonyms() {
        let rules = MatchRules::default();
        assert!(rules.is_match("hammer", "Hammer"));
        assert!(rules.is_match("screwdriver", "flat_screwdriver"));
        assert!(rules.is_match("cross_screwdriver", "screwdriver"));
        assert!(rules.is_match("tape_measure", "tape measure"));
        assert!(rules.is_match("hex_key_set", "hex key"));
        assert!(!rules.is_match("hammer", "pliers"));
        assert!(!rules.is_match("hammer", ""));
        // no fuzzy matching
        assert!(!rules.is_match("hammer", "hamer"));
    }

    #[test]
    fn swapped_items_are_both_misplaced() {
        let catalog = catalog(&[("P1", "hammer"), ("P2", "pliers")]);
        let verdicts = vec![verdict("P1", Some("pliers")), verdict("P2", Some("hammer"))];
        let out = resolve(&verdicts, &catalog, &MatchRules::default()).unwrap();

        assert_eq!(out[0].item_class, "hammer");
        assert_eq!(out[0].actual_status, Placement::Misplaced);
        assert_eq!(out[0].found_at_position_id.as_deref(), Some("P2"));
        assert_eq!(out[1].item_class, "pliers");
        assert_eq!(out[1].actual_status, Placement::Misplaced);
        assert_eq!(out[1].found_at_position_id.as_deref(), Some("P1"));
    }

    #[test]
    fn unmatched_single_position_is_missing() {
        let catalog = catalog(&[("P1", "hammer")]);
        let out = resolve(
            &[verdict("P1", Some("wrench"))],
            &catalog,
            &MatchRules::default(),
        )
        .unwrap();
        assert_eq!(out[0].actual_status, Placement::Missing);
        assert_eq!(out[0].found_at_position_id, None);
    }

    #[test]
    fn first_match_in_catalog_order_wins_and_is_not_exclusive() {
        let catalog = catalog(&[
            ("P1", "flat_screwdriver"),
            ("P2", "cross_screwdriver"),
            ("P3", "screwdriver"),
            ("P4", "screwdriver"),
        ]);
        let verdicts = vec![
            verdict("P1", Some("hammer")),
            verdict("P2", Some("hammer")),
            verdict("P3", Some("screwdriver")),
            verdict("P4", Some("screwdriver")),
        ];
        let out = resolve(&verdicts, &catalog, &MatchRules::default()).unwrap();
        assert_eq!(out[0].found_at_position_id.as_deref(), Some("P3"));
        assert_eq!(out[1].found_at_position_id.as_deref(), Some("P3"));
        assert_eq!(out[2].actual_status, Placement::Correct);
        assert_eq!(out[3].actual_status, Placement::Correct);
    }

    #[test]
    fn unidentified_positions_never_match() {
        let catalog = catalog(&[("P1", "hammer"), ("P2", "pliers")]);
        let verdicts = vec![verdict("P1", None), verdict("P2", Some("pliers"))];
        let out = resolve(&verdicts, &catalog, &MatchRules::default()).unwrap();
        assert_eq!(out[0].actual_status, Placement::Missing);
        assert_eq!(out[1].actual_status, Placement::Correct);
    }

    #[test]
    fn resolve_is_idempotent() {
        let catalog = catalog(&[("P1", "hammer"), ("P2", "pliers"), ("P3", "wrench")]);
        let verdicts = vec![
            verdict("P1", Some("pliers")),
            verdict("P2", Some("wrench")),
            verdict("P3", None),
        ];
        let rules = MatchRules::default();
        let first = resolve(&verdicts, &catalog, &rules).unwrap();
        let second = resolve(&verdicts, &catalog, &rules).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn incomplete_pass_is_rejected() {
        let catalog = catalog(&[("P1", "hammer"), ("P2", "pliers")]);
        let err = resolve(&[verdict("P1", Some("hammer"))], &catalog, &MatchRules::default())
            .unwrap_err();
        assert!(matches!(err, MonitorError::IncompletePass(_)));
    }
}
