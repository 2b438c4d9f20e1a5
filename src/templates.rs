//! Text prompts the classifier scores regions against.
//!
//! `ItemTemplates` holds, per item class, the positive prompts ("the item is
//! here") and negative prompts ("the slot is empty") used to compute contrast.
//! `ClassVocabulary` holds one descriptive prompt per generic class and is used
//! to identify what a region actually contains.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTemplate {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

impl LabelTemplate {
    pub fn new<P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        Self {
            positive: positive.into_iter().map(Into::into).collect(),
            negative: negative.into_iter().map(Into::into).collect(),
        }
    }

    /// Template for a class with no curated prompts.
    pub fn generic(class: &str) -> Self {
        let name = class.replace('_', " ");
        Self::new(
            [name.clone(), format!("a {}", name), format!("{} tool", name)],
            ["empty space", "background", "nothing", "absent"],
        )
    }

    /// Positive then negative labels, the order sent to the classifier in one call.
    pub fn joint_labels(&self) -> Vec<String> {
        self.positive
            .iter()
            .chain(self.negative.iter())
            .cloned()
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemTemplates {
    templates: BTreeMap<String, LabelTemplate>,
}

impl ItemTemplates {
    pub fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, class: impl Into<String>, template: LabelTemplate) {
        self.templates.insert(class.into(), template);
    }

    /// Curated template for `class`, or a generated one.
    pub fn template_for(&self, class: &str) -> LabelTemplate {
        self.templates
            .get(class)
            .cloned()
            .unwrap_or_else(|| LabelTemplate::generic(class))
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for ItemTemplates {
    fn default() -> Self {
        let mut t = Self::empty();
        let empty = |what: &str| {
            vec![
                format!("no {}", what),
                "empty space".to_string(),
                "missing tool".to_string(),
                "no tool".to_string(),
            ]
        };
        t.insert(
            "hammer",
            LabelTemplate::new(
                ["hammer", "hammer tool", "claw hammer", "construction hammer"],
                empty("hammer"),
            ),
        );
        t.insert(
            "pliers",
            LabelTemplate::new(
                ["pliers", "pliers tool", "yellow pliers", "needle nose pliers"],
                empty("pliers"),
            ),
        );
        t.insert(
            "wrench",
            LabelTemplate::new(
                ["wrench", "adjustable wrench", "spanner", "wrench tool"],
                empty("wrench"),
            ),
        );
        t.insert(
            "flat_screwdriver",
            LabelTemplate::new(
                [
                    "screwdriver",
                    "flat screwdriver",
                    "flathead screwdriver",
                    "screwdriver tool",
                ],
                empty("screwdriver"),
            ),
        );
        t.insert(
            "cross_screwdriver",
            LabelTemplate::new(
                [
                    "screwdriver",
                    "phillips screwdriver",
                    "cross screwdriver",
                    "screwdriver tool",
                ],
                empty("screwdriver"),
            ),
        );
        t.insert(
            "cutter",
            LabelTemplate::new(
                ["cutter", "utility knife", "box cutter", "cutting tool"],
                empty("cutter"),
            ),
        );
        t.insert(
            "tape_measure",
            LabelTemplate::new(
                ["tape measure", "measuring tape", "ruler", "measuring tool"],
                empty("tape measure"),
            ),
        );
        t.insert(
            "hex_key_set",
            LabelTemplate::new(
                ["hex keys", "allen keys", "hex key set", "allen wrench set"],
                empty("hex keys"),
            ),
        );
        t.insert(
            "screw_box",
            LabelTemplate::new(
                ["screws", "screw box", "hardware", "screw storage"],
                [
                    "no screws",
                    "empty compartment",
                    "missing tool",
                    "no tool",
                ],
            ),
        );
        t
    }
}

/// Ordered `(class, description)` pairs scored jointly to identify a region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassVocabulary {
    entries: Vec<(String, String)>,
}

impl ClassVocabulary {
    pub fn new<I, C, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = (C, D)>,
        C: Into<String>,
        D: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(c, d)| (c.into(), d.into()))
                .collect(),
        }
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.entries.iter().map(|(_, d)| d.clone()).collect()
    }

    pub fn class_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ClassVocabulary {
    fn default() -> Self {
        Self::new([
            ("hammer", "a metal hammer tool"),
            ("screwdriver", "a screwdriver with handle"),
            ("pliers", "metal pliers for gripping"),
            ("wrench", "a wrench for bolts"),
            ("tape measure", "a measuring tape tool"),
            ("cutter", "a cutting tool knife"),
            ("hex key", "a hex allen key tool"),
            ("screw box", "a toolbox with screws"),
        ])
    }
}
