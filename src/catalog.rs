//! Workspace catalog: the named positions a tool board is expected to hold.
//!
//! Catalogs are read from COCO-style annotation exports:
//!
//! ```json
//! {
//!   "categories": [{ "id": 1, "name": "hammer" }],
//!   "annotations": [{ "id": 7, "category_id": 1, "bbox": [10, 20, 30, 40] }]
//! }
//! ```
//!
//! Each annotation becomes one `WorkspacePosition` with id `tool_<annotation id>`.
//! A catalog is loaded once per session and is immutable afterwards; any
//! problem with the file rejects the whole catalog.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};
use crate::geometry::BoundingBox;

/// One expected item slot on the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspacePosition {
    pub id: String,
    /// Expected item class (e.g. "hammer", "flat_screwdriver").
    pub label: String,
    pub bbox: BoundingBox,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceCatalog {
    positions: Vec<WorkspacePosition>,
}

impl WorkspaceCatalog {
    /// Validate and build a catalog. Ids must be unique and boxes non-empty.
    pub fn new(positions: Vec<WorkspacePosition>) -> MonitorResult<Self> {
        if positions.is_empty() {
            return Err(MonitorError::CatalogMalformed(
                "catalog has no positions".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for position in &positions {
            if position.id.trim().is_empty() {
                return Err(MonitorError::CatalogMalformed(
                    "position id must not be empty".to_string(),
                ));
            }
            if position.label.trim().is_empty() {
                return Err(MonitorError::CatalogMalformed(format!(
                    "position {} has an empty label",
                    position.id
                )));
            }
            if position.bbox.is_empty() {
                return Err(MonitorError::CatalogMalformed(format!(
                    "position {} has an empty bounding box {}",
                    position.id, position.bbox
                )));
            }
            if !seen.insert(position.id.as_str()) {
                return Err(MonitorError::CatalogMalformed(format!(
                    "duplicate position id {}",
                    position.id
                )));
            }
        }
        Ok(Self { positions })
    }

    pub fn positions(&self) -> &[WorkspacePosition] {
        &self.positions
    }

    pub fn get(&self, id: &str) -> Option<&WorkspacePosition> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct AnnotationFile {
    categories: Vec<CategoryEntry>,
    annotations: Vec<AnnotationEntry>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AnnotationEntry {
    id: u64,
    category_id: u64,
    bbox: Vec<f64>,
}

/// Load a catalog from an annotation file on disk.
pub fn load_catalog(path: &Path) -> MonitorResult<WorkspaceCatalog> {
    if !path.is_file() {
        return Err(MonitorError::CatalogMissing(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path).map_err(|e| {
        MonitorError::CatalogMalformed(format!("failed to read {}: {}", path.display(), e))
    })?;
    let catalog = parse_catalog(&raw)?;
    log::info!(
        "loaded workspace catalog {}: {} positions",
        path.display(),
        catalog.len()
    );
    Ok(catalog)
}

/// Parse a catalog from annotation JSON.
pub fn parse_catalog(json: &str) -> MonitorResult<WorkspaceCatalog> {
    let file: AnnotationFile = serde_json::from_str(json)
        .map_err(|e| MonitorError::CatalogMalformed(format!("invalid annotation json: {}", e)))?;

    let categories: HashMap<u64, &str> = file
        .categories
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();

    let positions = file
        .annotations
        .iter()
        .map(|ann| {
            let label = categories.get(&ann.category_id).ok_or_else(|| {
                MonitorError::CatalogMalformed(format!(
                    "annotation {} references unknown category {}",
                    ann.id, ann.category_id
                ))
            })?;
            Ok(WorkspacePosition {
                id: format!("tool_{}", ann.id),
                label: label.to_string(),
                bbox: parse_bbox(ann.id, &ann.bbox)?,
            })
        })
        .collect::<MonitorResult<Vec<_>>>()?;

    WorkspaceCatalog::new(positions)
}

fn parse_bbox(annotation_id: u64, raw: &[f64]) -> MonitorResult<BoundingBox> {
    let [x, y, w, h] = raw else {
        return Err(MonitorError::CatalogMalformed(format!(
            "annotation {} bbox must have 4 values, got {}",
            annotation_id,
            raw.len()
        )));
    };
    let mut out = [0u32; 4];
    for (slot, value) in out.iter_mut().zip([x, y, w, h]) {
        if !value.is_finite() || *value < 0.0 || *value > u32::MAX as f64 {
            return Err(MonitorError::CatalogMalformed(format!(
                "annotation {} bbox has invalid value {}",
                annotation_id, value
            )));
        }
        *slot = value.round() as u32;
    }
    Ok(BoundingBox::new(out[0], out[1], out[2], out[3]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "categories": [
            { "id": 1, "name": "hammer" },
            { "id": 2, "name": "pliers" }
        ],
        "annotations": [
            { "id": 1, "category_id": 1, "bbox": [10, 20, 30, 40] },
            { "id": 2, "category_id": 2, "bbox": [100.4, 20.6, 50.0, 80.0] }
        ]
    }"#;

    #[test]
    fn parses_positions_in_annotation_order() {
        let catalog = parse_catalog(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);
        let first = &catalog.positions()[0];
        assert_eq!(first.id, "tool_1");
        assert_eq!(first.label, "hammer");
        assert_eq!(first.bbox.to_xywh(), [10, 20, 30, 40]);
        assert_eq!(catalog.get("tool_2").unwrap().bbox.to_xywh(), [100, 21, 50, 80]);
    }

    #[test]
    fn rejects_unknown_category() {
        let json = r#"{
            "categories": [{ "id": 1, "name": "hammer" }],
            "annotations": [{ "id": 1, "category_id": 9, "bbox": [0, 0, 5, 5] }]
        }"#;
        assert!(matches!(
            parse_catalog(json),
            Err(MonitorError::CatalogMalformed(_))
        ));
    }

    #[test]
    fn rejects_short_or_negative_boxes() {
        let short = r#"{
            "categories": [{ "id": 1, "name": "hammer" }],
            "annotations": [{ "id": 1, "category_id": 1, "bbox": [0, 0, 5] }]
        }"#;
        let negative = r#"{
            "categories": [{ "id": 1, "name": "hammer" }],
            "annotations": [{ "id": 1, "category_id": 1, "bbox": [-3, 0, 5, 5] }]
        }"#;
        assert!(parse_catalog(short).is_err());
        assert!(parse_catalog(negative).is_err());
    }

    #[test]
    fn rejects_empty_and_duplicate_catalogs() {
        let empty = r#"{ "categories": [], "annotations": [] }"#;
        assert!(parse_catalog(empty).is_err());

        let position = WorkspacePosition {
            id: "p1".to_string(),
            label: "hammer".to_string(),
            bbox: BoundingBox::new(0, 0, 10, 10),
        };
        assert!(WorkspaceCatalog::new(vec![position.clone(), position]).is_err());
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let err = load_catalog(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, MonitorError::CatalogMissing(_)));
    }
}
