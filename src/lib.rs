//! Tool Board Monitor
//!
//! Watches a fixed tool board through a camera or image source and reports,
//! per expected item, whether it is present, missing, uncertain, or sitting in
//! another item's slot.
//!
//! # Architecture
//!
//! A pass runs on a background worker admitted by the [`scheduler`]:
//!
//! 1. [`proposer`] yields regions: catalog positions, or a sliding-window grid.
//! 2. A [`detect::ClassifierBackend`] scores each region against text labels in
//!    one jointly normalized call.
//! 3. [`scoring`] reduces the scores to a contrast and a three-way status.
//! 4. Sliding-window hits are deduplicated by [`nms`].
//! 5. [`misplacement`] cross-references per-position identifications.
//! 6. The pass is published as an immutable [`result::ResultSet`].
//!
//! # Module Structure
//!
//! - `catalog`, `geometry`, `frame`: inputs
//! - `templates`, `scoring`, `nms`, `misplacement`, `pipeline`: detection core
//! - `scheduler`, `result`, `summary`: pass lifecycle and roll-up
//! - `ingest`, `config`, `report`, `overlay`: application surfaces

pub mod catalog;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod misplacement;
pub mod nms;
pub mod overlay;
pub mod pipeline;
pub mod proposer;
pub mod report;
pub mod result;
pub mod scheduler;
pub mod scoring;
pub mod summary;
pub mod templates;
pub mod verdict;

pub use catalog::{load_catalog, parse_catalog, WorkspaceCatalog, WorkspacePosition};
pub use config::MonitorConfig;
pub use detect::{BackendRegistry, ClassifierBackend, SharedBackend, StubBackend};
pub use error::{MonitorError, MonitorResult};
pub use frame::Frame;
pub use geometry::{iou, BoundingBox};
pub use ingest::{open_source, FrameSource};
pub use misplacement::{resolve, MatchRules};
pub use nms::{suppress, ScoredDetection};
pub use pipeline::{DetectionPipeline, PipelineSettings};
pub use proposer::{propose, Proposal, ProposalMode, SlidingWindow};
pub use result::{PassOutcome, PassOutput, ResultSet};
pub use scheduler::{Admission, DetectionScheduler, PassRunner, SchedulerStats};
pub use scoring::{aggregate, Contrast, LabelScore, Status, Thresholds};
pub use summary::WorkspaceSummary;
pub use templates::{ClassVocabulary, ItemTemplates, LabelTemplate};
pub use verdict::{DetectionVerdict, MisplacementVerdict, Placement, VerdictSubject};
