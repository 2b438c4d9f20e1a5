//! JSON report for one completed pass.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::result::ResultSet;
use crate::scheduler::SchedulerStats;
use crate::scoring::Thresholds;
use crate::summary::WorkspaceSummary;

pub const REPORT_VERSION: &str = "1.0";

/// Run details recorded alongside the verdicts.
#[derive(Clone, Debug, Serialize)]
pub struct ReportContext {
    pub backend: String,
    pub source: String,
    pub present_threshold: f32,
    pub uncertain_threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<SchedulerStats>,
}

impl ReportContext {
    pub fn new(backend: impl Into<String>, source: impl Into<String>, thresholds: &Thresholds) -> Self {
        Self {
            backend: backend.into(),
            source: source.into(),
            present_threshold: thresholds.present(),
            uncertain_threshold: thresholds.uncertain(),
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, stats: SchedulerStats) -> Self {
        self.scheduler = Some(stats);
        self
    }
}

#[derive(Serialize)]
struct ReportInfo<'a> {
    version: &'static str,
    generated_at_ms: u64,
    #[serde(flatten)]
    context: &'a ReportContext,
}

#[derive(Serialize)]
struct Report<'a> {
    report_info: ReportInfo<'a>,
    pass: &'a ResultSet,
    workspace_analysis: &'a WorkspaceSummary,
}

/// Write `detection_report_<pass_id>_<epoch>.json` into `dir`, creating it if needed.
pub fn write_report(
    dir: &Path,
    result: &ResultSet,
    summary: &WorkspaceSummary,
    context: &ReportContext,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create report directory {}", dir.display()))?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before UNIX epoch")?;
    let path = dir.join(format!(
        "detection_report_{}_{}.json",
        result.pass_id,
        now.as_secs()
    ));
    let report = Report {
        report_info: ReportInfo {
            version: REPORT_VERSION,
            generated_at_ms: now.as_millis() as u64,
            context,
        },
        pass: result,
        workspace_analysis: summary,
    };
    let json = serde_json::to_string_pretty(&report).context("serialize report")?;
    std::fs::write(&path, json).with_context(|| format!("write report {}", path.display()))?;
    log::info!("report written: {}", path.display());
    Ok(path)
}
