//! toolboard_inspect - one-shot check of a single tool board image.
//!
//! Runs one catalog pass over the image, prints the per-position verdicts, the
//! placement table, and the board summary, then writes a JSON report and an
//! overlay PNG.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Instant, SystemTime};

use toolboard_monitor::overlay::save_overlay;
use toolboard_monitor::report::{write_report, ReportContext};
use toolboard_monitor::{
    propose, DetectionPipeline, Frame, MonitorConfig, PassOutcome, ResultSet,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(name = "toolboard_inspect", about = "Check one tool board image")]
struct Args {
    /// Image of the tool board
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Config file (TOML or JSON). Defaults to $TOOLBOARD_CONFIG.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Workspace annotation file (overrides config)
    #[arg(long, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Classifier backend name (overrides config)
    #[arg(long, value_name = "NAME")]
    backend: Option<String>,

    /// Output directory for the report and overlay
    #[arg(long, default_value = "reports", value_name = "DIR")]
    out: PathBuf,

    /// Skip the overlay image
    #[arg(long)]
    no_overlay: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = match &args.config {
            Some(path) => MonitorConfig::load_from(Some(path))?,
            None => MonitorConfig::load()?,
        };
        if let Some(catalog) = &args.catalog {
            cfg.catalog.path = catalog.clone();
        }
        if let Some(backend) = &args.backend {
            cfg.classifier.backend = backend.clone();
        }
        cfg
    };

    let pipeline = {
        let _stage = ui.stage("Prepare classifier and regions");
        let registry = cfg.backend_registry()?;
        let backend = registry.default_backend()?;
        backend
            .lock()
            .map_err(|_| anyhow!("classifier backend lock poisoned"))?
            .warm_up()
            .context("classifier warm-up")?;
        DetectionPipeline::new(backend, cfg.proposal_mode()?)
            .with_templates(cfg.templates.clone())
            .with_rules(cfg.rules.clone())
            .with_settings(cfg.pipeline_settings()?)
    };

    let frame = {
        let _stage = ui.stage("Load image");
        let image = image::open(&args.image)
            .with_context(|| format!("failed to open image {}", args.image.display()))?
            .to_rgb8();
        Frame::new(image, 1)
    };

    let started_at = SystemTime::now();
    let started = Instant::now();
    let output = {
        let total = propose(&frame, pipeline.mode()).len();
        let progress = ui.regions("Classify regions", total);
        pipeline.run_observed(&frame, &mut |done, total| progress.update(done, total))?
    };
    let result = ResultSet {
        pass_id: 1,
        frame_sequence: frame.sequence,
        started_at,
        finished_at: SystemTime::now(),
        elapsed: started.elapsed(),
        outcome: PassOutcome::Completed(output),
    };
    let summary = result.summary();

    println!("toolboard_inspect: {}", args.image.display());
    println!();
    println!("{:<12} {:<20} {:<10} {:>10}  best label", "position", "item", "status", "contrast");
    for v in result.verdicts() {
        println!(
            "{:<12} {:<20} {:<10} {:>10.5}  {}",
            v.subject.to_string(),
            v.item_class,
            v.status.as_str(),
            v.contrast,
            v.best_label.as_deref().or(v.error.as_deref()).unwrap_or("-")
        );
    }

    if let Some(placements) = result.misplacements() {
        println!();
        println!("{:<12} {:<20} {:<10} found at", "position", "item", "placement");
        for m in placements {
            println!(
                "{:<12} {:<20} {:<10} {}",
                m.expected_position_id,
                m.item_class,
                m.actual_status.as_str(),
                m.found_at_position_id.as_deref().unwrap_or("-")
            );
        }
    }

    println!();
    println!(
        "present {}/{}  missing {}  uncertain {}  errors {}  misplaced {}",
        summary.present,
        summary.total,
        summary.missing,
        summary.uncertain,
        summary.errors,
        summary.misplaced
    );
    println!(
        "completeness {:.1}%  confidence {:.4}  overall {:?}",
        summary.completeness_rate, summary.confidence_score, summary.overall
    );
    for alert in &summary.alerts {
        println!("alert [{:?}] {}", alert.severity, alert.message);
    }
    for recommendation in &summary.recommendations {
        println!("hint: {}", recommendation);
    }

    {
        let _stage = ui.stage("Write report");
        let context = ReportContext::new(
            cfg.classifier.backend.clone(),
            args.image.display().to_string(),
            &cfg.thresholds()?,
        );
        let path = write_report(&args.out, &result, &summary, &context)?;
        println!();
        println!("report: {}", path.display());
        if !args.no_overlay {
            let overlay_path = args.out.join(format!(
                "{}_overlay.png",
                args.image
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("board")
            ));
            save_overlay(&frame, &result, &overlay_path)?;
            println!("overlay: {}", overlay_path.display());
        }
    }
    Ok(())
}
