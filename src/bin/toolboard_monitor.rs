//! toolboard_monitor - live tool board monitoring
//!
//! This daemon:
//! 1. Reads frames from the configured source (synthetic, image file, or directory)
//! 2. Offers every frame to the detection scheduler, which runs at most one
//!    background pass at a time and throttles passes to the configured interval
//! 3. Logs a summary and alerts for every newly published pass
//! 4. Optionally writes a JSON report (and overlay PNG) per pass

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use toolboard_monitor::overlay::save_overlay;
use toolboard_monitor::report::{write_report, ReportContext};
use toolboard_monitor::{
    open_source, Admission, DetectionPipeline, DetectionScheduler, Frame, MonitorConfig, ResultSet,
};

const HEALTH_LOG_PERIOD: Duration = Duration::from_secs(5);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "toolboard_monitor", about = "Monitor a tool board from a frame source")]
struct Args {
    /// Config file (TOML or JSON). Defaults to $TOOLBOARD_CONFIG.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Frame source: stub://name, an image file, or a directory of images
    #[arg(long, value_name = "URI")]
    source: Option<String>,

    /// Stop after this many frames
    #[arg(long, value_name = "N")]
    max_frames: Option<u64>,

    /// Start over when a file source is exhausted
    #[arg(long)]
    repeat: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => MonitorConfig::load_from(Some(path))?,
        None => MonitorConfig::load()?,
    };
    if let Some(source) = args.source {
        cfg.source.uri = source;
    }

    let registry = cfg.backend_registry()?;
    let backend = registry.default_backend()?;
    {
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("classifier backend lock poisoned"))?;
        guard.warm_up().context("classifier warm-up")?;
        log::info!("classifier backend: {}", guard.name());
    }

    let pipeline = DetectionPipeline::new(backend, cfg.proposal_mode()?)
        .with_templates(cfg.templates.clone())
        .with_rules(cfg.rules.clone())
        .with_settings(cfg.pipeline_settings()?);
    let scheduler = DetectionScheduler::new(Arc::new(pipeline), cfg.detection.interval);

    let mut source = open_source(&cfg.source.uri, cfg.source.width, cfg.source.height)?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("error setting Ctrl-C handler")?;
    }

    let context = ReportContext::new(
        cfg.classifier.backend.clone(),
        cfg.source.uri.clone(),
        &cfg.thresholds()?,
    );
    let frame_period = Duration::from_secs_f64(1.0 / cfg.source.fps as f64);
    let mut reporter = PassReporter {
        cfg: &cfg,
        context,
        last_reported: 0,
        frames: PendingFrames::default(),
    };

    log::info!(
        "toolboard_monitor running: source={} interval={:?} fps={}",
        cfg.source.uri,
        scheduler.interval(),
        cfg.source.fps
    );

    let mut frames = 0u64;
    let mut last_health_log = Instant::now();
    while running.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) if args.repeat => {
                source.restart()?;
                continue;
            }
            Ok(None) => {
                log::info!("source {} exhausted", source.name());
                break;
            }
            Err(e) => {
                log::warn!("source {}: skipping frame: {:#}", source.name(), e);
                std::thread::sleep(frame_period);
                continue;
            }
        };
        frames += 1;

        if let Some(latest) = scheduler.latest() {
            reporter.publish(&latest, &scheduler);
        }
        if let Admission::Started { pass_id } = scheduler.tick(&frame) {
            if reporter.wants_overlays() {
                reporter.frames.admit(pass_id, frame);
            }
        }

        if last_health_log.elapsed() >= HEALTH_LOG_PERIOD {
            let source_stats = source.stats();
            let stats = scheduler.stats();
            log::info!(
                "source health={} frames={} path={} | passes admitted={} completed={} failed={} throttled={} busy={}",
                source.is_healthy(),
                source_stats.frames_captured,
                source_stats.path,
                stats.admitted,
                stats.completed,
                stats.failed,
                stats.throttled,
                stats.busy
            );
            last_health_log = Instant::now();
        }

        if args.max_frames.is_some_and(|max| frames >= max) {
            break;
        }
        std::thread::sleep(frame_period);
    }

    log::info!("shutting down, waiting for the running pass...");
    if !scheduler.wait_idle(SHUTDOWN_GRACE) {
        log::warn!("detection pass still running after {:?}", SHUTDOWN_GRACE);
    }
    if let Some(latest) = scheduler.latest() {
        reporter.publish(&latest, &scheduler);
    }
    log::info!("processed {} frames, {} passes", frames, scheduler.stats().completed);
    Ok(())
}

struct PassReporter<'a> {
    cfg: &'a MonitorConfig,
    context: ReportContext,
    last_reported: u64,
    frames: PendingFrames,
}

impl PassReporter<'_> {
    fn wants_overlays(&self) -> bool {
        self.cfg.report.overlays && self.cfg.report.dir.is_some()
    }

    fn publish(&mut self, result: &ResultSet, scheduler: &DetectionScheduler) {
        if result.pass_id <= self.last_reported {
            return;
        }
        self.last_reported = result.pass_id;
        let frame = self.frames.take(result.pass_id);

        if let Some(error) = result.error() {
            log::error!("pass {} failed: {}", result.pass_id, error);
            return;
        }
        let summary = result.summary();
        log::info!(
            "pass {} (frame {}): {}/{} present, {} missing, {} uncertain, {} errors, {} misplaced, completeness {:.1}% [{:?}]",
            result.pass_id,
            result.frame_sequence,
            summary.present,
            summary.total,
            summary.missing,
            summary.uncertain,
            summary.errors,
            summary.misplaced,
            summary.completeness_rate,
            summary.overall
        );
        for alert in &summary.alerts {
            log::warn!("[{:?}] {}", alert.severity, alert.message);
        }

        let Some(dir) = &self.cfg.report.dir else {
            return;
        };
        let context = self.context.clone().with_scheduler(scheduler.stats());
        if let Err(e) = write_report(dir, result, &summary, &context) {
            log::error!("report for pass {} failed: {:#}", result.pass_id, e);
        }
        if !self.cfg.report.overlays {
            return;
        }
        let Some(frame) = frame else {
            log::warn!("no frame kept for pass {}, overlay skipped", result.pass_id);
            return;
        };
        let path = dir.join(format!("overlay_{}.png", result.pass_id));
        if let Err(e) = save_overlay(&frame, result, &path) {
            log::error!("overlay for pass {} failed: {:#}", result.pass_id, e);
        }
    }
}

/// Frames of admitted passes, held until their pass is published.
#[derive(Default)]
struct PendingFrames {
    by_pass: BTreeMap<u64, Frame>,
}

impl PendingFrames {
    fn admit(&mut self, pass_id: u64, frame: Frame) {
        self.by_pass.insert(pass_id, frame);
    }

    /// Frame for `pass_id`. Frames of earlier passes are dropped.
    fn take(&mut self, pass_id: u64) -> Option<Frame> {
        let frame = self.by_pass.remove(&pass_id);
        self.by_pass.retain(|id, _| *id > pass_id);
        frame
    }
}
