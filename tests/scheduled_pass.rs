//! End-to-end passes: catalog file -> pipeline -> scheduler -> published result.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{Rgb, RgbImage};

use toolboard_monitor::detect::softmax;
use toolboard_monitor::report::{write_report, ReportContext};
use toolboard_monitor::{
    parse_catalog, Admission, ClassVocabulary, ClassifierBackend, DetectionPipeline,
    DetectionScheduler, Frame, ItemTemplates, LabelTemplate, Placement, ProposalMode,
    SharedBackend, Status, StubBackend, Thresholds,
};

const WAIT: Duration = Duration::from_secs(10);

const BOARD: &str = r#"{
    "categories": [
        { "id": 1, "name": "hammer" },
        { "id": 2, "name": "pliers" }
    ],
    "annotations": [
        { "id": 1, "category_id": 1, "bbox": [10, 20, 30, 40] },
        { "id": 2, "category_id": 2, "bbox": [50, 20, 30, 40] }
    ]
}"#;

const HAMMER_RED: Rgb<u8> = Rgb([210, 30, 30]);
const PLIERS_BLUE: Rgb<u8> = Rgb([30, 30, 210]);

/// Recognises tools by the colour painted at the region's top-left pixel.
struct PaintedTools;

impl ClassifierBackend for PaintedTools {
    fn name(&self) -> &'static str {
        "painted"
    }

    fn score(&mut self, region: &RgbImage, labels: &[String]) -> anyhow::Result<Vec<f32>> {
        let keyword = match *region.get_pixel(0, 0) {
            HAMMER_RED => "hammer",
            PLIERS_BLUE => "pliers",
            _ => "empty",
        };
        let logits: Vec<f32> = labels
            .iter()
            .map(|l| if l.contains(keyword) { 4.0 } else { 0.0 })
            .collect();
        Ok(softmax(&logits))
    }
}

fn shared<B: ClassifierBackend + 'static>(backend: B) -> SharedBackend {
    Arc::new(Mutex::new(backend))
}

fn board_frame(left: Rgb<u8>, right: Rgb<u8>, sequence: u64) -> Frame {
    let image = RgbImage::from_fn(100, 80, |x, _| if x < 50 { left } else { right });
    Frame::new(image, sequence)
}

fn pipeline(backend: SharedBackend) -> DetectionPipeline {
    let mut templates = ItemTemplates::empty();
    templates.insert("hammer", LabelTemplate::new(["hammer", "claw hammer"], ["empty slot"]));
    templates.insert("pliers", LabelTemplate::new(["pliers", "long pliers"], ["empty slot"]));
    let catalog = parse_catalog(BOARD).expect("board catalog");
    DetectionPipeline::new(backend, ProposalMode::Catalog(Arc::new(catalog)))
        .with_templates(templates)
        .with_vocabulary(ClassVocabulary::new([
            ("hammer", "a hammer"),
            ("pliers", "a pair of pliers"),
            ("empty", "an empty board"),
        ]))
}

#[test]
fn catalog_box_survives_the_whole_pass() {
    let scheduler = DetectionScheduler::new(
        Arc::new(pipeline(shared(StubBackend::new()))),
        Duration::from_secs(60),
    );
    assert!(scheduler.latest().is_none());

    let frame = board_frame(HAMMER_RED, PLIERS_BLUE, 1);
    assert_eq!(scheduler.tick(&frame), Admission::Started { pass_id: 1 });
    let result = scheduler.wait_for_pass(1, WAIT).expect("pass published");

    let verdicts = result.verdicts();
    assert_eq!(verdicts.len(), 2);
    assert_eq!(verdicts[0].bbox.to_xywh(), [10, 20, 30, 40]);
    assert_eq!(verdicts[0].subject.position_id(), Some("tool_1"));

    let placements = result.misplacements().expect("misplacement resolved");
    assert_eq!(placements[0].expected_position_id, "tool_1");
    assert_eq!(placements[0].bbox.to_xywh(), [10, 20, 30, 40]);
}

#[test]
fn swapped_tools_are_reported_through_the_scheduler() {
    let scheduler =
        DetectionScheduler::new(Arc::new(pipeline(shared(PaintedTools))), Duration::ZERO);

    // correct layout first
    scheduler.tick(&board_frame(HAMMER_RED, PLIERS_BLUE, 1));
    let first = scheduler.wait_for_pass(1, WAIT).expect("first pass");
    let statuses: Vec<Status> = first.verdicts().iter().map(|v| v.status).collect();
    assert_eq!(statuses, vec![Status::Present, Status::Present]);
    assert!(first
        .misplacements()
        .unwrap()
        .iter()
        .all(|m| m.actual_status == Placement::Correct));

    // then the two tools trade places
    assert!(scheduler.wait_idle(WAIT));
    assert_eq!(
        scheduler.tick(&board_frame(PLIERS_BLUE, HAMMER_RED, 2)),
        Admission::Started { pass_id: 2 }
    );
    let second = scheduler.wait_for_pass(2, WAIT).expect("second pass");
    assert_eq!(second.frame_sequence, 2);
    let placements = second.misplacements().unwrap();
    assert_eq!(placements[0].actual_status, Placement::Misplaced);
    assert_eq!(placements[0].found_at_position_id.as_deref(), Some("tool_2"));
    assert_eq!(placements[1].actual_status, Placement::Misplaced);
    assert_eq!(placements[1].found_at_position_id.as_deref(), Some("tool_1"));

    let summary = second.summary();
    assert_eq!(summary.misplaced, 2);
    assert_eq!(summary.alerts.len(), 2);

    let dir = tempfile::tempdir().unwrap();
    let context = ReportContext::new("painted", "memory", &Thresholds::default())
        .with_scheduler(scheduler.stats());
    let path = write_report(dir.path(), &second, &summary, &context).unwrap();
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(report["pass"]["pass_id"], 2);
    assert_eq!(report["pass"]["misplacements"][0]["actual_status"], "misplaced");
    assert_eq!(report["report_info"]["scheduler"]["admitted"], 2);
}

#[test]
fn empty_board_is_missing_everywhere() {
    let scheduler =
        DetectionScheduler::new(Arc::new(pipeline(shared(PaintedTools))), Duration::ZERO);
    let grey = Rgb([90, 90, 90]);
    scheduler.tick(&board_frame(grey, grey, 1));
    let result = scheduler.wait_for_pass(1, WAIT).expect("pass published");

    assert!(result.verdicts().iter().all(|v| v.status == Status::Missing));
    assert!(result
        .misplacements()
        .unwrap()
        .iter()
        .all(|m| m.actual_status == Placement::Missing && m.found_at_position_id.is_none()));
    let summary = result.summary();
    assert_eq!(summary.completeness_rate, 0.0);
    assert_eq!(summary.missing, 2);
}
