//! One detection pass: propose regions, score them, turn scores into verdicts.

use std::sync::Arc;

use image::RgbImage;

use crate::catalog::{WorkspaceCatalog, WorkspacePosition};
use crate::detect::SharedBackend;
use crate::error::{MonitorError, MonitorResult};
use crate::frame::Frame;
use crate::misplacement::{resolve, MatchRules};
use crate::nms::{suppress, ScoredDetection, DEFAULT_IOU_THRESHOLD};
use crate::proposer::{propose, Proposal, ProposalMode};
use crate::result::PassOutput;
use crate::scheduler::PassRunner;
use crate::scoring::{aggregate, best_label, zip_scores, LabelScore, Thresholds};
use crate::templates::{ClassVocabulary, ItemTemplates};
use crate::verdict::{DetectionVerdict, VerdictSubject};

pub const DEFAULT_MIN_CONTRAST: f32 = 0.002;

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub thresholds: Thresholds,
    /// NMS overlap limit for sliding-window detections.
    pub iou_threshold: f32,
    /// Sliding-window hits must also beat this contrast.
    pub min_contrast: f32,
    /// Run the vocabulary call per catalog position.
    pub identify: bool,
    /// Resolve misplacement after a catalog pass. Needs `identify`.
    pub resolve_misplacement: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            min_contrast: DEFAULT_MIN_CONTRAST,
            identify: true,
            resolve_misplacement: true,
        }
    }
}

pub struct DetectionPipeline {
    backend: SharedBackend,
    mode: ProposalMode,
    templates: ItemTemplates,
    vocabulary: ClassVocabulary,
    rules: MatchRules,
    settings: PipelineSettings,
}

impl DetectionPipeline {
    pub fn new(backend: SharedBackend, mode: ProposalMode) -> Self {
        Self {
            backend,
            mode,
            templates: ItemTemplates::default(),
            vocabulary: ClassVocabulary::default(),
            rules: MatchRules::default(),
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_templates(mut self, templates: ItemTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: ClassVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn with_rules(mut self, rules: MatchRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn mode(&self) -> &ProposalMode {
        &self.mode
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn run(&self, frame: &Frame) -> MonitorResult<PassOutput> {
        self.run_observed(frame, &mut |_, _| {})
    }

    /// Run a pass, calling `progress(done, total)` after each region.
    pub fn run_observed(
        &self,
        frame: &Frame,
        progress: &mut dyn FnMut(usize, usize),
    ) -> MonitorResult<PassOutput> {
        let proposals = propose(frame, &self.mode);
        log::info!(
            "pass over frame {} ({}x{}): {} regions",
            frame.sequence,
            frame.width(),
            frame.height(),
            proposals.len()
        );
        match &self.mode {
            ProposalMode::Catalog(catalog) => {
                self.catalog_pass(frame, catalog, &proposals, progress)
            }
            ProposalMode::SlidingWindow(_) => self.sliding_pass(frame, &proposals, progress),
        }
    }

    fn catalog_pass(
        &self,
        frame: &Frame,
        catalog: &Arc<WorkspaceCatalog>,
        proposals: &[Proposal],
        progress: &mut dyn FnMut(usize, usize),
    ) -> MonitorResult<PassOutput> {
        let total = proposals.len();
        let mut verdicts = Vec::with_capacity(total);
        for (done, proposal) in proposals.iter().enumerate() {
            let Some(position) = proposal
                .source_position_id
                .as_deref()
                .and_then(|id| catalog.get(id))
            else {
                continue;
            };
            let subject = VerdictSubject::Position(position.id.clone());
            let verdict = match self.score_position(frame, position) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("{} ({}): {}", position.id, position.label, e);
                    DetectionVerdict::failed(subject, position.label.clone(), position.bbox, e)
                }
            };
            log::debug!(
                "{} {} -> {} (contrast {:.5}, identified {:?})",
                position.id,
                position.label,
                verdict.status,
                verdict.contrast,
                verdict.identified_class
            );
            verdicts.push(verdict);
            progress(done + 1, total);
        }

        let misplacements = if self.settings.resolve_misplacement && self.settings.identify {
            Some(resolve(&verdicts, catalog, &self.rules)?)
        } else {
            None
        };
        Ok(PassOutput {
            verdicts,
            misplacements,
        })
    }

    fn score_position(
        &self,
        frame: &Frame,
        position: &WorkspacePosition,
    ) -> MonitorResult<DetectionVerdict> {
        let region = frame.region(&position.bbox)?;
        let template = self.templates.template_for(&position.label);
        let scores = self.classify(&region, &template.joint_labels())?;
        let contrast = aggregate(&scores, &template.positive, &template.negative)?.value();

        let (identified_class, identified_score) = if self.settings.identify {
            match self.identify(&region)? {
                Some((class, score)) => (Some(class), Some(score)),
                None => (None, None),
            }
        } else {
            (None, None)
        };

        Ok(DetectionVerdict {
            subject: VerdictSubject::Position(position.id.clone()),
            item_class: position.label.clone(),
            status: self.settings.thresholds.classify(contrast),
            contrast,
            bbox: position.bbox,
            best_label: best_label(&scores, &template.positive).map(|s| s.label.clone()),
            identified_class,
            identified_score,
            error: None,
        })
    }

    /// Argmax over the class vocabulary, scored in one call.
    fn identify(&self, region: &RgbImage) -> MonitorResult<Option<(String, f32)>> {
        if self.vocabulary.is_empty() {
            return Ok(None);
        }
        let scores = self.classify(region, &self.vocabulary.descriptions())?;
        let best = scores
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, s)| match best {
                Some((_, b)) if b >= s.raw_score => best,
                _ => Some((i, s.raw_score)),
            });
        Ok(best.and_then(|(i, score)| {
            self.vocabulary
                .class_at(i)
                .map(|class| (class.to_string(), score))
        }))
    }

    fn sliding_pass(
        &self,
        frame: &Frame,
        proposals: &[Proposal],
        progress: &mut dyn FnMut(usize, usize),
    ) -> MonitorResult<PassOutput> {
        let total = proposals.len();
        let mut detections = Vec::new();
        let mut best_labels: Vec<Option<String>> = vec![None; total];
        let mut failures = Vec::new();

        for (index, proposal) in proposals.iter().enumerate() {
            match self.best_class(frame, proposal) {
                Ok(Some((class, contrast, label))) => {
                    log::debug!(
                        "proposal {} {}: {} (contrast {:.5})",
                        index,
                        proposal.bbox,
                        class,
                        contrast
                    );
                    best_labels[index] = label;
                    detections.push(ScoredDetection {
                        bbox: proposal.bbox,
                        score: contrast,
                        item_class: class,
                        proposal_index: index,
                    });
                }
                Ok(None) => {}
                Err((class, e)) => {
                    log::warn!("proposal {} {}: {}", index, proposal.bbox, e);
                    failures.push(DetectionVerdict::failed(
                        VerdictSubject::Proposal(index),
                        class,
                        proposal.bbox,
                        e,
                    ));
                }
            }
            progress(index + 1, total);
        }

        let candidates = detections.len();
        let kept = suppress(detections, self.settings.iou_threshold);
        log::info!(
            "sliding pass: {} candidates, {} after suppression, {} failed regions",
            candidates,
            kept.len(),
            failures.len()
        );

        let mut verdicts: Vec<DetectionVerdict> = kept
            .into_iter()
            .map(|d| DetectionVerdict {
                subject: VerdictSubject::Proposal(d.proposal_index),
                status: self.settings.thresholds.classify(d.score),
                contrast: d.score,
                bbox: d.bbox,
                best_label: best_labels[d.proposal_index].take(),
                identified_class: None,
                identified_score: None,
                error: None,
                item_class: d.item_class,
            })
            .collect();
        verdicts.extend(failures);
        Ok(PassOutput {
            verdicts,
            misplacements: None,
        })
    }

    /// Best-contrast class for one window, if it clears both thresholds.
    #[allow(clippy::type_complexity)]
    fn best_class(
        &self,
        frame: &Frame,
        proposal: &Proposal,
    ) -> Result<Option<(String, f32, Option<String>)>, (String, MonitorError)> {
        let region = frame
            .region(&proposal.bbox)
            .map_err(|e| (String::from("unknown"), e))?;
        let mut best: Option<(String, f32, Option<String>)> = None;
        for class in self.templates.classes() {
            let template = self.templates.template_for(class);
            let (contrast, label) = self
                .classify(&region, &template.joint_labels())
                .and_then(|scores| {
                    let c = aggregate(&scores, &template.positive, &template.negative)?;
                    let label = best_label(&scores, &template.positive).map(|s| s.label.clone());
                    Ok((c.value(), label))
                })
                .map_err(|e| (class.to_string(), e))?;
            if best.as_ref().map_or(true, |(_, b, _)| contrast > *b) {
                best = Some((class.to_string(), contrast, label));
            }
        }
        let floor = self.settings.thresholds.present().max(self.settings.min_contrast);
        Ok(best.filter(|(_, contrast, _)| *contrast > floor))
    }

    fn classify(&self, region: &RgbImage, labels: &[String]) -> MonitorResult<Vec<LabelScore>> {
        let mut backend = self.backend.lock().map_err(|_| {
            MonitorError::ClassifierFailure("classifier backend lock poisoned".to_string())
        })?;
        let scores = backend
            .score(region, labels)
            .map_err(|e| MonitorError::ClassifierFailure(format!("{}: {:#}", backend.name(), e)))?;
        zip_scores(labels, &scores)
    }
}

impl PassRunner for DetectionPipeline {
    fn run_pass(&self, frame: &Frame) -> anyhow::Result<PassOutput> {
        Ok(self.run(frame)?)
    }
}
