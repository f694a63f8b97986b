use crate::catalog::StageCatalog;
use crate::label::normalize;
use crate::types::{ProcessedDetection, RawDetection, Summary};
use serde::Serialize;

/// Output for one image or frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessedFrame {
    pub detections: Vec<ProcessedDetection>,
    pub summary: Summary,
}

impl ProcessedFrame {
    pub fn total(&self) -> usize {
        self.detections.len()
    }
}

/// Turns raw detector output into stage-labelled detections and counts.
///
/// Total over its input: every raw detection yields exactly one processed
/// detection, in input order. Confidence and boxes are copied through
/// untouched, degenerate boxes included. Thresholding and NMS belong to the
/// detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionProcessor {
    catalog: StageCatalog,
}

impl DetectionProcessor {
    pub fn new(catalog: StageCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    pub fn process(&self, raw: &[RawDetection]) -> ProcessedFrame {
        let mut summary = Summary::new();
        let mut detections = Vec::with_capacity(raw.len());

        for det in raw {
            let label = normalize(&det.label);
            let harvest_days = self.catalog.harvest_days(&label);

            tracing::trace!(
                raw = %det.label,
                label = %label,
                confidence = det.confidence,
                harvest_days,
                "Normalized detection"
            );

            summary.record(&label);
            detections.push(ProcessedDetection {
                label,
                confidence: det.confidence,
                bbox: det.bbox,
                harvest_days,
                ready: harvest_days == 0,
            });
        }

        if !summary.extra().is_empty() {
            tracing::debug!(
                unrecognized = ?summary.extra(),
                "Detector emitted labels outside the stage set"
            );
        }

        ProcessedFrame {
            detections,
            summary,
        }
    }
}
