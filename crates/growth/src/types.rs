use crate::label::{Label, Stage};
use serde::ser::{SerializeMap, SerializeTuple};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Pixel-space box in corner format. No ordering between corners is
/// enforced; degenerate boxes are carried as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn is_degenerate(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }
}

impl From<(i32, i32, i32, i32)> for BoundingBox {
    fn from((x1, y1, x2, y2): (i32, i32, i32, i32)) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Serialized as `[x1, y1, x2, y2]`.
impl Serialize for BoundingBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.x1)?;
        tuple.serialize_element(&self.y1)?;
        tuple.serialize_element(&self.x2)?;
        tuple.serialize_element(&self.y2)?;
        tuple.end()
    }
}

/// One box straight out of the detector, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: impl Into<BoundingBox>) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: bbox.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedDetection {
    #[serde(rename = "class")]
    pub label: Label,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub harvest_days: u32,
    pub ready: bool,
}

/// Per-frame counts: one fixed counter per [`Stage`] plus an open-ended
/// bucket for labels outside the stage set.
///
/// Serializes as a flat map, stages first in catalog order, then overflow
/// labels in lexical order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    stages: [u32; Stage::COUNT],
    extra: BTreeMap<String, u32>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: &Label) {
        match label {
            Label::Stage(stage) => self.stages[stage.index()] += 1,
            Label::Unrecognized(raw) => *self.extra.entry(raw.clone()).or_insert(0) += 1,
        }
    }

    pub fn count(&self, stage: Stage) -> u32 {
        self.stages[stage.index()]
    }

    pub fn stages(&self) -> impl Iterator<Item = (Stage, u32)> + '_ {
        Stage::ALL.iter().map(|stage| (*stage, self.count(*stage)))
    }

    pub fn extra(&self) -> &BTreeMap<String, u32> {
        &self.extra
    }

    pub fn total(&self) -> u32 {
        self.stages.iter().sum::<u32>() + self.extra.values().sum::<u32>()
    }
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.stages.len() + self.extra.len()))?;
        for (stage, count) in self.stages() {
            map.serialize_entry(stage.as_str(), &count)?;
        }
        for (label, count) in &self.extra {
            // An overflow key can never shadow a stage: stage spellings
            // always normalize to the stage counter.
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}
