use crate::label::{Label, Stage};

/// RGB display color.
pub type Color = [u8; 3];

pub const NEUTRAL_COLOR: Color = [255, 255, 255];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    pub label: Label,
    pub harvest_days: u32,
    pub color: Color,
}

impl StageInfo {
    pub fn ready(&self) -> bool {
        self.harvest_days == 0
    }

    /// Short harvest hint shown next to a box.
    pub fn harvest_hint(&self) -> String {
        if self.ready() {
            "Siap Panen".to_string()
        } else {
            format!("Panen: +{} hari", self.harvest_days)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    harvest_days: u32,
    color: Color,
}

/// Stage to harvest estimate and display color. Built once, read-only
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageCatalog {
    entries: [Entry; Stage::COUNT],
}

impl StageCatalog {
    /// Primordia +4 days (yellow), Muda +2 days (orange), Matang ready (green).
    pub const fn reference() -> Self {
        Self {
            entries: [
                Entry {
                    harvest_days: 4,
                    color: [255, 255, 0],
                },
                Entry {
                    harvest_days: 2,
                    color: [255, 165, 0],
                },
                Entry {
                    harvest_days: 0,
                    color: [0, 255, 0],
                },
            ],
        }
    }

    pub fn info_for(&self, label: &Label) -> StageInfo {
        match label.stage() {
            Some(stage) => {
                let entry = self.entries[stage.index()];
                StageInfo {
                    label: label.clone(),
                    harvest_days: entry.harvest_days,
                    color: entry.color,
                }
            }
            None => StageInfo {
                label: label.clone(),
                harvest_days: 0,
                color: NEUTRAL_COLOR,
            },
        }
    }

    pub fn harvest_days(&self, label: &Label) -> u32 {
        label
            .stage()
            .map(|stage| self.entries[stage.index()].harvest_days)
            .unwrap_or(0)
    }

    pub fn color(&self, label: &Label) -> Color {
        label
            .stage()
            .map(|stage| self.entries[stage.index()].color)
            .unwrap_or(NEUTRAL_COLOR)
    }
}

impl Default for StageCatalog {
    fn default() -> Self {
        Self::reference()
    }
}
