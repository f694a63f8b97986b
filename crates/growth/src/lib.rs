//! Growth-stage domain logic: raw detector labels in, harvest decisions and
//! per-frame counts out. Everything here is pure and total.

pub mod catalog;
pub mod label;
pub mod processor;
pub mod types;

pub use catalog::{StageCatalog, StageInfo};
pub use label::{Label, Stage, normalize};
pub use processor::{DetectionProcessor, ProcessedFrame};
pub use types::{BoundingBox, ProcessedDetection, RawDetection, Summary};
