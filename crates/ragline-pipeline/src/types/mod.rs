//! Task, result, and statistics types for batch processing

mod result;
mod stats;
mod task;

pub use result::{DocumentInfo, ImageOutcome, ProcessingResult, StageTimings};
pub use stats::BatchStatistics;
pub use task::{FileKind, ProcessingTask};
