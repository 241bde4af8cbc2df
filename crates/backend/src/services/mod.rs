pub mod aggregator;
pub mod analysis;
pub mod batch;
pub mod email_processor;

pub use analysis::{AnalysisError, AnalysisService, SingleAnalysis};
pub use batch::{BatchProcessor, ConcurrentBatchProcessor};
pub use email_processor::EmailProcessor;
