// Domain modules
pub mod config;
pub mod error;
pub mod metrics;

pub use config::{PipelineConfig, TtftStrategy, DEFAULT_BASELINE_CURRENT_A};
pub use error::{Result, WattburnError};
pub use metrics::{EnergySummary, InferenceMetrics, PowerSample};
