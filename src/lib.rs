pub mod config;
pub mod error;
pub mod interactive;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod subtitle;
pub mod transcribe;
pub mod translate;

pub use config::Config;
pub use error::{Result, SubtranslateError};
pub use pipeline::{
    print_summary, PipelineConfig, PipelineResult, PipelineRunner, PipelineState, PipelineStats,
    RunHandle,
};
pub use progress::{PipelineEvent, Progress, SegmentProgress};
