pub mod record;

pub use record::{
    JobOutput, JobProgress, JobRecord, JobStatus, JobSummary, ParsedContent, TransitionError,
    MAX_LIVE_PROGRESS,
};
