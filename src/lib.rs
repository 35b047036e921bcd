pub mod archive;
pub mod config;
pub mod humanize;
pub mod job;
pub mod observability;
pub mod orchestrator;
pub mod quota;
pub mod report;
pub mod worker;

pub use orchestrator::{JobError, JobReport, JobState, Orchestrator};
