//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod baseline_run_repo;
pub mod ingest_queue_repo;
pub mod reporting_repo;
pub mod video_repo;

pub use baseline_run_repo::BaselineRunRepo;
pub use ingest_queue_repo::IngestQueueRepo;
pub use reporting_repo::ReportingRepo;
pub use video_repo::VideoRepo;
