//! The rolling baseline engine process.
//!
//! [`engine::BaselineEngine`] exposes the two entry points (recompute one
//! video, recompute a batch of channels); [`backfill`] drives batches to
//! completion with checkpoints; [`scheduler`] and [`ingest`] are the
//! long-running loops the binary spawns.

pub mod backfill;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod scheduler;
pub mod telemetry;
