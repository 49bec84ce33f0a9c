//! Row structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` struct matching the database row
//! - `Deserialize` DTOs for inserts and updates where the engine needs them

pub mod baseline_run;
pub mod reporting;
pub mod video;
