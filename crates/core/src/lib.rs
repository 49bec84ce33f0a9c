//! Pure computation for the rolling baseline engine.
//!
//! Nothing in this crate performs I/O: the database layer feeds it
//! [`baseline::Observation`]s and persists the [`baseline::BaselineRow`]s
//! it returns.

pub mod baseline;
pub mod duration;
pub mod error;
pub mod score;
pub mod shorts;
pub mod types;
pub mod window;
