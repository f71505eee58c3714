//! Ahead-of-time frame preparation.
//!
//! A [`FramePreparationStrategy`] picks frames after each draw, a [`BitmapFramePreparer`] turns
//! each pick into at most one background job, and a [`FrameExecutor`] runs the jobs.

/// Worker pools.
pub mod executor;
/// Frame preparer and its job bookkeeping.
pub mod preparer;
/// Which frames to prepare.
pub mod strategy;

pub use executor::{FrameExecutor, Job, QueueExecutor, RayonExecutor};
pub use preparer::{BitmapFramePreparer, DefaultBitmapFramePreparer, JobKey, PreparerStats};
pub use strategy::{
    DEFAULT_FRAMES_TO_PREPARE, FixedNumberFramePreparationStrategy, FramePreparationStrategy,
    SingleNextFramePreparationStrategy,
};
