//! animcache renders animated image frames into a bounded set of reusable bitmaps.
//!
//! The pieces fit together like this:
//!
//! - A [`BitmapFrameCache`] decides which decoded frames stay in memory
//!   ([`NoOpCache`], [`KeepLastFrameCache`], [`PooledFrameCache`]).
//! - A [`DefaultBitmapFramePreparer`] renders upcoming frames on a worker pool, at most one job per
//!   `(backend, frame)`, as directed by a [`FramePreparationStrategy`].
//! - A [`BitmapAnimationBackend`] draws frames from the cache, rendering on demand when needed.
//! - An [`InactivityCheckBackend`] releases an animation's frames once it stops being drawn.
//!
//! [`AnimationFactory`] wires all of them from an [`AnimationOpts`].
#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Animation backends, the draw path and the inactivity watchdog.
pub mod backend;
/// Frame bitmaps and allocation.
pub mod bitmap;
/// Frame cache strategies and the shared frame store.
pub mod cache;
/// Configuration-driven construction of backend stacks.
pub mod factory;
/// Shared value types, errors and clocks.
pub mod foundation;
/// Ahead-of-time frame preparation.
pub mod prepare;

pub use crate::foundation::clock::{ManualClock, MonotonicClock, SystemClock};
pub use crate::foundation::core::{AnimationKey, BackendId, BitmapDesc, FrameType, PixelFormat};
pub use crate::foundation::error::{AnimError, AnimResult};

pub use crate::backend::{
    AnimationBackend, AnimationInformation, BitmapAnimationBackend, DelayedScheduler,
    DrawableBackend, FrameCanvas, FrameListener, FrameRenderer, InactivityCheckBackend,
    InactivityListener, InactivityOpts, ManualScheduler, SnapshotCanvas, ThreadScheduler,
};
pub use crate::bitmap::{
    AllocStats, Bitmap, BitmapAllocator, FrameHandle, HeapAllocatorOpts, HeapBitmapAllocator,
};
pub use crate::cache::{
    AnimatedFrameStore, BitmapFrameCache, FrameCacheListener, FrameStoreOpts, FrameStoreStats,
    KeepLastFrameCache, NoOpCache, PooledFrameCache,
};
pub use crate::factory::{
    AnimatedBackend, AnimationFactory, AnimationOpts, CachingStrategy, FactoryParts,
};
pub use crate::prepare::{
    BitmapFramePreparer, DefaultBitmapFramePreparer, FixedNumberFramePreparationStrategy,
    FrameExecutor, FramePreparationStrategy, QueueExecutor, RayonExecutor,
    SingleNextFramePreparationStrategy,
};
