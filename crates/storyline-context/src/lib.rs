//! Context carrier: which story does an ambient `given(..)` belong to?
//!
//! Three ways to establish the current story, checked in this order:
//! 1. [`scope`]: a `tokio` task-local, for test bodies that run concurrently
//!    inside one process.
//! 2. [`enter`]: a thread-local stack, for one-test-per-thread harnesses
//!    such as libtest.
//! 3. [`HandleRegistry`]: an explicit token the host framework passes around.
//!    Not ambient; callers look the recorder up themselves.
//!
//! There is no process-global "current story" slot.

mod registry;
mod task;
mod thread;

pub mod markers;

pub use registry::HandleRegistry;
pub use task::{scope, sync_scope};
pub use thread::{ScopeGuard, enter};

use std::panic::Location;
use storyline_error::StoryError;
use storyline_recorder::Recorder;

/// The recorder for the running test body.
pub fn current() -> Result<Recorder, StoryError> {
    task::current()
        .or_else(thread::current)
        .ok_or(StoryError::NoActiveStory)
}

/// Like [`current`], but a missing scope is reported against the caller as
/// "not initialized", which is what a test author needs to see.
#[track_caller]
pub fn require() -> Result<Recorder, StoryError> {
    let caller = Location::caller();
    current().map_err(|_| StoryError::NotInitialized {
        location: caller.into(),
    })
}
