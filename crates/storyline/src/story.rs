//! libtest binding.
//!
//! [`init`] returns a guard that keeps the story current on this thread and
//! finalizes it when dropped. A test that panics unwinds through the guard,
//! so the story is recorded as failed with the panic message.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use storyline_collector::Collector;
use storyline_context::ScopeGuard;
use storyline_recorder::{Recorder, install_hook, panic_error, take_last_panic};
use storyline_schema::story::{ErrorInfo, Outcome, Status, StoryOptions};

fn take_panic() -> ErrorInfo {
    take_last_panic().unwrap_or_else(|| ErrorInfo::new("test panicked"))
}

/// An open story. Dropping it finalizes and registers the record.
#[must_use = "the story is finalized when the guard is dropped"]
pub struct StoryGuard<'c> {
    recorder: Recorder,
    collector: &'c Collector,
    outcome: Option<Outcome>,
    _scope: ScopeGuard,
}

impl StoryGuard<'_> {
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Report the story as skipped instead of passed.
    pub fn skip(&mut self) {
        self.outcome = Some(Outcome::skipped());
    }

    pub fn todo(&mut self) {
        self.outcome = Some(Outcome::todo());
    }

    pub fn pending(&mut self) {
        self.outcome = Some(Outcome::pending());
    }

    /// Report a failure that did not panic.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.outcome = Some(Outcome::failed(message));
    }
}

impl Drop for StoryGuard<'_> {
    fn drop(&mut self) {
        let outcome = if std::thread::panicking() {
            Outcome::new(Status::Failed).with_error(take_panic())
        } else {
            self.outcome.take().unwrap_or_else(Outcome::passed)
        };
        finish(self.collector, &self.recorder, outcome);
    }
}

fn finish(collector: &Collector, recorder: &Recorder, outcome: Outcome) {
    match recorder.finalize(outcome) {
        Ok(record) => {
            if let Err(err) = collector.register(record) {
                tracing::warn!(category = %err.category(), error = %err, "story record not registered");
            }
        }
        Err(err) => {
            tracing::warn!(category = %err.category(), error = %err, "story could not be finalized")
        }
    }
}

/// Open a story in the global collector.
#[track_caller]
pub fn init(title: &str) -> StoryGuard<'static> {
    init_in(Collector::global(), title, StoryOptions::new())
}

#[track_caller]
pub fn init_with(title: &str, options: StoryOptions) -> StoryGuard<'static> {
    init_in(Collector::global(), title, options)
}

/// Open a story that registers into `collector`.
#[track_caller]
pub fn init_in<'c>(collector: &'c Collector, title: &str, options: StoryOptions) -> StoryGuard<'c> {
    install_hook();
    take_last_panic();
    let recorder = Recorder::start(title, options);
    collector.track(&recorder);
    let scope = storyline_context::enter(recorder.clone());
    StoryGuard {
        recorder,
        collector,
        outcome: None,
        _scope: scope,
    }
}

/// Run an async test body as a story of the global collector.
///
/// The story is task-local, so bodies running concurrently on one runtime
/// never mix steps. A panic is recorded and then resumed.
#[track_caller]
pub fn run_async<F: Future>(title: &str, body: F) -> impl Future<Output = F::Output> + use<F> {
    run_async_in(Collector::global(), title, StoryOptions::new(), body)
}

#[track_caller]
pub fn run_async_in<'c, F: Future>(
    collector: &'c Collector,
    title: &str,
    options: StoryOptions,
    body: F,
) -> impl Future<Output = F::Output> + use<'c, F> {
    install_hook();
    let recorder = Recorder::start(title, options);
    collector.track(&recorder);
    async move {
        let result = AssertUnwindSafe(storyline_context::scope(recorder.clone(), body))
            .catch_unwind()
            .await;
        match result {
            Ok(value) => {
                finish(collector, &recorder, Outcome::passed());
                value
            }
            Err(payload) => {
                let outcome = Outcome::new(Status::Failed).with_error(panic_error(&*payload));
                finish(collector, &recorder, outcome);
                std::panic::resume_unwind(payload)
            }
        }
    }
}
