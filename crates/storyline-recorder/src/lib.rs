//! Per-test story recorder.
//!
//! A [`Recorder`] is a cheap, cloneable handle to one story's mutable state.
//! It starts pending, becomes active on [`Recorder::init`], and is frozen
//! into an immutable [`StoryRecord`] by [`Recorder::finalize`].
//!
//! Step bodies run without the recorder lock held, so a body may itself
//! record docs (or nested steps) on the same recorder.

mod derive;
mod panic;

pub use panic::{install_hook, panic_error, panic_message, take_last_panic};

use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use storyline_error::{CallSite, StoryError};
use storyline_ids::StoryId;
use storyline_ports::StoryBinding;
use storyline_schema::doc::DocEntry;
use storyline_schema::story::{
    DocTarget, ErrorInfo, Outcome, SourceLocation, Status, StepKeyword, StepMode, StepRef,
    StoryOptions, StoryRecord, StoryStep, duration_ms,
};

/// Message attached to stories that never reached a terminal hook.
pub const ABANDONED_MESSAGE: &str = "story was not finalized before the run completed (timed out or cancelled)";

static NEXT_SOURCE_ORDER: AtomicU64 = AtomicU64::new(0);

/// Process-wide declaration counter, used when a binding supplies no order.
pub fn next_source_order() -> u64 {
    NEXT_SOURCE_ORDER.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
enum State {
    #[default]
    Pending,
    Active(Box<Draft>),
    Finalized(Box<StoryRecord>),
}

struct Draft {
    title: String,
    options: StoryOptions,
    source: SourceLocation,
    source_order: u64,
    steps: Vec<StoryStep>,
    docs: Vec<DocEntry>,
    started: Instant,
    /// Wrapped steps whose bodies are executing, innermost last.
    running: Vec<usize>,
    timers: HashMap<u64, (Instant, Option<usize>)>,
    next_timer: u64,
}

impl Draft {
    fn new(title: &str, mut options: StoryOptions, caller: &Location<'_>) -> Self {
        let source = options
            .source
            .take()
            .unwrap_or_else(|| SourceLocation::from(caller));
        let source_order = options.source_order.unwrap_or_else(next_source_order);
        Self {
            title: title.to_string(),
            options,
            source,
            source_order,
            steps: Vec::new(),
            docs: Vec::new(),
            started: Instant::now(),
            running: Vec::new(),
            timers: HashMap::new(),
            next_timer: 0,
        }
    }

    fn id(&self) -> StoryId {
        StoryId::for_source(
            &self.source.file,
            &self.title,
            self.source.line,
            self.source.column,
        )
    }

    fn push_step(&mut self, step: StoryStep) -> usize {
        self.steps.push(step);
        self.steps.len() - 1
    }

    fn current_step(&self) -> Option<usize> {
        self.running
            .last()
            .copied()
            .or_else(|| self.steps.len().checked_sub(1))
    }

    fn attach(&mut self, entry: DocEntry, target: DocTarget) -> Result<(), StoryError> {
        let index = match target {
            DocTarget::Story => None,
            DocTarget::Current => self.current_step(),
            DocTarget::Step(StepRef(i)) if i < self.steps.len() => Some(i),
            DocTarget::Step(StepRef(i)) => return Err(StoryError::UnknownStep { index: i }),
        };
        match index {
            Some(i) => self.steps[i].docs.push(entry),
            None => self.docs.push(entry),
        }
        Ok(())
    }

    fn into_record(mut self, outcome: Outcome) -> StoryRecord {
        derive::resolve_steps(&mut self.steps, outcome.status, outcome.error.as_ref());
        let status = Status::aggregate(
            self.steps
                .iter()
                .filter_map(|s| s.status)
                .chain([outcome.status]),
        );
        StoryRecord {
            id: self.id(),
            title: self.title,
            source: self.source,
            source_order: self.source_order,
            suite_path: self.options.suite_path,
            steps: self.steps,
            docs: self.docs,
            tags: self.options.tags,
            tickets: self.options.tickets,
            meta: self.options.meta,
            status,
            duration_ms: outcome
                .duration_ms
                .unwrap_or_else(|| duration_ms(self.started.elapsed())),
            error: outcome.error,
        }
    }
}

/// Handle to a recorded step, for attaching docs to that step specifically.
#[derive(Clone)]
pub struct StepHandle {
    recorder: Recorder,
    index: StepRef,
}

impl StepHandle {
    pub fn index(&self) -> StepRef {
        self.index
    }

    pub fn doc(&self, entry: DocEntry) -> Result<&Self, StoryError> {
        self.recorder.add_doc(entry, DocTarget::Step(self.index))?;
        Ok(self)
    }

    pub fn note(&self, text: impl Into<String>) -> Result<&Self, StoryError> {
        self.doc(DocEntry::note(text))
    }

    /// Attach a file to this step.
    pub fn attach(&self, name: &str, media_type: &str, path: &str) -> Result<&Self, StoryError> {
        self.doc(DocEntry::attachment(name, media_type, path))
    }
}

/// Token returned by [`Recorder::start_timer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// New recorder, already initialized.
    #[track_caller]
    pub fn start(title: &str, options: StoryOptions) -> Self {
        let recorder = Self::new();
        recorder.init_at(title, options, Location::caller());
        recorder
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking step body never leaves the state half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Same underlying story.
    pub fn ptr_eq(&self, other: &Recorder) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(*self.lock(), State::Pending)
    }

    pub fn is_finalized(&self) -> bool {
        matches!(*self.lock(), State::Finalized(_))
    }

    pub fn title(&self) -> Option<String> {
        match &*self.lock() {
            State::Pending => None,
            State::Active(d) => Some(d.title.clone()),
            State::Finalized(r) => Some(r.title.clone()),
        }
    }

    pub fn id(&self) -> Option<StoryId> {
        match &*self.lock() {
            State::Pending => None,
            State::Active(d) => Some(d.id()),
            State::Finalized(r) => Some(r.id.clone()),
        }
    }

    /// Steps recorded so far (or the final steps once finalized).
    pub fn steps(&self) -> Vec<StoryStep> {
        match &*self.lock() {
            State::Pending => Vec::new(),
            State::Active(d) => d.steps.clone(),
            State::Finalized(r) => r.steps.clone(),
        }
    }

    /// The frozen record, if finalized.
    pub fn record(&self) -> Option<StoryRecord> {
        match &*self.lock() {
            State::Finalized(r) => Some((**r).clone()),
            _ => None,
        }
    }

    /// Start the story. Calling it again before finalize replaces the first
    /// call's title and options and logs a warning.
    #[track_caller]
    pub fn init(&self, title: &str, options: StoryOptions) -> Result<(), StoryError> {
        let caller = Location::caller();
        if let State::Finalized(r) = &*self.lock() {
            return Err(StoryError::AlreadyFinalized {
                title: r.title.clone(),
            });
        }
        self.init_at(title, options, caller);
        Ok(())
    }

    fn init_at(&self, title: &str, options: StoryOptions, caller: &'static Location<'static>) {
        let mut state = self.lock();
        if let State::Active(previous) = &*state {
            tracing::warn!(
                story = %previous.title,
                replacement = %title,
                at = %CallSite::from(caller),
                "story initialized twice; last call wins"
            );
        }
        *state = State::Active(Box::new(Draft::new(title, options, caller)));
    }

    #[track_caller]
    fn with_draft<T>(&self, f: impl FnOnce(&mut Draft) -> T) -> Result<T, StoryError> {
        let caller = Location::caller();
        match &mut *self.lock() {
            State::Pending => Err(StoryError::NotInitialized {
                location: caller.into(),
            }),
            State::Finalized(r) => Err(StoryError::AlreadyFinalized {
                title: r.title.clone(),
            }),
            State::Active(d) => Ok(f(d)),
        }
    }

    /// Append a marker step. Its status is resolved at finalize.
    #[track_caller]
    pub fn add_step(&self, keyword: StepKeyword, text: &str) -> Result<StepHandle, StoryError> {
        let index = self.with_draft(|d| d.push_step(StoryStep::new(keyword, text)))?;
        Ok(self.handle(index))
    }

    /// A declared step that is not run.
    #[track_caller]
    pub fn skip_step(&self, keyword: StepKeyword, text: &str) -> Result<StepHandle, StoryError> {
        self.moded_step(keyword, text, StepMode::Skip, Status::Skipped)
    }

    /// A step that is planned but not written yet.
    #[track_caller]
    pub fn todo_step(&self, keyword: StepKeyword, text: &str) -> Result<StepHandle, StoryError> {
        self.moded_step(keyword, text, StepMode::Todo, Status::Todo)
    }

    #[track_caller]
    fn moded_step(
        &self,
        keyword: StepKeyword,
        text: &str,
        mode: StepMode,
        status: Status,
    ) -> Result<StepHandle, StoryError> {
        let index = self.with_draft(|d| {
            let mut step = StoryStep::new(keyword, text);
            step.mode = Some(mode);
            step.status = Some(status);
            d.push_step(step)
        })?;
        Ok(self.handle(index))
    }

    fn handle(&self, index: usize) -> StepHandle {
        StepHandle {
            recorder: self.clone(),
            index: StepRef(index),
        }
    }

    #[track_caller]
    pub fn add_doc(&self, entry: DocEntry, target: DocTarget) -> Result<(), StoryError> {
        self.with_draft(|d| d.attach(entry, target))?
    }

    #[track_caller]
    fn begin_step(&self, keyword: StepKeyword, text: &str) -> Result<usize, StoryError> {
        install_hook();
        self.with_draft(|d| {
            let mut step = StoryStep::new(keyword, text);
            step.wrapped = true;
            let index = d.push_step(step);
            d.running.push(index);
            index
        })
    }

    fn end_step(&self, index: usize, started: Instant, error: Option<ErrorInfo>) {
        let elapsed = duration_ms(started.elapsed());
        // Finalized mid-body (abandoned by the collector): nothing left to update.
        if let State::Active(d) = &mut *self.lock() {
            d.running.retain(|&i| i != index);
            if let Some(step) = d.steps.get_mut(index) {
                step.duration_ms = Some(elapsed);
                step.status = Some(if error.is_some() {
                    Status::Failed
                } else {
                    Status::Passed
                });
                step.error = error;
            }
        }
    }

    /// Run `body` as a step.
    ///
    /// A panic inside `body` marks the step failed, records the panic message,
    /// and then resumes unwinding so the test still fails.
    #[track_caller]
    pub fn wrap_step<T>(
        &self,
        keyword: StepKeyword,
        text: &str,
        body: impl FnOnce() -> T,
    ) -> Result<T, StoryError> {
        let index = self.begin_step(keyword, text)?;
        let started = Instant::now();
        match std::panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(value) => {
                self.end_step(index, started, None);
                Ok(value)
            }
            Err(payload) => {
                self.end_step(
                    index,
                    started,
                    Some(panic_error(&*payload)),
                );
                std::panic::resume_unwind(payload)
            }
        }
    }

    /// Run a fallible `body` as a step; an `Err` marks it failed and is returned unchanged.
    #[track_caller]
    pub fn try_step<T, E: std::fmt::Display>(
        &self,
        keyword: StepKeyword,
        text: &str,
        body: impl FnOnce() -> Result<T, E>,
    ) -> Result<Result<T, E>, StoryError> {
        let index = self.begin_step(keyword, text)?;
        let started = Instant::now();
        let result = match std::panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(result) => result,
            Err(payload) => {
                self.end_step(
                    index,
                    started,
                    Some(panic_error(&*payload)),
                );
                std::panic::resume_unwind(payload)
            }
        };
        let error = result.as_ref().err().map(|e| ErrorInfo::new(e.to_string()));
        self.end_step(index, started, error);
        Ok(result)
    }

    /// Async form of [`Recorder::wrap_step`]. Suspension happens only at the
    /// future's own await points; the recorder is not locked meanwhile.
    #[track_caller]
    pub fn wrap_step_async<'a, F: Future>(
        &'a self,
        keyword: StepKeyword,
        text: &str,
        body: F,
    ) -> impl Future<Output = Result<F::Output, StoryError>> + use<'a, F> {
        let begun = self.begin_step(keyword, text);
        async move {
            let index = begun?;
            let started = Instant::now();
            match AssertUnwindSafe(body).catch_unwind().await {
                Ok(value) => {
                    self.end_step(index, started, None);
                    Ok(value)
                }
                Err(payload) => {
                    self.end_step(
                        index,
                        started,
                        Some(panic_error(&*payload)),
                    );
                    std::panic::resume_unwind(payload)
                }
            }
        }
    }

    /// Async form of [`Recorder::try_step`].
    #[track_caller]
    pub fn try_step_async<'a, T, E, F>(
        &'a self,
        keyword: StepKeyword,
        text: &str,
        body: F,
    ) -> impl Future<Output = Result<Result<T, E>, StoryError>> + use<'a, T, E, F>
    where
        E: std::fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        let begun = self.begin_step(keyword, text);
        async move {
            let index = begun?;
            let started = Instant::now();
            let result = match AssertUnwindSafe(body).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    self.end_step(
                        index,
                        started,
                        Some(panic_error(&*payload)),
                    );
                    std::panic::resume_unwind(payload)
                }
            };
            let error = result.as_ref().err().map(|e| ErrorInfo::new(e.to_string()));
            self.end_step(index, started, error);
            Ok(result)
        }
    }

    /// Start timing the current step (or the story, if there is no step yet).
    #[track_caller]
    pub fn start_timer(&self) -> Result<TimerToken, StoryError> {
        self.with_draft(|d| {
            let token = d.next_timer;
            d.next_timer += 1;
            d.timers.insert(token, (Instant::now(), d.current_step()));
            TimerToken(token)
        })
    }

    /// Stop a timer and store the elapsed time on the step it was started for.
    ///
    /// Returns the elapsed milliseconds, or `None` if the token was already used.
    #[track_caller]
    pub fn end_timer(&self, token: TimerToken) -> Result<Option<u64>, StoryError> {
        self.with_draft(|d| {
            let (started, step) = d.timers.remove(&token.0)?;
            let elapsed = duration_ms(started.elapsed());
            if let Some(step) = step.and_then(|i| d.steps.get_mut(i)) {
                step.duration_ms = Some(elapsed);
            }
            Some(elapsed)
        })
    }

    /// Freeze the story.
    ///
    /// Unresolved steps are derived from `outcome`; the overall status is the
    /// worst of the outcome and every step. A second call fails.
    #[track_caller]
    pub fn finalize(&self, outcome: Outcome) -> Result<StoryRecord, StoryError> {
        let caller = Location::caller();
        let mut state = self.lock();
        let draft = match std::mem::take(&mut *state) {
            State::Active(d) => d,
            State::Pending => {
                return Err(StoryError::NotInitialized {
                    location: caller.into(),
                });
            }
            State::Finalized(r) => {
                let title = r.title.clone();
                *state = State::Finalized(r);
                return Err(StoryError::AlreadyFinalized { title });
            }
        };
        let record = (*draft).into_record(outcome);
        tracing::debug!(
            story = %record.title,
            id = %record.id.short(),
            status = %record.status,
            steps = record.steps.len(),
            "story finalized"
        );
        *state = State::Finalized(Box::new(record.clone()));
        Ok(record)
    }

    /// Finalize a story the host never finished as failed.
    ///
    /// Returns `None` when there is nothing to abandon (pending or already final).
    pub fn abandon(&self) -> Option<StoryRecord> {
        if !matches!(*self.lock(), State::Active(_)) {
            return None;
        }
        self.finalize(Outcome::failed(ABANDONED_MESSAGE)).ok()
    }
}

impl StoryBinding for Recorder {
    #[track_caller]
    fn init(&self, title: &str, options: StoryOptions) -> Result<(), StoryError> {
        Recorder::init(self, title, options)
    }

    #[track_caller]
    fn add_step(&self, keyword: StepKeyword, text: &str) -> Result<StepRef, StoryError> {
        Recorder::add_step(self, keyword, text).map(|h| h.index())
    }

    #[track_caller]
    fn add_doc(&self, entry: DocEntry, target: DocTarget) -> Result<(), StoryError> {
        Recorder::add_doc(self, entry, target)
    }

    #[track_caller]
    fn finalize(&self, outcome: Outcome) -> Result<StoryRecord, StoryError> {
        Recorder::finalize(self, outcome)
    }
}
