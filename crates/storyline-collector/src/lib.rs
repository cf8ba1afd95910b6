//! Run-scoped registry of finalized stories.
//!
//! Records are keyed by [`StoryId`], so a retried test replaces its earlier
//! attempt. Registration order is kept for the snapshot; declaration order is
//! restored by [`Collector::all_by_file`] and by the snapshot's own views.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use storyline_error::StoryError;
use storyline_ids::StoryId;
use storyline_ports::{RecordSink, Registration};
use storyline_recorder::Recorder;
use storyline_schema::report::{RunMeta, RunSnapshot, source_order_cmp};
use storyline_schema::story::StoryRecord;

/// What happens to a record registered after [`Collector::finalize_run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LateArrivalPolicy {
    /// Discard it and log a warning.
    #[default]
    Drop,
    /// Return [`StoryError::RunClosed`] to the caller.
    Reject,
}

pub struct Collector {
    inner: Mutex<Inner>,
}

struct Inner {
    records: BTreeMap<StoryId, StoryRecord>,
    order: Vec<StoryId>,
    tracked: Vec<Recorder>,
    policy: LateArrivalPolicy,
    meta: RunMeta,
    snapshot: Option<RunSnapshot>,
}

impl Inner {
    fn insert(&mut self, record: StoryRecord) -> Registration {
        let id = record.id.clone();
        match self.records.insert(id.clone(), record) {
            Some(_) => Registration::Replaced,
            None => {
                self.order.push(id);
                Registration::Inserted
            }
        }
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    pub fn new() -> Self {
        Self::with_policy(LateArrivalPolicy::default())
    }

    pub fn with_policy(policy: LateArrivalPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: BTreeMap::new(),
                order: Vec::new(),
                tracked: Vec::new(),
                policy,
                meta: RunMeta::start(),
                snapshot: None,
            }),
        }
    }

    /// The process-wide collector used by the ambient `story` API.
    pub fn global() -> &'static Collector {
        static GLOBAL: OnceLock<Collector> = OnceLock::new();
        GLOBAL.get_or_init(Collector::new)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy(&self) -> LateArrivalPolicy {
        self.lock().policy
    }

    pub fn set_policy(&self, policy: LateArrivalPolicy) {
        self.lock().policy = policy;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().snapshot.is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remember a live recorder so it is not lost if its test never finishes.
    ///
    /// At [`Collector::finalize_run`] a tracked recorder that is still active
    /// is abandoned and reported as failed.
    pub fn track(&self, recorder: &Recorder) {
        let mut inner = self.lock();
        if inner.snapshot.is_some() {
            tracing::warn!(
                story = recorder.title().as_deref().unwrap_or("<pending>"),
                "recorder tracked after the run closed; ignored"
            );
            return;
        }
        inner.tracked.push(recorder.clone());
    }

    /// Insert or replace a finalized record. Last write wins per identity.
    pub fn register(&self, record: StoryRecord) -> Result<Registration, StoryError> {
        let mut inner = self.lock();
        if inner.snapshot.is_some() {
            return match inner.policy {
                LateArrivalPolicy::Drop => {
                    tracing::warn!(
                        story = %record.title,
                        id = %record.id.short(),
                        "story finalized after the run closed; dropped"
                    );
                    Ok(Registration::Dropped)
                }
                LateArrivalPolicy::Reject => Err(StoryError::RunClosed {
                    title: record.title,
                }),
            };
        }
        let registration = inner.insert(record);
        if registration == Registration::Replaced {
            tracing::debug!("story registered again; replaced the earlier attempt");
        }
        Ok(registration)
    }

    /// Every registered story grouped by file, each group in declaration order.
    pub fn all_by_file(&self) -> BTreeMap<String, Vec<StoryRecord>> {
        let inner = self.lock();
        let mut out: BTreeMap<String, Vec<StoryRecord>> = BTreeMap::new();
        for record in inner.records.values() {
            out.entry(record.source.file.clone())
                .or_default()
                .push(record.clone());
        }
        for stories in out.values_mut() {
            stories.sort_by(source_order_cmp);
        }
        out
    }

    /// Close the run and take an immutable snapshot.
    ///
    /// Tracked recorders that never finalized are abandoned as failed;
    /// tracked recorders that finalized but never registered are added.
    /// Later calls return the same snapshot.
    pub fn finalize_run(&self) -> RunSnapshot {
        let mut inner = self.lock();
        if let Some(snapshot) = &inner.snapshot {
            return snapshot.clone();
        }

        for recorder in std::mem::take(&mut inner.tracked) {
            if let Some(record) = recorder.abandon() {
                tracing::warn!(
                    story = %record.title,
                    id = %record.id.short(),
                    "story never finished; recorded as failed"
                );
                inner.insert(record);
            } else if let Some(record) = recorder.record()
                && !inner.records.contains_key(&record.id)
            {
                inner.insert(record);
            }
        }

        inner.meta.finished_at = Some(Utc::now());
        let stories: Vec<StoryRecord> = inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect();
        let snapshot = RunSnapshot {
            meta: inner.meta.clone(),
            stories,
        };
        tracing::info!(
            run = %snapshot.meta.run_id,
            stories = snapshot.stories.len(),
            "run finalized"
        );
        inner.snapshot = Some(snapshot.clone());
        snapshot
    }
}

impl RecordSink for Collector {
    fn register(&self, record: StoryRecord) -> Result<Registration, StoryError> {
        Collector::register(self, record)
    }
}
