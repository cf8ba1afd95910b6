//! Fixture builders shared by storyline tests.
//!
//! Keeping these in one crate avoids copy-paste across collector, layout and
//! renderer tests.

pub mod proptest;

use chrono::{TimeZone, Utc};
use storyline_ids::{RunId, StoryId};
use storyline_schema::doc::DocEntry;
use storyline_schema::report::{RunMeta, RunSnapshot};
use storyline_schema::story::{ErrorInfo, SourceLocation, Status, StepKeyword, StoryRecord, StoryStep};

/// A passed story with no steps, declared at `file:line:1`.
pub fn story(file: &str, title: &str, line: u32) -> StoryRecord {
    StoryBuilder::new(file, title, line).build()
}

/// A resolved step.
pub fn step(keyword: StepKeyword, text: &str, status: Status) -> StoryStep {
    let mut step = StoryStep::new(keyword, text);
    step.status = Some(status);
    step
}

/// Run metadata pinned to the epoch so rendered output is stable.
pub fn run_meta() -> RunMeta {
    RunMeta {
        run_id: RunId("run_fixture".into()),
        started_at: Utc.timestamp_opt(0, 0).unwrap(),
        finished_at: Some(Utc.timestamp_opt(1, 500_000_000).unwrap()),
    }
}

pub fn snapshot(stories: Vec<StoryRecord>) -> RunSnapshot {
    RunSnapshot {
        meta: run_meta(),
        stories,
    }
}

/// Builder for finalized story records.
///
/// The overall status is derived from the steps unless set explicitly.
#[derive(Clone, Debug)]
pub struct StoryBuilder {
    record: StoryRecord,
    status: Option<Status>,
}

impl StoryBuilder {
    pub fn new(file: &str, title: &str, line: u32) -> Self {
        Self {
            record: StoryRecord {
                id: StoryId::for_source(file, title, line, 1),
                title: title.to_string(),
                source: SourceLocation::new(file, line, 1),
                source_order: u64::from(line),
                suite_path: vec![],
                steps: vec![],
                docs: vec![],
                tags: Default::default(),
                tickets: vec![],
                meta: Default::default(),
                status: Status::Passed,
                duration_ms: 0,
                error: None,
            },
            status: None,
        }
    }

    pub fn order(mut self, order: u64) -> Self {
        self.record.source_order = order;
        self
    }

    pub fn column(mut self, column: u32) -> Self {
        let r = &mut self.record;
        r.source.column = column;
        r.id = StoryId::for_source(&r.source.file, &r.title, r.source.line, column);
        self
    }

    pub fn suite(mut self, path: &[&str]) -> Self {
        self.record.suite_path = path.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn step(mut self, keyword: StepKeyword, text: &str, status: Status) -> Self {
        self.record.steps.push(step(keyword, text, status));
        self
    }

    pub fn passed(self, keyword: StepKeyword, text: &str) -> Self {
        self.step(keyword, text, Status::Passed)
    }

    /// A failed step carrying `message`.
    pub fn failed(mut self, keyword: StepKeyword, text: &str, message: &str) -> Self {
        let mut s = step(keyword, text, Status::Failed);
        s.error = Some(ErrorInfo::new(message));
        self.record.steps.push(s);
        self
    }

    /// Attach a doc to the most recent step, or to the story if there is none.
    pub fn doc(mut self, entry: DocEntry) -> Self {
        match self.record.steps.last_mut() {
            Some(s) => s.docs.push(entry),
            None => self.record.docs.push(entry),
        }
        self
    }

    pub fn story_doc(mut self, entry: DocEntry) -> Self {
        self.record.docs.push(entry);
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.record.tags.insert(tag.to_string());
        self
    }

    pub fn ticket(mut self, ticket: &str) -> Self {
        self.record.tickets.push(ticket.to_string());
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.record.duration_ms = ms;
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn build(self) -> StoryRecord {
        let mut record = self.record;
        record.status = self.status.unwrap_or_else(|| {
            Status::aggregate(record.steps.iter().filter_map(|s| s.status))
        });
        record
    }
}
