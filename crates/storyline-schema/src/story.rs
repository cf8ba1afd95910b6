use crate::doc::DocEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::Location;
use std::time::Duration;
use storyline_ids::StoryId;

/// Narrative keyword of a step. Presentational only; order is never checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKeyword {
    Given,
    When,
    Then,
    And,
    But,
}

impl StepKeyword {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKeyword::Given => "Given",
            StepKeyword::When => "When",
            StepKeyword::Then => "Then",
            StepKeyword::And => "And",
            StepKeyword::But => "But",
        }
    }

    /// Given/When/Then, the keywords that collapse to `And` when repeated.
    pub fn is_primary(self) -> bool {
        matches!(
            self,
            StepKeyword::Given | StepKeyword::When | StepKeyword::Then
        )
    }
}

impl fmt::Display for StepKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a step or a whole story.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
    Todo,
    Pending,
}

impl Status {
    /// Aggregation weight: failed > skipped > todo > pending > passed.
    pub fn precedence(self) -> u8 {
        match self {
            Status::Passed => 0,
            Status::Pending => 1,
            Status::Todo => 2,
            Status::Skipped => 3,
            Status::Failed => 4,
        }
    }

    pub fn worst(self, other: Status) -> Status {
        if other.precedence() > self.precedence() {
            other
        } else {
            self
        }
    }

    /// Overall status of a set of statuses. Empty input is `Passed`.
    pub fn aggregate(statuses: impl IntoIterator<Item = Status>) -> Status {
        statuses.into_iter().fold(Status::Passed, Status::worst)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
            Status::Todo => "todo",
            Status::Pending => "pending",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker recorded on a step that was declared but not executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMode {
    Skip,
    Todo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Where a story was declared.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    pub fn unknown() -> Self {
        Self::new("unknown", 0, 0)
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(loc: &Location<'_>) -> Self {
        // `file!()` uses the host separator; reports always use `/`.
        Self::new(loc.file().replace('\\', "/"), loc.line(), loc.column())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryStep {
    pub keyword: StepKeyword,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<DocEntry>,
    /// The step ran a body through the recorder rather than being a bare marker.
    #[serde(default, skip_serializing_if = "is_false")]
    pub wrapped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<StepMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl StoryStep {
    pub fn new(keyword: StepKeyword, text: impl Into<String>) -> Self {
        Self {
            keyword,
            text: text.into(),
            status: None,
            duration_ms: None,
            docs: Vec::new(),
            wrapped: false,
            mode: None,
            error: None,
        }
    }
}

/// A finalized story. Immutable once it leaves the recorder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    pub id: StoryId,
    pub title: String,
    pub source: SourceLocation,
    /// Declaration sequence; breaks ties between stories on the same line.
    pub source_order: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suite_path: Vec<String>,
    pub steps: Vec<StoryStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<DocEntry>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tickets: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
    pub status: Status,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl StoryRecord {
    /// Position of the declaration within its file.
    pub fn source_key(&self) -> (u32, u32, u64) {
        (self.source.line, self.source.column, self.source_order)
    }

    pub fn suite_label(&self, separator: &str) -> String {
        self.suite_path.join(separator)
    }

    /// Step error first, then the story-level error.
    pub fn failure(&self) -> Option<&ErrorInfo> {
        self.steps
            .iter()
            .find_map(|s| s.error.as_ref())
            .or(self.error.as_ref())
    }
}

/// Options accepted by `init`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoryOptions {
    pub tags: BTreeSet<String>,
    pub tickets: Vec<String>,
    pub meta: BTreeMap<String, Value>,
    pub suite_path: Vec<String>,
    /// Overrides the caller location captured by `init`.
    pub source: Option<SourceLocation>,
    /// Overrides the process-wide declaration counter.
    pub source_order: Option<u64>,
}

impl StoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I>(mut self, tags: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn ticket(mut self, ticket: impl Into<String>) -> Self {
        self.tickets.push(ticket.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn suite<I>(mut self, path: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.suite_path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn source(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.source = Some(SourceLocation::new(file, line, column));
        self
    }

    pub fn source_order(mut self, order: u64) -> Self {
        self.source_order = Some(order);
        self
    }
}

/// Terminal result reported by the host framework.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub status: Status,
    /// Host-measured duration; the recorder's own clock is used when absent.
    pub duration_ms: Option<u64>,
    pub error: Option<ErrorInfo>,
}

impl Outcome {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            duration_ms: None,
            error: None,
        }
    }

    pub fn passed() -> Self {
        Self::new(Status::Passed)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(ErrorInfo::new(message)),
            ..Self::new(Status::Failed)
        }
    }

    pub fn skipped() -> Self {
        Self::new(Status::Skipped)
    }

    pub fn todo() -> Self {
        Self::new(Status::Todo)
    }

    pub fn pending() -> Self {
        Self::new(Status::Pending)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration_ms(duration));
        self
    }

    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }
}

/// Index of a step inside its story.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StepRef(pub usize);

/// Where a doc entry should land.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DocTarget {
    /// The running wrapped step, else the most recent step, else the story.
    #[default]
    Current,
    Story,
    Step(StepRef),
}

/// Whole milliseconds, saturating.
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
