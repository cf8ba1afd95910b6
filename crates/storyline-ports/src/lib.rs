//! Seams between the recorder, the collector and the renderers.

use storyline_error::{RenderError, StoryError};
use storyline_schema::doc::DocEntry;
use storyline_schema::report::{ReportDocument, ReportMeta};
use storyline_schema::story::{DocTarget, Outcome, StepKeyword, StepRef, StoryOptions, StoryRecord};

/// The four operations a host framework binding needs.
///
/// One core, many thin bindings: a binding maps its framework's lifecycle
/// hooks onto these calls and never re-implements aggregation.
pub trait StoryBinding {
    /// Start (or restart) the story. A second call replaces the first.
    #[track_caller]
    fn init(&self, title: &str, options: StoryOptions) -> Result<(), StoryError>;

    fn add_step(&self, keyword: StepKeyword, text: &str) -> Result<StepRef, StoryError>;

    fn add_doc(&self, entry: DocEntry, target: DocTarget) -> Result<(), StoryError>;

    /// Freeze the story. Any later call fails with `AlreadyFinalized`.
    fn finalize(&self, outcome: Outcome) -> Result<StoryRecord, StoryError>;
}

/// Result of handing a finalized record to a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    /// Same identity seen before; the newer record won.
    Replaced,
    /// Arrived after the run closed and was discarded.
    Dropped,
}

/// Where finalized records go.
pub trait RecordSink {
    fn register(&self, record: StoryRecord) -> Result<Registration, StoryError>;
}

/// Rendering.
///
/// Renderers should be pure: input in, bytes out.
pub trait Renderer {
    fn render(&self, doc: &ReportDocument, meta: &ReportMeta) -> Result<String, RenderError>;
}
