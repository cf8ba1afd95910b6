//! Executable stories for Rust tests.
//!
//! A test opens a story, narrates it with `given` / `when` / `then` and doc
//! helpers, and the run ends with [`write_reports`] turning every story into
//! Markdown (and optionally JSON) documents.
//!
//! ```
//! use storyline::{given, then, when};
//!
//! let _story = storyline::story::init("Adding two numbers");
//! given("two numbers 5 and 3").unwrap();
//! when("I add them").unwrap();
//! then("the result is 8").unwrap();
//! assert_eq!(5 + 3, 8);
//! ```
//!
//! libtest has no end-of-run hook. Call [`write_reports`] from a
//! `harness = false` test target after the stories ran, or from the last test
//! of a serial suite.

pub mod story;

pub use storyline_collector::{Collector, LateArrivalPolicy};
pub use storyline_config::{MarkdownOptions, OutputRule, OutputSpec, ReporterConfig, SortOrder, StepStyle};
pub use storyline_context::markers::*;
pub use storyline_context::{HandleRegistry, current, scope};
pub use storyline_engine::RunOutputs;
pub use storyline_error::StoryError;
pub use storyline_recorder::{Recorder, StepHandle};
pub use storyline_schema::doc::{AttachmentEncoding, DocEntry};
pub use storyline_schema::story::{Outcome, Status, StepKeyword, StoryOptions, StoryRecord};

use storyline_engine::StoryReporter;
use storyline_render_md::MarkdownRenderer;

/// Close the global run and write reports configured by `STORYLINE_CONFIG`
/// and `STORYLINE_OUTPUT`.
pub fn write_reports() -> anyhow::Result<RunOutputs> {
    let config = ReporterConfig::from_env()?;
    write_reports_with(Collector::global(), &config)
}

/// Close `collector`'s run and write its reports with `config`.
///
/// Stories still open are reported as failed. A second call rewrites the
/// same snapshot.
pub fn write_reports_with(collector: &Collector, config: &ReporterConfig) -> anyhow::Result<RunOutputs> {
    collector.set_policy(config.late_arrivals);
    let snapshot = collector.finalize_run();
    let renderer = MarkdownRenderer::new(config.markdown.clone());
    StoryReporter::new(config, &renderer).write(&snapshot)
}
