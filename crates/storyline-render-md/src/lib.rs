//! Markdown renderer for storyline reports.
//!
//! Rendering is a pure function of the document, the run metadata and the
//! options. The only time-dependent content is the metadata block, and its
//! date comes from [`ReportMeta`], not the clock.

mod doc;

use chrono::SecondsFormat;
use itertools::Itertools;
use storyline_config::{MarkdownOptions, StepStyle};
use storyline_error::RenderError;
use storyline_ports::Renderer;
use storyline_schema::report::{OutputMode, ReportDocument, ReportMeta, StatusCounts};
use storyline_schema::story::{Status, StepKeyword, StepMode, StoryRecord, StoryStep};

/// Body of a document with no scenarios.
pub const EMPTY_DOCUMENT: &str = "_No scenarios found._";

/// Scenario headings never go deeper than `####`.
const MAX_HEADING_LEVEL: usize = 4;

/// Indent that keeps step docs inside the step's list item.
const BULLET_DOC_INDENT: &str = "    ";

pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Passed => "✅",
        Status::Failed => "❌",
        Status::Skipped => "⏩",
        Status::Todo | Status::Pending => "📝",
    }
}

/// Output buffer. [`Lines::blank`] never stacks blank lines.
#[derive(Default)]
pub(crate) struct Lines(Vec<String>);

impl Lines {
    pub(crate) fn push(&mut self, line: impl Into<String>) {
        self.0.push(line.into());
    }

    pub(crate) fn blank(&mut self) {
        if self.0.last().is_some_and(|l| !l.is_empty()) {
            self.0.push(String::new());
        }
    }

    fn finish(self) -> String {
        let mut out = self.0.join("\n");
        out.truncate(out.trim_end().len());
        out.push('\n');
        out
    }
}

/// Renders one [`ReportDocument`] as Markdown.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    options: MarkdownOptions,
}

impl MarkdownRenderer {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MarkdownOptions {
        &self.options
    }

    fn front_matter(&self, out: &mut Lines, doc: &ReportDocument, meta: &ReportMeta) {
        let counts = StatusCounts::from_records(&doc.stories);
        out.push("---");
        out.push(format!("title: {}", yaml_quote(&self.options.title)));
        if self.options.include_metadata {
            out.push(format!("generatedAt: {}", yaml_quote(&iso_date(meta))));
        }
        out.push(format!("scenarios: {}", counts.total()));
        out.push(format!("passed: {}", counts.passed));
        out.push(format!("failed: {}", counts.failed));
        out.push(format!("skipped: {}", counts.skipped));
        out.push(format!("todo: {}", counts.todo));
        out.push(format!("pending: {}", counts.pending));
        if let Some(version) = &meta.package_version {
            out.push(format!("version: {}", yaml_quote(version)));
        }
        if let Some(sha) = meta.short_sha() {
            out.push(format!("gitSha: {}", yaml_quote(sha)));
        }
        out.push("---");
        out.blank();
    }

    fn metadata(&self, out: &mut Lines, meta: &ReportMeta) {
        out.push("| Key | Value |");
        out.push("| --- | --- |");
        out.push(format!("| Date | {} |", iso_date(meta)));
        if let Some(version) = &meta.package_version {
            out.push(format!("| Version | {version} |"));
        }
        if let Some(sha) = meta.short_sha() {
            out.push(format!("| Git SHA | {sha} |"));
        }
        if let Some(ci) = &meta.ci {
            out.push(format!("| CI | {ci} |"));
        }
        out.blank();
    }

    fn summary(&self, out: &mut Lines, doc: &ReportDocument) {
        let counts = StatusCounts::from_records(&doc.stories);
        let steps: usize = doc.stories.iter().map(|s| s.steps.len()).sum();
        out.push("| Scenarios | Steps | Passed | Failed | Skipped | Todo | Pending |");
        out.push("| ---: | ---: | ---: | ---: | ---: | ---: | ---: |");
        out.push(format!(
            "| {} | {steps} | {} | {} | {} | {} | {} |",
            counts.total(),
            counts.passed,
            counts.failed,
            counts.skipped,
            counts.todo,
            counts.pending
        ));
        out.blank();
    }

    /// Scenarios grouped by suite path, in first-seen order.
    fn suite_groups(&self, out: &mut Lines, stories: &[&StoryRecord], base_level: usize) {
        for (suite, members) in group_first_seen(stories.iter().copied(), |s| s.suite_path.as_slice()) {
            let level = if suite.is_empty() {
                base_level
            } else {
                out.push(format!(
                    "{} {}",
                    "#".repeat(base_level),
                    suite.join(&self.options.suite_separator)
                ));
                out.blank();
                base_level + 1
            };
            for story in members {
                self.scenario(out, story, level.min(MAX_HEADING_LEVEL));
            }
        }
    }

    fn scenario(&self, out: &mut Lines, story: &StoryRecord, level: usize) {
        let icon = if self.options.include_status_icons {
            format!("{} ", status_icon(story.status))
        } else {
            String::new()
        };
        out.push(format!("{} {icon}{}", "#".repeat(level), story.title));

        if let Some(base) = &self.options.permalink_base_url {
            let file = &story.source.file;
            let line = story.source.line;
            out.push(format!(
                "Source: [{file}:{line}]({}/{file}#L{line})",
                base.trim_end_matches('/')
            ));
        }
        if !story.tags.is_empty() {
            out.push(format!(
                "Tags: {}",
                story.tags.iter().map(|t| format!("`{t}`")).join(", ")
            ));
        }
        if !story.tickets.is_empty() {
            let tickets = match &self.options.ticket_url_template {
                Some(template) => story
                    .tickets
                    .iter()
                    .map(|t| format!("[{t}]({})", template.replace("{ticket}", t)))
                    .join(", "),
                None => story.tickets.iter().map(|t| format!("`{t}`")).join(", "),
            };
            out.push(format!("Tickets: {tickets}"));
        }
        out.blank();

        for entry in &story.docs {
            doc::render(out, entry, "");
        }
        out.blank();

        let mut last_primary = None;
        for step in &story.steps {
            let keyword = self.display_keyword(step.keyword, &mut last_primary);
            self.step(out, step, keyword);
        }

        if self.options.include_error_in_markdown
            && story.status == Status::Failed
            && let Some(error) = story.failure()
        {
            out.blank();
            out.push("**Failure**");
            out.blank();
            out.push("```text");
            for line in error.message.split('\n') {
                out.push(line);
            }
            if let Some(stack) = &error.stack {
                for line in stack.split('\n') {
                    out.push(line);
                }
            }
            out.push("```");
        }
        out.blank();
    }

    /// `Given a; Given b` reads as `Given a; And b` when auto-And is on.
    fn display_keyword(&self, keyword: StepKeyword, last: &mut Option<StepKeyword>) -> StepKeyword {
        if !keyword.is_primary() {
            return keyword;
        }
        let repeated = *last == Some(keyword);
        *last = Some(keyword);
        if repeated && self.options.auto_and {
            StepKeyword::And
        } else {
            keyword
        }
    }

    fn step(&self, out: &mut Lines, step: &StoryStep, keyword: StepKeyword) {
        let suffix = match step.mode {
            Some(StepMode::Skip) => " _(skipped)_",
            Some(StepMode::Todo) => " _(todo)_",
            None => "",
        };
        let indent = match self.options.step_style {
            StepStyle::Bullets => {
                out.push(format!("- **{keyword}** {}{suffix}", step.text));
                BULLET_DOC_INDENT
            }
            StepStyle::Gherkin => {
                out.push(format!("**{keyword}** {}{suffix}", step.text));
                ""
            }
        };
        for entry in &step.docs {
            doc::render(out, entry, indent);
        }
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, doc: &ReportDocument, meta: &ReportMeta) -> Result<String, RenderError> {
        validate(doc)?;

        let mut out = Lines::default();
        if self.options.include_front_matter {
            self.front_matter(&mut out, doc, meta);
        }
        out.push(format!("# {}", self.options.title));
        out.blank();
        if let Some(description) = &self.options.description {
            out.push(description.as_str());
            out.blank();
        }
        if self.options.include_metadata {
            self.metadata(&mut out, meta);
        }
        if self.options.include_summary_table {
            self.summary(&mut out, doc);
        }

        if doc.stories.is_empty() {
            out.push(EMPTY_DOCUMENT);
            return Ok(out.finish());
        }

        match doc.mode {
            OutputMode::Aggregated => {
                for (file, stories) in group_first_seen(&doc.stories, |s| s.source.file.as_str()) {
                    out.push(format!("## {file}"));
                    out.blank();
                    self.suite_groups(&mut out, &stories, 3);
                }
            }
            OutputMode::Colocated => {
                let stories: Vec<&StoryRecord> = doc.stories.iter().collect();
                self.suite_groups(&mut out, &stories, 2);
            }
        }
        Ok(out.finish())
    }
}

/// Every table in the document, at any depth, must be rectangular.
fn validate(doc: &ReportDocument) -> Result<(), RenderError> {
    doc.stories
        .iter()
        .flat_map(|s| s.docs.iter().chain(s.steps.iter().flat_map(|step| &step.docs)))
        .try_for_each(|entry| entry.validate())
}

fn group_first_seen<'a, K: PartialEq>(
    stories: impl IntoIterator<Item = &'a StoryRecord>,
    key: impl Fn(&'a StoryRecord) -> K,
) -> Vec<(K, Vec<&'a StoryRecord>)> {
    let mut groups: Vec<(K, Vec<&'a StoryRecord>)> = Vec::new();
    for story in stories {
        let k = key(story);
        match groups.iter_mut().find(|(g, _)| *g == k) {
            Some((_, members)) => members.push(story),
            None => groups.push((k, vec![story])),
        }
    }
    groups
}

fn iso_date(meta: &ReportMeta) -> String {
    meta.generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn yaml_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
