use crate::story::{Status, StoryRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;
use storyline_ids::RunId;

/// Version of the JSON report layout.
pub const SCHEMA_VERSION: u32 = 1;

/// How stories matched by an output rule are written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// One combined document for every matching source file.
    Aggregated,
    /// One document per source file, next to it.
    #[default]
    Colocated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMeta {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunMeta {
    pub fn start() -> Self {
        Self {
            run_id: RunId::now("run"),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }
}

/// Immutable view of a finished run.
///
/// `stories` keeps registration order, which is completion order under
/// parallel execution. Use [`RunSnapshot::source_ordered`] or
/// [`RunSnapshot::by_file`] for declaration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub meta: RunMeta,
    pub stories: Vec<StoryRecord>,
}

impl RunSnapshot {
    pub fn source_ordered(&self) -> Vec<&StoryRecord> {
        let mut out: Vec<&StoryRecord> = self.stories.iter().collect();
        out.sort_by(|a, b| source_order_cmp(a, b));
        out
    }

    pub fn by_file(&self) -> BTreeMap<&str, Vec<&StoryRecord>> {
        let mut out: BTreeMap<&str, Vec<&StoryRecord>> = BTreeMap::new();
        for story in self.source_ordered() {
            out.entry(story.source.file.as_str()).or_default().push(story);
        }
        out
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::from_records(&self.stories)
    }
}

/// File path, then position in the file, then declaration sequence.
pub fn source_order_cmp(a: &StoryRecord, b: &StoryRecord) -> Ordering {
    a.source
        .file
        .cmp(&b.source.file)
        .then_with(|| a.source_key().cmp(&b.source_key()))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub todo: usize,
    pub pending: usize,
}

impl StatusCounts {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a StoryRecord>) -> Self {
        let mut counts = Self::default();
        for r in records {
            match r.status {
                Status::Passed => counts.passed += 1,
                Status::Failed => counts.failed += 1,
                Status::Skipped => counts.skipped += 1,
                Status::Todo => counts.todo += 1,
                Status::Pending => counts.pending += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.todo + self.pending
    }
}

/// One output document: where it goes and which stories it holds, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportDocument {
    pub path: PathBuf,
    pub mode: OutputMode,
    pub stories: Vec<StoryRecord>,
}

/// Run-level facts a renderer may print. Kept out of story records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportMeta {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub run_id: RunId,
    pub duration_ms: u64,
    pub package_version: Option<String>,
    pub git_sha: Option<String>,
    pub ci: Option<String>,
}

impl ReportMeta {
    pub fn new(title: impl Into<String>, run: &RunMeta) -> Self {
        Self {
            title: title.into(),
            generated_at: run.finished_at.unwrap_or(run.started_at),
            run_id: run.run_id.clone(),
            duration_ms: run.duration_ms(),
            package_version: None,
            git_sha: None,
            ci: None,
        }
    }

    /// Git SHA shortened to seven characters.
    pub fn short_sha(&self) -> Option<&str> {
        self.git_sha
            .as_deref()
            .map(|sha| sha.get(..7).unwrap_or(sha))
    }
}

/// Machine-readable companion to a Markdown document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonReport {
    pub meta: JsonReportMeta,
    pub scenarios: Vec<StoryRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReportMeta {
    pub schema_version: u32,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci: Option<String>,
    /// The Markdown document this report accompanies.
    pub output_path: String,
}

impl JsonReport {
    pub fn new(doc: &ReportDocument, meta: &ReportMeta) -> Self {
        Self {
            meta: JsonReportMeta {
                schema_version: SCHEMA_VERSION,
                title: meta.title.clone(),
                generated_at: meta.generated_at,
                run_id: meta.run_id.clone(),
                package_version: meta.package_version.clone(),
                git_sha: meta.git_sha.clone(),
                ci: meta.ci.clone(),
                output_path: doc.path.to_string_lossy().replace('\\', "/"),
            },
            scenarios: doc.stories.clone(),
        }
    }
}
