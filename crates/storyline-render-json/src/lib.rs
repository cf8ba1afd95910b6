//! JSON companion reports.
//!
//! Every Markdown document can be accompanied by a JSON file holding the same
//! stories in the same order, plus run metadata, for downstream tooling.

use anyhow::{Context, Result};
use std::path::Path;
use storyline_error::RenderError;
use storyline_ports::Renderer;
use storyline_schema::report::{JsonReport, ReportDocument, ReportMeta};

/// Renders a [`ReportDocument`] as a pretty-printed [`JsonReport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, doc: &ReportDocument, meta: &ReportMeta) -> Result<String, RenderError> {
        for story in &doc.stories {
            for entry in story.docs.iter().chain(story.steps.iter().flat_map(|s| &s.docs)) {
                entry.validate()?;
            }
        }
        let mut text = serde_json::to_string_pretty(&JsonReport::new(doc, meta))
            .map_err(|e| RenderError::Serialize {
                path: doc.path.clone(),
                reason: e.to_string(),
            })?;
        text.push('\n');
        Ok(text)
    }
}

pub fn read_json_report(path: &Path) -> Result<JsonReport> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {path:?}"))?;
    parse_json_report(&text).with_context(|| format!("parse {path:?}"))
}

pub fn parse_json_report(text: &str) -> Result<JsonReport> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use storyline_schema::report::OutputMode;
    use storyline_schema::story::StepKeyword;
    use storyline_testkit::{StoryBuilder, run_meta};

    fn document() -> ReportDocument {
        ReportDocument {
            path: PathBuf::from("docs/user-stories.md"),
            mode: OutputMode::Aggregated,
            stories: vec![
                StoryBuilder::new("tests/calc.rs", "adding", 3)
                    .passed(StepKeyword::Given, "two numbers")
                    .build(),
                StoryBuilder::new("tests/calc.rs", "dividing", 9)
                    .failed(StepKeyword::When, "dividing by zero", "Cannot divide by zero")
                    .build(),
            ],
        }
    }

    #[test]
    fn report_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user-stories.json");
        let doc = document();
        let meta = ReportMeta::new("Stories", &run_meta());

        let text = JsonRenderer.render(&doc, &meta).unwrap();
        assert!(text.ends_with("}\n"));
        std::fs::write(&path, &text).unwrap();

        let loaded = read_json_report(&path).unwrap();
        assert_eq!(loaded, JsonReport::new(&doc, &meta));
    }

    #[test]
    fn rendered_report_keeps_order_and_path() {
        let doc = document();
        let meta = ReportMeta::new("Stories", &run_meta());
        let rendered = JsonRenderer.render(&doc, &meta).unwrap();
        let report = parse_json_report(&rendered).unwrap();
        let titles: Vec<_> = report.scenarios.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["adding", "dividing"]);
        assert_eq!(report.meta.output_path, "docs/user-stories.md");
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = read_json_report(&path).unwrap_err();
        assert!(format!("{err:#}").contains("absent.json"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_json_report("{\"meta\": 1}").is_err());
        assert!(parse_json_report("").is_err());
    }
}
