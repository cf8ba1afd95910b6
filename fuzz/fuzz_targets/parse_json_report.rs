//! Fuzz harness for JSON reports.
//!
//! Anything that parses as a report must render to Markdown or fail with a
//! `RenderError`, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::PathBuf;
use storyline_ports::Renderer;
use storyline_render_json::parse_json_report;
use storyline_render_md::MarkdownRenderer;
use storyline_schema::report::{OutputMode, ReportDocument, ReportMeta, RunMeta};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(report) = parse_json_report(input) else {
        return;
    };

    let run = RunMeta {
        run_id: report.meta.run_id.clone(),
        started_at: report.meta.generated_at,
        finished_at: None,
    };
    let meta = ReportMeta::new(report.meta.title.clone(), &run);
    for mode in [OutputMode::Aggregated, OutputMode::Colocated] {
        let doc = ReportDocument {
            path: PathBuf::from(&report.meta.output_path),
            mode,
            stories: report.scenarios.clone(),
        };
        let _ = MarkdownRenderer::default().render(&doc, &meta);
    }
});
