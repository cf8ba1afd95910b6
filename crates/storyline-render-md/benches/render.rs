//! Criterion benchmarks for Markdown rendering of aggregated documents.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::path::PathBuf;
use storyline_ports::Renderer;
use storyline_render_md::MarkdownRenderer;
use storyline_schema::doc::DocEntry;
use storyline_schema::report::{OutputMode, ReportDocument, ReportMeta};
use storyline_schema::story::StepKeyword;
use storyline_testkit::{StoryBuilder, run_meta};

fn document(stories: usize) -> ReportDocument {
    let stories = (0..stories)
        .map(|i| {
            let line = u32::try_from(i).unwrap_or(u32::MAX);
            StoryBuilder::new(&format!("tests/file_{}.rs", i % 8), &format!("story {i}"), line)
                .suite(&["Checkout", "Discounts"])
                .tag("bench")
                .passed(StepKeyword::Given, "a cart with items")
                .doc(DocEntry::table(["sku", "qty"], [["A1", "2"], ["B2", "1"]]))
                .passed(StepKeyword::When, "the customer checks out")
                .doc(DocEntry::code("{\"total\": 36}", Some("json")).labeled("response"))
                .passed(StepKeyword::Then, "the total is 36.00")
                .build()
        })
        .collect();
    ReportDocument {
        path: PathBuf::from("docs/user-stories.md"),
        mode: OutputMode::Aggregated,
        stories,
    }
}

fn benchmark_render(c: &mut Criterion) {
    let renderer = MarkdownRenderer::default();
    let meta = ReportMeta::new("User Stories", &run_meta());
    let mut group = c.benchmark_group("render_md/aggregated");

    for size in [10usize, 100, 1000] {
        let doc = document(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| match renderer.render(black_box(doc), &meta) {
                Ok(md) => black_box(md.len()),
                Err(err) => panic!("render failed: {err}"),
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_render);
criterion_main!(benches);
