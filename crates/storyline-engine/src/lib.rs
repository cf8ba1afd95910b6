//! Orchestration for the end of a test run.
//!
//! Takes the collector's snapshot, routes stories to documents, renders each
//! document and writes it (plus an optional JSON companion) under the
//! configured root.
//!
//! Recorded source paths come from `file!()`, which rustc writes relative
//! to the workspace root, while libtest runs each member's tests from that
//! member's directory. A relative `rootDir` is therefore resolved against
//! [`source_root`], not the working directory.

mod build_info;

pub use build_info::{BuildInfo, SHA_VARS, detect_ci, find_git_dir, find_git_dir_from, read_git_sha};

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};
use storyline_config::ReporterConfig;
use storyline_error::RenderError;
use storyline_output_layout::{json_path_for, plan};
use storyline_ports::Renderer;
use storyline_render_json::JsonRenderer;
use storyline_schema::report::{ReportDocument, ReportMeta, RunMeta, RunSnapshot};

pub struct StoryReporter<'a> {
    pub config: &'a ReporterConfig,
    pub renderer: &'a dyn Renderer,
    pub build: BuildInfo,
    /// Where the search for the source root starts.
    pub working_dir: PathBuf,
}

/// Files written by one [`StoryReporter::write`], in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOutputs {
    pub markdown: Vec<PathBuf>,
    pub json: Vec<PathBuf>,
}

impl<'a> StoryReporter<'a> {
    pub fn new(config: &'a ReporterConfig, renderer: &'a dyn Renderer) -> Self {
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            config,
            renderer,
            build: BuildInfo::detect(&working_dir.join(&config.root_dir), config.package_version.clone()),
            working_dir,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Replace detected build facts, e.g. for reproducible output.
    pub fn with_build_info(mut self, build: BuildInfo) -> Self {
        self.build = build;
        self
    }

    pub fn report_meta(&self, run: &RunMeta) -> ReportMeta {
        let mut meta = ReportMeta::new(self.config.markdown.title.clone(), run);
        meta.package_version = self.build.package_version.clone();
        meta.git_sha = self.build.git_sha.clone();
        meta.ci = self.build.ci.clone();
        meta
    }

    /// Route the snapshot's stories to documents without writing anything.
    pub fn plan(&self, snapshot: &RunSnapshot) -> Result<Vec<ReportDocument>> {
        plan(snapshot, &self.config.rules(), self.config.sort_scenarios).context("plan report documents")
    }

    /// Directory document paths are joined onto.
    ///
    /// An absolute `rootDir` is used as-is; a relative one sits under the
    /// snapshot's [`source_root`].
    pub fn output_root(&self, snapshot: &RunSnapshot) -> PathBuf {
        if self.config.root_dir.is_absolute() {
            return self.config.root_dir.clone();
        }
        let mut root = source_root(&self.working_dir, snapshot);
        root.extend(
            self.config
                .root_dir
                .components()
                .filter(|c| !matches!(c, Component::CurDir)),
        );
        root
    }

    pub fn write(&self, snapshot: &RunSnapshot) -> Result<RunOutputs> {
        let meta = self.report_meta(&snapshot.meta);
        let root = self.output_root(snapshot);
        let mut outputs = RunOutputs::default();

        for doc in self.plan(snapshot)? {
            let path = root.join(&doc.path);
            let markdown = self
                .renderer
                .render(&doc, &meta)
                .with_context(|| format!("render {:?}", doc.path))?;
            write_document(&path, &markdown)?;
            tracing::info!(path = %path.display(), stories = doc.stories.len(), "wrote story document");
            outputs.markdown.push(path.clone());

            if self.config.include_json {
                let json_path = json_path_for(&path);
                let json = JsonRenderer
                    .render(&doc, &meta)
                    .with_context(|| format!("render {json_path:?}"))?;
                write_document(&json_path, &json)?;
                tracing::info!(path = %json_path.display(), "wrote json report");
                outputs.json.push(json_path);
            }
        }

        Ok(outputs)
    }
}

/// Ancestor of `start` that the snapshot's source paths are relative to.
///
/// The first directory (walking up) under which some recorded source file
/// exists; `start` itself when none does.
pub fn source_root(start: &Path, snapshot: &RunSnapshot) -> PathBuf {
    start
        .ancestors()
        .find(|dir| {
            snapshot
                .stories
                .iter()
                .any(|s| dir.join(&s.source.file).is_file())
        })
        .unwrap_or(start)
        .to_path_buf()
}

fn write_document(path: &Path, contents: &str) -> Result<(), RenderError> {
    let written = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
    .and_then(|()| std::fs::write(path, contents));

    written.map_err(|source| {
        let err = RenderError::Io {
            path: path.to_path_buf(),
            source,
        };
        tracing::error!(category = %err.category(), error = %err, "report document not written");
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_render_md::MarkdownRenderer;
    use storyline_schema::story::StepKeyword;
    use storyline_testkit::{StoryBuilder, snapshot};
    use tracing_test::traced_test;

    fn config(root: &Path) -> ReporterConfig {
        ReporterConfig {
            root_dir: root.to_path_buf(),
            ..ReporterConfig::default()
        }
    }

    #[traced_test]
    #[test]
    fn logs_each_written_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let renderer = MarkdownRenderer::new(config.markdown.clone());
        let reporter = StoryReporter::new(&config, &renderer).with_build_info(BuildInfo::default());

        let snap = snapshot(vec![
            StoryBuilder::new("tests/cart.rs", "adds items", 4)
                .passed(StepKeyword::Given, "an empty cart")
                .build(),
        ]);
        let outputs = reporter.write(&snap).unwrap();

        assert_eq!(outputs.markdown, vec![dir.path().join("tests/cart.docs.md")]);
        assert!(logs_contain("wrote story document"));
        assert!(logs_contain("stories=1"));
    }

    #[traced_test]
    #[test]
    fn unwritable_root_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let config = config(&blocker);
        let renderer = MarkdownRenderer::new(config.markdown.clone());
        let reporter = StoryReporter::new(&config, &renderer).with_build_info(BuildInfo::default());

        let err = reporter
            .write(&snapshot(vec![StoryBuilder::new("tests/cart.rs", "adds items", 4).build()]))
            .unwrap_err();
        match err.downcast_ref::<RenderError>() {
            Some(RenderError::Io { path, .. }) => {
                assert_eq!(path, &blocker.join("tests/cart.docs.md"));
            }
            other => panic!("expected RenderError::Io, got {other:?}"),
        }
        assert!(logs_contain("report document not written"));
        assert!(logs_contain("category=io"));
    }

    #[test]
    fn source_root_walks_up_to_the_recorded_path() {
        let ws = tempfile::tempdir().unwrap();
        let member = ws.path().join("crates/cart");
        std::fs::create_dir_all(member.join("tests")).unwrap();
        std::fs::write(member.join("tests/cart.rs"), "").unwrap();

        let snap = snapshot(vec![StoryBuilder::new("crates/cart/tests/cart.rs", "adds items", 4).build()]);
        assert_eq!(source_root(&member, &snap), ws.path());

        let elsewhere = snapshot(vec![StoryBuilder::new("crates/gone/tests/x.rs", "x", 1).build()]);
        assert_eq!(source_root(&member, &elsewhere), member);
    }

    #[test]
    fn report_meta_carries_build_facts() {
        let config = ReporterConfig::default();
        let renderer = MarkdownRenderer::default();
        let reporter = StoryReporter::new(&config, &renderer).with_build_info(BuildInfo {
            package_version: Some("0.3.0".into()),
            git_sha: Some("abcdef0123".into()),
            ci: Some("github".into()),
        });
        let meta = reporter.report_meta(&snapshot(vec![]).meta);
        assert_eq!(meta.title, "User Stories");
        assert_eq!(meta.package_version.as_deref(), Some("0.3.0"));
        assert_eq!(meta.short_sha(), Some("abcdef0"));
        assert_eq!(meta.ci.as_deref(), Some("github"));
    }
}
