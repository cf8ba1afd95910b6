//! Output layout: which document each story goes to, and in what order.

use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use storyline_config::{OutputRule, SortOrder};
use storyline_error::RenderError;
use storyline_schema::report::{OutputMode, ReportDocument, RunSnapshot, source_order_cmp};
use storyline_schema::story::StoryRecord;

/// Aggregated target when a rule names none, or when there are no rules.
pub const DEFAULT_AGGREGATED_FILE: &str = "docs/user-stories.md";
/// Suffix for colocated documents.
pub const DEFAULT_EXTENSION: &str = ".docs.md";
/// Companion extension for JSON reports.
pub const JSON_EXTENSION: &str = "json";

/// Test-file suffixes stripped before the colocated extension is appended.
const TEST_SUFFIXES: &[&str] = &[
    "_tests.rs",
    "_test.rs",
    ".test.ts",
    ".test.tsx",
    ".spec.ts",
    ".spec.tsx",
    ".test.js",
    ".spec.js",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// An output rule with its glob compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pattern: Pattern,
    rule: OutputRule,
}

impl CompiledRule {
    pub fn new(rule: OutputRule) -> Result<Self, RenderError> {
        let pattern = Pattern::new(&rule.include).map_err(|e| RenderError::InvalidRule {
            include: rule.include.clone(),
            reason: e.msg.to_string(),
        })?;
        Ok(Self { pattern, rule })
    }

    pub fn matches(&self, source_file: &str) -> bool {
        self.pattern.matches_with(source_file, MATCH_OPTIONS)
    }

    /// Document path for a story declared in `source_file`.
    pub fn target(&self, source_file: &str) -> PathBuf {
        match self.rule.mode {
            OutputMode::Aggregated => self
                .rule
                .output_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_AGGREGATED_FILE)),
            OutputMode::Colocated => colocated_path(
                source_file,
                self.rule.extension.as_deref().unwrap_or(DEFAULT_EXTENSION),
            ),
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.rule.mode
    }
}

pub fn compile_rules(rules: &[OutputRule]) -> Result<Vec<CompiledRule>, RenderError> {
    rules.iter().cloned().map(CompiledRule::new).collect()
}

/// First rule whose glob matches `source_file`.
pub fn find_rule<'a>(rules: &'a [CompiledRule], source_file: &str) -> Option<&'a CompiledRule> {
    rules.iter().find(|r| r.matches(source_file))
}

/// `tests/checkout_test.rs` + `.docs.md` -> `tests/checkout.docs.md`.
///
/// Known test suffixes are stripped; otherwise only the last extension is.
pub fn colocated_path(source_file: &str, extension: &str) -> PathBuf {
    let base = TEST_SUFFIXES
        .iter()
        .find_map(|suffix| source_file.strip_suffix(suffix))
        .unwrap_or_else(|| match Path::new(source_file).extension() {
            Some(ext) => &source_file[..source_file.len() - ext.len() - 1],
            None => source_file,
        });
    PathBuf::from(format!("{base}{extension}"))
}

/// `docs/user-stories.md` -> `docs/user-stories.json`.
pub fn json_path_for(markdown: &Path) -> PathBuf {
    markdown.with_extension(JSON_EXTENSION)
}

/// Order stories within one document.
pub fn sort_stories(stories: &mut [StoryRecord], order: SortOrder) {
    match order {
        SortOrder::Source => stories.sort_by(source_order_cmp),
        SortOrder::Title => stories.sort_by(|a, b| {
            a.source
                .file
                .cmp(&b.source.file)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.source_key().cmp(&b.source_key()))
        }),
        SortOrder::None => {}
    }
}

/// Route every story in `snapshot` to a document.
///
/// With no rules, everything goes to [`DEFAULT_AGGREGATED_FILE`]. With rules,
/// stories from files no rule matches are left out. Documents come back
/// sorted by path.
pub fn plan(
    snapshot: &RunSnapshot,
    rules: &[OutputRule],
    order: SortOrder,
) -> Result<Vec<ReportDocument>, RenderError> {
    let compiled = compile_rules(rules)?;
    let mut docs: BTreeMap<PathBuf, ReportDocument> = BTreeMap::new();

    for story in &snapshot.stories {
        let file = story.source.file.as_str();
        let (path, mode) = if compiled.is_empty() {
            (PathBuf::from(DEFAULT_AGGREGATED_FILE), OutputMode::Aggregated)
        } else {
            match find_rule(&compiled, file) {
                Some(rule) => (rule.target(file), rule.mode()),
                None => {
                    tracing::debug!(file, story = %story.title, "no output rule matches; story not rendered");
                    continue;
                }
            }
        };
        docs.entry(path.clone())
            .or_insert_with(|| ReportDocument {
                path,
                mode,
                stories: Vec::new(),
            })
            .stories
            .push(story.clone());
    }

    let mut out: Vec<ReportDocument> = docs.into_values().collect();
    for doc in &mut out {
        sort_stories(&mut doc.stories, order);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_testkit::{snapshot, story};
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn unmatched_files_are_left_out() {
        let snap = snapshot(vec![story("tests/api/a.rs", "api", 1), story("benches/b.rs", "bench", 1)]);
        let docs = plan(
            &snap,
            &[OutputRule::aggregated("tests/**", "docs/tests.md")],
            SortOrder::Source,
        )
        .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].stories[0].title, "api");
        assert!(logs_contain("no output rule matches"));
    }

    #[test]
    fn colocated_paths_strip_test_suffixes() {
        assert_eq!(
            colocated_path("tests/checkout.rs", DEFAULT_EXTENSION),
            PathBuf::from("tests/checkout.docs.md")
        );
        assert_eq!(
            colocated_path("tests/checkout_test.rs", DEFAULT_EXTENSION),
            PathBuf::from("tests/checkout.docs.md")
        );
        assert_eq!(
            colocated_path("src/cart.spec.ts", ".story.md"),
            PathBuf::from("src/cart.story.md")
        );
        assert_eq!(
            colocated_path("README", DEFAULT_EXTENSION),
            PathBuf::from("README.docs.md")
        );
    }

    #[test]
    fn json_companion_path() {
        assert_eq!(
            json_path_for(Path::new("docs/user-stories.md")),
            PathBuf::from("docs/user-stories.json")
        );
        assert_eq!(
            json_path_for(Path::new("tests/a.docs.md")),
            PathBuf::from("tests/a.docs.json")
        );
    }

    #[test]
    fn invalid_glob_is_a_render_error() {
        let err = CompiledRule::new(OutputRule::colocated("tests/[")).unwrap_err();
        assert!(matches!(err, RenderError::InvalidRule { ref include, .. } if include == "tests/["));
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = compile_rules(&[
            OutputRule::aggregated("tests/api/**", "docs/api.md"),
            OutputRule::colocated("**/*"),
        ])
        .unwrap();
        assert_eq!(
            find_rule(&rules, "tests/api/orders.rs").unwrap().target("tests/api/orders.rs"),
            PathBuf::from("docs/api.md")
        );
        assert_eq!(
            find_rule(&rules, "tests/ui.rs").unwrap().target("tests/ui.rs"),
            PathBuf::from("tests/ui.docs.md")
        );
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let rules = compile_rules(&[OutputRule::colocated("tests/*.rs")]).unwrap();
        assert!(find_rule(&rules, "tests/a.rs").is_some());
        assert!(find_rule(&rules, "tests/nested/a.rs").is_none());
    }
}
