//! Reporter configuration.
//!
//! Keys are camelCase on disk (`includeErrorInMarkdown`, `outputFile`, ...).
//! Every field has a default, so an empty file is a valid configuration.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub use storyline_collector::LateArrivalPolicy;
pub use storyline_schema::report::OutputMode;

/// Environment variable naming a config file to load.
pub const CONFIG_ENV: &str = "STORYLINE_CONFIG";
/// Environment variable replacing `output` with one aggregated file.
pub const OUTPUT_ENV: &str = "STORYLINE_OUTPUT";

/// Configuration format types supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    #[default]
    Yaml,
}

impl ConfigFormat {
    /// Detect format from extension; anything unknown is YAML.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// How scenarios are ordered inside one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// File, then line, column and declaration sequence.
    #[default]
    Source,
    /// File, then title.
    Title,
    /// Registration (completion) order.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStyle {
    /// `- **Given** text`
    #[default]
    Bullets,
    /// `**Given** text`
    Gherkin,
}

/// One routing rule. Rules are tried in order; the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRule {
    /// Glob matched against the story's source file.
    pub include: String,
    #[serde(default)]
    pub mode: OutputMode,
    /// Target document for aggregated rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
    /// Suffix for colocated documents, e.g. `.docs.md`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl OutputRule {
    pub fn aggregated(include: impl Into<String>, output_file: impl Into<PathBuf>) -> Self {
        Self {
            include: include.into(),
            mode: OutputMode::Aggregated,
            output_file: Some(output_file.into()),
            extension: None,
        }
    }

    pub fn colocated(include: impl Into<String>) -> Self {
        Self {
            include: include.into(),
            mode: OutputMode::Colocated,
            output_file: None,
            extension: None,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }
}

/// `output`: either one path (everything aggregated there) or a rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputSpec {
    Single(PathBuf),
    Rules(Vec<OutputRule>),
}

impl Default for OutputSpec {
    fn default() -> Self {
        OutputSpec::Rules(vec![OutputRule::colocated("**/*")])
    }
}

impl OutputSpec {
    /// The rule list this spec stands for.
    pub fn rules(&self) -> Vec<OutputRule> {
        match self {
            OutputSpec::Single(path) => vec![OutputRule::aggregated("**/*", path.clone())],
            OutputSpec::Rules(rules) => rules.clone(),
        }
    }
}

/// Options consumed by the Markdown renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkdownOptions {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub include_metadata: bool,
    pub include_front_matter: bool,
    pub include_error_in_markdown: bool,
    pub include_status_icons: bool,
    pub include_summary_table: bool,
    pub suite_separator: String,
    pub step_style: StepStyle,
    /// Render repeated Given/When/Then as `And`.
    pub auto_and: bool,
    /// `{ticket}` is replaced by the ticket id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_url_template: Option<String>,
    /// Prefix for `Source:` links, e.g. a repository blob URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink_base_url: Option<String>,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            title: "User Stories".to_string(),
            description: None,
            include_metadata: true,
            include_front_matter: false,
            include_error_in_markdown: true,
            include_status_icons: true,
            include_summary_table: false,
            suite_separator: " - ".to_string(),
            step_style: StepStyle::Bullets,
            auto_and: true,
            ticket_url_template: None,
            permalink_base_url: None,
        }
    }
}

/// Main reporter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReporterConfig {
    #[serde(default)]
    pub output: OutputSpec,

    #[serde(flatten)]
    pub markdown: MarkdownOptions,

    /// Write a `.json` companion next to every Markdown document.
    #[serde(default)]
    pub include_json: bool,

    #[serde(default)]
    pub sort_scenarios: SortOrder,

    #[serde(default)]
    pub late_arrivals: LateArrivalPolicy,

    /// Relative output paths are resolved against this directory.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Overrides the version printed in metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            output: OutputSpec::default(),
            markdown: MarkdownOptions::default(),
            include_json: false,
            sort_scenarios: SortOrder::default(),
            late_arrivals: LateArrivalPolicy::default(),
            root_dir: default_root_dir(),
            package_version: None,
        }
    }
}

impl ReporterConfig {
    pub fn rules(&self) -> Vec<OutputRule> {
        self.output.rules()
    }

    /// Configuration from `STORYLINE_CONFIG` / `STORYLINE_OUTPUT`, else defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::resolve(std::env::var_os(CONFIG_ENV), std::env::var_os(OUTPUT_ENV))
    }

    /// [`ReporterConfig::from_env`] with the variables passed in.
    pub fn resolve(config: Option<OsString>, output: Option<OsString>) -> anyhow::Result<Self> {
        let mut cfg = match config.filter(|p| !p.is_empty()) {
            Some(path) => load_config(PathBuf::from(path))?,
            None => ReporterConfig::default(),
        };
        if let Some(output) = output.filter(|p| !p.is_empty()) {
            cfg.output = OutputSpec::Single(PathBuf::from(output));
        }
        Ok(cfg)
    }
}

/// Load configuration from a file
pub fn load_config<P: Into<PathBuf>>(path: P) -> anyhow::Result<ReporterConfig> {
    let path = path.into();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("read config {path:?}"))?;
    parse_config(&contents, ConfigFormat::for_path(&path))
        .with_context(|| format!("parse config {path:?}"))
}

/// Parse configuration text in the given format.
pub fn parse_config(contents: &str, format: ConfigFormat) -> anyhow::Result<ReporterConfig> {
    match format {
        ConfigFormat::Json => serde_json::from_str(contents).context("invalid JSON config"),
        ConfigFormat::Yaml if contents.trim().is_empty() => Ok(ReporterConfig::default()),
        ConfigFormat::Yaml => serde_yaml::from_str(contents).context("invalid YAML config"),
    }
}

/// Save configuration to a file
pub fn save_config<P: Into<PathBuf>>(config: &ReporterConfig, path: P) -> anyhow::Result<()> {
    let path = path.into();
    let contents = match ConfigFormat::for_path(&path) {
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).context("serialize JSON config")?
        }
        ConfigFormat::Yaml => serde_yaml::to_string(config).context("serialize YAML config")?,
    };
    std::fs::write(&path, contents).with_context(|| format!("write config {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_default_values() {
        let config = ReporterConfig::default();
        assert_eq!(config.markdown.title, "User Stories");
        assert!(config.markdown.include_metadata);
        assert!(!config.markdown.include_front_matter);
        assert!(config.markdown.include_error_in_markdown);
        assert!(!config.include_json);
        assert_eq!(config.sort_scenarios, SortOrder::Source);
        assert_eq!(config.markdown.suite_separator, " - ");
        assert_eq!(config.late_arrivals, LateArrivalPolicy::Drop);
        assert_eq!(config.rules(), vec![OutputRule::colocated("**/*")]);
    }

    #[test]
    fn empty_documents_are_defaults() {
        assert_eq!(
            parse_config("{}", ConfigFormat::Json).unwrap(),
            ReporterConfig::default()
        );
        assert_eq!(
            parse_config("", ConfigFormat::Yaml).unwrap(),
            ReporterConfig::default()
        );
    }

    #[test]
    fn single_output_string_is_one_aggregated_rule() {
        let cfg = parse_config(r#"{"output": "docs/stories.md"}"#, ConfigFormat::Json).unwrap();
        assert_eq!(
            cfg.rules(),
            vec![OutputRule::aggregated("**/*", "docs/stories.md")]
        );
    }

    #[test]
    fn rule_list_with_camel_case_keys() {
        let yaml = r#"
title: Checkout stories
includeErrorInMarkdown: false
sortScenarios: title
stepStyle: gherkin
lateArrivals: reject
output:
  - include: "tests/api/**"
    mode: aggregated
    outputFile: docs/api.md
  - include: "**/*"
    mode: colocated
    extension: .story.md
"#;
        let cfg = parse_config(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.markdown.title, "Checkout stories");
        assert!(!cfg.markdown.include_error_in_markdown);
        assert_eq!(cfg.markdown.step_style, StepStyle::Gherkin);
        assert_eq!(cfg.sort_scenarios, SortOrder::Title);
        assert_eq!(cfg.late_arrivals, LateArrivalPolicy::Reject);
        assert_eq!(
            cfg.rules(),
            vec![
                OutputRule::aggregated("tests/api/**", "docs/api.md"),
                OutputRule::colocated("**/*").with_extension(".story.md"),
            ]
        );
    }

    #[test]
    fn invalid_mode_is_an_error() {
        let err = parse_config(
            r#"{"output": [{"include": "**", "mode": "sideways"}]}"#,
            ConfigFormat::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid JSON config"));
    }

    #[test]
    fn load_save_yaml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("storyline.yaml");

        let mut config = ReporterConfig::default();
        config.output = OutputSpec::Single(PathBuf::from("out/all.md"));
        config.include_json = true;
        config.markdown.ticket_url_template = Some("https://jira.example/browse/{ticket}".into());

        save_config(&config, &config_path).unwrap();
        let loaded = load_config(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_save_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("storyline.json");
        let config = ReporterConfig::default();
        save_config(&config, &config_path).unwrap();
        let text = std::fs::read_to_string(&config_path).unwrap();
        assert!(text.contains("\"includeMetadata\": true"));
        assert_eq!(load_config(&config_path).unwrap(), config);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_config("does/not/exist.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.yaml"));
    }

    #[test]
    fn resolve_applies_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("cfg.json");
        std::fs::write(&config_path, r#"{"title": "From file"}"#).unwrap();

        let cfg = ReporterConfig::resolve(
            Some(config_path.into_os_string()),
            Some(OsString::from("reports/all.md")),
        )
        .unwrap();
        assert_eq!(cfg.markdown.title, "From file");
        assert_eq!(cfg.output, OutputSpec::Single(PathBuf::from("reports/all.md")));

        let cfg = ReporterConfig::resolve(None, Some(OsString::new())).unwrap();
        assert_eq!(cfg, ReporterConfig::default());
    }
}
