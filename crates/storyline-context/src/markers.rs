//! Ambient step and doc markers.
//!
//! Each call resolves the current story through [`crate::require`], so a call
//! made outside any scope fails with `NotInitialized` pointing at the call
//! site instead of being silently dropped.

use crate::require;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use storyline_error::StoryError;
use storyline_recorder::{StepHandle, TimerToken};
use storyline_schema::doc::{AttachmentEncoding, DocEntry};
use storyline_schema::story::{DocTarget, StepKeyword};

macro_rules! keyword_marker {
    ($($(#[$meta:meta])* $name:ident => $keyword:ident;)*) => {
        $(
            $(#[$meta])*
            #[track_caller]
            pub fn $name(text: &str) -> Result<StepHandle, StoryError> {
                step(StepKeyword::$keyword, text)
            }
        )*
    };
}

keyword_marker! {
    given => Given;
    when => When;
    then => Then;
    and => And;
    but => But;
    /// Alias for [`given`].
    arrange => Given;
    /// Alias for [`given`].
    setup => Given;
    /// Alias for [`given`].
    context => Given;
    /// Alias for [`when`].
    act => When;
    /// Alias for [`when`].
    execute => When;
    /// Alias for [`when`].
    action => When;
    /// Alias for [`then`].
    assert_that => Then;
    /// Alias for [`then`].
    verify => Then;
}

#[track_caller]
pub fn step(keyword: StepKeyword, text: &str) -> Result<StepHandle, StoryError> {
    require()?.add_step(keyword, text)
}

#[track_caller]
pub fn skip_step(keyword: StepKeyword, text: &str) -> Result<StepHandle, StoryError> {
    require()?.skip_step(keyword, text)
}

#[track_caller]
pub fn todo_step(keyword: StepKeyword, text: &str) -> Result<StepHandle, StoryError> {
    require()?.todo_step(keyword, text)
}

/// Run `body` as a step of the current story. Panics are recorded, then resumed.
#[track_caller]
pub fn run<T>(keyword: StepKeyword, text: &str, body: impl FnOnce() -> T) -> Result<T, StoryError> {
    require()?.wrap_step(keyword, text, body)
}

/// Run a fallible `body` as a step of the current story.
#[track_caller]
pub fn try_run<T, E: std::fmt::Display>(
    keyword: StepKeyword,
    text: &str,
    body: impl FnOnce() -> Result<T, E>,
) -> Result<Result<T, E>, StoryError> {
    require()?.try_step(keyword, text, body)
}

/// Run a future as a step of the story current at the call.
#[track_caller]
pub fn run_async<F: Future>(
    keyword: StepKeyword,
    text: &str,
    body: F,
) -> impl Future<Output = Result<F::Output, StoryError>> + use<F> {
    let recorder = require();
    let text = text.to_string();
    async move {
        let recorder = recorder?;
        recorder.wrap_step_async(keyword, &text, body).await
    }
}

#[track_caller]
pub fn doc(entry: DocEntry) -> Result<(), StoryError> {
    require()?.add_doc(entry, DocTarget::Current)
}

#[track_caller]
pub fn note(text: &str) -> Result<(), StoryError> {
    doc(DocEntry::note(text))
}

#[track_caller]
pub fn tag(name: &str) -> Result<(), StoryError> {
    doc(DocEntry::tag(name))
}

#[track_caller]
pub fn kv(key: &str, value: impl Into<Value>) -> Result<(), StoryError> {
    doc(DocEntry::kv(key, value))
}

#[track_caller]
pub fn json(key: &str, value: &impl Serialize) -> Result<(), StoryError> {
    doc(DocEntry::json(key, value))
}

#[track_caller]
pub fn code(label: &str, content: &str, language: Option<&str>) -> Result<(), StoryError> {
    doc(DocEntry::code(content, language).labeled(label))
}

#[track_caller]
pub fn table(label: &str, headers: &[&str], rows: &[&[&str]]) -> Result<(), StoryError> {
    doc(DocEntry::table(headers.iter().copied(), rows.iter().map(|r| r.iter().copied())).labeled(label))
}

#[track_caller]
pub fn link(text: &str, url: &str) -> Result<(), StoryError> {
    doc(DocEntry::link(url, Some(text)))
}

#[track_caller]
pub fn section(title: &str, entries: Vec<DocEntry>) -> Result<(), StoryError> {
    doc(DocEntry::section(title, entries))
}

#[track_caller]
pub fn mermaid(code: &str, title: Option<&str>) -> Result<(), StoryError> {
    let entry = DocEntry::mermaid(code);
    doc(match title {
        Some(t) => entry.labeled(t),
        None => entry,
    })
}

#[track_caller]
pub fn screenshot(path: &str, alt: Option<&str>) -> Result<(), StoryError> {
    doc(DocEntry::screenshot(path, alt))
}

#[track_caller]
pub fn custom(name: &str, data: Value) -> Result<(), StoryError> {
    doc(DocEntry::custom(name, data))
}

/// Attach a file to the current step (or the story, before any step).
#[track_caller]
pub fn attach(name: &str, media_type: &str, path: &str) -> Result<(), StoryError> {
    doc(DocEntry::attachment(name, media_type, path))
}

#[track_caller]
pub fn attach_inline(
    name: &str,
    media_type: &str,
    body: &str,
    encoding: AttachmentEncoding,
) -> Result<(), StoryError> {
    doc(DocEntry::inline_attachment(name, media_type, body, encoding))
}

#[track_caller]
pub fn start_timer() -> Result<TimerToken, StoryError> {
    require()?.start_timer()
}

#[track_caller]
pub fn end_timer(token: TimerToken) -> Result<Option<u64>, StoryError> {
    require()?.end_timer(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enter;
    use storyline_recorder::Recorder;
    use storyline_schema::story::{Outcome, StoryOptions};

    #[test]
    fn marker_without_scope_points_at_caller() {
        let line = line!() + 1;
        let err = given("no story").err().expect("expected error");
        match err {
            StoryError::NotInitialized { location } => {
                assert!(location.file.ends_with("markers.rs"), "{location}");
                assert_eq!(location.line, line);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(note("x"), Err(StoryError::NotInitialized { .. })));
    }

    #[test]
    fn aliases_map_to_keywords() {
        let rec = Recorder::start("aliases", StoryOptions::new());
        let _g = enter(rec.clone());
        arrange("a").unwrap();
        setup("b").unwrap();
        context("c").unwrap();
        act("d").unwrap();
        execute("e").unwrap();
        action("f").unwrap();
        assert_that("g").unwrap();
        verify("h").unwrap();
        but("i").unwrap();
        let keywords: Vec<_> = rec.steps().iter().map(|s| s.keyword).collect();
        use StepKeyword::{But, Given, Then, When};
        assert_eq!(
            keywords,
            vec![Given, Given, Given, When, When, When, Then, Then, But]
        );
    }

    #[test]
    fn doc_helpers_attach_to_latest_step() {
        let rec = Recorder::start("docs", StoryOptions::new());
        let _g = enter(rec.clone());
        note("story level").unwrap();
        given("a cart").unwrap();
        table("items", &["sku", "qty"], &[&["A1", "2"]]).unwrap();
        code("payload", "{}", Some("json")).unwrap();
        link("docs", "https://example.com").unwrap();
        mermaid("graph TD; A-->B", Some("Flow")).unwrap();
        let record = rec.finalize(Outcome::passed()).unwrap();
        assert_eq!(record.docs, vec![DocEntry::note("story level")]);
        let kinds: Vec<_> = record.steps[0].docs.iter().map(DocEntry::kind).collect();
        assert_eq!(kinds, vec!["table", "code", "link", "mermaid"]);
    }

    #[test]
    fn attachments_bind_to_the_current_step() {
        let rec = Recorder::start("attachments", StoryOptions::new());
        let _g = enter(rec.clone());
        attach("fixture", "application/json", "fixtures/cart.json").unwrap();
        given("a cart").unwrap();
        attach_inline("stdout", "text/plain", "ok", AttachmentEncoding::Identity).unwrap();
        let record = rec.finalize(Outcome::passed()).unwrap();
        assert_eq!(
            record.docs,
            vec![DocEntry::attachment("fixture", "application/json", "fixtures/cart.json")]
        );
        assert_eq!(
            record.steps[0].docs,
            vec![DocEntry::inline_attachment("stdout", "text/plain", "ok", AttachmentEncoding::Identity)]
        );
    }

    #[test]
    fn run_records_wrapped_step() {
        let rec = Recorder::start("run", StoryOptions::new());
        let _g = enter(rec.clone());
        let sum = run(StepKeyword::When, "adding", || 5 + 3).unwrap();
        assert_eq!(sum, 8);
        let parsed = try_run(StepKeyword::Then, "parsing", || "x".parse::<u8>()).unwrap();
        assert!(parsed.is_err());
        let steps = rec.steps();
        assert!(steps[0].wrapped);
        assert!(steps[1].error.is_some());
    }
}
