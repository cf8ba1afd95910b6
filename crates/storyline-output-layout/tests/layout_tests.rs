//! Routing snapshots to documents.

use proptest::prelude::*;
use std::path::PathBuf;
use storyline_config::{OutputRule, SortOrder};
use storyline_output_layout::{DEFAULT_AGGREGATED_FILE, plan};
use storyline_schema::report::OutputMode;
use storyline_testkit::{StoryBuilder, snapshot, story};

fn titles(doc: &storyline_schema::report::ReportDocument) -> Vec<&str> {
    doc.stories.iter().map(|s| s.title.as_str()).collect()
}

#[test]
fn no_rules_aggregates_everything_into_the_default_file() {
    let snap = snapshot(vec![story("tests/b.rs", "b", 1), story("tests/a.rs", "a", 1)]);
    let docs = plan(&snap, &[], SortOrder::Source).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].path, PathBuf::from(DEFAULT_AGGREGATED_FILE));
    assert_eq!(docs[0].mode, OutputMode::Aggregated);
    assert_eq!(titles(&docs[0]), vec!["a", "b"]);
}

#[test]
fn aggregated_document_orders_by_file_then_source() {
    // completion order C, A, B
    let snap = snapshot(vec![
        story("tests/z.rs", "C", 5),
        story("tests/a.rs", "A", 30),
        story("tests/a.rs", "B", 40),
        story("tests/a.rs", "A0", 2),
    ]);
    let docs = plan(
        &snap,
        &[OutputRule::aggregated("**/*", "docs/all.md")],
        SortOrder::Source,
    )
    .unwrap();
    assert_eq!(titles(&docs[0]), vec!["A0", "A", "B", "C"]);
}

#[test]
fn colocated_rule_makes_one_document_per_file() {
    let snap = snapshot(vec![
        story("tests/orders.rs", "o2", 20),
        story("tests/users_test.rs", "u1", 3),
        story("tests/orders.rs", "o1", 10),
    ]);
    let docs = plan(&snap, &[OutputRule::colocated("**/*")], SortOrder::Source).unwrap();
    let paths: Vec<_> = docs.iter().map(|d| d.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            PathBuf::from("tests/orders.docs.md"),
            PathBuf::from("tests/users.docs.md"),
        ]
    );
    assert_eq!(titles(&docs[0]), vec!["o1", "o2"]);
    assert!(docs.iter().all(|d| d.mode == OutputMode::Colocated));
}

#[test]
fn mixed_rules_share_aggregated_targets() {
    let snap = snapshot(vec![
        story("tests/api/orders.rs", "orders", 1),
        story("tests/api/users.rs", "users", 1),
        story("tests/ui/home.rs", "home", 1),
    ]);
    let docs = plan(
        &snap,
        &[
            OutputRule::aggregated("tests/api/**", "docs/api.md"),
            OutputRule::colocated("tests/**").with_extension(".story.md"),
        ],
        SortOrder::Source,
    )
    .unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].path, PathBuf::from("docs/api.md"));
    assert_eq!(titles(&docs[0]), vec!["orders", "users"]);
    assert_eq!(docs[1].path, PathBuf::from("tests/ui/home.story.md"));
}

#[test]
fn title_and_registration_ordering() {
    let snap = snapshot(vec![
        story("tests/a.rs", "zeta", 1),
        story("tests/a.rs", "alpha", 2),
        StoryBuilder::new("tests/a.rs", "mid", 3).build(),
    ]);
    let by_title = plan(&snap, &[], SortOrder::Title).unwrap();
    assert_eq!(titles(&by_title[0]), vec!["alpha", "mid", "zeta"]);
    let as_registered = plan(&snap, &[], SortOrder::None).unwrap();
    assert_eq!(titles(&as_registered[0]), vec!["zeta", "alpha", "mid"]);
}

#[test]
fn invalid_rule_fails_the_plan() {
    let snap = snapshot(vec![story("tests/a.rs", "a", 1)]);
    assert!(plan(&snap, &[OutputRule::colocated("[")], SortOrder::Source).is_err());
}

proptest! {
    /// Every story lands in exactly one document under a catch-all rule.
    #[test]
    fn prop_catch_all_keeps_every_story(
        entries in proptest::collection::btree_set(("[a-c]", 1u32..50), 0..30)
    ) {
        let stories: Vec<_> = entries
            .iter()
            .map(|(file, line)| story(&format!("tests/{file}.rs"), &format!("{file}{line}"), *line))
            .collect();
        let total = stories.len();
        let snap = snapshot(stories);
        let docs = plan(&snap, &[OutputRule::colocated("**/*")], SortOrder::Source).unwrap();
        prop_assert_eq!(docs.iter().map(|d| d.stories.len()).sum::<usize>(), total);
        for doc in &docs {
            let lines: Vec<u32> = doc.stories.iter().map(|s| s.source.line).collect();
            let mut sorted = lines.clone();
            sorted.sort_unstable();
            prop_assert_eq!(lines, sorted);
        }
    }
}
