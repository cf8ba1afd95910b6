use proptest::collection::{btree_map, btree_set, vec};
use proptest::option;
use proptest::prelude::*;
use serde_json::Value;
use storyline_ids::StoryId;
use storyline_schema::doc::{AttachmentEncoding, DocEntry};
use storyline_schema::story::{
    ErrorInfo, SourceLocation, Status, StepKeyword, StepMode, StoryRecord, StoryStep,
};

// ============================================================================
// Base Strategies
// ============================================================================

/// Short printable text, including the characters Markdown cares about.
pub fn strategy_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _|*`#>.-]{0,24}"
}

pub fn strategy_keyword() -> impl Strategy<Value = StepKeyword> {
    prop_oneof![
        Just(StepKeyword::Given),
        Just(StepKeyword::When),
        Just(StepKeyword::Then),
        Just(StepKeyword::And),
        Just(StepKeyword::But),
    ]
}

pub fn strategy_status() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Passed),
        Just(Status::Failed),
        Just(Status::Skipped),
        Just(Status::Todo),
        Just(Status::Pending),
    ]
}

/// Arbitrary JSON, floats included. Non-finite floats have no JSON form.
pub fn strategy_json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Value::from),
        strategy_text().prop_map(Value::String),
    ];
    leaf.prop_recursive(2, 12, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Value::Array),
            btree_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

pub fn strategy_source_location() -> impl Strategy<Value = SourceLocation> {
    ("tests/[a-z_]{1,12}\\.rs", 1u32..5000, 1u32..120)
        .prop_map(|(file, line, column)| SourceLocation::new(file, line, column))
}

pub fn strategy_error_info() -> impl Strategy<Value = ErrorInfo> {
    (strategy_text(), option::of(strategy_text())).prop_map(|(message, stack)| ErrorInfo {
        message,
        stack,
    })
}

// ============================================================================
// Doc entries
// ============================================================================

/// A table whose rows all match the header width. Row count varies freely.
pub fn strategy_table() -> impl Strategy<Value = DocEntry> {
    (1usize..5)
        .prop_flat_map(|width| {
            (
                vec(strategy_text(), width),
                vec(vec(strategy_text(), width), 0..5),
                option::of(strategy_text()),
            )
        })
        .prop_map(|(headers, rows, label)| DocEntry::Table {
            headers,
            rows,
            label,
        })
}

/// A file attachment or an inline one, never both.
pub fn strategy_attachment() -> impl Strategy<Value = DocEntry> {
    let media_type = prop_oneof![Just("text/plain"), Just("image/png"), Just("application/json")];
    prop_oneof![
        (strategy_text(), media_type.clone(), "[a-z/]{1,16}\\.(log|png)")
            .prop_map(|(name, mt, path)| DocEntry::attachment(name, mt, path)),
        (
            strategy_text(),
            media_type,
            strategy_text(),
            prop_oneof![Just(AttachmentEncoding::Base64), Just(AttachmentEncoding::Identity)],
        )
            .prop_map(|(name, mt, body, encoding)| DocEntry::inline_attachment(name, mt, body, encoding)),
    ]
}

/// Every variant except `Section`.
pub fn strategy_doc_leaf() -> impl Strategy<Value = DocEntry> {
    prop_oneof![
        strategy_text().prop_map(|text| DocEntry::Note { text }),
        (strategy_text(), option::of(strategy_text()))
            .prop_map(|(name, value)| DocEntry::Tag { name, value }),
        (strategy_text(), strategy_json_value())
            .prop_map(|(key, value)| DocEntry::KeyValue { key, value }),
        (
            strategy_text(),
            option::of("[a-z]{1,8}"),
            option::of(strategy_text())
        )
            .prop_map(|(content, language, label)| DocEntry::Code {
                content,
                language,
                label,
            }),
        strategy_table(),
        ("https://[a-z]{3,10}\\.dev/[a-z]{0,10}", option::of(strategy_text()))
            .prop_map(|(url, text)| DocEntry::Link { url, text }),
        (strategy_text(), option::of(strategy_text()))
            .prop_map(|(code, title)| DocEntry::Mermaid { code, title }),
        prop_oneof![
            ("[a-z/]{1,16}\\.png", option::of(strategy_text()))
                .prop_map(|(path, alt)| DocEntry::Screenshot { path, alt }),
            strategy_attachment(),
        ],
        ("[a-z-]{1,12}", strategy_json_value())
            .prop_map(|(name, data)| DocEntry::Custom { name, data }),
    ]
}

/// Any doc entry, with sections nested up to three levels deep.
pub fn strategy_doc_entry() -> impl Strategy<Value = DocEntry> {
    strategy_doc_leaf().prop_recursive(3, 24, 4, |inner| {
        (strategy_text(), vec(inner, 0..4))
            .prop_map(|(title, entries)| DocEntry::Section { title, entries })
    })
}

// ============================================================================
// Steps and stories
// ============================================================================

pub fn strategy_step() -> impl Strategy<Value = StoryStep> {
    (
        strategy_keyword(),
        strategy_text(),
        option::of(strategy_status()),
        option::of(0u64..100_000),
        vec(strategy_doc_entry(), 0..3),
        any::<bool>(),
        option::of(prop_oneof![Just(StepMode::Skip), Just(StepMode::Todo)]),
        option::of(strategy_error_info()),
    )
        .prop_map(
            |(keyword, text, status, duration_ms, docs, wrapped, mode, error)| StoryStep {
                keyword,
                text,
                status,
                duration_ms,
                docs,
                wrapped,
                mode,
                error,
            },
        )
}

pub fn strategy_story_record() -> impl Strategy<Value = StoryRecord> {
    (
        (
            "[A-Za-z ]{1,30}",
            strategy_source_location(),
            any::<u64>(),
            vec("[a-z]{1,10}", 0..3),
        ),
        vec(strategy_step(), 0..5),
        vec(strategy_doc_entry(), 0..3),
        btree_set("[a-z-]{1,10}", 0..3),
        vec("[A-Z]{2,4}-[0-9]{1,4}", 0..2),
        btree_map("[a-z]{1,8}", strategy_json_value(), 0..3),
        (strategy_status(), 0u64..1_000_000, option::of(strategy_error_info())),
    )
        .prop_map(
            |(
                (title, source, source_order, suite_path),
                steps,
                docs,
                tags,
                tickets,
                meta,
                (status, duration_ms, error),
            )| StoryRecord {
                id: StoryId::for_source(&source.file, &title, source.line, source.column),
                title,
                source,
                source_order,
                suite_path,
                steps,
                docs,
                tags,
                tickets,
                meta,
                status,
                duration_ms,
                error,
            },
        )
}
