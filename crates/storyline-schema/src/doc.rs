use serde::{Deserialize, Serialize};
use serde_json::Value;
use storyline_error::RenderError;

/// A unit of supplementary documentation attached to a step or a story.
///
/// Entries form a tree: a `Section` owns its children, nothing refers back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DocEntry {
    Note {
        text: String,
    },
    Tag {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    #[serde(rename = "kv")]
    KeyValue {
        key: String,
        value: Value,
    },
    Code {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Link {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Section {
        title: String,
        #[serde(default)]
        entries: Vec<DocEntry>,
    },
    Mermaid {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Screenshot {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
    Custom {
        name: String,
        #[serde(default)]
        data: Value,
    },
    /// A file on disk (`path`) or an inline `body`, described by its media type.
    Attachment {
        name: String,
        #[serde(rename = "mediaType")]
        media_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        encoding: Option<AttachmentEncoding>,
    },
}

/// How an inline attachment body is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttachmentEncoding {
    Base64,
    Identity,
}

impl DocEntry {
    pub fn note(text: impl Into<String>) -> Self {
        DocEntry::Note { text: text.into() }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        DocEntry::Tag {
            name: name.into(),
            value: None,
        }
    }

    pub fn tag_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        DocEntry::Tag {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn kv(key: impl Into<String>, value: impl Into<Value>) -> Self {
        DocEntry::KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Key/value entry from any serializable value; unserializable input becomes `null`.
    pub fn json(key: impl Into<String>, value: &impl Serialize) -> Self {
        DocEntry::KeyValue {
            key: key.into(),
            value: serde_json::to_value(value).unwrap_or(Value::Null),
        }
    }

    pub fn code(content: impl Into<String>, language: Option<&str>) -> Self {
        DocEntry::Code {
            content: content.into(),
            language: language.map(str::to_string),
            label: None,
        }
    }

    pub fn table<H, R, C>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: Into<String>,
    {
        DocEntry::Table {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
            label: None,
        }
    }

    pub fn link(url: impl Into<String>, text: Option<&str>) -> Self {
        DocEntry::Link {
            url: url.into(),
            text: text.map(str::to_string),
        }
    }

    pub fn section(title: impl Into<String>, entries: Vec<DocEntry>) -> Self {
        DocEntry::Section {
            title: title.into(),
            entries,
        }
    }

    pub fn mermaid(code: impl Into<String>) -> Self {
        DocEntry::Mermaid {
            code: code.into(),
            title: None,
        }
    }

    pub fn screenshot(path: impl Into<String>, alt: Option<&str>) -> Self {
        DocEntry::Screenshot {
            path: path.into(),
            alt: alt.map(str::to_string),
        }
    }

    pub fn custom(name: impl Into<String>, data: Value) -> Self {
        DocEntry::Custom {
            name: name.into(),
            data,
        }
    }

    /// Attachment referring to a file; an empty `path` records none.
    pub fn attachment(
        name: impl Into<String>,
        media_type: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        let path = path.into();
        DocEntry::Attachment {
            name: name.into(),
            media_type: media_type.into(),
            path: (!path.is_empty()).then_some(path),
            body: None,
            encoding: None,
        }
    }

    pub fn inline_attachment(
        name: impl Into<String>,
        media_type: impl Into<String>,
        body: impl Into<String>,
        encoding: AttachmentEncoding,
    ) -> Self {
        DocEntry::Attachment {
            name: name.into(),
            media_type: media_type.into(),
            path: None,
            body: Some(body.into()),
            encoding: Some(encoding),
        }
    }

    /// Attach a label (code, table) or title (mermaid). Other kinds are returned unchanged.
    pub fn labeled(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            DocEntry::Code { label, .. } | DocEntry::Table { label, .. } => {
                *label = Some(text.into())
            }
            DocEntry::Mermaid { title, .. } => *title = Some(text.into()),
            _ => {}
        }
        self
    }

    /// The serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            DocEntry::Note { .. } => "note",
            DocEntry::Tag { .. } => "tag",
            DocEntry::KeyValue { .. } => "kv",
            DocEntry::Code { .. } => "code",
            DocEntry::Table { .. } => "table",
            DocEntry::Link { .. } => "link",
            DocEntry::Section { .. } => "section",
            DocEntry::Mermaid { .. } => "mermaid",
            DocEntry::Screenshot { .. } => "screenshot",
            DocEntry::Custom { .. } => "custom",
            DocEntry::Attachment { .. } => "attachment",
        }
    }

    /// Check structural rules that serde cannot express.
    ///
    /// Every table row must be exactly as wide as its header. Sections are
    /// checked recursively.
    pub fn validate(&self) -> Result<(), RenderError> {
        match self {
            DocEntry::Table {
                headers,
                rows,
                label,
            } => {
                for (i, row) in rows.iter().enumerate() {
                    if row.len() != headers.len() {
                        return Err(RenderError::TableShape {
                            label: label.clone().unwrap_or_else(|| headers.join(", ")),
                            row: i,
                            expected: headers.len(),
                            found: row.len(),
                        });
                    }
                }
                Ok(())
            }
            DocEntry::Section { entries, .. } => entries.iter().try_for_each(DocEntry::validate),
            _ => Ok(()),
        }
    }
}
