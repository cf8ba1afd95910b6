use crate::Lines;
use itertools::Itertools;
use serde_json::Value;
use storyline_schema::doc::{AttachmentEncoding, DocEntry};

/// Render one doc entry. Every emitted line is prefixed with `indent`;
/// block entries (code, tables, sections) are set off by blank lines.
pub(crate) fn render(out: &mut Lines, entry: &DocEntry, indent: &str) {
    let line = |out: &mut Lines, text: &str| out.push(format!("{indent}{text}"));

    match entry {
        DocEntry::Note { text } => {
            for l in text.split('\n') {
                line(out, &format!("> {l}"));
            }
        }
        DocEntry::Tag { name, value } => match value {
            Some(v) => line(out, &format!("`{name}: {v}`")),
            None => line(out, &format!("`{name}`")),
        },
        DocEntry::KeyValue { key, value } => {
            line(out, &format!("- **{key}:** {}", scalar(value)));
        }
        DocEntry::Code {
            content,
            language,
            label,
        } => {
            out.blank();
            if let Some(label) = label {
                line(out, &format!("**{label}**"));
                out.blank();
            }
            line(out, &format!("```{}", language.as_deref().unwrap_or("")));
            for l in content.split('\n') {
                line(out, l);
            }
            line(out, "```");
            out.blank();
        }
        DocEntry::Table {
            headers,
            rows,
            label,
        } => {
            out.blank();
            if let Some(label) = label {
                line(out, &format!("**{label}**"));
                out.blank();
            }
            line(out, &table_row(headers));
            line(out, &format!("| {} |", headers.iter().map(|_| "---").join(" | ")));
            for row in rows {
                line(out, &table_row(row));
            }
            out.blank();
        }
        DocEntry::Link { url, text } => {
            line(out, &format!("[{}]({url})", text.as_deref().unwrap_or(url)));
        }
        DocEntry::Section { title, entries } => {
            out.blank();
            line(out, &format!("**{title}**"));
            out.blank();
            for child in entries {
                render(out, child, indent);
            }
            out.blank();
        }
        DocEntry::Mermaid { code, title } => {
            out.blank();
            if let Some(title) = title {
                line(out, &format!("**{title}**"));
                out.blank();
            }
            line(out, "```mermaid");
            for l in code.split('\n') {
                line(out, l);
            }
            line(out, "```");
            out.blank();
        }
        DocEntry::Screenshot { path, alt } => {
            line(out, &format!("![{}]({path})", alt.as_deref().unwrap_or("Screenshot")));
        }
        DocEntry::Custom { name, data } => {
            out.blank();
            line(out, &format!("**[{name}]**"));
            out.blank();
            line(out, "```json");
            let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
            for l in pretty.split('\n') {
                line(out, l);
            }
            line(out, "```");
            out.blank();
        }
        DocEntry::Attachment {
            name,
            media_type,
            path,
            body,
            encoding,
        } => match (path, body) {
            (Some(path), _) => line(out, &format!("📎 [{name}]({path}) `{media_type}`")),
            (None, Some(body)) if *encoding != Some(AttachmentEncoding::Base64) => {
                out.blank();
                line(out, &format!("**📎 {name}** `{media_type}`"));
                out.blank();
                line(out, "```");
                for l in body.split('\n') {
                    line(out, l);
                }
                line(out, "```");
                out.blank();
            }
            (None, Some(body)) => line(
                out,
                &format!("📎 {name} `{media_type}` (inline base64, {} chars)", body.len()),
            ),
            (None, None) => line(out, &format!("📎 {name} `{media_type}`")),
        },
    }
}

/// Strings as-is, everything else as compact JSON.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn table_row(cells: &[String]) -> String {
    format!("| {} |", cells.iter().map(|c| escape_cell(c)).join(" | "))
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', "<br>")
}
