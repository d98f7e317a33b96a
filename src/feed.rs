//! Feed wire shapes and parsers.
//!
//! Two interchangeable feed shapes exist: a tabular file with a header row
//! (comma-separated, quote-aware) and a nested JSON document keyed by family
//! tag. This module only parses; normalization into catalog items lives in
//! the loader.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

/// One raw row of the tabular feed, keyed by the recognized column names.
/// Absent columns and empty cells both surface as empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularRecord {
    pub title: String,
    pub model_name: String,
    pub year: String,
    pub platform: String,
    pub context_note: String,
    pub confidence: String,
    pub direct_media_url: String,
    pub embed_url: String,
    pub page_url: String,
}

/// Parses the tabular feed. The first row is the header; data rows map cells
/// to columns by header name. Blank lines are skipped.
pub fn parse_tabular(text: &str) -> Result<Vec<TabularRecord>, String> {
    let rows = split_rows(text);
    let mut rows = rows.into_iter().filter(|row| !row_is_blank(row));
    let header = rows.next().ok_or("feed has no header row")?;
    let column_index: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(index, name)| (name.trim(), index))
        .collect();

    let cell = |row: &[String], name: &str| -> String {
        column_index
            .get(name)
            .and_then(|&index| row.get(index))
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    };

    let mut records = Vec::new();
    for row in rows {
        records.push(TabularRecord {
            title: cell(&row, "title"),
            model_name: cell(&row, "model_name"),
            year: cell(&row, "year"),
            platform: cell(&row, "platform"),
            context_note: cell(&row, "context_note"),
            confidence: cell(&row, "confidence"),
            direct_media_url: cell(&row, "direct_media_url"),
            embed_url: cell(&row, "embed_url"),
            page_url: cell(&row, "page_url"),
        });
    }
    Ok(records)
}

fn row_is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

/// Splits delimited text into rows of cells. Double-quoted cells may contain
/// commas, newlines, and doubled quotes.
fn split_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        cell.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => cell.push(ch),
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            ',' => {
                row.push(std::mem::take(&mut cell));
            }
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut cell));
                rows.push(std::mem::take(&mut row));
            }
            _ => cell.push(ch),
        }
    }
    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        rows.push(row);
    }
    rows
}

/// Nested feed: one document keyed by family tag. Unknown keys are ignored.
pub type NestedDocument = HashMap<String, NestedFamily>;

/// One family's entry in the nested feed. `models` and `examples` stay
/// `None` when the field is absent; a family with neither is hidden from the
/// surface, which is why absence and emptiness are kept distinct here.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NestedFamily {
    pub models: Option<Vec<NestedModel>>,
    pub examples: Option<Vec<NestedExample>>,
}

/// Static catalog metadata for one model; not playable.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NestedModel {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub year: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub paper: Option<NestedPaper>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NestedPaper {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub cite: Option<String>,
}

/// One playable example, already tagged with its family by its position in
/// the document.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NestedExample {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub year: Option<String>,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

pub fn parse_nested(text: &str) -> Result<NestedDocument, String> {
    serde_json::from_str(text).map_err(|err| format!("invalid nested feed document: {}", err))
}

/// Feeds write years as either strings or bare numbers; both normalize to a
/// string.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => {
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        }
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}
