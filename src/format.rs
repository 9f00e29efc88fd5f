//! Human-readable rendering of decoded JSON responses.
//!
//! Values are classified once into a [`Shape`] and rendered as Markdown-like
//! text: key/value tables, bullet lists, row tables and headed sections.
//! Tables that would overflow the terminal fall back to narrower layouts.

use serde_json::{Map, Value};

use crate::naming::parameter_to_option_name;

/// Structures reached at this depth or deeper are printed as compact JSON.
pub const MAX_DEPTH: usize = 4;

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("api", "API"),
    ("cpu", "CPU"),
    ("css", "CSS"),
    ("dns", "DNS"),
    ("gpu", "GPU"),
    ("html", "HTML"),
    ("http", "HTTP"),
    ("https", "HTTPS"),
    ("id", "ID"),
    ("ids", "IDs"),
    ("ip", "IP"),
    ("json", "JSON"),
    ("os", "OS"),
    ("ram", "RAM"),
    ("sdk", "SDK"),
    ("sql", "SQL"),
    ("ssl", "SSL"),
    ("tls", "TLS"),
    ("ttl", "TTL"),
    ("ui", "UI"),
    ("uri", "URI"),
    ("url", "URL"),
    ("urls", "URLs"),
    ("utc", "UTC"),
    ("uuid", "UUID"),
    ("xml", "XML"),
];

/// Structural classification of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    EmptyMap,
    EmptyList,
    /// Map whose values are all scalars
    SimpleObject,
    /// Map with at least one map or list value
    NestedObject,
    ScalarList,
    /// Non-empty maps that all share the same key set
    HomogeneousTable,
    HeterogeneousList,
}

impl Shape {
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::Object(map) if map.is_empty() => Self::EmptyMap,
            Value::Object(map) if map.values().all(is_scalar) => Self::SimpleObject,
            Value::Object(_) => Self::NestedObject,
            Value::Array(items) if items.is_empty() => Self::EmptyList,
            Value::Array(items) if items.iter().all(is_scalar) => Self::ScalarList,
            Value::Array(items) if is_homogeneous(items) => Self::HomogeneousTable,
            Value::Array(_) => Self::HeterogeneousList,
            _ => Self::Scalar,
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn is_homogeneous(items: &[Value]) -> bool {
    let Some(Value::Object(first)) = items.first() else {
        return false;
    };
    if first.is_empty() {
        return false;
    }
    items.iter().all(|item| match item {
        Value::Object(map) => map.len() == first.len() && map.keys().all(|k| first.contains_key(k)),
        _ => false,
    })
}

/// Renders JSON values for a terminal of an optional width.
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanReadableFormatter {
    width: Option<usize>,
}

impl HumanReadableFormatter {
    pub fn new(width: Option<usize>) -> Self {
        Self { width }
    }

    pub fn format(&self, value: &Value) -> String {
        self.format_at(value, 0)
    }

    fn format_at(&self, value: &Value, depth: usize) -> String {
        if depth >= MAX_DEPTH && !is_scalar(value) {
            return value.to_string();
        }
        match (Shape::classify(value), value) {
            (Shape::EmptyMap, _) => "(empty)".to_string(),
            (Shape::EmptyList, _) => "(empty list)".to_string(),
            (Shape::SimpleObject, Value::Object(map)) => self.simple_object(map),
            (Shape::NestedObject, Value::Object(map)) => self.nested_object(map, depth),
            (Shape::ScalarList, Value::Array(items)) => items
                .iter()
                .map(|item| format!("- {}", scalar(item).replace(['\r', '\n'], " ")))
                .collect::<Vec<_>>()
                .join("\n"),
            (Shape::HomogeneousTable, Value::Array(items)) => self.table(items),
            (Shape::HeterogeneousList, Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    format!("{} Item {}\n\n{}", heading(depth), i + 1, self.format_at(item, depth + 1))
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
            _ => scalar(value),
        }
    }

    fn fits(&self, lines: &[String]) -> bool {
        match self.width {
            Some(width) => lines.iter().all(|l| l.chars().count() <= width),
            None => true,
        }
    }

    fn simple_object(&self, map: &Map<String, Value>) -> String {
        let pairs: Vec<(String, String)> = map.iter().map(|(k, v)| (humanize_key(k), cell(v))).collect();
        self.pairs(&pairs)
    }

    /// Two-column `| Key | value |` rows, or `Key: value` lines when too wide.
    fn pairs(&self, pairs: &[(String, String)]) -> String {
        let rows = pair_rows(pairs);
        if self.fits(&rows) {
            rows.join("\n")
        } else {
            pair_lines(pairs).join("\n")
        }
    }

    fn nested_object(&self, map: &Map<String, Value>, depth: usize) -> String {
        map.iter()
            .map(|(key, value)| {
                format!("{} {}\n\n{}", heading(depth), humanize_key(key), self.format_at(value, depth + 1))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn table(&self, items: &[Value]) -> String {
        let Some(Value::Object(first)) = items.first() else {
            return String::new();
        };
        let columns: Vec<&String> = first.keys().collect();
        let headers: Vec<String> = columns.iter().map(|c| humanize_key(c)).collect();
        let rows: Vec<Vec<String>> = items
            .iter()
            .map(|item| columns.iter().map(|c| cell(&item[c.as_str()])).collect())
            .collect();

        let widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                rows.iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = Vec::with_capacity(rows.len() + 2);
        lines.push(table_row(&headers, &widths));
        lines.push(format!(
            "|{}|",
            widths.iter().map(|w| "-".repeat(w + 2)).collect::<Vec<_>>().join("|")
        ));
        lines.extend(rows.iter().map(|r| table_row(r, &widths)));
        if self.fits(&lines) {
            return lines.join("\n");
        }

        // Too wide: one card per row, all cards sharing one layout
        let cards: Vec<Vec<(String, String)>> = rows
            .iter()
            .map(|row| headers.iter().cloned().zip(row.iter().cloned()).collect())
            .collect();
        let as_tables = cards.iter().all(|card| self.fits(&pair_rows(card)));
        cards
            .iter()
            .map(|card| {
                if as_tables {
                    pair_rows(card).join("\n")
                } else {
                    pair_lines(card).join("\n")
                }
            })
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

fn pair_rows(pairs: &[(String, String)]) -> Vec<String> {
    pairs.iter().map(|(k, v)| format!("| {k} | {v} |")).collect()
}

fn pair_lines(pairs: &[(String, String)]) -> Vec<String> {
    pairs.iter().map(|(k, v)| format!("{k}: {v}")).collect()
}

fn heading(depth: usize) -> String {
    "#".repeat((depth + 1).min(6))
}

fn table_row(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(c, &w)| format!(" {c:<w$} "))
        .collect();
    format!("|{}|", padded.join("|"))
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => "(empty)".to_string(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A single-line table cell; structures are compact JSON.
fn cell(value: &Value) -> String {
    let text = if is_scalar(value) { scalar(value) } else { value.to_string() };
    text.replace(['\r', '\n'], " ").replace('|', "\\|")
}

/// `created_at` / `createdAt` / `user-id` → `Created At` / `User ID`.
pub fn humanize_key(key: &str) -> String {
    if let Some(abbr) = abbreviation(key) {
        return abbr.to_string();
    }
    parameter_to_option_name(key)
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|word| match abbreviation(word) {
            Some(abbr) => abbr.to_string(),
            None => capitalize(word),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn abbreviation(word: &str) -> Option<&'static str> {
    let lower = word.to_lowercase();
    ABBREVIATIONS
        .iter()
        .find(|(k, _)| *k == lower)
        .map(|(_, v)| *v)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
