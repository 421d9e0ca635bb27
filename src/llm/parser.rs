//! Turns completion text into structured results.
//!
//! The model is asked for JSON, but does not always comply. Strict parsing is
//! tried first; when it fails, a best-effort result is recovered from the raw
//! text. Nothing here returns an error: the worst case is an empty table list.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

use crate::llm::models::{ParsedResponse, SchemaResult, SqlResult, TableInfo};

pub const SQL_FALLBACK_EXPLANATION: &str = "SQL query generated from natural language";
pub const SCHEMA_FALLBACK_EXPLANATION: &str = "Database schema generated from description";

const RESERVED_COLUMN_WORDS: [&str; 4] = ["PRIMARY", "FOREIGN", "KEY", "CONSTRAINT"];

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```$").expect("valid fence regex")
});

pub fn parse_sql(raw: &str) -> ParsedResponse<SqlResult> {
    match parse_structured::<SqlResult>(raw) {
        Some(result) => ParsedResponse::Structured(result),
        None => {
            warn!("Model did not return JSON for SQL generation, using raw text");
            ParsedResponse::Fallback(SqlResult {
                sql_query: raw.trim().to_string(),
                explanation: Some(SQL_FALLBACK_EXPLANATION.to_string()),
                tables_involved: Value::Array(Vec::new()),
                extra: Default::default(),
            })
        }
    }
}

pub fn parse_schema(raw: &str) -> ParsedResponse<SchemaResult> {
    match parse_structured::<SchemaResult>(raw) {
        Some(result) => ParsedResponse::Structured(result),
        None => {
            warn!("Model did not return JSON for schema generation, treating it as DDL");
            ParsedResponse::Fallback(SchemaResult {
                schema: raw.trim().to_string(),
                explanation: Some(SCHEMA_FALLBACK_EXPLANATION.to_string()),
                tables: extract_tables_from_ddl(raw)
                    .into_iter()
                    .map(Value::from)
                    .collect(),
                recommendations: Value::Array(Vec::new()),
                extra: Default::default(),
            })
        }
    }
}

/// Strict JSON parse of the whole text, or of the body of a single fenced block.
fn parse_structured<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Some(value);
    }

    CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|body| serde_json::from_str::<T>(body.as_str().trim()).ok())
}

/// Line-oriented scan of DDL text for tables and their column names.
///
/// Each line starting with `CREATE TABLE` opens a table. Column names are
/// taken from definitions written inline after the opening parenthesis, and
/// from following lines that contain both `(` and `)`.
pub fn extract_tables_from_ddl(ddl: &str) -> Vec<TableInfo> {
    let mut tables = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in ddl.lines() {
        let line = line.trim();
        let upper = line.to_uppercase();

        if upper.starts_with("CREATE TABLE") {
            if let Some((name, columns)) = current.take() {
                tables.push(TableInfo { name, columns });
            }
            current = Some((table_name(line), inline_columns(line)));
            continue;
        }

        let Some((_, columns)) = current.as_mut() else {
            continue;
        };
        if line.is_empty() || line.starts_with("--") || line.starts_with("/*") {
            continue;
        }
        if line.contains('(') && line.contains(')') && !upper.starts_with("CREATE") {
            if let Some(column) = column_name(line) {
                columns.push(column);
            }
        }
    }

    if let Some((name, columns)) = current {
        tables.push(TableInfo { name, columns });
    }

    tables
}

/// Third token of a `CREATE TABLE` line, skipping `IF NOT EXISTS`.
fn table_name(line: &str) -> String {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut idx = 2;
    if tokens.len() > 4
        && tokens[2].eq_ignore_ascii_case("IF")
        && tokens[3].eq_ignore_ascii_case("NOT")
        && tokens[4].eq_ignore_ascii_case("EXISTS")
    {
        idx = 5;
    }

    tokens
        .get(idx)
        .map(|token| {
            let before_paren = token.split('(').next().unwrap_or_default();
            before_paren
                .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | ')' | ';'))
                .to_string()
        })
        .unwrap_or_default()
}

/// Column names defined on the `CREATE TABLE` line itself, e.g.
/// `CREATE TABLE posts (id INT, title TEXT);`.
fn inline_columns(line: &str) -> Vec<String> {
    let Some(open) = line.find('(') else {
        return Vec::new();
    };

    let mut definitions = Vec::new();
    let mut depth = 0usize;
    let mut start = open + 1;
    for (offset, ch) in line[open + 1..].char_indices() {
        let pos = open + 1 + offset;
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => {
                definitions.push(&line[start..pos]);
                start = line.len();
                break;
            }
            ')' => depth -= 1,
            ',' if depth == 0 => {
                definitions.push(&line[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    if start < line.len() {
        // Definition list continues on the next line
        definitions.push(&line[start..]);
    }

    definitions.into_iter().filter_map(column_name).collect()
}

fn column_name(definition: &str) -> Option<String> {
    let token = definition.split_whitespace().next()?;
    let name: String = token
        .chars()
        .filter(|&c| !matches!(c, ',' | '`' | '"'))
        .collect();

    if name.is_empty()
        || RESERVED_COLUMN_WORDS
            .iter()
            .any(|word| name.eq_ignore_ascii_case(word))
    {
        return None;
    }
    Some(name)
}
