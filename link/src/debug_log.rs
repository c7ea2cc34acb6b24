//! File-based query log.
//!
//! Each executed statement is reconstructed with its parameters inlined as
//! escaped literals and appended as `<timestamp> <sql>`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tablerow_core::{DATETIME_FORMAT, Params, escape_literal};

/// Quoted literals and identifiers are matched as a whole so that
/// placeholder-like text inside them is skipped; only group 1 is a real
/// placeholder.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|`[^`]*`|[:@$]([A-Za-z_][A-Za-z0-9_]*)"#)
        .expect("static regex must compile")
});

/// Inlines bound parameters into `sql` for display.
///
/// Placeholders without a matching parameter, and anything inside quotes,
/// are left untouched.
pub fn substitute(sql: &str, params: &Params) -> String {
    if params.is_empty() {
        return sql.to_string();
    }
    PLACEHOLDER_RE
        .replace_all(sql, |caps: &Captures<'_>| {
            let Some(bare) = caps.get(1).map(|m| m.as_str()) else {
                return caps[0].to_string();
            };
            params
                .iter()
                .find(|(key, _)| key.trim_start_matches([':', '@', '$']) == bare)
                .map(|(_, value)| escape_literal(value))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Appends one timestamped line to the log at `path`.
pub fn append(path: &Path, sql: &str) -> std::io::Result<()> {
    let stamp = chrono::Local::now().format(DATETIME_FORMAT);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{stamp} {sql}")
}
