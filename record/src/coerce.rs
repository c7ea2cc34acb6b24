//! Per-column value coercion applied before values are bound.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tablerow_core::{DATETIME_FORMAT, Value};
use tracing::warn;

/// Zero-date sentinel written for the `"none"` marker.
pub const ZERO_DATE: &str = "0000-00-00 00:00:00";

/// Coercion family of a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    DateTime,
    Integer,
    Float,
    Other,
}

impl ColumnKind {
    /// Classifies a declared type such as `VARCHAR(20)` or `BIGINT UNSIGNED`.
    pub fn from_declared(declared: &str) -> Self {
        let lowered = declared.to_ascii_lowercase();
        let base = lowered
            .split(['(', ' '])
            .next()
            .unwrap_or_default();
        match base {
            "date" | "datetime" | "timestamp" => ColumnKind::DateTime,
            "int" | "integer" | "tinyint" | "smallint" | "mediumint" | "bigint" | "int2"
            | "int8" | "bool" | "boolean" | "bit" | "serial" | "bigserial" => ColumnKind::Integer,
            "float" | "double" | "real" | "decimal" | "numeric" => ColumnKind::Float,
            _ if lowered.starts_with("unsigned big int") => ColumnKind::Integer,
            _ => ColumnKind::Other,
        }
    }
}

/// Coerces `value` for a column declared as `declared`.
///
/// - date/datetime/timestamp: structured date-times, `"now"`, `"none"`
///   (zero date), `"null"`/null, epoch seconds, or any parseable date text,
///   normalized to `YYYY-MM-DD HH:MM:SS`
/// - integer and boolean families: integer cast
/// - float and decimal families: float cast
/// - anything else passes through
///
/// Null stays null for every kind.
pub fn process_value(value: &Value, declared: &str) -> Value {
    coerce(value, ColumnKind::from_declared(declared), Utc::now().naive_utc())
}

pub(crate) fn coerce(value: &Value, kind: ColumnKind, now: NaiveDateTime) -> Value {
    match kind {
        ColumnKind::DateTime => coerce_datetime(value, now),
        ColumnKind::Integer => coerce_integer(value),
        ColumnKind::Float => coerce_float(value),
        ColumnKind::Other => value.clone(),
    }
}

fn render(dt: NaiveDateTime) -> Value {
    Value::Text(dt.format(DATETIME_FORMAT).to_string())
}

fn from_epoch(secs: i64) -> Value {
    DateTime::<Utc>::from_timestamp(secs, 0).map_or(Value::Null, |dt| render(dt.naive_utc()))
}

fn coerce_datetime(value: &Value, now: NaiveDateTime) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::DateTime(dt) => render(*dt),
        Value::Integer(secs) => from_epoch(*secs),
        Value::Real(secs) => from_epoch(secs.trunc() as i64),
        Value::Blob(_) => value.clone(),
        Value::Text(text) => {
            let trimmed = text.trim();
            if trimmed.eq_ignore_ascii_case("now") {
                render(now)
            } else if trimmed.eq_ignore_ascii_case("none") {
                Value::Text(ZERO_DATE.to_string())
            } else if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                Value::Null
            } else if let Some(dt) = parse_datetime(trimmed) {
                render(dt)
            } else {
                warn!(value = trimmed, "unparseable date value coerced to null");
                Value::Null
            }
        }
    }
}

const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];

/// Best-effort parse of free-form date text.
fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if text.bytes().all(|b| b.is_ascii_digit()) {
        let compact = match text.len() {
            8 => NaiveDate::parse_from_str(text, "%Y%m%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            14 => NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S").ok(),
            _ => None,
        };
        if compact.is_some() {
            return compact;
        }
        return text
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    DATETIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .or_else(|| {
            DATE_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Leading numeric prefix of `text` (`"12abc"` → `"12"`).
fn numeric_prefix(text: &str, allow_fraction: bool) -> &str {
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in text.char_indices() {
        let ok = c.is_ascii_digit()
            || (i == 0 && (c == '-' || c == '+'))
            || (allow_fraction && c == '.' && !seen_dot);
        if !ok {
            break;
        }
        seen_dot |= c == '.';
        end = i + c.len_utf8();
    }
    &text[..end]
}

fn coerce_integer(value: &Value) -> Value {
    match value {
        Value::Null | Value::Integer(_) | Value::Blob(_) => value.clone(),
        Value::Real(f) => Value::Integer(f.trunc() as i64),
        Value::DateTime(dt) => Value::Integer(dt.and_utc().timestamp()),
        Value::Text(text) => {
            let trimmed = text.trim();
            let parsed = trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f.trunc() as i64))
                .or_else(|| numeric_prefix(trimmed, false).parse::<i64>().ok())
                .unwrap_or(0);
            Value::Integer(parsed)
        }
    }
}

fn coerce_float(value: &Value) -> Value {
    match value {
        Value::Null | Value::Real(_) | Value::Blob(_) => value.clone(),
        Value::Integer(i) => Value::Real(*i as f64),
        Value::DateTime(dt) => Value::Real(dt.and_utc().timestamp() as f64),
        Value::Text(text) => {
            let trimmed = text.trim();
            let parsed = trimmed
                .parse::<f64>()
                .ok()
                .or_else(|| numeric_prefix(trimmed, true).parse::<f64>().ok())
                .unwrap_or(0.0);
            Value::Real(parsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(ColumnKind::from_declared("DATETIME"), ColumnKind::DateTime);
        assert_eq!(ColumnKind::from_declared("timestamp"), ColumnKind::DateTime);
        assert_eq!(ColumnKind::from_declared("date"), ColumnKind::DateTime);
        assert_eq!(ColumnKind::from_declared("TINYINT(1)"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_declared("BIGINT UNSIGNED"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_declared("boolean"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_declared("DECIMAL(10,2)"), ColumnKind::Float);
        assert_eq!(ColumnKind::from_declared("REAL"), ColumnKind::Float);
        assert_eq!(ColumnKind::from_declared("VARCHAR(20)"), ColumnKind::Other);
        assert_eq!(ColumnKind::from_declared("POINT"), ColumnKind::Other);
        assert_eq!(ColumnKind::from_declared(""), ColumnKind::Other);
    }

    #[test]
    fn test_now_marker_uses_current_time() {
        let now = at(2024, 5, 6, 7, 8, 9);
        assert_eq!(
            coerce(&text("now"), ColumnKind::DateTime, now),
            text("2024-05-06 07:08:09")
        );
        assert_eq!(
            coerce(&text("NOW"), ColumnKind::DateTime, now),
            text("2024-05-06 07:08:09")
        );
    }

    #[test]
    fn test_now_via_process_value_has_fixed_layout() {
        let out = process_value(&text("now"), "datetime");
        let rendered = out.as_str().unwrap();
        assert!(NaiveDateTime::parse_from_str(rendered, DATETIME_FORMAT).is_ok());
        assert_eq!(rendered.len(), 19);
    }

    #[test]
    fn test_none_and_null_markers() {
        let now = at(2024, 1, 1, 0, 0, 0);
        assert_eq!(coerce(&text("none"), ColumnKind::DateTime, now), text(ZERO_DATE));
        assert_eq!(coerce(&text("null"), ColumnKind::DateTime, now), Value::Null);
        assert_eq!(coerce(&Value::Null, ColumnKind::DateTime, now), Value::Null);
    }

    #[test]
    fn test_epoch_integer() {
        let now = at(2024, 1, 1, 0, 0, 0);
        assert_eq!(
            coerce(&Value::Integer(0), ColumnKind::DateTime, now),
            text("1970-01-01 00:00:00")
        );
        assert_eq!(
            coerce(&Value::Integer(1_700_000_000), ColumnKind::DateTime, now),
            text("2023-11-14 22:13:20")
        );
    }

    #[test]
    fn test_digit_strings_prefer_compact_dates() {
        let now = at(2024, 1, 1, 0, 0, 0);
        assert_eq!(
            coerce(&text("20210704"), ColumnKind::DateTime, now),
            text("2021-07-04 00:00:00")
        );
        assert_eq!(
            coerce(&text("20210704103000"), ColumnKind::DateTime, now),
            text("2021-07-04 10:30:00")
        );
        assert_eq!(
            coerce(&text("1700000000"), ColumnKind::DateTime, now),
            text("2023-11-14 22:13:20")
        );
    }

    #[test]
    fn test_structured_and_parsed_dates() {
        let now = at(2024, 1, 1, 0, 0, 0);
        assert_eq!(
            coerce(&Value::DateTime(at(2020, 2, 29, 23, 59, 58)), ColumnKind::DateTime, now),
            text("2020-02-29 23:59:58")
        );
        assert_eq!(
            coerce(&text("2021-07-04"), ColumnKind::DateTime, now),
            text("2021-07-04 00:00:00")
        );
        assert_eq!(
            coerce(&text("2021-07-04T10:30:00+02:00"), ColumnKind::DateTime, now),
            text("2021-07-04 08:30:00")
        );
        assert_eq!(
            coerce(&text("2021-07-04 10:30"), ColumnKind::DateTime, now),
            text("2021-07-04 10:30:00")
        );
        assert_eq!(
            coerce(&text("not a date"), ColumnKind::DateTime, now),
            Value::Null
        );
    }

    #[test]
    fn test_integer_cast() {
        assert_eq!(process_value(&text("42"), "INTEGER"), Value::Integer(42));
        assert_eq!(process_value(&text("12abc"), "int"), Value::Integer(12));
        assert_eq!(process_value(&text("abc"), "int"), Value::Integer(0));
        assert_eq!(process_value(&Value::Real(3.9), "bigint"), Value::Integer(3));
        assert_eq!(process_value(&text("2.5"), "bool"), Value::Integer(2));
        assert_eq!(process_value(&Value::Null, "int"), Value::Null);
    }

    #[test]
    fn test_float_cast() {
        assert_eq!(process_value(&text("2.5"), "DECIMAL(4,1)"), Value::Real(2.5));
        assert_eq!(process_value(&Value::Integer(3), "real"), Value::Real(3.0));
        assert_eq!(process_value(&text("1.5kg"), "float"), Value::Real(1.5));
        assert_eq!(process_value(&text("x"), "double"), Value::Real(0.0));
    }

    #[test]
    fn test_other_types_pass_through() {
        assert_eq!(process_value(&text("now"), "TEXT"), text("now"));
        assert_eq!(process_value(&Value::Integer(5), "varchar(10)"), Value::Integer(5));
    }
}
