//! Key canonicalization and numeric coercion.
//!
//! Every comparison or join in the crate goes through [`normalize_text`], so
//! `" T1 "`, `"T1"` and a numeric cell holding `1` vs text `"1"` all land on
//! the same key.

use crate::config::EmptyKeyPolicy;
use crate::error::ReconError;
use crate::model::{CompositeKey, Record, Table, Value};

/// Text form of a value with surrounding whitespace removed.
pub fn normalize_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.trim().to_string(),
        other => other.to_text().trim().to_string(),
    }
}

/// Copy of `record` where every named field is text and trimmed.
/// Missing values become the empty string. Idempotent.
pub fn normalize_fields(record: &Record, fields: &[String]) -> Record {
    let mut out = record.clone();
    for field in fields {
        let text = normalize_text(record.value(field));
        out.set(field, Value::Text(text));
    }
    out
}

/// Composite key of `record`, or `None` if any component is empty after
/// normalization.
pub fn composite_key(record: &Record, fields: &[String]) -> Option<CompositeKey> {
    let mut parts = Vec::with_capacity(fields.len());
    for field in fields {
        let part = normalize_text(record.value(field));
        if part.is_empty() {
            return None;
        }
        parts.push(part);
    }
    Some(CompositeKey(parts))
}

/// Records of a table split into keyed and key-less rows.
#[derive(Debug)]
pub struct KeyedRecords<'a> {
    pub keyed: Vec<(CompositeKey, &'a Record)>,
    pub excluded: Vec<&'a Record>,
}

/// Compute composite keys for every record, applying `policy` to records
/// whose key is empty.
pub fn key_records<'a>(
    table: &'a Table,
    fields: &[String],
    policy: EmptyKeyPolicy,
) -> Result<KeyedRecords<'a>, ReconError> {
    let mut keyed = Vec::with_capacity(table.len());
    let mut excluded = Vec::new();

    for record in &table.records {
        match composite_key(record, fields) {
            Some(key) => keyed.push((key, record)),
            None => match policy {
                EmptyKeyPolicy::Error => {
                    return Err(ReconError::EmptyKey {
                        input: table.name.clone(),
                        row: record.id.0,
                    });
                }
                EmptyKeyPolicy::Warn => {
                    log::warn!(
                        "{} row {}: empty composite key on {:?}, row excluded",
                        table.name,
                        record.id.0,
                        fields
                    );
                    excluded.push(record);
                }
                EmptyKeyPolicy::Drop => excluded.push(record),
            },
        }
    }

    if !excluded.is_empty() {
        log::debug!("{}: {} of {} rows excluded for empty keys", table.name, excluded.len(), table.len());
    }

    Ok(KeyedRecords { keyed, excluded })
}

// ---------------------------------------------------------------------------
// Numeric coercion
// ---------------------------------------------------------------------------

/// Outcome of coercing a cell to a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Number(f64),
    /// Empty cell.
    Missing,
    /// Non-empty cell that is not a number.
    Invalid,
}

impl Numeric {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Missing | Self::Invalid => None,
        }
    }
}

/// Coerce a cell to a number. Numeric cells pass through (non-finite values
/// are invalid); text is parsed with [`parse_number`].
pub fn coerce_number(value: &Value) -> Numeric {
    match value {
        Value::Empty => Numeric::Missing,
        Value::Number(n) if n.is_finite() => Numeric::Number(*n),
        Value::Number(_) => Numeric::Invalid,
        Value::Text(s) if s.trim().is_empty() => Numeric::Missing,
        Value::Text(s) => parse_number(s).map_or(Numeric::Invalid, Numeric::Number),
    }
}

/// Parse a quantity string.
///
/// Accepts plain decimal notation with an optional sign and exponent,
/// surrounded by optional whitespace. Anything else returns `None`:
/// decimal commas (`0,5`), thousands separators, accounting parentheses
/// and non-finite values are not numbers.
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Digits, one optional leading sign, '.', and an exponent are allowed
    let bytes = trimmed.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'0'..=b'9' | b'.' | b'e' | b'E' => {}
            b'-' | b'+' if i == 0 => {}
            b'-' | b'+' if matches!(bytes[i - 1], b'e' | b'E') => {}
            _ => return None,
        }
    }

    let value: f64 = trimmed.parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowId;

    fn rec(fields: &[(&str, Value)]) -> Record {
        Record::new(
            RowId(0),
            fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        )
    }

    fn keys() -> Vec<String> {
        vec!["task_id".into(), "rsrc_id".into()]
    }

    #[test]
    fn trims_and_coerces_to_text() {
        let r = rec(&[("task_id", Value::text("  T1 ")), ("rsrc_id", Value::Number(42.0))]);
        let n = normalize_fields(&r, &keys());
        assert_eq!(n.value("task_id"), &Value::text("T1"));
        assert_eq!(n.value("rsrc_id"), &Value::text("42"));
    }

    #[test]
    fn missing_becomes_empty_string() {
        let r = rec(&[("task_id", Value::Empty)]);
        let n = normalize_fields(&r, &keys());
        assert_eq!(n.value("task_id"), &Value::text(""));
        assert_eq!(n.value("rsrc_id"), &Value::text(""));
    }

    #[test]
    fn normalization_is_idempotent() {
        let r = rec(&[
            ("task_id", Value::text("\tT1\n")),
            ("rsrc_id", Value::Number(7.5)),
            ("other", Value::text("  untouched  ")),
        ]);
        let once = normalize_fields(&r, &keys());
        let twice = normalize_fields(&once, &keys());
        assert_eq!(once, twice);
        assert_eq!(once.value("other"), &Value::text("  untouched  "));
    }

    #[test]
    fn composite_key_rejects_empty_components() {
        let ok = rec(&[("task_id", Value::text(" T1")), ("rsrc_id", Value::text("R1 "))]);
        assert_eq!(
            composite_key(&ok, &keys()),
            Some(CompositeKey(vec!["T1".into(), "R1".into()]))
        );
        let partial = rec(&[("task_id", Value::text("T1")), ("rsrc_id", Value::text("   "))]);
        assert_eq!(composite_key(&partial, &keys()), None);
        let absent = rec(&[]);
        assert_eq!(composite_key(&absent, &keys()), None);
    }

    #[test]
    fn numeric_and_text_keys_match() {
        let a = rec(&[("task_id", Value::Number(1001.0)), ("rsrc_id", Value::text("R"))]);
        let b = rec(&[("task_id", Value::text("1001 ")), ("rsrc_id", Value::text("R"))]);
        assert_eq!(composite_key(&a, &keys()), composite_key(&b, &keys()));
    }

    #[test]
    fn key_records_policies() {
        let table = Table::from_rows(
            "before",
            keys(),
            vec![
                vec![Value::text("T1"), Value::text("R1")],
                vec![Value::text(""), Value::text("")],
            ],
        );
        let out = key_records(&table, &keys(), EmptyKeyPolicy::Drop).unwrap();
        assert_eq!(out.keyed.len(), 1);
        assert_eq!(out.excluded.len(), 1);
        assert_eq!(out.excluded[0].id, RowId(1));

        let out = key_records(&table, &keys(), EmptyKeyPolicy::Warn).unwrap();
        assert_eq!(out.excluded.len(), 1);

        let err = key_records(&table, &keys(), EmptyKeyPolicy::Error).unwrap_err();
        assert!(matches!(err, ReconError::EmptyKey { row: 1, .. }));
    }

    #[test]
    fn parse_number_basic() {
        assert_eq!(parse_number("123.45"), Some(123.45));
        assert_eq!(parse_number("-50"), Some(-50.0));
        assert_eq!(parse_number(" 1234.5 "), Some(1234.5));
        assert_eq!(parse_number("+.5"), Some(0.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("2.5E-1"), Some(0.25));
    }

    #[test]
    fn parse_number_rejects_text() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("N/A"), None);
        assert_eq!(parse_number("12abc"), None);
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn parse_number_rejects_comma_and_accounting_forms() {
        assert_eq!(parse_number("0,5"), None);
        assert_eq!(parse_number("1,5"), None);
        assert_eq!(parse_number("1,234.5"), None);
        assert_eq!(parse_number("(500)"), None);
        assert_eq!(parse_number("1 000"), None);
        assert_eq!(coerce_number(&Value::text("0,5")), Numeric::Invalid);
    }

    #[test]
    fn coerce_distinguishes_missing_from_invalid() {
        assert_eq!(coerce_number(&Value::Empty), Numeric::Missing);
        assert_eq!(coerce_number(&Value::text("  ")), Numeric::Missing);
        assert_eq!(coerce_number(&Value::text("abc")), Numeric::Invalid);
        assert_eq!(coerce_number(&Value::Number(f64::NAN)), Numeric::Invalid);
        assert_eq!(coerce_number(&Value::text("4")), Numeric::Number(4.0));
        assert_eq!(coerce_number(&Value::Number(0.0)), Numeric::Number(0.0));
    }
}
