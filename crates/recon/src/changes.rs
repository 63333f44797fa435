use crate::config::Suffixes;
use crate::model::{Table, Value};
use crate::normalize::normalize_text;
use crate::reconcile::{pairs_table, MatchedPair, Reconciliation};

/// Column listing which tracked fields changed, appended to the changes table.
pub const CHANGED_FIELDS_COLUMN: &str = "changed_fields";

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub before: Value,
    pub after: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangedPair {
    pub pair: MatchedPair,
    pub changes: Vec<FieldChange>,
}

/// Pairs where at least one tracked field differs after normalization.
/// Comparison is exact on the normalized text: no numeric tolerance, and an
/// empty cell never equals `0`.
pub fn detect_changes(both: &[MatchedPair], tracked: &[String]) -> Vec<ChangedPair> {
    both.iter()
        .filter_map(|pair| {
            let changes: Vec<FieldChange> = tracked
                .iter()
                .filter_map(|field| {
                    let before = pair.a.value(field);
                    let after = pair.b.value(field);
                    if normalize_text(before) == normalize_text(after) {
                        None
                    } else {
                        Some(FieldChange {
                            field: field.clone(),
                            before: before.clone(),
                            after: after.clone(),
                        })
                    }
                })
                .collect();
            if changes.is_empty() {
                None
            } else {
                Some(ChangedPair {
                    pair: pair.clone(),
                    changes,
                })
            }
        })
        .collect()
}

/// Flatten changed pairs like `Reconciliation::both_table`, plus a
/// `changed_fields` column.
pub fn changes_table(
    name: &str,
    changed: &[ChangedPair],
    recon: &Reconciliation,
    suffixes: &Suffixes,
) -> Table {
    let pairs: Vec<MatchedPair> = changed.iter().map(|c| c.pair.clone()).collect();
    let mut table = pairs_table(name, &pairs, &recon.keys, &recon.columns_a, &recon.columns_b, suffixes);
    table.ensure_column(CHANGED_FIELDS_COLUMN);
    for (record, change) in table.records.iter_mut().zip(changed) {
        let names: Vec<&str> = change.changes.iter().map(|c| c.field.as_str()).collect();
        record.set(CHANGED_FIELDS_COLUMN, Value::Text(names.join(", ")));
    }
    table
}
