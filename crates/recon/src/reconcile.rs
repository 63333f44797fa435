use std::collections::{BTreeMap, BTreeSet};

use crate::config::{EmptyKeyPolicy, Suffixes};
use crate::error::ReconError;
use crate::model::{CompositeKey, Record, Table, Value};
use crate::normalize::{key_records, normalize_fields};

/// A key present in both snapshots: one A record paired with one B record.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub key: CompositeKey,
    pub a: Record,
    pub b: Record,
}

/// Three-way partition of two snapshots by composite key.
///
/// Output records carry their original `RowId` and have their key fields
/// normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub keys: Vec<String>,
    pub columns_a: Vec<String>,
    pub columns_b: Vec<String>,
    pub only_in_a: Vec<Record>,
    pub only_in_b: Vec<Record>,
    pub both: Vec<MatchedPair>,
    /// Records whose key was empty after normalization.
    pub excluded_a: Vec<Record>,
    pub excluded_b: Vec<Record>,
}

/// Partition `a` and `b` by composite key.
///
/// `both` is an inner join: every (a, b) combination sharing a key is emitted,
/// outer order following A, inner order following B. `only_in_a` follows A
/// order, `only_in_b` follows B order.
pub fn reconcile(
    a: &Table,
    b: &Table,
    keys: &[String],
    policy: EmptyKeyPolicy,
) -> Result<Reconciliation, ReconError> {
    let keyed_a = key_records(a, keys, policy)?;
    let keyed_b = key_records(b, keys, policy)?;

    // B occurrences per key, in B order
    let mut b_index: BTreeMap<&CompositeKey, Vec<&Record>> = BTreeMap::new();
    for (key, record) in &keyed_b.keyed {
        b_index.entry(key).or_default().push(record);
    }

    let mut only_in_a = Vec::new();
    let mut both = Vec::new();
    let mut a_keys: BTreeSet<&CompositeKey> = BTreeSet::new();

    for (key, a_record) in &keyed_a.keyed {
        a_keys.insert(key);
        match b_index.get(key) {
            Some(matches) => {
                let a_norm = normalize_fields(a_record, keys);
                for b_record in matches {
                    both.push(MatchedPair {
                        key: key.clone(),
                        a: a_norm.clone(),
                        b: normalize_fields(b_record, keys),
                    });
                }
            }
            None => only_in_a.push(normalize_fields(a_record, keys)),
        }
    }

    let only_in_b: Vec<Record> = keyed_b
        .keyed
        .iter()
        .filter(|(key, _)| !a_keys.contains(key))
        .map(|(_, record)| normalize_fields(record, keys))
        .collect();

    log::info!(
        "reconciled {} ({} rows) against {} ({} rows): {} only in {}, {} only in {}, {} pairs",
        a.name,
        a.len(),
        b.name,
        b.len(),
        only_in_a.len(),
        a.name,
        only_in_b.len(),
        b.name,
        both.len(),
    );

    Ok(Reconciliation {
        keys: keys.to_vec(),
        columns_a: a.columns.clone(),
        columns_b: b.columns.clone(),
        only_in_a,
        only_in_b,
        both,
        excluded_a: keyed_a.excluded.into_iter().cloned().collect(),
        excluded_b: keyed_b.excluded.into_iter().cloned().collect(),
    })
}

impl Reconciliation {
    pub fn only_in_a_table(&self, name: &str) -> Table {
        Table {
            name: name.to_string(),
            columns: self.columns_a.clone(),
            records: self.only_in_a.clone(),
        }
    }

    pub fn only_in_b_table(&self, name: &str) -> Table {
        Table {
            name: name.to_string(),
            columns: self.columns_b.clone(),
            records: self.only_in_b.clone(),
        }
    }

    /// Flatten `both` into one table: key columns once, columns present on
    /// both sides suffixed, side-specific columns kept as-is.
    pub fn both_table(&self, name: &str, suffixes: &Suffixes) -> Table {
        pairs_table(name, &self.both, &self.keys, &self.columns_a, &self.columns_b, suffixes)
    }
}

/// Column layout of a flattened pair: (output column, side, source column).
pub(crate) fn pair_layout(
    keys: &[String],
    columns_a: &[String],
    columns_b: &[String],
    suffixes: &Suffixes,
) -> Vec<(String, Side, String)> {
    let mut layout = Vec::new();
    for column in columns_a {
        if keys.contains(column) {
            layout.push((column.clone(), Side::A, column.clone()));
        } else if columns_b.contains(column) {
            layout.push((format!("{column}{}", suffixes.before), Side::A, column.clone()));
        } else {
            layout.push((column.clone(), Side::A, column.clone()));
        }
    }
    for column in columns_b {
        if keys.contains(column) {
            if !columns_a.contains(column) {
                layout.push((column.clone(), Side::B, column.clone()));
            }
        } else if columns_a.contains(column) {
            layout.push((format!("{column}{}", suffixes.after), Side::B, column.clone()));
        } else {
            layout.push((column.clone(), Side::B, column.clone()));
        }
    }

    // A side-specific column may already carry a suffixed name
    let mut used = BTreeSet::new();
    for (output, side, _) in &mut layout {
        let suffix = match side {
            Side::A => &suffixes.before,
            Side::B => &suffixes.after,
        };
        while !used.insert(output.clone()) {
            output.push_str(suffix);
        }
    }
    layout
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    A,
    B,
}

pub(crate) fn pairs_table(
    name: &str,
    pairs: &[MatchedPair],
    keys: &[String],
    columns_a: &[String],
    columns_b: &[String],
    suffixes: &Suffixes,
) -> Table {
    let layout = pair_layout(keys, columns_a, columns_b, suffixes);
    let mut table = Table::new(name, layout.iter().map(|(out, _, _)| out.clone()).collect());
    for pair in pairs {
        let row: Vec<Value> = layout
            .iter()
            .map(|(_, side, source)| match side {
                Side::A => pair.a.value(source).clone(),
                Side::B => pair.b.value(source).clone(),
            })
            .collect();
        table.push_row(row);
    }
    table
}
