use std::collections::{HashMap, HashSet};

use crate::category::{Category, CategoryVocabulary};
use crate::config::fields;
use crate::derive::{Derivation, DerivedRow};
use crate::error::ReconError;
use crate::model::{RowId, Table, Value};

/// Where derived quantities land in the activity table.
#[derive(Debug, Clone, Copy)]
pub struct WritebackFields<'a> {
    pub rsrc_type: &'a str,
    /// Budgeted, actual, remaining.
    pub quantities: [&'a str; 3],
}

impl WritebackFields<'static> {
    pub const LOGICAL: Self = Self {
        rsrc_type: fields::RSRC_TYPE,
        quantities: fields::QUANTITIES,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct WritebackOutcome {
    pub table: Table,
    /// Equipment rows whose quantities were replaced.
    pub updated: usize,
    /// Equipment rows left as-is because their derivation was invalid.
    pub kept: usize,
}

/// Resolve each derived row to a position in `table`, checking that it
/// addresses an equipment row exactly once.
fn resolve_targets(
    table: &Table,
    derived: &[DerivedRow],
    vocab: &CategoryVocabulary,
    wb: WritebackFields<'_>,
) -> Result<Vec<usize>, ReconError> {
    let positions: HashMap<RowId, usize> = table
        .records
        .iter()
        .enumerate()
        .map(|(pos, r)| (r.id, pos))
        .collect();

    let mut seen = HashSet::with_capacity(derived.len());
    let mut targets = Vec::with_capacity(derived.len());

    for row in derived {
        let pos = *positions.get(&row.row_id).ok_or_else(|| {
            ReconError::Writeback(format!("row {} not present in {}", row.row_id, table.name))
        })?;
        let category = vocab.classify_record(&table.records[pos], wb.rsrc_type);
        if category != Category::Equipment {
            return Err(ReconError::Writeback(format!(
                "row {} is {category}, only equipment rows can be written back",
                row.row_id
            )));
        }
        if !seen.insert(row.row_id) {
            return Err(ReconError::Writeback(format!(
                "row {} derived more than once",
                row.row_id
            )));
        }
        targets.push(pos);
    }

    Ok(targets)
}

/// Replace the quantity fields of each validly derived equipment row.
///
/// The result has the same length, order and identities as `table`. Invalid
/// derivations and every non-equipment row are returned unchanged.
pub fn write_back(
    table: &Table,
    derived: &[DerivedRow],
    vocab: &CategoryVocabulary,
    wb: WritebackFields<'_>,
) -> Result<WritebackOutcome, ReconError> {
    let targets = resolve_targets(table, derived, vocab, wb)?;
    let mut out = table.clone();
    let mut updated = 0;
    let mut kept = 0;

    for (row, pos) in derived.iter().zip(targets) {
        match row.outcome {
            Derivation::Valid(q) => {
                let record = &mut out.records[pos];
                for (field, value) in wb.quantities.iter().zip([q.budgeted, q.actual, q.remaining]) {
                    record.set(field, Value::Number(value));
                }
                updated += 1;
            }
            Derivation::Invalid(_) => kept += 1,
        }
    }

    log::info!("{}: {updated} equipment rows updated, {kept} left unchanged", table.name);

    Ok(WritebackOutcome {
        table: out,
        updated,
        kept,
    })
}

/// Keep original quantities and add `calc_target_qty`, `calc_act_qty`,
/// `calc_remain_qty` and `calc_ok` columns. Calc columns are filled on
/// derived equipment rows (empty when invalid) and empty on all other rows.
pub fn annotate(
    table: &Table,
    derived: &[DerivedRow],
    vocab: &CategoryVocabulary,
    wb: WritebackFields<'_>,
) -> Result<Table, ReconError> {
    let targets = resolve_targets(table, derived, vocab, wb)?;
    let calc = [fields::CALC_TARGET_QTY, fields::CALC_ACT_QTY, fields::CALC_REMAIN_QTY];

    let mut out = table.clone();
    for column in calc.iter().chain([&fields::CALC_OK]) {
        out.ensure_column(column);
    }

    for (row, pos) in derived.iter().zip(targets) {
        let record = &mut out.records[pos];
        match row.outcome {
            Derivation::Valid(q) => {
                for (field, value) in calc.iter().zip([q.budgeted, q.actual, q.remaining]) {
                    record.set(field, Value::Number(value));
                }
                record.set(fields::CALC_OK, Value::text("true"));
            }
            Derivation::Invalid(_) => record.set(fields::CALC_OK, Value::text("false")),
        }
    }

    Ok(out)
}
