//! Equipment row synthesis from the norms table.
//!
//! Every material row implies, through the norms for its item, a set of
//! equipment resources the task needs. Missing ones are appended to the
//! working table with zero quantities so the derivation can fill them in.

use std::collections::HashSet;

use crate::category::{Category, CategoryVocabulary};
use crate::config::fields;
use crate::model::{RowId, Table, Value};
use crate::normalize::normalize_text;
use crate::norms::NormsTable;

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// Working table: the input rows followed by synthesized rows.
    pub table: Table,
    /// Identities of the appended rows, in append order.
    pub synthesized: Vec<RowId>,
}

/// Append one equipment row per (task, norm resource, item) implied by the
/// material rows, skipping combinations already present as equipment.
///
/// Synthesized rows copy task and item, take the resource id from the norms
/// entry, get `vocab.equipment_label` as resource type, `0` for quantity and
/// cost fields, and empty values everywhere else. Only columns already in
/// the table are written. Identities continue after the last input row.
pub fn synthesize_equipment(table: &Table, norms: &NormsTable, vocab: &CategoryVocabulary) -> Synthesis {
    let key_of = |task: &str, rsrc: &str, item: &str| (task.to_string(), rsrc.to_string(), item.to_string());

    let mut present: HashSet<(String, String, String)> = table
        .records
        .iter()
        .filter(|r| vocab.classify_record(r, fields::RSRC_TYPE) == Category::Equipment)
        .map(|r| {
            key_of(
                &normalize_text(r.value(fields::TASK_ID)),
                &normalize_text(r.value(fields::RSRC_ID)),
                &normalize_text(r.value(fields::ITEM_ID)),
            )
        })
        .collect();

    let mut planned: Vec<(String, String, String)> = Vec::new();
    for record in &table.records {
        if vocab.classify_record(record, fields::RSRC_TYPE) != Category::Material {
            continue;
        }
        let task = normalize_text(record.value(fields::TASK_ID));
        let item = normalize_text(record.value(fields::ITEM_ID));
        if task.is_empty() || item.is_empty() {
            continue;
        }
        for entry in norms.entries_for_item(&item) {
            let key = key_of(&task, &entry.rsrc, &item);
            if present.insert(key.clone()) {
                planned.push(key);
            }
        }
    }

    let mut out = table.clone();
    let mut synthesized = Vec::with_capacity(planned.len());
    let zero = || Value::Number(0.0);

    for (task, rsrc, item) in planned {
        let id = out.push_record(vec![
            (fields::TASK_ID.into(), Value::Text(task)),
            (fields::RSRC_ID.into(), Value::Text(rsrc)),
            (fields::RSRC_TYPE.into(), Value::text(vocab.equipment_label.as_str())),
            (fields::ITEM_ID.into(), Value::Text(item)),
            (fields::TARGET_QTY.into(), zero()),
            (fields::ACT_QTY.into(), zero()),
            (fields::REMAIN_QTY.into(), zero()),
            (fields::TARGET_COST.into(), zero()),
            (fields::ACT_COST.into(), zero()),
            (fields::REMAIN_COST.into(), zero()),
        ]);
        synthesized.push(id);
    }

    if !synthesized.is_empty() {
        log::info!("{}: synthesized {} equipment rows from norms", table.name, synthesized.len());
    }

    Synthesis {
        table: out,
        synthesized,
    }
}
