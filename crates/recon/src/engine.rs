use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use crate::aggregate::aggregate_quantities;
use crate::assign::synthesize_equipment;
use crate::category::{Category, CategoryVocabulary};
use crate::changes::{changes_table, detect_changes, ChangedPair};
use crate::config::{fields, CompareConfig, DeriveConfig, DeriveMode, EmptyKeyPolicy, RunConfig};
use crate::derive::{derive_quantities, Derivation, DerivedRow, JoinFields};
use crate::error::ReconError;
use crate::model::{CompareSummary, DeriveSummary, Record, RowId, Table};
use crate::norms::{NormAmbiguity, NormsTable};
use crate::reconcile::{reconcile, Reconciliation};
use crate::schema::require_fields;
use crate::writeback::{annotate, write_back, WritebackFields};

/// Logical fields the activity input must carry for derivation.
pub const ACTIVITY_REQUIRED: [&str; 7] = [
    fields::TASK_ID,
    fields::RSRC_ID,
    fields::RSRC_TYPE,
    fields::TARGET_QTY,
    fields::ACT_QTY,
    fields::REMAIN_QTY,
    fields::ITEM_ID,
];

/// Logical fields the norms input must carry.
pub const NORMS_REQUIRED: [&str; 3] = [fields::NORM_ITEM_ID, fields::NORM_RSRC_ID, fields::NORM_FACTOR];

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub workflow: String,
    pub engine_version: String,
    pub run_at: String,
}

impl RunMeta {
    fn new(config_name: &str, workflow: &str) -> Self {
        Self {
            config_name: config_name.to_string(),
            workflow: workflow.to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Compare / changes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CompareResult {
    pub meta: RunMeta,
    pub reconciliation: Reconciliation,
    /// Populated by `run_changes` only.
    pub changed: Vec<ChangedPair>,
    pub summary: CompareSummary,
}

impl CompareResult {
    pub fn only_before_table(&self) -> Table {
        self.reconciliation.only_in_a_table("only_before")
    }

    pub fn only_after_table(&self) -> Table {
        self.reconciliation.only_in_b_table("only_after")
    }

    pub fn both_table(&self, config: &CompareConfig) -> Table {
        self.reconciliation.both_table("both", &config.suffixes)
    }

    pub fn changed_table(&self, config: &CompareConfig) -> Table {
        changes_table("changed", &self.changed, &self.reconciliation, &config.suffixes)
    }

    /// Machine-readable run report for `--json` output.
    pub fn report(&self) -> JsonValue {
        let mut report = json!({
            "meta": self.meta,
            "keys": self.reconciliation.keys,
            "summary": self.summary,
        });
        if self.meta.workflow == "changes" {
            report["changed"] = self
                .changed
                .iter()
                .map(|c| {
                    json!({
                        "key": c.pair.key.parts(),
                        "fields": c.changes.iter().map(|f| json!({
                            "field": f.field,
                            "before": f.before,
                            "after": f.after,
                        })).collect::<Vec<_>>(),
                    })
                })
                .collect();
        }
        report
    }
}

/// Only-in-before / only-in-after / in-both partition of two snapshots.
pub fn run_compare(
    config: &RunConfig,
    before: &Table,
    after: &Table,
) -> Result<CompareResult, ReconError> {
    let compare = config.compare_config()?;
    require_fields(before, &compare.keys)?;
    require_fields(after, &compare.keys)?;
    compare_inner(config, compare, before, after, false)
}

/// Same partition plus the subset of in-both pairs whose tracked fields changed.
pub fn run_changes(
    config: &RunConfig,
    before: &Table,
    after: &Table,
) -> Result<CompareResult, ReconError> {
    let compare = config.compare_config()?;
    for table in [before, after] {
        require_fields(table, &compare.keys)?;
        require_fields(table, &compare.tracked)?;
    }
    compare_inner(config, compare, before, after, true)
}

fn compare_inner(
    config: &RunConfig,
    compare: &CompareConfig,
    before: &Table,
    after: &Table,
    with_changes: bool,
) -> Result<CompareResult, ReconError> {
    let reconciliation = reconcile(before, after, &compare.keys, config.empty_keys)?;
    let changed = if with_changes {
        detect_changes(&reconciliation.both, &compare.tracked)
    } else {
        Vec::new()
    };

    let summary = CompareSummary {
        rows_a: before.len(),
        rows_b: after.len(),
        only_in_a: reconciliation.only_in_a.len(),
        only_in_b: reconciliation.only_in_b.len(),
        in_both: reconciliation.both.len(),
        changed: changed.len(),
        excluded_a: reconciliation.excluded_a.len(),
        excluded_b: reconciliation.excluded_b.len(),
    };

    Ok(CompareResult {
        meta: RunMeta::new(&config.name, if with_changes { "changes" } else { "compare" }),
        reconciliation,
        changed,
        summary,
    })
}

// ---------------------------------------------------------------------------
// Derive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DeriveResult {
    pub meta: RunMeta,
    /// Full activity table after write-back (or annotation).
    pub table: Table,
    pub derived: Vec<DerivedRow>,
    pub synthesized: Vec<RowId>,
    pub ambiguities: Vec<NormAmbiguity>,
    pub summary: DeriveSummary,
}

impl DeriveResult {
    /// Machine-readable run report for `--json` output. Invalid rows are
    /// listed by identity with the reason they were left unchanged.
    pub fn report(&self) -> JsonValue {
        let invalid: Vec<JsonValue> = self
            .derived
            .iter()
            .filter_map(|d| match d.outcome {
                Derivation::Invalid(reason) => Some(json!({
                    "row": d.row_id,
                    "task_id": d.task,
                    "item_id": d.item,
                    "rsrc_id": d.rsrc,
                    "reason": reason,
                })),
                Derivation::Valid(_) => None,
            })
            .collect();
        json!({
            "meta": self.meta,
            "summary": self.summary,
            "synthesized": self.synthesized,
            "ambiguities": self.ambiguities,
            "invalid": invalid,
        })
    }
}

/// Derive equipment quantities from material quantities and norms, then
/// merge them back into the activity table.
pub fn run_derive(
    config: &RunConfig,
    activity: &Table,
    norms_input: &Table,
) -> Result<DeriveResult, ReconError> {
    let derive = config.derive_config()?;
    require_fields(activity, &ACTIVITY_REQUIRED)?;
    require_fields(norms_input, &NORMS_REQUIRED)?;
    derive_inner(config, derive, activity, norms_input)
}

fn derive_inner(
    config: &RunConfig,
    derive: &DeriveConfig,
    activity: &Table,
    norms_input: &Table,
) -> Result<DeriveResult, ReconError> {
    let vocab = &config.categories;
    let norms = NormsTable::from_table(
        norms_input,
        fields::NORM_ITEM_ID,
        fields::NORM_RSRC_ID,
        fields::NORM_FACTOR,
    );

    let (working, synthesized) = if derive.synthesize {
        let s = synthesize_equipment(activity, &norms, vocab);
        (s.table, s.synthesized)
    } else {
        (activity.clone(), Vec::new())
    };

    let (material, equipment, other) = partition(&working, vocab);

    let aggregates = aggregate_quantities(
        material.iter().copied(),
        fields::TASK_ID,
        fields::ITEM_ID,
        fields::QUANTITIES,
    );
    let derived = derive_quantities(equipment.iter().copied(), &aggregates, &norms, JoinFields::LOGICAL);

    let table = match derive.mode {
        DeriveMode::Overwrite => write_back(&working, &derived, vocab, WritebackFields::LOGICAL)?.table,
        DeriveMode::Annotate => annotate(&working, &derived, vocab, WritebackFields::LOGICAL)?,
    };

    let mut invalid_counts: HashMap<String, usize> = HashMap::new();
    for row in &derived {
        if let Derivation::Invalid(reason) = row.outcome {
            *invalid_counts.entry(reason.as_str().to_string()).or_insert(0) += 1;
        }
    }
    let derived_valid = derived.iter().filter(|d| d.outcome.is_valid()).count();

    let summary = DeriveSummary {
        rows: table.len(),
        material_rows: material.len(),
        equipment_rows: equipment.len(),
        other_rows: other,
        synthesized: synthesized.len(),
        aggregate_groups: aggregates.len(),
        derived_valid,
        derived_invalid: derived.len() - derived_valid,
        invalid_counts,
        coercion_warnings: aggregates.coercion_warnings + norms.coercion_warnings,
        norm_entries: norms.len(),
        norm_ambiguities: norms.ambiguities.len(),
        norm_rows_skipped: norms.skipped.len(),
        excluded_material: aggregates.excluded.len(),
    };

    Ok(DeriveResult {
        meta: RunMeta::new(&config.name, "derive"),
        table,
        derived,
        synthesized,
        ambiguities: norms.ambiguities.clone(),
        summary,
    })
}

/// Material rows, equipment rows, and the count of everything else.
fn partition<'a>(table: &'a Table, vocab: &CategoryVocabulary) -> (Vec<&'a Record>, Vec<&'a Record>, usize) {
    let mut material = Vec::new();
    let mut equipment = Vec::new();
    let mut other = 0;
    for record in &table.records {
        match vocab.classify_record(record, fields::RSRC_TYPE) {
            Category::Material => material.push(record),
            Category::Equipment => equipment.push(record),
            Category::Other => other += 1,
        }
    }
    (material, equipment, other)
}

/// One human-readable line per configured workflow, plus the empty-key policy.
pub fn describe(config: &RunConfig) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(ref c) = config.compare {
        lines.push(format!(
            "compare: {} vs {} on [{}], tracking [{}]",
            c.before,
            c.after,
            c.keys.join(", "),
            c.tracked.join(", ")
        ));
    }
    if let Some(ref d) = config.derive {
        lines.push(format!(
            "derive: {} with norms {} → {} ({:?}{})",
            d.activity,
            d.norms,
            d.output_path(),
            d.mode,
            if d.synthesize { ", synthesize" } else { "" }
        ));
    }
    let policy = match config.empty_keys {
        EmptyKeyPolicy::Drop => "drop",
        EmptyKeyPolicy::Warn => "warn",
        EmptyKeyPolicy::Error => "error",
    };
    lines.push(format!("empty keys: {policy}"));
    lines
}
