use serde::Serialize;

use crate::aggregate::AggregatedQuantities;
use crate::config::fields;
use crate::model::{Quantities, Record, RowId, TaskItemKey};
use crate::norms::{JoinedTarget, NormMatch, NormsTable};
use crate::normalize::normalize_text;

/// Field names used to join equipment rows to aggregates and norms.
#[derive(Debug, Clone, Copy)]
pub struct JoinFields<'a> {
    pub task: &'a str,
    pub item: &'a str,
    pub rsrc: &'a str,
}

impl JoinFields<'static> {
    pub const LOGICAL: Self = Self {
        task: fields::TASK_ID,
        item: fields::ITEM_ID,
        rsrc: fields::RSRC_ID,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// No norms entry for (item, resource).
    NoNorm,
    /// A norms entry exists but its factor is not numeric.
    NonNumericFactor,
    /// No material records for (task, item).
    NoAggregate,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoNorm => "no_norm",
            Self::NonNumericFactor => "non_numeric_factor",
            Self::NoAggregate => "no_aggregate",
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Derivation {
    Valid(Quantities),
    Invalid(InvalidReason),
}

impl Derivation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn quantities(&self) -> Option<Quantities> {
        match self {
            Self::Valid(q) => Some(*q),
            Self::Invalid(_) => None,
        }
    }
}

/// Derivation outcome for one equipment record.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRow {
    pub row_id: RowId,
    pub task: String,
    pub item: String,
    pub rsrc: String,
    pub aggregate: Option<Quantities>,
    pub norm: NormMatch,
    pub outcome: Derivation,
}

/// Derive equipment quantities: aggregate(task, item) × factor(item, rsrc).
///
/// A row is `Valid` only when both the aggregate and a numeric factor are
/// present. The norm is checked first, so a row missing both reports
/// `NoNorm`. No rounding is applied.
pub fn derive_quantities<'a>(
    equipment: impl IntoIterator<Item = &'a Record>,
    aggregates: &AggregatedQuantities,
    norms: &NormsTable,
    join: JoinFields<'_>,
) -> Vec<DerivedRow> {
    let equipment: Vec<&Record> = equipment.into_iter().collect();
    let joined = norms.join(equipment.iter().copied(), join.item, join.rsrc);

    let derived: Vec<DerivedRow> = equipment
        .into_iter()
        .zip(joined)
        .map(|(record, target)| {
            let task = normalize_text(record.value(join.task));
            let JoinedTarget { item, rsrc, norm, .. } = target;

            let aggregate = aggregates
                .get(&TaskItemKey::new(task.as_str(), item.as_str()))
                .map(|g| g.totals);

            let outcome = match (norm, aggregate) {
                (NormMatch::Absent, _) => Derivation::Invalid(InvalidReason::NoNorm),
                (NormMatch::NonNumeric, _) => Derivation::Invalid(InvalidReason::NonNumericFactor),
                (NormMatch::Found(_), None) => Derivation::Invalid(InvalidReason::NoAggregate),
                (NormMatch::Found(factor), Some(totals)) => Derivation::Valid(totals.scaled(factor)),
            };

            if let Derivation::Invalid(reason) = outcome {
                log::debug!("row {}: ({task}, {item}, {rsrc}) not derived: {reason}", record.id.0);
            }

            DerivedRow {
                row_id: record.id,
                task,
                item,
                rsrc,
                aggregate,
                norm,
                outcome,
            }
        })
        .collect();

    let invalid = derived.iter().filter(|d| !d.outcome.is_valid()).count();
    if invalid > 0 {
        log::warn!("{invalid} of {} equipment rows could not be derived", derived.len());
    }

    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_quantities;
    use crate::model::{Table, Value};

    fn activity(rows: &[(&str, &str, &str, &str, f64)]) -> Table {
        Table::from_rows(
            "activity",
            vec![
                "task_id".into(),
                "rsrc_id".into(),
                "rsrc_type".into(),
                "user_field_130".into(),
                "target_qty".into(),
                "act_qty".into(),
                "remain_qty".into(),
            ],
            rows.iter()
                .map(|(t, r, ty, i, q)| {
                    vec![
                        Value::text(*t),
                        Value::text(*r),
                        Value::text(*ty),
                        Value::text(*i),
                        Value::Number(*q),
                        Value::Number(*q / 5.0),
                        Value::Number(*q - *q / 5.0),
                    ]
                })
                .collect(),
        )
    }

    fn norms(rows: &[(&str, &str, Value)]) -> NormsTable {
        let t = Table::from_rows(
            "norms",
            vec!["item_id".into(), "rsrc_id".into(), "factor".into()],
            rows.iter()
                .map(|(i, r, f)| vec![Value::text(*i), Value::text(*r), f.clone()])
                .collect(),
        );
        NormsTable::from_table(&t, "item_id", "rsrc_id", "factor")
    }

    fn run(act: &Table, norms: &NormsTable) -> Vec<DerivedRow> {
        let material: Vec<&Record> = act.records.iter().filter(|r| r.value("rsrc_type") == &Value::text("Material")).collect();
        let equipment: Vec<&Record> = act.records.iter().filter(|r| r.value("rsrc_type") == &Value::text("Nonlabor")).collect();
        let agg = aggregate_quantities(material, "task_id", "user_field_130", crate::config::fields::QUANTITIES);
        derive_quantities(equipment, &agg, norms, JoinFields::LOGICAL)
    }

    #[test]
    fn derives_material_times_factor() {
        let act = activity(&[
            ("T1", "M1", "Material", "I1", 10.0),
            ("T1", "M2", "Material", "I1", 5.0),
            ("T1", "R2", "Nonlabor", "I1", 0.0),
        ]);
        let out = run(&act, &norms(&[("I1", "R2", Value::Number(2.0))]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].row_id, RowId(2));
        let q = out[0].outcome.quantities().unwrap();
        assert_eq!(q.budgeted, 30.0);
        assert_eq!(q.budgeted, out[0].aggregate.unwrap().budgeted * 2.0);
        assert_eq!(q.actual, (10.0 / 5.0 + 5.0 / 5.0) * 2.0);
    }

    #[test]
    fn missing_norm_is_invalid_not_zero() {
        let act = activity(&[
            ("T1", "M1", "Material", "I9", 10.0),
            ("T1", "R2", "Nonlabor", "I9", 4.0),
        ]);
        let out = run(&act, &norms(&[("I1", "R2", Value::Number(2.0))]));
        assert_eq!(out[0].outcome, Derivation::Invalid(InvalidReason::NoNorm));
        assert!(out[0].outcome.quantities().is_none());
        assert!(out[0].aggregate.is_some());
    }

    #[test]
    fn missing_aggregate_is_invalid() {
        let act = activity(&[
            ("T2", "M1", "Material", "I1", 10.0),
            ("T1", "R2", "Nonlabor", "I1", 4.0),
        ]);
        let out = run(&act, &norms(&[("I1", "R2", Value::Number(2.0))]));
        assert_eq!(out[0].outcome, Derivation::Invalid(InvalidReason::NoAggregate));
    }

    #[test]
    fn non_numeric_factor_is_invalid() {
        let act = activity(&[
            ("T1", "M1", "Material", "I1", 10.0),
            ("T1", "R2", "Nonlabor", "I1", 4.0),
        ]);
        let out = run(&act, &norms(&[("I1", "R2", Value::text("n/a"))]));
        assert_eq!(out[0].outcome, Derivation::Invalid(InvalidReason::NonNumericFactor));
    }

    #[test]
    fn zero_factor_is_a_valid_zero() {
        let act = activity(&[
            ("T1", "M1", "Material", "I1", 10.0),
            ("T1", "R2", "Nonlabor", "I1", 4.0),
        ]);
        let out = run(&act, &norms(&[("I1", "R2", Value::Number(0.0))]));
        assert_eq!(out[0].outcome, Derivation::Valid(Quantities::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn factor_depends_on_resource() {
        let act = activity(&[
            ("T1", "M1", "Material", "I1", 10.0),
            ("T1", "R2", "Nonlabor", "I1", 0.0),
            ("T1", "R3", "Nonlabor", "I1", 0.0),
        ]);
        let out = run(
            &act,
            &norms(&[("I1", "R2", Value::Number(2.0)), ("I1", "R3", Value::Number(0.25))]),
        );
        assert_eq!(out[0].outcome.quantities().unwrap().budgeted, 20.0);
        assert_eq!(out[1].outcome.quantities().unwrap().budgeted, 2.5);
    }
}
