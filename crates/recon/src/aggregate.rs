use std::collections::BTreeMap;

use crate::model::{Quantities, Record, RowId, TaskItemKey};
use crate::normalize::{coerce_number, normalize_text, Numeric};

/// Summed quantities for one (task, item) group.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateGroup {
    pub totals: Quantities,
    pub record_count: usize,
    pub record_ids: Vec<RowId>,
}

/// Material quantities summed per (task, item).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatedQuantities {
    groups: BTreeMap<TaskItemKey, AggregateGroup>,
    /// Non-empty quantity cells that failed to parse (counted as zero).
    pub coercion_warnings: usize,
    /// Records skipped because their task or item id was empty.
    pub excluded: Vec<RowId>,
}

impl AggregatedQuantities {
    /// Group for `key`, if any record contributed to it.
    pub fn get(&self, key: &TaskItemKey) -> Option<&AggregateGroup> {
        self.groups.get(key)
    }

    /// Totals for `key`; zero when no record contributed.
    pub fn total_for(&self, key: &TaskItemKey) -> Quantities {
        self.groups.get(key).map(|g| g.totals).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&TaskItemKey, &AggregateGroup)> {
        self.groups.iter()
    }

    /// Fold another aggregation into this one. Record ids are kept sorted so
    /// merging partitions in any order gives the same result.
    pub fn merge(&mut self, other: AggregatedQuantities) {
        for (key, group) in other.groups {
            let entry = self.groups.entry(key).or_default();
            entry.totals.add(&group.totals);
            entry.record_count += group.record_count;
            entry.record_ids.extend(group.record_ids);
            entry.record_ids.sort();
        }
        self.coercion_warnings += other.coercion_warnings;
        self.excluded.extend(other.excluded);
        self.excluded.sort();
    }
}

/// Group records by normalized (task, item) and sum the three quantity
/// fields (budgeted, actual, remaining). Missing or non-numeric cells
/// contribute zero. Records with an empty task or item id are excluded.
pub fn aggregate_quantities<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    task_field: &str,
    item_field: &str,
    qty_fields: [&str; 3],
) -> AggregatedQuantities {
    let mut out = AggregatedQuantities::default();

    for record in records {
        let task = normalize_text(record.value(task_field));
        let item = normalize_text(record.value(item_field));
        if task.is_empty() || item.is_empty() {
            out.excluded.push(record.id);
            continue;
        }

        let mut values = [0.0f64; 3];
        for (slot, field) in values.iter_mut().zip(qty_fields) {
            match coerce_number(record.value(field)) {
                Numeric::Number(n) => *slot = n,
                Numeric::Missing => {}
                Numeric::Invalid => {
                    out.coercion_warnings += 1;
                    log::debug!(
                        "row {}: '{}' value {:?} is not numeric, counted as 0",
                        record.id.0,
                        field,
                        record.value(field).to_text()
                    );
                }
            }
        }

        let entry = out.groups.entry(TaskItemKey { task, item }).or_default();
        entry.totals.add(&Quantities::new(values[0], values[1], values[2]));
        entry.record_count += 1;
        entry.record_ids.push(record.id);
    }

    if out.coercion_warnings > 0 {
        log::warn!(
            "{} non-numeric quantity values treated as 0 during aggregation",
            out.coercion_warnings
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    const QTY: [&str; 3] = ["target_qty", "act_qty", "remain_qty"];

    fn row(id: usize, task: &str, item: &str, b: Value, a: Value, r: Value) -> Record {
        Record::new(
            RowId(id),
            vec![
                ("task_id".into(), Value::text(task)),
                ("user_field_130".into(), Value::text(item)),
                ("target_qty".into(), b),
                ("act_qty".into(), a),
                ("remain_qty".into(), r),
            ],
        )
    }

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    #[test]
    fn sums_per_task_and_item() {
        let rows = vec![
            row(0, "T1", "I1", n(10.0), n(2.0), n(8.0)),
            row(1, "T1", "I1", n(5.0), n(1.0), n(4.0)),
            row(2, "T1", "I2", n(7.0), n(0.0), n(7.0)),
        ];
        let agg = aggregate_quantities(&rows, "task_id", "user_field_130", QTY);
        assert_eq!(agg.len(), 2);
        let g = agg.get(&TaskItemKey::new("T1", "I1")).unwrap();
        assert_eq!(g.totals, Quantities::new(15.0, 3.0, 12.0));
        assert_eq!(g.record_count, 2);
        assert_eq!(g.record_ids, vec![RowId(0), RowId(1)]);
    }

    #[test]
    fn keys_are_normalized_before_grouping() {
        let rows = vec![
            row(0, " T1", "I1 ", n(1.0), n(0.0), n(0.0)),
            row(1, "T1", "I1", n(2.0), n(0.0), n(0.0)),
        ];
        let agg = aggregate_quantities(&rows, "task_id", "user_field_130", QTY);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.total_for(&TaskItemKey::new("T1", "I1")).budgeted, 3.0);
    }

    #[test]
    fn missing_and_bad_values_count_as_zero() {
        let rows = vec![
            row(0, "T1", "I1", Value::Empty, Value::text("n/a"), n(4.0)),
            row(1, "T1", "I1", Value::text("6"), Value::Empty, Value::text("x")),
        ];
        let agg = aggregate_quantities(&rows, "task_id", "user_field_130", QTY);
        let g = agg.get(&TaskItemKey::new("T1", "I1")).unwrap();
        assert_eq!(g.totals, Quantities::new(6.0, 0.0, 4.0));
        assert_eq!(agg.coercion_warnings, 2);
    }

    #[test]
    fn absent_key_totals_zero() {
        let agg = aggregate_quantities(std::iter::empty(), "task_id", "user_field_130", QTY);
        assert!(agg.is_empty());
        assert!(agg.get(&TaskItemKey::new("T1", "I1")).is_none());
        assert_eq!(agg.total_for(&TaskItemKey::new("T1", "I1")), Quantities::default());
    }

    #[test]
    fn empty_item_is_excluded() {
        let rows = vec![
            row(0, "T1", "", n(1.0), n(1.0), n(1.0)),
            row(1, "", "I1", n(1.0), n(1.0), n(1.0)),
        ];
        let agg = aggregate_quantities(&rows, "task_id", "user_field_130", QTY);
        assert!(agg.is_empty());
        assert_eq!(agg.excluded, vec![RowId(0), RowId(1)]);
    }

    #[test]
    fn merge_matches_whole_aggregation() {
        let rows = vec![
            row(0, "T1", "I1", n(1.0), n(2.0), n(3.0)),
            row(1, "T2", "I1", n(4.0), n(5.0), n(6.0)),
            row(2, "T1", "I1", n(7.0), n(8.0), n(9.0)),
        ];
        let whole = aggregate_quantities(&rows, "task_id", "user_field_130", QTY);
        let mut left = aggregate_quantities(&rows[2..], "task_id", "user_field_130", QTY);
        left.merge(aggregate_quantities(&rows[..2], "task_id", "user_field_130", QTY));
        assert_eq!(left, whole);
    }
}
