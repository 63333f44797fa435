use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Values + records
// ---------------------------------------------------------------------------

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Canonical text form. Numbers use shortest round-trip formatting, so
    /// `Number(1001.0)` renders as `1001`.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => format!("{n}"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Position of a record in the collection it was ingested into (or appended
/// to, for synthesized rows). Never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowId(pub usize);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An ordered field → value mapping with a stable identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RowId,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(id: RowId, fields: Vec<(String, Value)>) -> Self {
        Self { id, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, v)| v)
    }

    /// Value of `field`, or `Value::Empty` when the field is absent.
    pub fn value(&self, field: &str) -> &Value {
        static EMPTY: Value = Value::Empty;
        self.get(field).unwrap_or(&EMPTY)
    }

    /// Replace the value of `field`, appending the field if it is absent.
    pub fn set(&mut self, field: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.get(field).is_some()
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// One loaded input (or produced output): a named, ordered record batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Input label used in error messages (`before`, `activity`, `norms`...).
    pub name: String,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            records: Vec::new(),
        }
    }

    /// Build a table from positional rows. Each row gets `RowId(index)`.
    /// Missing trailing cells become `Value::Empty`; extra cells are dropped.
    pub fn from_rows(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut table = Self::new(name, columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Append a positional row and return its identity.
    pub fn push_row(&mut self, row: Vec<Value>) -> RowId {
        let mut cells = row.into_iter();
        let fields = self
            .columns
            .iter()
            .map(|c| (c.clone(), cells.next().unwrap_or_default()))
            .collect();
        self.push_record(fields)
    }

    /// Append a record built from named fields. Fields not in `columns` are
    /// ignored; columns not supplied are `Value::Empty`.
    pub fn push_record(&mut self, mut fields: Vec<(String, Value)>) -> RowId {
        let id = RowId(self.records.len());
        let ordered = self
            .columns
            .iter()
            .map(|c| {
                let value = fields
                    .iter()
                    .position(|(name, _)| name == c)
                    .map(|i| fields.swap_remove(i).1)
                    .unwrap_or_default();
                (c.clone(), value)
            })
            .collect();
        self.records.push(Record::new(id, ordered));
        id
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Add a column (filled with `Value::Empty`) if it does not exist yet.
    pub fn ensure_column(&mut self, column: &str) {
        if self.has_column(column) {
            return;
        }
        self.columns.push(column.to_string());
        for record in &mut self.records {
            record.fields.push((column.to_string(), Value::Empty));
        }
    }

    /// Rename columns in place (`from → to`). Unmapped columns keep their name.
    pub fn rename_columns(&mut self, mapping: &HashMap<String, String>) {
        for column in &mut self.columns {
            if let Some(to) = mapping.get(column.as_str()) {
                *column = to.clone();
            }
        }
        for record in &mut self.records {
            for (name, _) in &mut record.fields {
                if let Some(to) = mapping.get(name.as_str()) {
                    *name = to.clone();
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by identity. Records of freshly loaded tables sit at
    /// their own index; derived tables fall back to a scan.
    pub fn get(&self, id: RowId) -> Option<&Record> {
        match self.records.get(id.0) {
            Some(r) if r.id == id => Some(r),
            _ => self.records.iter().find(|r| r.id == id),
        }
    }

    /// Rendering of a table's records as positional rows, in column order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        self.records
            .iter()
            .map(move |r| self.columns.iter().map(|c| r.value(c)).collect())
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Ordered tuple of normalized key values. Never contains an empty component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CompositeKey(pub Vec<String>);

impl CompositeKey {
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Aggregate key = (task id, item id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskItemKey {
    pub task: String,
    pub item: String,
}

impl TaskItemKey {
    pub fn new(task: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            item: item.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Quantities
// ---------------------------------------------------------------------------

/// Budgeted / actual / remaining triple.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Quantities {
    pub budgeted: f64,
    pub actual: f64,
    pub remaining: f64,
}

impl Quantities {
    pub fn new(budgeted: f64, actual: f64, remaining: f64) -> Self {
        Self {
            budgeted,
            actual,
            remaining,
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            budgeted: self.budgeted * factor,
            actual: self.actual * factor,
            remaining: self.remaining * factor,
        }
    }

    pub fn add(&mut self, other: &Quantities) {
        self.budgeted += other.budgeted;
        self.actual += other.actual;
        self.remaining += other.remaining;
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompareSummary {
    pub rows_a: usize,
    pub rows_b: usize,
    pub only_in_a: usize,
    pub only_in_b: usize,
    pub in_both: usize,
    pub changed: usize,
    pub excluded_a: usize,
    pub excluded_b: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeriveSummary {
    pub rows: usize,
    pub material_rows: usize,
    pub equipment_rows: usize,
    pub other_rows: usize,
    pub synthesized: usize,
    pub aggregate_groups: usize,
    pub derived_valid: usize,
    pub derived_invalid: usize,
    pub invalid_counts: HashMap<String, usize>,
    pub coercion_warnings: usize,
    pub norm_entries: usize,
    pub norm_ambiguities: usize,
    pub norm_rows_skipped: usize,
    pub excluded_material: usize,
}
