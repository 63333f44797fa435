use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Record, RowId, Table};
use crate::normalize::{coerce_number, normalize_text, Numeric};

/// One (item, resource) → factor mapping from the norms table.
#[derive(Debug, Clone, PartialEq)]
pub struct NormsEntry {
    pub item: String,
    pub rsrc: String,
    /// `None` when the factor cell was empty or not numeric.
    pub factor: Option<f64>,
    pub row: RowId,
}

/// Result of looking up a factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormMatch {
    Found(f64),
    /// An entry exists but its factor is missing or not numeric.
    NonNumeric,
    Absent,
}

impl NormMatch {
    pub fn factor(self) -> Option<f64> {
        match self {
            Self::Found(f) => Some(f),
            Self::NonNumeric | Self::Absent => None,
        }
    }
}

/// A (item, resource) pair listed more than once. The first occurrence in
/// table order is the one used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormAmbiguity {
    pub item: String,
    pub rsrc: String,
    pub occurrences: usize,
    pub chosen_row: RowId,
    /// Whether the duplicates disagree on the factor.
    pub conflicting: bool,
}

/// A target record joined against the norms table.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedTarget {
    pub row_id: RowId,
    pub item: String,
    pub rsrc: String,
    pub norm: NormMatch,
}

#[derive(Debug, Clone, Default)]
pub struct NormsTable {
    /// First occurrence of each (item, resource), in table order.
    entries: Vec<NormsEntry>,
    index: HashMap<(String, String), usize>,
    pub ambiguities: Vec<NormAmbiguity>,
    /// Rows with an empty item or resource id.
    pub skipped: Vec<RowId>,
    /// Non-empty factor cells that failed to parse.
    pub coercion_warnings: usize,
}

impl NormsTable {
    /// Index a norms table. Item and resource ids are normalized like key
    /// fields. For duplicated (item, resource) pairs the first row wins and
    /// the duplication is recorded in `ambiguities`.
    pub fn from_table(table: &Table, item_field: &str, rsrc_field: &str, factor_field: &str) -> Self {
        let mut norms = NormsTable::default();
        let mut ambiguity_index: HashMap<usize, usize> = HashMap::new();

        for record in &table.records {
            let item = normalize_text(record.value(item_field));
            let rsrc = normalize_text(record.value(rsrc_field));
            if item.is_empty() || rsrc.is_empty() {
                norms.skipped.push(record.id);
                continue;
            }

            let factor = match coerce_number(record.value(factor_field)) {
                Numeric::Number(f) => Some(f),
                Numeric::Missing => None,
                Numeric::Invalid => {
                    norms.coercion_warnings += 1;
                    None
                }
            };

            let key = (item, rsrc);
            if let Some(&first) = norms.index.get(&key) {
                let chosen = &norms.entries[first];
                let conflicting = chosen.factor != factor;
                match ambiguity_index.get(&first) {
                    Some(&a) => {
                        let amb = &mut norms.ambiguities[a];
                        amb.occurrences += 1;
                        amb.conflicting |= conflicting;
                    }
                    None => {
                        ambiguity_index.insert(first, norms.ambiguities.len());
                        norms.ambiguities.push(NormAmbiguity {
                            item: key.0.clone(),
                            rsrc: key.1.clone(),
                            occurrences: 2,
                            chosen_row: chosen.row,
                            conflicting,
                        });
                    }
                }
                continue;
            }

            norms.index.insert(key.clone(), norms.entries.len());
            norms.entries.push(NormsEntry {
                item: key.0,
                rsrc: key.1,
                factor,
                row: record.id,
            });
        }

        for amb in &norms.ambiguities {
            log::warn!(
                "norms: ({}, {}) listed {} times{}; using row {}",
                amb.item,
                amb.rsrc,
                amb.occurrences,
                if amb.conflicting { " with different factors" } else { "" },
                amb.chosen_row.0
            );
        }
        if !norms.skipped.is_empty() {
            log::warn!("norms: {} rows without item or resource id skipped", norms.skipped.len());
        }

        norms
    }

    pub fn lookup(&self, item: &str, rsrc: &str) -> NormMatch {
        match self.index.get(&(item.to_string(), rsrc.to_string())) {
            Some(&i) => match self.entries[i].factor {
                Some(f) => NormMatch::Found(f),
                None => NormMatch::NonNumeric,
            },
            None => NormMatch::Absent,
        }
    }

    /// Entries for one item, in table order.
    pub fn entries_for_item<'a>(&'a self, item: &'a str) -> impl Iterator<Item = &'a NormsEntry> + 'a {
        self.entries.iter().filter(move |e| e.item == item)
    }

    pub fn entries(&self) -> &[NormsEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attach a factor (or its absence) to every target record by normalized
    /// (item, resource).
    pub fn join<'a>(
        &self,
        targets: impl IntoIterator<Item = &'a Record>,
        item_field: &str,
        rsrc_field: &str,
    ) -> Vec<JoinedTarget> {
        targets
            .into_iter()
            .map(|record| {
                let item = normalize_text(record.value(item_field));
                let rsrc = normalize_text(record.value(rsrc_field));
                let norm = self.lookup(&item, &rsrc);
                JoinedTarget {
                    row_id: record.id,
                    item,
                    rsrc,
                    norm,
                }
            })
            .collect()
    }
}
