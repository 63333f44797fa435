use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::category::CategoryVocabulary;
use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Logical field names
// ---------------------------------------------------------------------------

/// Field names the engine works with. Inputs are renamed to these by the
/// column mappings below before they reach the engine.
pub mod fields {
    pub const TASK_ID: &str = "task_id";
    pub const RSRC_ID: &str = "rsrc_id";
    pub const RSRC_TYPE: &str = "rsrc_type";
    pub const TARGET_QTY: &str = "target_qty";
    pub const ACT_QTY: &str = "act_qty";
    pub const REMAIN_QTY: &str = "remain_qty";
    pub const ITEM_ID: &str = "user_field_130";
    pub const TARGET_COST: &str = "target_cost";
    pub const ACT_COST: &str = "act_cost";
    pub const REMAIN_COST: &str = "remain_cost";

    pub const NORM_ITEM_ID: &str = "item_id";
    pub const NORM_RSRC_ID: &str = "rsrc_id";
    pub const NORM_FACTOR: &str = "factor";

    pub const CALC_TARGET_QTY: &str = "calc_target_qty";
    pub const CALC_ACT_QTY: &str = "calc_act_qty";
    pub const CALC_REMAIN_QTY: &str = "calc_remain_qty";
    pub const CALC_OK: &str = "calc_ok";

    /// Budgeted / actual / remaining, in that order.
    pub const QUANTITIES: [&str; 3] = [TARGET_QTY, ACT_QTY, REMAIN_QTY];
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub empty_keys: EmptyKeyPolicy,
    #[serde(default)]
    pub compare: Option<CompareConfig>,
    #[serde(default)]
    pub derive: Option<DeriveConfig>,
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default)]
    pub categories: CategoryVocabulary,
}

/// What to do with a record whose composite key is empty after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyKeyPolicy {
    /// Exclude silently (counted in the summary).
    Drop,
    /// Exclude, count, and log each row at warn level.
    #[default]
    Warn,
    /// Abort the run.
    Error,
}

// ---------------------------------------------------------------------------
// Compare workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompareConfig {
    pub before: String,
    pub after: String,
    #[serde(default = "default_keys")]
    pub keys: Vec<String>,
    #[serde(default = "default_tracked")]
    pub tracked: Vec<String>,
    #[serde(default)]
    pub suffixes: Suffixes,
    #[serde(default)]
    pub output: CompareOutput,
}

fn default_keys() -> Vec<String> {
    vec![fields::TASK_ID.into(), fields::RSRC_ID.into()]
}

fn default_tracked() -> Vec<String> {
    fields::QUANTITIES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Suffixes {
    pub before: String,
    pub after: String,
}

impl Default for Suffixes {
    fn default() -> Self {
        Self {
            before: "_before".into(),
            after: "_after".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompareOutput {
    pub only_before: String,
    pub only_after: String,
    pub both: String,
    pub changed: String,
}

impl Default for CompareOutput {
    fn default() -> Self {
        Self {
            only_before: "present_in_before_not_in_after.xlsx".into(),
            only_after: "present_in_after_not_in_before.xlsx".into(),
            both: "present_in_both.xlsx".into(),
            changed: "changed_in_both.xlsx".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Derive workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeriveConfig {
    pub activity: String,
    pub norms: String,
    /// Output path. `None` overwrites the activity file.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub mode: DeriveMode,
    /// Append equipment rows generated from the norms table before deriving.
    #[serde(default)]
    pub synthesize: bool,
}

impl DeriveConfig {
    pub fn output_path(&self) -> &str {
        self.output.as_deref().unwrap_or(&self.activity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeriveMode {
    /// Replace equipment quantities with derived values.
    #[default]
    Overwrite,
    /// Keep quantities, append `calc_*` columns.
    Annotate,
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub activity: ActivityColumns,
    pub norms: NormsColumns,
}

/// External column name for each logical activity field.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivityColumns {
    pub task_id: String,
    pub rsrc_id: String,
    pub rsrc_type: String,
    pub target_qty: String,
    pub act_qty: String,
    pub remain_qty: String,
    pub item_id: String,
    pub target_cost: String,
    pub act_cost: String,
    pub remain_cost: String,
}

impl Default for ActivityColumns {
    fn default() -> Self {
        Self {
            task_id: fields::TASK_ID.into(),
            rsrc_id: fields::RSRC_ID.into(),
            rsrc_type: fields::RSRC_TYPE.into(),
            target_qty: fields::TARGET_QTY.into(),
            act_qty: fields::ACT_QTY.into(),
            remain_qty: fields::REMAIN_QTY.into(),
            item_id: fields::ITEM_ID.into(),
            target_cost: fields::TARGET_COST.into(),
            act_cost: fields::ACT_COST.into(),
            remain_cost: fields::REMAIN_COST.into(),
        }
    }
}

impl ActivityColumns {
    fn pairs(&self) -> [(&str, &'static str); 10] {
        [
            (self.task_id.as_str(), fields::TASK_ID),
            (self.rsrc_id.as_str(), fields::RSRC_ID),
            (self.rsrc_type.as_str(), fields::RSRC_TYPE),
            (self.target_qty.as_str(), fields::TARGET_QTY),
            (self.act_qty.as_str(), fields::ACT_QTY),
            (self.remain_qty.as_str(), fields::REMAIN_QTY),
            (self.item_id.as_str(), fields::ITEM_ID),
            (self.target_cost.as_str(), fields::TARGET_COST),
            (self.act_cost.as_str(), fields::ACT_COST),
            (self.remain_cost.as_str(), fields::REMAIN_COST),
        ]
    }

    /// External → logical rename map (identity entries omitted).
    pub fn to_logical(&self) -> HashMap<String, String> {
        rename_map(self.pairs().iter().map(|(ext, logical)| (*ext, *logical)))
    }

    /// Logical → external rename map (identity entries omitted).
    pub fn to_external(&self) -> HashMap<String, String> {
        rename_map(self.pairs().iter().map(|(ext, logical)| (*logical, *ext)))
    }
}

/// External column name for each logical norms field.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormsColumns {
    pub item_id: String,
    pub rsrc_id: String,
    pub factor: String,
}

impl Default for NormsColumns {
    fn default() -> Self {
        Self {
            item_id: "BOQ Item No.".into(),
            rsrc_id: "Resource ID".into(),
            factor: "Qty/Unit (Norms)".into(),
        }
    }
}

impl NormsColumns {
    fn pairs(&self) -> [(&str, &'static str); 3] {
        [
            (self.item_id.as_str(), fields::NORM_ITEM_ID),
            (self.rsrc_id.as_str(), fields::NORM_RSRC_ID),
            (self.factor.as_str(), fields::NORM_FACTOR),
        ]
    }

    pub fn to_logical(&self) -> HashMap<String, String> {
        rename_map(self.pairs().iter().map(|(ext, logical)| (*ext, *logical)))
    }
}

fn rename_map<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> HashMap<String, String> {
    pairs
        .filter(|(from, to)| from != to)
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RunConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.compare.is_none() && self.derive.is_none() {
            return Err(ReconError::ConfigValidation(
                "config needs a [compare] or [derive] section".into(),
            ));
        }

        if let Some(ref compare) = self.compare {
            if compare.keys.is_empty() {
                return Err(ReconError::ConfigValidation("compare.keys must not be empty".into()));
            }
            if let Some(dup) = first_duplicate(compare.keys.iter().map(String::as_str)) {
                return Err(ReconError::ConfigValidation(format!(
                    "compare.keys lists '{dup}' twice"
                )));
            }
            if let Some(key) = compare.tracked.iter().find(|t| compare.keys.contains(t)) {
                return Err(ReconError::ConfigValidation(format!(
                    "compare.tracked field '{key}' is also a key field"
                )));
            }
            if compare.suffixes.before == compare.suffixes.after {
                return Err(ReconError::ConfigValidation(
                    "compare.suffixes.before and .after must differ".into(),
                ));
            }
        }

        let activity = self.columns.activity.pairs();
        if let Some(dup) = first_duplicate(activity.iter().map(|(ext, _)| *ext)) {
            return Err(ReconError::ConfigValidation(format!(
                "columns.activity maps '{dup}' to more than one field"
            )));
        }
        let norms = self.columns.norms.pairs();
        if let Some(dup) = first_duplicate(norms.iter().map(|(ext, _)| *ext)) {
            return Err(ReconError::ConfigValidation(format!(
                "columns.norms maps '{dup}' to more than one field"
            )));
        }

        self.categories.validate()
    }

    pub fn compare_config(&self) -> Result<&CompareConfig, ReconError> {
        self.compare
            .as_ref()
            .ok_or_else(|| ReconError::ConfigValidation("config has no [compare] section".into()))
    }

    pub fn derive_config(&self) -> Result<&DeriveConfig, ReconError> {
        self.derive
            .as_ref()
            .ok_or_else(|| ReconError::ConfigValidation("config has no [derive] section".into()))
    }
}

fn first_duplicate<'a>(items: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    items.into_iter().find(|item| !seen.insert(*item))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
