use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::{Record, Value};
use crate::normalize::normalize_text;

/// Role a record plays in the derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Material,
    Equipment,
    Other,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Material => write!(f, "material"),
            Self::Equipment => write!(f, "equipment"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Resource-type labels recognized for each category. Matching is
/// case-insensitive on the trimmed label; anything else is `Other`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoryVocabulary {
    pub material: Vec<String>,
    pub equipment: Vec<String>,
    /// Resource type written on synthesized equipment rows.
    pub equipment_label: String,
}

impl Default for CategoryVocabulary {
    fn default() -> Self {
        Self {
            material: vec!["material".into()],
            equipment: vec!["nonlabor".into()],
            equipment_label: "Nonlabor".into(),
        }
    }
}

impl CategoryVocabulary {
    pub fn classify(&self, label: &Value) -> Category {
        let label = normalize_text(label).to_lowercase();
        if label.is_empty() {
            return Category::Other;
        }
        if self.material.iter().any(|m| m.trim().to_lowercase() == label) {
            Category::Material
        } else if self.equipment.iter().any(|e| e.trim().to_lowercase() == label) {
            Category::Equipment
        } else {
            Category::Other
        }
    }

    pub fn classify_record(&self, record: &Record, type_field: &str) -> Category {
        self.classify(record.value(type_field))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.material.is_empty() || self.equipment.is_empty() {
            return Err(ReconError::ConfigValidation(
                "categories.material and categories.equipment need at least one label".into(),
            ));
        }
        for label in &self.material {
            let lower = label.trim().to_lowercase();
            if self.equipment.iter().any(|e| e.trim().to_lowercase() == lower) {
                return Err(ReconError::ConfigValidation(format!(
                    "resource type '{label}' is listed as both material and equipment"
                )));
            }
        }
        if self.classify(&Value::text(self.equipment_label.as_str())) != Category::Equipment {
            return Err(ReconError::ConfigValidation(format!(
                "categories.equipment_label '{}' is not an equipment label",
                self.equipment_label
            )));
        }
        Ok(())
    }
}
