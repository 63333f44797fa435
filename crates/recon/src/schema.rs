use crate::error::ReconError;
use crate::model::Table;

/// Fail with `ReconError::Schema` naming the first field `table` lacks.
pub fn require_fields<S: AsRef<str>>(table: &Table, fields: &[S]) -> Result<(), ReconError> {
    for field in fields {
        let field = field.as_ref();
        if !table.has_column(field) {
            return Err(ReconError::Schema {
                input: table.name.clone(),
                field: field.to_string(),
            });
        }
    }
    Ok(())
}
