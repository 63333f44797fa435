// File I/O operations

pub mod csv;
pub mod xlsx;

use std::path::Path;

use assignrec_recon::{ReconError, Table};

/// Tabular file formats recognized by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Delimited text. `None` sniffs the delimiter on read and writes commas.
    Delimited(Option<u8>),
    /// Workbook formats calamine can read. Only `.xlsx` can be written.
    Excel { writable: bool },
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self, ReconError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(Self::Delimited(None)),
            "tsv" | "tab" => Ok(Self::Delimited(Some(b'\t'))),
            "xlsx" => Ok(Self::Excel { writable: true }),
            "xlsm" | "xls" | "xlsb" | "ods" => Ok(Self::Excel { writable: false }),
            "" => Err(ReconError::Io(format!(
                "{}: no file extension (expected .csv, .tsv or .xlsx)",
                path.display()
            ))),
            other => Err(ReconError::Io(format!(
                "{}: unsupported file type '.{other}'",
                path.display()
            ))),
        }
    }

    /// Fail early when `path` names a format that cannot be written.
    pub fn for_write(path: &Path) -> Result<Self, ReconError> {
        let format = Self::from_path(path)?;
        if let Self::Excel { writable: false } = format {
            return Err(ReconError::Io(format!(
                "{}: cannot write this workbook format (use .xlsx or .csv)",
                path.display()
            )));
        }
        Ok(format)
    }
}

/// Load a table from `path`. `name` labels the input in error messages.
pub fn read_table(path: &Path, name: &str) -> Result<Table, ReconError> {
    let table = match FileFormat::from_path(path)? {
        FileFormat::Delimited(None) => crate::csv::import(path, name),
        FileFormat::Delimited(Some(delimiter)) => crate::csv::import_with_delimiter(path, name, delimiter),
        FileFormat::Excel { .. } => xlsx::import(path, name),
    }
    .map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?;

    log::debug!(
        "loaded {name} from {}: {} rows, {} columns",
        path.display(),
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

/// Write `table` to `path` in the format implied by its extension.
pub fn write_table(path: &Path, table: &Table) -> Result<(), ReconError> {
    match FileFormat::for_write(path)? {
        FileFormat::Delimited(delimiter) => crate::csv::export(table, path, delimiter.unwrap_or(b',')),
        FileFormat::Excel { .. } => xlsx::export(table, path),
    }
    .map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?;

    log::debug!("wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Header cells as column names: blanks become `Unnamed: {index}` and
/// repeated names get a `.{n}` suffix so every column is addressable.
pub(crate) fn column_names(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for (index, name) in raw.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {index}")
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while columns.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        columns.push(candidate);
    }
    columns
}
