// Excel file import (xlsx, xlsm, xls, xlsb, ods) and export (xlsx only)
//
// Import reads the first worksheet; its first row is the header.
// Export writes a single "Sheet1" worksheet with a bold header row.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use rust_xlsxwriter::{Format, Workbook};

use assignrec_recon::{Table, Value};

use crate::column_names;

/// XLSX grid limits
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

pub fn import(path: &Path, name: &str) -> Result<Table, String> {
    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let first = sheet_names
        .first()
        .ok_or_else(|| "Excel file contains no sheets".to_string())?;
    if sheet_names.len() > 1 {
        log::debug!("{name}: reading sheet '{first}', ignoring {} others", sheet_names.len() - 1);
    }

    let range = workbook
        .worksheet_range(first)
        .map_err(|e| format!("Failed to read sheet '{}': {}", first, e))?;

    let mut rows = range.rows();
    let header = match rows.next() {
        Some(cells) => cells,
        None => return Ok(Table::new(name, Vec::new())),
    };
    let columns = column_names(header.iter().map(header_text));
    let mut table = Table::new(name, columns);

    for cells in rows {
        table.push_row(cells.iter().map(cell_value).collect());
    }

    Ok(table)
}

fn header_text(cell: &Data) -> String {
    match cell {
        // Numeric headers (e.g. a year) read back as "2024", not "2024.0"
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        other => cell_value(other).to_text(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Empty,
        Data::String(s) if s.is_empty() => Value::Empty,
        Data::String(s) => Value::Text(s.clone()),
        Data::Float(n) => Value::Number(*n),
        Data::Int(n) => Value::Number(*n as f64),
        Data::Bool(b) => Value::text(if *b { "TRUE" } else { "FALSE" }),
        Data::Error(e) => Value::Text(format!("#{:?}", e)),
        // Serial date number; the engine never does date arithmetic
        Data::DateTime(dt) => Value::Number(dt.as_f64()),
        Data::DateTimeIso(s) => Value::Text(s.clone()),
        Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

pub fn export(table: &Table, path: &Path) -> Result<(), String> {
    if table.len() + 1 > MAX_ROWS || table.columns.len() > MAX_COLS {
        return Err(format!(
            "{} rows x {} columns exceeds the XLSX limit of {} x {}",
            table.len() + 1,
            table.columns.len(),
            MAX_ROWS,
            MAX_COLS
        ));
    }

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    {
        let worksheet = workbook
            .add_worksheet()
            .set_name("Sheet1")
            .map_err(|e| format!("Failed to create sheet: {}", e))?;

        for (col, name) in table.columns.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, name, &header_format)
                .map_err(|e| format!("Failed to write header '{}': {}", name, e))?;
        }

        for (row_idx, row) in table.rows().enumerate() {
            let row32 = (row_idx + 1) as u32;
            for (col, value) in row.into_iter().enumerate() {
                let col16 = col as u16;
                let written = match value {
                    Value::Empty => continue,
                    Value::Number(n) if n.is_finite() => worksheet.write_number(row32, col16, *n),
                    Value::Number(n) => worksheet.write_string(row32, col16, n.to_string()),
                    Value::Text(s) => worksheet.write_string(row32, col16, s),
                };
                written.map_err(|e| format!("Failed to write cell ({}, {}): {}", row32, col16, e))?;
            }
        }
    }

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))?;
    Ok(())
}
