// CSV/TSV import/export

use std::io::Read;
use std::path::Path;

use assignrec_recon::{Table, Value};

use crate::column_names;

pub fn import(path: &Path, name: &str) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&content, name, delimiter)
}

pub fn import_with_delimiter(path: &Path, name: &str, delimiter: u8) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&content, name, delimiter)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Score: lines agreeing with the header's field count, times that count
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            // Windows-1252 is what Excel uses for "CSV" exports on most locales
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    Ok(match content.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => content,
    })
}

/// First record is the header. Empty cells load as `Value::Empty`, everything
/// else as text exactly as written.
fn import_from_string(content: &str, name: &str, delimiter: u8) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(result) => result.map_err(|e| e.to_string())?,
        None => return Ok(Table::new(name, Vec::new())),
    };
    let columns = column_names(header.iter().map(str::to_string));
    let width = columns.len();
    let mut table = Table::new(name, columns);

    for (row_idx, result) in records.enumerate() {
        let record = result.map_err(|e| e.to_string())?;
        if record.len() > width {
            log::warn!(
                "{name} line {}: {} fields for {width} columns, extra fields ignored",
                row_idx + 2,
                record.len()
            );
        }
        let row = record
            .iter()
            .map(|field| if field.is_empty() { Value::Empty } else { Value::text(field) })
            .collect();
        table.push_row(row);
    }

    Ok(table)
}

pub fn export(table: &Table, path: &Path, delimiter: u8) -> Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    writer.write_record(&table.columns).map_err(|e| e.to_string())?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_text()))
            .map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}
