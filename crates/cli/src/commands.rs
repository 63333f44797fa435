//! `assignrec compare|changes|derive|validate`: config-driven runs.
//!
//! Every input is loaded and the engine run completes before any output
//! file is written, so a failed precondition leaves the filesystem untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use assignrec_io::{read_table, write_table, FileFormat};
use assignrec_recon::config::Suffixes;
use assignrec_recon::{engine, CompareResult, RunConfig, Table};

use crate::CliError;

fn load_config(config_path: &Path) -> Result<(RunConfig, PathBuf), CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::io(format!("cannot read config {}: {e}", config_path.display()))
    })?;
    let config = RunConfig::from_toml(&config_str)
        .map_err(|e| CliError::from(e).with_hint(format!("check {}", config_path.display())))?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    log::info!("config {} loaded, resolving paths against {}", config_path.display(), base_dir.display());
    Ok((config, base_dir))
}

fn output_path(base_dir: &Path, file: &str) -> Result<PathBuf, CliError> {
    let path = base_dir.join(file);
    FileFormat::for_write(&path).map_err(|e| CliError::usage(e.to_string()))?;
    Ok(path)
}

/// Fail before any output is written when a target directory is missing.
fn ensure_output_dirs<P: AsRef<Path>>(paths: &[P]) -> Result<(), CliError> {
    for path in paths {
        let path = path.as_ref();
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        if !dir.is_dir() {
            return Err(CliError::io(format!(
                "cannot write {}: directory {} does not exist",
                path.display(),
                dir.display()
            ))
            .with_hint("create the directory or fix the output path in the config"));
        }
    }
    Ok(())
}

fn input_path(base_dir: &Path, file: &str) -> Result<PathBuf, CliError> {
    let path = base_dir.join(file);
    FileFormat::from_path(&path).map_err(|e| CliError::usage(e.to_string()))?;
    Ok(path)
}

/// Load a table and rename its external column names to logical ones.
fn load(path: &Path, name: &str, to_logical: &HashMap<String, String>) -> Result<Table, CliError> {
    let mut table = read_table(path, name)?;
    let renamed = table.columns.iter().filter(|c| to_logical.contains_key(c.as_str())).count();
    log::debug!("{name}: {renamed} columns renamed to logical names");
    table.rename_columns(to_logical);
    Ok(table)
}

/// Logical → external map that also covers `_before`/`_after` suffixed columns.
fn suffixed(to_external: &HashMap<String, String>, suffixes: &Suffixes) -> HashMap<String, String> {
    let mut mapping = to_external.clone();
    for (logical, external) in to_external {
        for suffix in [&suffixes.before, &suffixes.after] {
            mapping.insert(format!("{logical}{suffix}"), format!("{external}{suffix}"));
        }
    }
    mapping
}

fn save(path: &Path, mut table: Table, to_external: &HashMap<String, String>) -> Result<(), CliError> {
    table.rename_columns(to_external);
    write_table(path, &table)?;
    eprintln!("wrote {} ({} rows)", path.display(), table.len());
    Ok(())
}

fn print_json(report: &serde_json::Value) -> Result<(), CliError> {
    let json_str = serde_json::to_string_pretty(report)
        .map_err(|e| CliError::usage(format!("JSON serialization error: {e}")))?;
    println!("{json_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// compare / changes
// ---------------------------------------------------------------------------

struct Snapshots {
    config: RunConfig,
    before: Table,
    after: Table,
    to_external: HashMap<String, String>,
}

fn load_snapshots(config: RunConfig, base_dir: &Path) -> Result<Snapshots, CliError> {
    let compare = config.compare_config()?;
    let to_logical = config.columns.activity.to_logical();
    let before = load(&input_path(base_dir, &compare.before)?, "before", &to_logical)?;
    let after = load(&input_path(base_dir, &compare.after)?, "after", &to_logical)?;
    let to_external = suffixed(&config.columns.activity.to_external(), &compare.suffixes);
    Ok(Snapshots { config, before, after, to_external })
}

fn print_compare_summary(result: &CompareResult) {
    let s = &result.summary;
    eprintln!(
        "compare on [{}]: {} before rows, {} after rows",
        result.reconciliation.keys.join(", "),
        s.rows_a,
        s.rows_b,
    );
    eprintln!("  only in before: {}", s.only_in_a);
    eprintln!("  only in after:  {}", s.only_in_b);
    eprintln!("  in both:        {}", s.in_both);
    if s.excluded_a + s.excluded_b > 0 {
        eprintln!(
            "  excluded (empty key): {} before, {} after",
            s.excluded_a, s.excluded_b
        );
    }
}

pub fn cmd_compare(config_path: PathBuf, json_output: bool) -> Result<(), CliError> {
    let (config, base_dir) = load_config(&config_path)?;
    let compare = config.compare_config()?;
    let out_before = output_path(&base_dir, &compare.output.only_before)?;
    let out_after = output_path(&base_dir, &compare.output.only_after)?;
    let out_both = output_path(&base_dir, &compare.output.both)?;
    ensure_output_dirs(&[&out_before, &out_after, &out_both])?;

    let snapshots = load_snapshots(config, &base_dir)?;
    let result = engine::run_compare(&snapshots.config, &snapshots.before, &snapshots.after)?;
    let compare = snapshots.config.compare_config()?;

    save(&out_before, result.only_before_table(), &snapshots.to_external)?;
    save(&out_after, result.only_after_table(), &snapshots.to_external)?;
    save(&out_both, result.both_table(compare), &snapshots.to_external)?;

    if json_output {
        print_json(&result.report())?;
    }
    print_compare_summary(&result);
    Ok(())
}

pub fn cmd_changes(config_path: PathBuf, json_output: bool) -> Result<(), CliError> {
    let (config, base_dir) = load_config(&config_path)?;
    let out_changed = output_path(&base_dir, &config.compare_config()?.output.changed)?;
    ensure_output_dirs(&[&out_changed])?;

    let snapshots = load_snapshots(config, &base_dir)?;
    let result = engine::run_changes(&snapshots.config, &snapshots.before, &snapshots.after)?;
    let compare = snapshots.config.compare_config()?;

    save(&out_changed, result.changed_table(compare), &snapshots.to_external)?;

    if json_output {
        print_json(&result.report())?;
    }
    print_compare_summary(&result);
    eprintln!(
        "  changed:        {} (tracking {})",
        result.summary.changed,
        compare.tracked.join(", ")
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// derive
// ---------------------------------------------------------------------------

pub fn cmd_derive(config_path: PathBuf, json_output: bool, dry_run: bool) -> Result<(), CliError> {
    let (config, base_dir) = load_config(&config_path)?;
    let derive = config.derive_config()?;
    let out_path = output_path(&base_dir, derive.output_path())?;
    if !dry_run {
        ensure_output_dirs(&[&out_path])?;
    }

    let activity = load(
        &input_path(&base_dir, &derive.activity)?,
        "activity",
        &config.columns.activity.to_logical(),
    )?;
    let norms = load(
        &input_path(&base_dir, &derive.norms)?,
        "norms",
        &config.columns.norms.to_logical(),
    )?;

    let result = engine::run_derive(&config, &activity, &norms)?;

    if dry_run {
        eprintln!("dry run: {} not written", out_path.display());
    } else {
        save(&out_path, result.table.clone(), &config.columns.activity.to_external())?;
    }

    if json_output {
        print_json(&result.report())?;
    }

    let s = &result.summary;
    eprintln!(
        "derive: {} rows ({} material, {} equipment, {} other), {} synthesized",
        s.rows, s.material_rows, s.equipment_rows, s.other_rows, s.synthesized,
    );
    eprintln!(
        "  derived: {} valid, {} invalid from {} (task, item) groups",
        s.derived_valid, s.derived_invalid, s.aggregate_groups,
    );
    if s.derived_invalid > 0 {
        let mut reasons: Vec<_> = s.invalid_counts.iter().collect();
        reasons.sort();
        let reasons: Vec<String> = reasons.iter().map(|(r, n)| format!("{r}: {n}")).collect();
        eprintln!("  invalid rows kept unchanged ({})", reasons.join(", "));
    }
    if s.norm_ambiguities > 0 {
        eprintln!(
            "  norms: {} duplicated (item, resource) pairs, first occurrence used",
            s.norm_ambiguities
        );
    }
    if s.coercion_warnings > 0 {
        eprintln!("  {} non-numeric quantities treated as zero", s.coercion_warnings);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, base_dir) = load_config(&config_path)?;

    if let Some(ref compare) = config.compare {
        input_path(&base_dir, &compare.before)?;
        input_path(&base_dir, &compare.after)?;
        for file in [
            &compare.output.only_before,
            &compare.output.only_after,
            &compare.output.both,
            &compare.output.changed,
        ] {
            output_path(&base_dir, file)?;
        }
    }
    if let Some(ref derive) = config.derive {
        input_path(&base_dir, &derive.activity)?;
        input_path(&base_dir, &derive.norms)?;
        output_path(&base_dir, derive.output_path())?;
    }

    for line in engine::describe(&config) {
        eprintln!("{line}");
    }
    eprintln!("config OK: {}", config_path.display());
    Ok(())
}
