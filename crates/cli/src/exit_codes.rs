//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | Usage or config error (bad args, invalid TOML, bad value) |
//! | 3    | Schema error (required column missing from an input)      |
//! | 4    | I/O error (cannot read or write a table or config)        |
//!
//! Invalid derivations and norm ambiguities are not failures: they are
//! reported in the summary and the run exits 0.

use assignrec_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable or invalid config.
pub const EXIT_USAGE: u8 = 2;

/// A required logical field is missing from an input table.
pub const EXIT_SCHEMA: u8 = 3;

/// Reading or writing a table or the config file failed.
pub const EXIT_IO: u8 = 4;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_USAGE,
        ReconError::Schema { .. } | ReconError::EmptyKey { .. } => EXIT_SCHEMA,
        ReconError::Io(_) => EXIT_IO,
        ReconError::Writeback(_) => EXIT_ERROR,
    }
}
