use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty key list, duplicate mapping, etc.).
    ConfigValidation(String),
    /// A required field is absent from an input collection.
    Schema { input: String, field: String },
    /// A record produced an empty composite key under `EmptyKeyPolicy::Error`.
    EmptyKey { input: String, row: usize },
    /// Write-back addressed a row that is missing or not in the target category.
    Writeback(String),
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Schema { input, field } => {
                write!(f, "missing column '{field}' in {input} input")
            }
            Self::EmptyKey { input, row } => {
                write!(f, "{input} input, row {row}: composite key is empty after normalization")
            }
            Self::Writeback(msg) => write!(f, "write-back error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
