//! `assignrec-recon`: Snapshot reconciliation and norms-based quantity derivation.
//!
//! Pure engine crate: receives pre-loaded tables keyed by logical field
//! names, returns partitions, change sets and derived activity tables.
//! No CLI or file IO dependencies.

pub mod aggregate;
pub mod assign;
pub mod category;
pub mod changes;
pub mod config;
pub mod derive;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod norms;
pub mod reconcile;
pub mod schema;
pub mod writeback;

pub use category::{Category, CategoryVocabulary};
pub use config::{fields, CompareConfig, DeriveConfig, DeriveMode, EmptyKeyPolicy, RunConfig};
pub use engine::{run_changes, run_compare, run_derive, CompareResult, DeriveResult, RunMeta};
pub use error::ReconError;
pub use model::{CompareSummary, DeriveSummary, Record, RowId, Table, Value};
