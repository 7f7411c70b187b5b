//! `verdict-analysis`: cross-tabulation and fairness metrics engine.
//!
//! Pure engine crate: receives pre-loaded records, hands finished tables to a
//! [`SheetSink`]. No filesystem or workbook dependencies.

pub mod config;
pub mod crosstab;
pub mod error;
pub mod fairness;
pub mod model;
pub mod pipeline;
pub mod sink;
pub mod store;
pub mod sweep;

pub use config::AnalysisPlan;
pub use error::AnalysisError;
pub use model::{Cell, Field, Key, Record, Table};
pub use pipeline::{run, RunSummary};
pub use sink::{MemorySink, SheetSink};
pub use store::RecordStore;
