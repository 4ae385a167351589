//! Reconciliation services
//!
//! Leaf stages (decoding, parsing, aggregation, matching) are pure or read-only;
//! `ledger_writer`, `reversal` and `resume` own every write to balances.

pub mod aggregator;
pub mod catalog_resolver;
pub mod decoder;
pub mod fuzzy;
pub mod ledger_writer;
pub mod progress;
pub mod report_details;
pub mod report_pipeline;
pub mod resume;
pub mod reversal;
pub mod row_parser;

pub use catalog_resolver::{CatalogResolver, ReleaseCatalog};
pub use ledger_writer::{LedgerWriter, PayoutAccumulator, PayoutSummary, ReportContext};
pub use report_pipeline::{spawn_report, ReportPipeline};
pub use reversal::{reverse_report, ReversalSummary};
