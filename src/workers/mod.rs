pub mod reconciliation;

pub use reconciliation::{ReconciliationConfig, ReconciliationSweeper, SweepSummary};
