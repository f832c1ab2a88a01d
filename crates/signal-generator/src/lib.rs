pub mod indicators;
pub mod scoring;
pub mod turtle;

pub use scoring::{pick_best_entry, score_signals, CORRELATION_GROUPS};
pub use turtle::{check_exit_signals, enrich_symbol_data, generate_entry_signals, FilterConfig};
