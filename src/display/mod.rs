//! Human-facing renderings of results.
pub mod table;
pub mod trace;

pub use table::write_csv;
pub use trace::format_trace;
