//! Result export: job results to a CSV file, written atomically.

mod atomic_file;
mod results;

pub use atomic_file::AtomicCsvFile;
pub use results::{export_results, ExportFilter, ExportSummary};
