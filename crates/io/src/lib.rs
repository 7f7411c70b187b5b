// File I/O: county CSV inputs in, xlsx report out

pub mod csv;
pub mod xlsx;

pub use csv::{discover_inputs, load_dir, read_file_as_utf8};
pub use xlsx::XlsxReport;
