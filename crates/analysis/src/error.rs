use std::fmt;

#[derive(Debug)]
pub enum AnalysisError {
    /// TOML parse / deserialization error.
    PlanParse(String),
    /// Plan validation error (missing value field, duplicate sheet, etc.).
    PlanValidation(String),
    /// Missing required column in an input source.
    MissingColumn { source: String, column: String },
    /// Row could not be read (wrong field count, bad quoting, ...).
    MalformedRow { source: String, line: u64, message: String },
    /// Numeric column holds a value that is not a finite number.
    InvalidNumber { source: String, line: u64, column: String, value: String },
    /// Input directory is missing or holds no CSV files.
    NoInputs(String),
    /// Inputs were found but contain no records.
    EmptyInput(String),
    /// IO error (file read, directory listing, etc.).
    Io(String),
    /// Report sink failed to accept or persist a sheet.
    Sink(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlanParse(msg) => write!(f, "plan parse error: {msg}"),
            Self::PlanValidation(msg) => write!(f, "plan validation error: {msg}"),
            Self::MissingColumn { source, column } => {
                write!(f, "{source}: missing column '{column}'")
            }
            Self::MalformedRow { source, line, message } => {
                write!(f, "{source}, line {line}: malformed row: {message}")
            }
            Self::InvalidNumber { source, line, column, value } => {
                write!(f, "{source}, line {line}: column '{column}': cannot parse number '{value}'")
            }
            Self::NoInputs(msg) => write!(f, "no input files: {msg}"),
            Self::EmptyInput(msg) => write!(f, "no records: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Sink(msg) => write!(f, "report error: {msg}"),
        }
    }
}

impl std::error::Error for AnalysisError {}
