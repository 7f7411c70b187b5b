//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args)               |
//! | 3-9     | input            | County CSV discovery and parsing         |
//! | 10-19   | plan             | Analysis plan reading and validation     |
//! | 20-29   | output           | Excel report writing                     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `analysis_exit_code` or the command's error handling

use verdict_analysis::AnalysisError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Input (3-9)
// =============================================================================

/// Input directory missing, or it holds no CSV files.
pub const EXIT_INPUT_MISSING: u8 = 3;

/// CSV files were found but hold no records.
pub const EXIT_INPUT_EMPTY: u8 = 4;

/// Missing required column, malformed row or non-numeric score.
pub const EXIT_INPUT_PARSE: u8 = 5;

/// Input file could not be read.
pub const EXIT_INPUT_IO: u8 = 6;

// =============================================================================
// Plan (10-19)
// =============================================================================

/// Plan file is not valid TOML or does not match the plan schema.
pub const EXIT_PLAN_PARSE: u8 = 10;

/// Plan parsed but failed validation (bad field combination, duplicate sheet).
pub const EXIT_PLAN_INVALID: u8 = 11;

/// Plan file could not be read.
pub const EXIT_PLAN_READ: u8 = 12;

// =============================================================================
// Output (20-29)
// =============================================================================

/// Existing report unreadable, or the report could not be written.
pub const EXIT_OUTPUT: u8 = 20;

/// Map an AnalysisError to its exit code.
pub fn analysis_exit_code(err: &AnalysisError) -> u8 {
    match err {
        AnalysisError::NoInputs(_) => EXIT_INPUT_MISSING,
        AnalysisError::EmptyInput(_) => EXIT_INPUT_EMPTY,
        AnalysisError::MissingColumn { .. }
        | AnalysisError::MalformedRow { .. }
        | AnalysisError::InvalidNumber { .. } => EXIT_INPUT_PARSE,
        AnalysisError::Io(_) => EXIT_INPUT_IO,
        AnalysisError::PlanParse(_) => EXIT_PLAN_PARSE,
        AnalysisError::PlanValidation(_) => EXIT_PLAN_INVALID,
        AnalysisError::Sink(_) => EXIT_OUTPUT,
    }
}
