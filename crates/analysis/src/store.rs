use serde::Serialize;

use crate::error::AnalysisError;
use crate::model::{Field, Record};

/// Cell values read as null, matching pandas' default `na_values`.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_null(value: &str) -> bool {
    NA_TOKENS.contains(&value)
}

/// Records loaded from one input source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub records: usize,
}

/// The unified table: all sources concatenated in load order.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    sources: Vec<SourceSummary>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `csv_data` and append its rows. Returns the number of rows added.
    pub fn extend_from_csv(&mut self, source: &str, csv_data: &str) -> Result<usize, AnalysisError> {
        let rows = load_csv_records(source, csv_data)?;
        let added = rows.len();
        self.push_source(source, rows);
        Ok(added)
    }

    pub fn push_source(&mut self, source: &str, rows: Vec<Record>) {
        self.sources.push(SourceSummary { name: source.to_string(), records: rows.len() });
        self.records.extend(rows);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn sources(&self) -> &[SourceSummary] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

fn malformed(source: &str, err: &csv::Error) -> AnalysisError {
    AnalysisError::MalformedRow {
        source: source.to_string(),
        line: err.position().map(|p| p.line()).unwrap_or(0),
        message: err.to_string(),
    }
}

/// Load one CSV document (with header row) into records.
pub fn load_csv_records(source: &str, csv_data: &str) -> Result<Vec<Record>, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(source, &e))?
        .iter()
        .map(normalize_header)
        .collect();

    let mut columns: Vec<(Field, usize)> = Vec::new();
    for field in Field::ALL {
        match headers.iter().position(|h| h == field.label()) {
            Some(idx) => columns.push((field, idx)),
            None if field.is_required() => {
                return Err(AnalysisError::MissingColumn {
                    source: source.to_string(),
                    column: field.label().to_string(),
                });
            }
            None => {}
        }
    }

    for header in &headers {
        if Field::from_label(header).is_none() {
            log::warn!("{source}: ignoring unrecognized column '{header}'");
        }
    }

    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| malformed(source, &e))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let mut row = Record::default();
        for &(field, idx) in &columns {
            let raw = record.get(idx).unwrap_or("");
            if is_null(raw) {
                continue;
            }
            match field {
                Field::RiskScore => {
                    let value = raw
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| AnalysisError::InvalidNumber {
                            source: source.to_string(),
                            line,
                            column: field.label().to_string(),
                            value: raw.to_string(),
                        })?;
                    row.risk_score = Some(value);
                }
                Field::County => row.county = Some(raw.to_string()),
                Field::Race => row.race = Some(raw.to_string()),
                Field::Gender => row.gender = Some(raw.to_string()),
                Field::EducationLevel => row.education_level = Some(raw.to_string()),
                Field::JudgeDecision => row.judge_decision = Some(raw.to_string()),
                Field::Reoffense => row.reoffense = Some(raw.to_string()),
                Field::AiDecision => row.ai_decision = Some(raw.to_string()),
            }
        }
        rows.push(row);
    }

    Ok(rows)
}
