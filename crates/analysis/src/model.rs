use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One row of the unified table. `None` means the source cell was null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub county: Option<String>,
    pub race: Option<String>,
    pub gender: Option<String>,
    pub education_level: Option<String>,
    pub risk_score: Option<f64>,
    pub judge_decision: Option<String>,
    pub reoffense: Option<String>,
    pub ai_decision: Option<String>,
}

/// A column of the record schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "County", alias = "county")]
    County,
    #[serde(rename = "Race", alias = "race")]
    Race,
    #[serde(rename = "Gender", alias = "gender")]
    Gender,
    #[serde(rename = "Education Level", alias = "education_level")]
    EducationLevel,
    #[serde(rename = "Risk Score", alias = "risk_score")]
    RiskScore,
    #[serde(rename = "Judge Decision", alias = "judge_decision")]
    JudgeDecision,
    #[serde(rename = "Re-offense", alias = "reoffense")]
    Reoffense,
    #[serde(rename = "AI Decision", alias = "ai_decision")]
    AiDecision,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::County,
        Field::Race,
        Field::Gender,
        Field::EducationLevel,
        Field::RiskScore,
        Field::JudgeDecision,
        Field::Reoffense,
        Field::AiDecision,
    ];

    /// Column header as it appears in the input files.
    pub fn label(&self) -> &'static str {
        match self {
            Self::County => "County",
            Self::Race => "Race",
            Self::Gender => "Gender",
            Self::EducationLevel => "Education Level",
            Self::RiskScore => "Risk Score",
            Self::JudgeDecision => "Judge Decision",
            Self::Reoffense => "Re-offense",
            Self::AiDecision => "AI Decision",
        }
    }

    pub fn from_label(label: &str) -> Option<Field> {
        Self::ALL.iter().copied().find(|f| f.label() == label)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::RiskScore)
    }

    /// AI Decision is derived in most datasets, so its column may be absent.
    pub fn is_required(&self) -> bool {
        !matches!(self, Self::AiDecision)
    }

    fn text<'a>(&self, record: &'a Record) -> Option<&'a str> {
        let slot = match self {
            Self::County => &record.county,
            Self::Race => &record.race,
            Self::Gender => &record.gender,
            Self::EducationLevel => &record.education_level,
            Self::JudgeDecision => &record.judge_decision,
            Self::Reoffense => &record.reoffense,
            Self::AiDecision => &record.ai_decision,
            Self::RiskScore => return None,
        };
        slot.as_deref()
    }

    /// Grouping key of this field for a record, `None` when null.
    pub fn key(&self, record: &Record) -> Option<Key> {
        match self {
            Self::RiskScore => record.risk_score.map(Key::number),
            _ => self.text(record).map(Key::text),
        }
    }

    /// Numeric value of this field, `None` when null or categorical.
    pub fn number(&self, record: &Record) -> Option<f64> {
        match self {
            Self::RiskScore => record.risk_score,
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Grouping keys
// ---------------------------------------------------------------------------

/// A grouping value. Numbers sort before text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Number(OrderedFloat<f64>),
    Text(String),
}

impl Key {
    pub fn number(value: f64) -> Self {
        Self::Number(OrderedFloat(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Compare against a configured label by display form ("7" matches 7.0).
    pub fn matches(&self, label: &str) -> bool {
        match self {
            Self::Text(s) => s == label,
            Self::Number(_) => self.to_string() == label,
        }
    }

    pub fn to_cell(&self) -> Cell {
        match self {
            Self::Number(n) => Cell::Number(n.0),
            Self::Text(s) => Cell::Text(s.clone()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", format_number(n.0)),
            Self::Text(s) => f.write_str(s),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ---------------------------------------------------------------------------
// Output tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Undefined values (e.g. a rate with a zero denominator) become empty cells.
    pub fn from_opt(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Self::Number(v),
            _ => Self::Empty,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

/// Export shape shared by every analysis: one header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<Cell>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(header: Vec<Cell>) -> Self {
        Self { header, rows: Vec::new() }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0)
    }

    /// Index of the first header cell whose display form equals `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|c| c.to_string() == name)
    }

    /// First row whose leading cells display as `keys`.
    pub fn find_row(&self, keys: &[&str]) -> Option<&[Cell]> {
        self.rows
            .iter()
            .find(|row| {
                keys.len() <= row.len()
                    && keys.iter().zip(row.iter()).all(|(k, c)| c.to_string() == *k)
            })
            .map(Vec::as_slice)
    }

    /// Cell at (row matching `keys`, column `name`).
    pub fn get(&self, keys: &[&str], column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.find_row(keys).and_then(|row| row.get(col))
    }

    /// Tab-separated rendering of the header and the first `n` rows, for logs.
    pub fn preview(&self, n: usize) -> String {
        let render = |cells: &[Cell]| {
            cells.iter().map(ToString::to_string).collect::<Vec<_>>().join("\t")
        };
        let mut lines = vec![render(&self.header)];
        lines.extend(self.rows.iter().take(n).map(|r| render(r)));
        lines.join("\n")
    }
}
