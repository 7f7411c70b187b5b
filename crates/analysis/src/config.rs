use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::model::Field;

/// Characters Excel rejects in sheet names.
const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];
const MAX_SHEET_NAME_LEN: usize = 31;
/// Sheet name Excel reserves for change tracking.
const RESERVED_SHEET_NAME: &str = "History";
/// Widest threshold sweep, `hi - lo`.
const MAX_THRESHOLD_SPAN: i64 = 1000;

// ---------------------------------------------------------------------------
// Top-level plan
// ---------------------------------------------------------------------------

/// Ordered list of analyses; sheets are written in plan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPlan {
    #[serde(default = "default_plan_name")]
    pub name: String,
    #[serde(rename = "analysis", default)]
    pub analyses: Vec<Analysis>,
}

fn default_plan_name() -> String {
    "analysis".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Analysis {
    Crosstab(CrossTabSpec),
    Fairness(FairnessSpec),
    Sweep(SweepSpec),
}

impl Analysis {
    pub fn topic(&self) -> &str {
        match self {
            Self::Crosstab(spec) => &spec.topic,
            Self::Fairness(spec) => &spec.topic,
            Self::Sweep(spec) => &spec.topic,
        }
    }

    /// Sheet names this analysis writes, in write order.
    pub fn sheet_names(&self) -> Vec<String> {
        match self {
            Self::Crosstab(spec) => spec.variants().into_iter().map(|v| v.sheet).collect(),
            Self::Fairness(spec) => {
                let mut names = Vec::new();
                if spec.export_crosstab {
                    names.push(spec.crosstab_sheet());
                }
                names.push(spec.topic.clone());
                names
            }
            Self::Sweep(spec) => vec![spec.topic.clone()],
        }
    }
}

// ---------------------------------------------------------------------------
// Cross-tabulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Count,
    Sum,
    Mean,
    Min,
    Max,
}

impl Aggregation {
    pub fn requires_numeric(&self) -> bool {
        !matches!(self, Self::Count)
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count => write!(f, "count"),
            Self::Sum => write!(f, "sum"),
            Self::Mean => write!(f, "mean"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossTabSpec {
    pub topic: String,
    pub rows: Vec<Field>,
    /// Second-level row keys; each one yields its own table named `{topic}_{nested}`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<Field>,
    pub columns: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregation>,
}

/// One concrete table produced by a [`CrossTabSpec`].
#[derive(Debug, Clone, PartialEq)]
pub struct CrossTabVariant {
    pub sheet: String,
    pub rows: Vec<Field>,
    pub column: Field,
}

impl CrossTabSpec {
    pub fn variants(&self) -> Vec<CrossTabVariant> {
        let mut out = Vec::new();
        for &column in &self.columns {
            if self.nested.is_empty() {
                out.push(CrossTabVariant {
                    sheet: format!("{}_{}", self.topic, column.label()),
                    rows: self.rows.clone(),
                    column,
                });
                continue;
            }
            for &nested in &self.nested {
                let mut rows = self.rows.clone();
                rows.push(nested);
                out.push(CrossTabVariant {
                    sheet: format!("{}_{}", self.topic, nested.label()),
                    rows,
                    column,
                });
            }
        }
        out
    }

    /// Value field + aggregation, when the table aggregates instead of counting.
    pub fn measure(&self) -> Option<(Field, Aggregation)> {
        match (self.value, self.aggregate) {
            (Some(field), Some(agg)) => Some((field, agg)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Positive/negative vocabulary of a binary categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryLabels {
    pub positive: String,
    pub negative: String,
}

impl BinaryLabels {
    pub fn new(positive: impl Into<String>, negative: impl Into<String>) -> Self {
        Self { positive: positive.into(), negative: negative.into() }
    }

    /// Re-offense: "Yes" / "No".
    pub fn condition_default() -> Self {
        Self::new("Yes", "No")
    }

    /// Bail decision: "Denied" (detain) / "Granted".
    pub fn prediction_default() -> Self {
        Self::new("Denied", "Granted")
    }

    /// `Some(true)` for the positive label, `Some(false)` for the negative one.
    pub fn classify(&self, value: &str) -> Option<bool> {
        if value == self.positive {
            Some(true)
        } else if value == self.negative {
            Some(false)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Fairness + sweep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessSpec {
    pub topic: String,
    pub group: Field,
    pub condition: Field,
    pub prediction: Field,
    #[serde(default = "BinaryLabels::condition_default")]
    pub condition_labels: BinaryLabels,
    #[serde(default = "BinaryLabels::prediction_default")]
    pub prediction_labels: BinaryLabels,
    /// Also write the intermediate (group, prediction) x condition crosstab.
    #[serde(default = "default_true")]
    pub export_crosstab: bool,
}

impl FairnessSpec {
    pub fn crosstab_sheet(&self) -> String {
        format!("{}_{}", self.topic, self.condition.label())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRange {
    pub lo: i64,
    pub hi: i64,
}

impl Default for ThresholdRange {
    fn default() -> Self {
        Self { lo: 1, hi: 10 }
    }
}

impl ThresholdRange {
    pub fn iter(&self) -> std::ops::RangeInclusive<i64> {
        self.lo..=self.hi
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    pub topic: String,
    pub group: Field,
    pub condition: Field,
    pub score: Field,
    #[serde(default)]
    pub thresholds: ThresholdRange,
    #[serde(default = "BinaryLabels::condition_default")]
    pub condition_labels: BinaryLabels,
}

// ---------------------------------------------------------------------------
// Default plan
// ---------------------------------------------------------------------------

impl Default for AnalysisPlan {
    /// Demographics, risk, bail-vs-risk, judge fairness, re-offense and
    /// risk-threshold sweep reports.
    fn default() -> Self {
        use Field::*;

        let crosstab = |topic: &str, rows: Vec<Field>, nested: Vec<Field>, columns: Vec<Field>| {
            CrossTabSpec { topic: topic.into(), rows, nested, columns, value: None, aggregate: None }
        };

        Self {
            name: "Judgment by Algorithm".into(),
            analyses: vec![
                Analysis::Crosstab(crosstab("Demo", vec![County], vec![], vec![Race, Gender, EducationLevel])),
                Analysis::Crosstab(CrossTabSpec {
                    value: Some(RiskScore),
                    aggregate: Some(Aggregation::Mean),
                    ..crosstab("Risk", vec![County], vec![], vec![Race, Gender])
                }),
                Analysis::Crosstab(crosstab("Bail_Risk", vec![JudgeDecision], vec![Race, Gender], vec![RiskScore])),
                Analysis::Fairness(FairnessSpec {
                    topic: "Fairness_Judge".into(),
                    group: Race,
                    condition: Reoffense,
                    prediction: JudgeDecision,
                    condition_labels: BinaryLabels::condition_default(),
                    prediction_labels: BinaryLabels::prediction_default(),
                    export_crosstab: true,
                }),
                Analysis::Crosstab(crosstab(
                    "Bail_Risk_alt",
                    vec![County, JudgeDecision],
                    vec![Race, Gender],
                    vec![RiskScore],
                )),
                Analysis::Crosstab(crosstab("Reoffense_Risk_alt", vec![Reoffense], vec![Race, Gender], vec![RiskScore])),
                Analysis::Sweep(SweepSpec {
                    topic: "Fairness_Risk".into(),
                    group: Race,
                    condition: Reoffense,
                    score: RiskScore,
                    thresholds: ThresholdRange::default(),
                    condition_labels: BinaryLabels::condition_default(),
                }),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AnalysisPlan {
    pub fn from_toml(input: &str) -> Result<Self, AnalysisError> {
        let plan: AnalysisPlan =
            toml::from_str(input).map_err(|e| AnalysisError::PlanParse(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn to_toml(&self) -> Result<String, AnalysisError> {
        toml::to_string_pretty(self).map_err(|e| AnalysisError::PlanParse(e.to_string()))
    }

    /// Every sheet the plan writes, in write order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.analyses.iter().flat_map(Analysis::sheet_names).collect()
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.analyses.is_empty() {
            return Err(invalid("plan has no analyses"));
        }

        for analysis in &self.analyses {
            let topic = analysis.topic();
            if topic.trim().is_empty() {
                return Err(invalid("analysis topic must not be empty"));
            }
            match analysis {
                Analysis::Crosstab(spec) => validate_crosstab(spec)?,
                Analysis::Fairness(spec) => validate_fairness(spec)?,
                Analysis::Sweep(spec) => validate_sweep(spec)?,
            }
        }

        let mut seen = HashSet::new();
        for name in self.sheet_names() {
            validate_sheet_name(&name)?;
            if !seen.insert(name.to_lowercase()) {
                return Err(invalid(format!("sheet '{name}' is produced more than once")));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> AnalysisError {
    AnalysisError::PlanValidation(msg.into())
}

fn validate_crosstab(spec: &CrossTabSpec) -> Result<(), AnalysisError> {
    let topic = &spec.topic;
    if spec.rows.is_empty() {
        return Err(invalid(format!("'{topic}': at least one row field is required")));
    }
    if spec.columns.is_empty() {
        return Err(invalid(format!("'{topic}': at least one column field is required")));
    }
    match (spec.value, spec.aggregate) {
        (Some(_), None) => {
            return Err(invalid(format!("'{topic}': value field requires an aggregate")));
        }
        (None, Some(agg)) => {
            return Err(invalid(format!("'{topic}': aggregate '{agg}' requires a value field")));
        }
        (Some(field), Some(agg)) if agg.requires_numeric() && !field.is_numeric() => {
            return Err(invalid(format!(
                "'{topic}': aggregate '{agg}' requires a numeric value field, '{field}' is categorical"
            )));
        }
        _ => {}
    }
    Ok(())
}

fn validate_labels(topic: &str, what: &str, labels: &BinaryLabels) -> Result<(), AnalysisError> {
    if labels.positive == labels.negative {
        return Err(invalid(format!(
            "'{topic}': {what} positive and negative labels are both '{}'",
            labels.positive
        )));
    }
    Ok(())
}

fn validate_fairness(spec: &FairnessSpec) -> Result<(), AnalysisError> {
    let topic = &spec.topic;
    if spec.group == spec.condition || spec.group == spec.prediction || spec.condition == spec.prediction {
        return Err(invalid(format!("'{topic}': group, condition and prediction must be distinct fields")));
    }
    validate_labels(topic, "condition", &spec.condition_labels)?;
    validate_labels(topic, "prediction", &spec.prediction_labels)
}

fn validate_sweep(spec: &SweepSpec) -> Result<(), AnalysisError> {
    let topic = &spec.topic;
    if !spec.score.is_numeric() {
        return Err(invalid(format!("'{topic}': score field '{}' is not numeric", spec.score)));
    }
    if spec.group == spec.condition {
        return Err(invalid(format!("'{topic}': group and condition must be distinct fields")));
    }
    let (lo, hi) = (spec.thresholds.lo, spec.thresholds.hi);
    if lo > hi {
        return Err(invalid(format!("'{topic}': threshold range {lo}..={hi} is empty")));
    }
    match hi.checked_sub(lo) {
        Some(span) if span <= MAX_THRESHOLD_SPAN => {}
        _ => {
            return Err(invalid(format!(
                "'{topic}': threshold range {lo}..={hi} spans more than {MAX_THRESHOLD_SPAN}"
            )));
        }
    }
    validate_labels(topic, "condition", &spec.condition_labels)
}

fn validate_sheet_name(name: &str) -> Result<(), AnalysisError> {
    if name.is_empty() || name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(invalid(format!(
            "sheet name '{name}' must be 1-{MAX_SHEET_NAME_LEN} characters"
        )));
    }
    if let Some(c) = name.chars().find(|c| INVALID_SHEET_CHARS.contains(c)) {
        return Err(invalid(format!("sheet name '{name}' contains '{c}'")));
    }
    if name.eq_ignore_ascii_case(RESERVED_SHEET_NAME) {
        return Err(invalid(format!("sheet name '{name}' is reserved by Excel")));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(invalid(format!("sheet name '{name}' must not start or end with an apostrophe")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
