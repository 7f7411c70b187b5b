//! Group re-offense rates and conditional error rates (FPR / FNR).
//!
//! The (group, prediction) x condition crosstab is left-joined onto a
//! per-group summary. FPR is only defined on prediction-positive rows and
//! FNR only on prediction-negative rows; zero denominators stay undefined.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{BinaryLabels, FairnessSpec};
use crate::crosstab::{self, CrossTab, TOTAL_LABEL};
use crate::model::{Cell, Field, Key, Record, Table};

/// Per-group condition counts over records with a recognized condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub total: u64,
    pub positives: u64,
    pub negatives: u64,
}

impl GroupSummary {
    /// Fraction of condition-positive records (mean of the encoded condition).
    pub fn rate(&self) -> Option<f64> {
        ratio(self.positives, self.total)
    }
}

fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

pub fn group_summaries(
    records: &[Record],
    group: Field,
    condition: Field,
    labels: &BinaryLabels,
) -> BTreeMap<Key, GroupSummary> {
    let mut out: BTreeMap<Key, GroupSummary> = BTreeMap::new();
    for record in records {
        let Some(key) = group.key(record) else { continue };
        let summary = out.entry(key).or_default();
        let encoded = condition.key(record).and_then(|k| labels.classify(&k.to_string()));
        match encoded {
            Some(true) => {
                summary.total += 1;
                summary.positives += 1;
            }
            Some(false) => {
                summary.total += 1;
                summary.negatives += 1;
            }
            None => {}
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct FairnessRow {
    pub group: Key,
    /// `None` on the crosstab "Total" row.
    pub prediction: Option<Key>,
    pub positives: u64,
    pub negatives: u64,
    pub summary: Option<GroupSummary>,
    pub fpr: Option<f64>,
    pub fnr: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FairnessTable {
    pub spec: FairnessSpec,
    pub crosstab: CrossTab,
    pub summaries: BTreeMap<Key, GroupSummary>,
    pub rows: Vec<FairnessRow>,
}

pub fn compute(records: &[Record], spec: &FairnessSpec) -> FairnessTable {
    let cond = &spec.condition_labels;
    let pred = &spec.prediction_labels;

    let summaries = group_summaries(records, spec.group, spec.condition, cond);
    let crosstab = crosstab::build(records, &[spec.group, spec.prediction], spec.condition, None);

    let pos_key = crosstab.column_keys.iter().find(|k| k.matches(&cond.positive)).cloned();
    let neg_key = crosstab.column_keys.iter().find(|k| k.matches(&cond.negative)).cloned();
    let count = |v: Option<f64>| v.map(|n| n as u64).unwrap_or(0);

    let mut rows = Vec::with_capacity(crosstab.row_keys.len() + 1);
    for (keys, _) in crosstab.rows() {
        let (group, prediction) = (&keys[0], &keys[1]);
        let positives = count(pos_key.as_ref().and_then(|k| crosstab.cell(keys, k)));
        let negatives = count(neg_key.as_ref().and_then(|k| crosstab.cell(keys, k)));
        let summary = summaries.get(group).copied();

        let fpr = if prediction.matches(&pred.positive) {
            summary.and_then(|s| ratio(negatives, s.negatives))
        } else {
            None
        };
        let fnr = if prediction.matches(&pred.negative) {
            summary.and_then(|s| ratio(positives, s.positives))
        } else {
            None
        };

        rows.push(FairnessRow {
            group: group.clone(),
            prediction: Some(prediction.clone()),
            positives,
            negatives,
            summary,
            fpr,
            fnr,
        });
    }

    rows.push(FairnessRow {
        group: Key::text(TOTAL_LABEL),
        prediction: None,
        positives: count(pos_key.as_ref().and_then(|k| crosstab.column_total(k))),
        negatives: count(neg_key.as_ref().and_then(|k| crosstab.column_total(k))),
        summary: None,
        fpr: None,
        fnr: None,
    });

    FairnessTable { spec: spec.clone(), crosstab, summaries, rows }
}

impl FairnessTable {
    pub fn row(&self, group: &str, prediction: &str) -> Option<&FairnessRow> {
        self.rows.iter().find(|r| {
            r.group.matches(group) && r.prediction.as_ref().is_some_and(|p| p.matches(prediction))
        })
    }

    pub fn to_table(&self) -> Table {
        let g = self.spec.group.label();
        let c = self.spec.condition.label();
        let labels = &self.spec.condition_labels;

        let mut table = Table::new(vec![
            Cell::text(g),
            Cell::text(self.spec.prediction.label()),
            Cell::text(&labels.positive),
            Cell::text(&labels.negative),
            Cell::text(format!("{g} Total")),
            Cell::text(format!("{g} {c} Total")),
            Cell::text(format!("{g} {c} Rate")),
            Cell::text(format!("{g} {} {c} Total", labels.negative)),
            Cell::text("FPR"),
            Cell::text("FNR"),
        ]);

        for row in &self.rows {
            let summary = row.summary;
            table.push_row(vec![
                row.group.to_cell(),
                row.prediction.as_ref().map(Key::to_cell).unwrap_or(Cell::Empty),
                Cell::Number(row.positives as f64),
                Cell::Number(row.negatives as f64),
                Cell::from_opt(summary.map(|s| s.total as f64)),
                Cell::from_opt(summary.map(|s| s.positives as f64)),
                Cell::from_opt(summary.and_then(|s| s.rate())),
                Cell::from_opt(summary.map(|s| s.negatives as f64)),
                Cell::from_opt(row.fpr),
                Cell::from_opt(row.fnr),
            ]);
        }

        table
    }
}
