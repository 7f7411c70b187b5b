//! Confusion-matrix counts per group across a range of score thresholds.
//!
//! A record is predicted positive at threshold `t` when its score is `>= t`.
//! Every (threshold, group, outcome) cell exists, with 0 when unobserved.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::SweepSpec;
use crate::model::{Cell, Key, Record, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    TruePositive,
    FalsePositive,
    FalseNegative,
    TrueNegative,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [
        Outcome::TruePositive,
        Outcome::FalsePositive,
        Outcome::FalseNegative,
        Outcome::TrueNegative,
    ];

    pub fn classify(condition_positive: bool, predicted_positive: bool) -> Self {
        match (condition_positive, predicted_positive) {
            (true, true) => Self::TruePositive,
            (false, true) => Self::FalsePositive,
            (true, false) => Self::FalseNegative,
            (false, false) => Self::TrueNegative,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::TruePositive => "TP",
            Self::FalsePositive => "FP",
            Self::FalseNegative => "FN",
            Self::TrueNegative => "TN",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Dense (threshold, group, outcome) -> count map.
#[derive(Debug, Clone)]
pub struct SweepTable {
    pub spec: SweepSpec,
    pub groups: Vec<Key>,
    counts: BTreeMap<(i64, Key, Outcome), u64>,
}

/// Record reduced to what the sweep needs; `None` when it cannot be categorized.
struct Scored {
    group: Key,
    condition_positive: bool,
    score: f64,
}

fn score_record(record: &Record, spec: &SweepSpec) -> Option<Scored> {
    let group = spec.group.key(record)?;
    let condition = spec.condition.key(record)?;
    let condition_positive = spec.condition_labels.classify(&condition.to_string())?;
    let score = spec.score.number(record)?;
    Some(Scored { group, condition_positive, score })
}

pub fn sweep(records: &[Record], spec: &SweepSpec) -> SweepTable {
    let scored: Vec<Scored> = records.iter().filter_map(|r| score_record(r, spec)).collect();
    let groups: Vec<Key> = scored
        .iter()
        .map(|s| s.group.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut counts = BTreeMap::new();
    for threshold in spec.thresholds.iter() {
        for group in &groups {
            for outcome in Outcome::ALL {
                counts.insert((threshold, group.clone(), outcome), 0u64);
            }
        }
        for s in &scored {
            let predicted_positive = s.score >= threshold as f64;
            let outcome = Outcome::classify(s.condition_positive, predicted_positive);
            if let Some(n) = counts.get_mut(&(threshold, s.group.clone(), outcome)) {
                *n += 1;
            }
        }
    }

    SweepTable { spec: spec.clone(), groups, counts }
}

impl SweepTable {
    pub fn count(&self, threshold: i64, group: &Key, outcome: Outcome) -> Option<u64> {
        self.counts.get(&(threshold, group.clone(), outcome)).copied()
    }

    /// Sum of all cells at `threshold`.
    pub fn threshold_total(&self, threshold: i64) -> u64 {
        self.counts
            .range((threshold, Key::number(f64::NEG_INFINITY), Outcome::TruePositive)..)
            .take_while(|((t, _, _), _)| *t == threshold)
            .map(|(_, n)| *n)
            .sum()
    }

    /// Cells in (threshold, group, outcome) order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &Key, Outcome, u64)> {
        self.counts.iter().map(|((t, g, o), n)| (*t, g, *o, *n))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(vec![
            Cell::text(format!("{} Threshold", self.spec.score.label())),
            Cell::text(self.spec.group.label()),
            Cell::text("Outcome"),
            Cell::text("count"),
        ]);
        for (threshold, group, outcome, n) in self.iter() {
            table.push_row(vec![
                Cell::Number(threshold as f64),
                group.to_cell(),
                Cell::text(outcome.code()),
                Cell::Number(n as f64),
            ]);
        }
        table
    }
}
