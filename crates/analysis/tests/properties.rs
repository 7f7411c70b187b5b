// Property-based tests for the cross-tabulation and fairness invariants.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use verdict_analysis::config::{Aggregation, BinaryLabels, FairnessSpec, SweepSpec, ThresholdRange};
use verdict_analysis::crosstab;
use verdict_analysis::fairness;
use verdict_analysis::model::{Field, Record};
use verdict_analysis::sweep::{self, Outcome};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Categorical value from a small vocabulary, occasionally null.
fn arb_category(values: &'static [&'static str]) -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        9 => proptest::sample::select(values).prop_map(|s| Some(s.to_string())),
        1 => Just(None),
    ]
}

fn arb_score() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        9 => (1u8..=10).prop_map(|n| Some(n as f64)),
        1 => Just(None),
    ]
}

fn arb_record() -> impl Strategy<Value = Record> {
    (
        arb_category(&["Adams", "Baker", "Clark"]),
        arb_category(&["A", "B", "C"]),
        arb_category(&["Male", "Female"]),
        arb_score(),
        arb_category(&["Denied", "Granted"]),
        arb_category(&["Yes", "No", "Unknown"]),
    )
        .prop_map(|(county, race, gender, risk_score, judge_decision, reoffense)| Record {
            county,
            race,
            gender,
            education_level: Some("College".into()),
            risk_score,
            judge_decision,
            reoffense,
            ai_decision: None,
        })
}

fn arb_records() -> impl Strategy<Value = Vec<Record>> {
    proptest::collection::vec(arb_record(), 0..120)
}

fn fairness_spec() -> FairnessSpec {
    FairnessSpec {
        topic: "Fairness_Judge".into(),
        group: Field::Race,
        condition: Field::Reoffense,
        prediction: Field::JudgeDecision,
        condition_labels: BinaryLabels::condition_default(),
        prediction_labels: BinaryLabels::prediction_default(),
        export_crosstab: true,
    }
}

fn sweep_spec() -> SweepSpec {
    SweepSpec {
        topic: "Fairness_Risk".into(),
        group: Field::Race,
        condition: Field::Reoffense,
        score: Field::RiskScore,
        thresholds: ThresholdRange::default(),
        condition_labels: BinaryLabels::condition_default(),
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn count_margins_are_consistent(records in arb_records()) {
        let table = crosstab::build(&records, &[Field::County], Field::Race, None);

        let mut grand = 0.0;
        for (keys, cells) in table.rows() {
            let sum: f64 = cells.iter().map(|c| c.unwrap_or(0.0)).sum();
            prop_assert_eq!(table.row_total(keys), Some(sum));
            grand += sum;
        }
        for column in &table.column_keys {
            let sum: f64 = table
                .rows()
                .filter_map(|(keys, _)| table.cell(keys, column))
                .sum();
            prop_assert_eq!(table.column_total(column), Some(sum));
        }

        let counted = records
            .iter()
            .filter(|r| r.county.is_some() && r.race.is_some())
            .count() as f64;
        prop_assert_eq!(grand, counted);
        prop_assert_eq!(table.grand_total().unwrap_or(0.0), counted);
    }

    #[test]
    fn count_cells_are_zero_filled(records in arb_records()) {
        let table = crosstab::build(&records, &[Field::JudgeDecision, Field::Race], Field::RiskScore, None);
        for (_, cells) in table.rows() {
            prop_assert!(cells.iter().all(Option::is_some));
        }
    }

    #[test]
    fn mean_margins_lie_within_cell_range(records in arb_records()) {
        let table = crosstab::build(
            &records,
            &[Field::County],
            Field::Race,
            Some((Field::RiskScore, Aggregation::Mean)),
        );
        if let Some(grand) = table.grand_total() {
            prop_assert!((1.0..=10.0).contains(&grand));
        }
        for (keys, _) in table.rows() {
            let total = table.row_total(keys).unwrap();
            prop_assert!((1.0..=10.0).contains(&total));
        }
    }

    #[test]
    fn error_rates_are_probabilities(records in arb_records()) {
        let table = fairness::compute(&records, &fairness_spec());
        for row in &table.rows {
            for rate in [row.fpr, row.fnr].into_iter().flatten() {
                prop_assert!((0.0..=1.0).contains(&rate), "rate {}", rate);
            }
            prop_assert!(row.fpr.is_none() || row.fnr.is_none());
        }
    }

    #[test]
    fn sweep_is_complete_and_conserves_records(records in arb_records()) {
        let spec = sweep_spec();
        let table = sweep::sweep(&records, &spec);
        prop_assert_eq!(table.len(), 10 * table.groups.len() * 4);

        let categorizable = records
            .iter()
            .filter(|r| r.race.is_some() && r.risk_score.is_some())
            .filter(|r| matches!(r.reoffense.as_deref(), Some("Yes") | Some("No")))
            .count() as u64;
        for t in spec.thresholds.iter() {
            prop_assert_eq!(table.threshold_total(t), categorizable);
        }
    }

    #[test]
    fn positives_never_grow_with_threshold(records in arb_records()) {
        let table = sweep::sweep(&records, &sweep_spec());
        for group in &table.groups {
            for t in 1..10 {
                let predicted = |t: i64| {
                    table.count(t, group, Outcome::TruePositive).unwrap()
                        + table.count(t, group, Outcome::FalsePositive).unwrap()
                };
                prop_assert!(predicted(t + 1) <= predicted(t));
            }
        }
    }
}
