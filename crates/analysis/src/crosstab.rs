//! Grouped frequency / aggregate tables with "Total" margins.
//!
//! Only observed row-key combinations and observed column values appear.
//! Inside an observed row, an empty count cell is 0 and an empty aggregate
//! cell is undefined.

use std::collections::BTreeMap;

use crate::config::Aggregation;
use crate::model::{Cell, Field, Key, Record, Table};

pub const TOTAL_LABEL: &str = "Total";

/// Running aggregate for one bucket.
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    n: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        if self.n == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.n += 1;
        self.sum += value;
    }

    fn finish(&self, aggregation: Option<Aggregation>) -> Option<f64> {
        if self.n == 0 {
            return match aggregation {
                None => Some(0.0),
                Some(_) => None,
            };
        }
        match aggregation {
            None | Some(Aggregation::Count) => Some(self.n as f64),
            Some(Aggregation::Sum) => Some(self.sum),
            Some(Aggregation::Mean) => Some(self.sum / self.n as f64),
            Some(Aggregation::Min) => Some(self.min),
            Some(Aggregation::Max) => Some(self.max),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrossTab {
    pub row_fields: Vec<Field>,
    pub column_field: Field,
    pub measure: Option<(Field, Aggregation)>,
    /// Sorted, observed row-key combinations.
    pub row_keys: Vec<Vec<Key>>,
    /// Sorted, observed column values.
    pub column_keys: Vec<Key>,
    cells: Vec<Vec<Option<f64>>>,
    row_totals: Vec<Option<f64>>,
    column_totals: Vec<Option<f64>>,
    grand_total: Option<f64>,
}

/// Cross-tabulate `records` by `rows` x `column`, counting or aggregating `measure`.
pub fn build(
    records: &[Record],
    rows: &[Field],
    column: Field,
    measure: Option<(Field, Aggregation)>,
) -> CrossTab {
    let mut buckets: BTreeMap<Vec<Key>, BTreeMap<Key, Accumulator>> = BTreeMap::new();
    let mut row_margin: BTreeMap<Vec<Key>, Accumulator> = BTreeMap::new();
    let mut column_margin: BTreeMap<Key, Accumulator> = BTreeMap::new();
    let mut grand = Accumulator::default();

    'records: for record in records {
        let mut row_key = Vec::with_capacity(rows.len());
        for field in rows {
            match field.key(record) {
                Some(k) => row_key.push(k),
                None => continue 'records,
            }
        }
        let Some(col_key) = column.key(record) else { continue };

        let value = match measure {
            None => 1.0,
            Some((field, Aggregation::Count)) => match field.key(record) {
                Some(_) => 1.0,
                None => continue,
            },
            Some((field, _)) => match field.number(record) {
                Some(v) => v,
                None => continue,
            },
        };

        buckets
            .entry(row_key.clone())
            .or_default()
            .entry(col_key.clone())
            .or_default()
            .add(value);
        row_margin.entry(row_key).or_default().add(value);
        column_margin.entry(col_key).or_default().add(value);
        grand.add(value);
    }

    let aggregation = measure.map(|(_, agg)| agg);
    let column_keys: Vec<Key> = column_margin.keys().cloned().collect();

    let cells = buckets
        .values()
        .map(|by_col| {
            column_keys
                .iter()
                .map(|ck| by_col.get(ck).copied().unwrap_or_default().finish(aggregation))
                .collect()
        })
        .collect();

    CrossTab {
        row_fields: rows.to_vec(),
        column_field: column,
        measure,
        row_keys: buckets.keys().cloned().collect(),
        column_totals: column_margin.values().map(|acc| acc.finish(aggregation)).collect(),
        row_totals: row_margin.values().map(|acc| acc.finish(aggregation)).collect(),
        column_keys,
        cells,
        grand_total: if grand.n == 0 { None } else { grand.finish(aggregation) },
    }
}

impl CrossTab {
    fn row_index(&self, row: &[Key]) -> Option<usize> {
        self.row_keys.binary_search_by(|k| k.as_slice().cmp(row)).ok()
    }

    fn column_index(&self, column: &Key) -> Option<usize> {
        self.column_keys.binary_search(column).ok()
    }

    /// Cell value; `None` when the row/column is absent or the cell is undefined.
    pub fn cell(&self, row: &[Key], column: &Key) -> Option<f64> {
        let r = self.row_index(row)?;
        let c = self.column_index(column)?;
        self.cells[r][c]
    }

    pub fn row_total(&self, row: &[Key]) -> Option<f64> {
        self.row_index(row).and_then(|r| self.row_totals[r])
    }

    pub fn column_total(&self, column: &Key) -> Option<f64> {
        self.column_index(column).and_then(|c| self.column_totals[c])
    }

    pub fn grand_total(&self) -> Option<f64> {
        self.grand_total
    }

    /// Body rows as (row key, cells in `column_keys` order).
    pub fn rows(&self) -> impl Iterator<Item = (&[Key], &[Option<f64>])> {
        self.row_keys
            .iter()
            .map(Vec::as_slice)
            .zip(self.cells.iter().map(Vec::as_slice))
    }

    pub fn is_empty(&self) -> bool {
        self.row_keys.is_empty()
    }

    pub fn to_table(&self) -> Table {
        let mut header: Vec<Cell> = self.row_fields.iter().map(|f| Cell::text(f.label())).collect();
        header.extend(self.column_keys.iter().map(Key::to_cell));
        header.push(Cell::text(TOTAL_LABEL));

        let mut table = Table::new(header);
        for (idx, (keys, cells)) in self.rows().enumerate() {
            let mut row: Vec<Cell> = keys.iter().map(Key::to_cell).collect();
            row.extend(cells.iter().map(|v| Cell::from_opt(*v)));
            row.push(Cell::from_opt(self.row_totals[idx]));
            table.push_row(row);
        }

        let mut total_row = vec![Cell::text(TOTAL_LABEL)];
        total_row.extend(std::iter::repeat(Cell::Empty).take(self.row_fields.len().saturating_sub(1)));
        total_row.extend(self.column_totals.iter().map(|v| Cell::from_opt(*v)));
        total_row.push(Cell::from_opt(self.grand_total));
        table.push_row(total_row);

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(county: &str, race: &str, score: Option<f64>, decision: &str) -> Record {
        Record {
            county: Some(county.into()),
            race: Some(race.into()),
            gender: Some("Male".into()),
            education_level: Some("College".into()),
            risk_score: score,
            judge_decision: Some(decision.into()),
            reoffense: Some("No".into()),
            ai_decision: None,
        }
    }

    fn t(s: &str) -> Key {
        Key::text(s)
    }

    #[test]
    fn counts_with_margins() {
        let records = vec![
            rec("Adams", "A", Some(3.0), "Granted"),
            rec("Adams", "A", Some(5.0), "Denied"),
            rec("Adams", "B", Some(7.0), "Denied"),
            rec("Baker", "B", Some(9.0), "Denied"),
        ];
        let ct = build(&records, &[Field::County], Field::Race, None);

        assert_eq!(ct.row_keys, vec![vec![t("Adams")], vec![t("Baker")]]);
        assert_eq!(ct.column_keys, vec![t("A"), t("B")]);
        assert_eq!(ct.cell(&[t("Adams")], &t("A")), Some(2.0));
        assert_eq!(ct.cell(&[t("Baker")], &t("A")), Some(0.0));
        assert_eq!(ct.row_total(&[t("Adams")]), Some(3.0));
        assert_eq!(ct.column_total(&t("B")), Some(2.0));
        assert_eq!(ct.grand_total(), Some(4.0));
    }

    #[test]
    fn mean_margins_use_underlying_values() {
        let records = vec![
            rec("Adams", "A", Some(2.0), "Granted"),
            rec("Adams", "A", Some(4.0), "Granted"),
            rec("Adams", "B", Some(9.0), "Denied"),
            rec("Baker", "B", Some(6.0), "Denied"),
        ];
        let ct = build(&records, &[Field::County], Field::Race, Some((Field::RiskScore, Aggregation::Mean)));

        assert_eq!(ct.cell(&[t("Adams")], &t("A")), Some(3.0));
        // Baker has no A: undefined rather than zero
        assert_eq!(ct.cell(&[t("Baker")], &t("A")), None);
        // (2 + 4 + 9) / 3, not the mean of the cell means
        assert_eq!(ct.row_total(&[t("Adams")]), Some(5.0));
        assert_eq!(ct.column_total(&t("B")), Some(7.5));
        assert_eq!(ct.grand_total(), Some(21.0 / 4.0));
    }

    #[test]
    fn min_max_sum() {
        let records = vec![
            rec("Adams", "A", Some(2.0), "Granted"),
            rec("Adams", "A", Some(8.0), "Granted"),
        ];
        let sum = build(&records, &[Field::County], Field::Race, Some((Field::RiskScore, Aggregation::Sum)));
        let min = build(&records, &[Field::County], Field::Race, Some((Field::RiskScore, Aggregation::Min)));
        let max = build(&records, &[Field::County], Field::Race, Some((Field::RiskScore, Aggregation::Max)));
        assert_eq!(sum.cell(&[t("Adams")], &t("A")), Some(10.0));
        assert_eq!(min.grand_total(), Some(2.0));
        assert_eq!(max.grand_total(), Some(8.0));
    }

    #[test]
    fn null_keys_and_values_are_excluded() {
        let mut missing_race = rec("Adams", "A", Some(4.0), "Granted");
        missing_race.race = None;
        let records = vec![
            rec("Adams", "A", Some(2.0), "Granted"),
            rec("Adams", "A", None, "Granted"),
            missing_race,
        ];

        let counts = build(&records, &[Field::County], Field::Race, None);
        assert_eq!(counts.grand_total(), Some(2.0));

        let means = build(&records, &[Field::County], Field::Race, Some((Field::RiskScore, Aggregation::Mean)));
        assert_eq!(means.grand_total(), Some(2.0));

        let non_null = build(&records, &[Field::County], Field::Race, Some((Field::RiskScore, Aggregation::Count)));
        assert_eq!(non_null.grand_total(), Some(1.0));
    }

    #[test]
    fn unobserved_row_combinations_are_omitted() {
        let records = vec![
            rec("Adams", "A", Some(1.0), "Granted"),
            rec("Baker", "B", Some(2.0), "Denied"),
        ];
        let ct = build(&records, &[Field::County, Field::JudgeDecision], Field::Race, None);
        assert_eq!(
            ct.row_keys,
            vec![vec![t("Adams"), t("Granted")], vec![t("Baker"), t("Denied")]]
        );
    }

    #[test]
    fn numeric_column_keys_sort_numerically() {
        let records = vec![
            rec("Adams", "A", Some(10.0), "Denied"),
            rec("Adams", "A", Some(2.0), "Granted"),
            rec("Adams", "A", Some(9.0), "Denied"),
        ];
        let ct = build(&records, &[Field::JudgeDecision], Field::RiskScore, None);
        assert_eq!(ct.column_keys, vec![Key::number(2.0), Key::number(9.0), Key::number(10.0)]);
    }

    #[test]
    fn table_layout_has_total_row_and_column() {
        let records = vec![
            rec("Adams", "A", Some(1.0), "Granted"),
            rec("Adams", "B", Some(2.0), "Denied"),
            rec("Baker", "B", Some(2.0), "Denied"),
        ];
        let table = build(&records, &[Field::County, Field::JudgeDecision], Field::Race, None).to_table();

        assert_eq!(
            table.header,
            vec![
                Cell::text("County"),
                Cell::text("Judge Decision"),
                Cell::text("A"),
                Cell::text("B"),
                Cell::text("Total"),
            ]
        );
        assert_eq!(table.rows.len(), 4);
        let last = table.rows.last().unwrap();
        assert_eq!(
            last,
            &vec![
                Cell::text("Total"),
                Cell::Empty,
                Cell::Number(1.0),
                Cell::Number(2.0),
                Cell::Number(3.0),
            ]
        );
        assert_eq!(table.get(&["Adams", "Denied"], "B"), Some(&Cell::Number(1.0)));
    }

    #[test]
    fn empty_input_yields_only_total_row() {
        let ct = build(&[], &[Field::County], Field::Race, None);
        assert!(ct.is_empty());
        let table = ct.to_table();
        assert_eq!(table.rows, vec![vec![Cell::text("Total"), Cell::Empty]]);
    }
}
