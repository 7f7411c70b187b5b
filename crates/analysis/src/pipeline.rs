use serde::Serialize;

use crate::config::{Analysis, AnalysisPlan};
use crate::crosstab;
use crate::error::AnalysisError;
use crate::fairness;
use crate::model::{Record, Table};
use crate::sink::SheetSink;
use crate::sweep;

/// Rows in table previews written to the debug log.
const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub topic: String,
    pub kind: &'static str,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub plan: String,
    pub engine_version: String,
    pub records: usize,
    pub sheets: Vec<SheetSummary>,
}

/// Run every analysis of `plan` over `records`, handing each table to `sink`
/// as soon as it is built.
pub fn run(
    plan: &AnalysisPlan,
    records: &[Record],
    sink: &mut dyn SheetSink,
) -> Result<RunSummary, AnalysisError> {
    plan.validate()?;

    let mut sheets = Vec::new();
    for analysis in &plan.analyses {
        let topic = analysis.topic();
        log::info!(">>> {topic}");

        match analysis {
            Analysis::Crosstab(spec) => {
                for variant in spec.variants() {
                    let table = crosstab::build(records, &variant.rows, variant.column, spec.measure());
                    export(sink, &mut sheets, &variant.sheet, topic, "crosstab", &table.to_table())?;
                }
            }
            Analysis::Fairness(spec) => {
                let result = fairness::compute(records, spec);
                if spec.export_crosstab {
                    let table = result.crosstab.to_table();
                    export(sink, &mut sheets, &spec.crosstab_sheet(), topic, "crosstab", &table)?;
                }
                export(sink, &mut sheets, &spec.topic, topic, "fairness", &result.to_table())?;
            }
            Analysis::Sweep(spec) => {
                let result = sweep::sweep(records, spec);
                export(sink, &mut sheets, &spec.topic, topic, "sweep", &result.to_table())?;
            }
        }
    }

    Ok(RunSummary {
        plan: plan.name.clone(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        records: records.len(),
        sheets,
    })
}

fn export(
    sink: &mut dyn SheetSink,
    sheets: &mut Vec<SheetSummary>,
    name: &str,
    topic: &str,
    kind: &'static str,
    table: &Table,
) -> Result<(), AnalysisError> {
    log::debug!("{name}:\n{}", table.preview(PREVIEW_ROWS));
    sink.write_sheet(name, table)?;
    log::info!("{name} exported");

    sheets.push(SheetSummary {
        name: name.to_string(),
        topic: topic.to_string(),
        kind,
        rows: table.rows.len(),
        columns: table.width(),
    });
    Ok(())
}
