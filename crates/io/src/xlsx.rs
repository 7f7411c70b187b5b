// Excel report sink (xlsx)
//
// The whole workbook is held in memory: sheets already present in the output
// file are loaded on open, same-named sheets are replaced as the run writes
// them, and the file is written once by `save`. Kept sheets are written back
// with their values, formulas and dates; cell styles are not carried over.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader};
use rust_xlsxwriter::{Format, Formula, Workbook as XlsxWorkbook, Worksheet};
use verdict_analysis::{AnalysisError, Cell, SheetSink, Table};

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
const DURATION_FORMAT: &str = "[h]:mm:ss";

pub struct XlsxReport {
    path: PathBuf,
    sheets: Vec<(String, Sheet)>,
}

enum Sheet {
    /// Written by this run.
    Written(Table),
    /// Loaded from the existing report and left untouched.
    Kept(KeptSheet),
}

struct KeptSheet {
    table: Table,
    values: Range<Data>,
    formulas: Range<String>,
}

impl Sheet {
    fn table(&self) -> &Table {
        match self {
            Sheet::Written(table) => table,
            Sheet::Kept(kept) => &kept.table,
        }
    }
}

impl XlsxReport {
    /// Open the report at `path`, keeping any sheets it already holds.
    /// A missing file starts an empty report.
    pub fn open(path: &Path) -> Result<Self, AnalysisError> {
        let mut report = Self { path: path.to_path_buf(), sheets: Vec::new() };
        if !path.exists() {
            return Ok(report);
        }

        let mut workbook = open_workbook_auto(path)
            .map_err(|e| sink_error(format!("Failed to open existing report {}: {e}", path.display())))?;
        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
        for name in sheet_names {
            let values = workbook
                .worksheet_range(&name)
                .map_err(|e| sink_error(format!("Failed to read sheet '{name}': {e}")))?;
            let formulas = workbook
                .worksheet_formula(&name)
                .map_err(|e| sink_error(format!("Failed to read formulas of sheet '{name}': {e}")))?;
            log::debug!("keeping existing sheet '{name}'");
            let table = range_to_table(&values);
            report.sheets.push((name, Sheet::Kept(KeptSheet { table, values, formulas })));
        }
        Ok(report)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Table> {
        self.position(name).map(|idx| self.sheets[idx].1.table())
    }

    // Excel compares sheet names case-insensitively
    fn position(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.sheets.iter().position(|(n, _)| n.to_lowercase() == wanted)
    }

    /// Write every sheet to disk, creating the parent directory if needed.
    /// Returns the number of sheets written.
    pub fn save(&self) -> Result<usize, AnalysisError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| sink_error(format!("Failed to create {}: {e}", parent.display())))?;
        }

        let mut xlsx_workbook = XlsxWorkbook::new();
        let header_format = Format::new().set_bold();

        for (name, sheet) in &self.sheets {
            let worksheet = xlsx_workbook
                .add_worksheet()
                .set_name(name)
                .map_err(|e| sink_error(format!("Failed to create sheet '{name}': {e}")))?;
            match sheet {
                Sheet::Written(table) => {
                    write_row(worksheet, 0, &table.header, Some(&header_format))?;
                    for (idx, row) in table.rows.iter().enumerate() {
                        write_row(worksheet, idx as u32 + 1, row, None)?;
                    }
                }
                Sheet::Kept(kept) => write_kept(worksheet, kept)?,
            }
            worksheet.autofit();
        }

        xlsx_workbook
            .save(&self.path)
            .map_err(|e| sink_error(format!("Failed to save XLSX file {}: {e}", self.path.display())))?;
        log::info!("wrote {} sheets to {}", self.sheets.len(), self.path.display());
        Ok(self.sheets.len())
    }
}

impl SheetSink for XlsxReport {
    fn write_sheet(&mut self, name: &str, table: &Table) -> Result<(), AnalysisError> {
        let entry = (name.to_string(), Sheet::Written(table.clone()));
        match self.position(name) {
            Some(idx) => self.sheets[idx] = entry,
            None => self.sheets.push(entry),
        }
        Ok(())
    }
}

fn sink_error(msg: String) -> AnalysisError {
    AnalysisError::Sink(msg)
}

fn column(row: u32, col: usize) -> Result<u16, AnalysisError> {
    u16::try_from(col).map_err(|_| sink_error(format!("row {row} has too many columns ({})", col + 1)))
}

fn write_row(
    worksheet: &mut Worksheet,
    row: u32,
    cells: &[Cell],
    format: Option<&Format>,
) -> Result<(), AnalysisError> {
    for (col, cell) in cells.iter().enumerate() {
        let col = column(row, col)?;
        let written = match (cell, format) {
            (Cell::Empty, _) => continue,
            (Cell::Text(s), Some(f)) => worksheet.write_string_with_format(row, col, s, f).map(|_| ()),
            (Cell::Text(s), None) => worksheet.write_string(row, col, s).map(|_| ()),
            (Cell::Number(n), Some(f)) => worksheet.write_number_with_format(row, col, *n, f).map(|_| ()),
            (Cell::Number(n), None) => worksheet.write_number(row, col, *n).map(|_| ()),
            (Cell::Bool(b), Some(f)) => worksheet.write_boolean_with_format(row, col, *b, f).map(|_| ()),
            (Cell::Bool(b), None) => worksheet.write_boolean(row, col, *b).map(|_| ()),
        };
        written.map_err(|e| sink_error(format!("Failed to write cell ({row}, {col}): {e}")))?;
    }
    Ok(())
}

/// Write a kept sheet back cell by cell at its original positions.
/// Formula cells are written as formulas with their last computed value.
fn write_kept(worksheet: &mut Worksheet, kept: &KeptSheet) -> Result<(), AnalysisError> {
    let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);
    let duration_format = Format::new().set_num_format(DURATION_FORMAT);
    let is_formula = |pos: (u32, u32)| kept.formulas.get_value(pos).is_some_and(|f| !f.is_empty());

    let (start_row, start_col) = kept.values.start().unwrap_or((0, 0));
    for (r, c, data) in kept.values.used_cells() {
        let (row, col) = (start_row + r as u32, start_col as usize + c);
        if is_formula((row, col as u32)) {
            continue;
        }
        let col = column(row, col)?;
        let written = match data {
            Data::Empty => continue,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                worksheet.write_string(row, col, s).map(|_| ())
            }
            Data::Float(n) => worksheet.write_number(row, col, *n).map(|_| ()),
            Data::Int(n) => worksheet.write_number(row, col, *n as f64).map(|_| ()),
            Data::Bool(b) => worksheet.write_boolean(row, col, *b).map(|_| ()),
            Data::DateTime(dt) => {
                let format = if dt.is_duration() { &duration_format } else { &datetime_format };
                worksheet.write_number_with_format(row, col, dt.as_f64(), format).map(|_| ())
            }
            Data::Error(e) => worksheet.write_string(row, col, e.to_string()).map(|_| ()),
        };
        written.map_err(|e| sink_error(format!("Failed to write cell ({row}, {col}): {e}")))?;
    }

    let (start_row, start_col) = kept.formulas.start().unwrap_or((0, 0));
    for (r, c, formula) in kept.formulas.used_cells() {
        if formula.is_empty() {
            continue;
        }
        let (row, col) = (start_row + r as u32, start_col as usize + c);
        let cached = kept
            .values
            .get_value((row, col as u32))
            .map(ToString::to_string)
            .unwrap_or_default();
        let col = column(row, col)?;
        worksheet
            .write_formula(row, col, Formula::new(formula).set_result(cached))
            .map_err(|e| sink_error(format!("Failed to write formula ({row}, {col}): {e}")))?;
    }
    Ok(())
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

/// Convert a worksheet range into a table anchored at A1.
fn range_to_table(range: &Range<Data>) -> Table {
    let Some((start_row, start_col)) = range.start() else {
        return Table::default();
    };

    let mut grid: Vec<Vec<Cell>> = (0..start_row).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; start_col as usize];
        cells.extend(row.iter().map(data_to_cell));
        while cells.last().is_some_and(Cell::is_empty) {
            cells.pop();
        }
        grid.push(cells);
    }

    let mut rows = grid.into_iter();
    let header = rows.next().unwrap_or_default();
    Table { header, rows: rows.collect() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(label: &str, value: f64) -> Table {
        let header = ["County", "A", "B", "Total"].map(Cell::text).to_vec();
        let mut table = Table::new(header);
        table.push_row(vec![Cell::text(label), Cell::Number(value), Cell::Empty, Cell::Number(value)]);
        table.push_row(vec![Cell::text("Total"), Cell::Number(value), Cell::Bool(true), Cell::Number(value)]);
        table
    }

    fn reread(path: &Path) -> Vec<(String, Table)> {
        let mut workbook = open_workbook_auto(path).unwrap();
        let names: Vec<String> = workbook.sheet_names().to_vec();
        names
            .into_iter()
            .map(|name| {
                let range = workbook.worksheet_range(&name).unwrap();
                (name, range_to_table(&range))
            })
            .collect()
    }

    #[test]
    fn test_save_creates_parent_and_writes_cells() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("output/Analysis_output.xlsx");

        let mut report = XlsxReport::open(&path).unwrap();
        assert!(report.sheet_names().is_empty());
        report.write_sheet("Demo_Race", &sample("Adams", 4.0)).unwrap();
        report.write_sheet("Risk_Race", &sample("Baker", 5.5)).unwrap();
        assert_eq!(report.save().unwrap(), 2);

        let sheets = reread(&path);
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].0, "Demo_Race");
        assert_eq!(sheets[0].1, sample("Adams", 4.0));
        assert_eq!(sheets[1].1.get(&["Baker"], "A"), Some(&Cell::Number(5.5)));
    }

    #[test]
    fn test_reopen_replaces_and_keeps_unrelated_sheets() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.xlsx");

        let mut first = XlsxReport::open(&path).unwrap();
        first.write_sheet("Notes", &sample("Keep", 1.0)).unwrap();
        first.write_sheet("Demo_Race", &sample("Stale", 1.0)).unwrap();
        first.save().unwrap();

        let mut second = XlsxReport::open(&path).unwrap();
        assert_eq!(second.sheet_names(), vec!["Notes", "Demo_Race"]);
        assert_eq!(second.sheet("DEMO_RACE"), Some(&sample("Stale", 1.0)));
        assert_eq!(second.path(), path.as_path());
        second.write_sheet("demo_race", &sample("Fresh", 2.0)).unwrap();
        second.write_sheet("Fairness_Risk", &sample("New", 3.0)).unwrap();
        second.save().unwrap();

        let sheets = reread(&path);
        let names: Vec<&str> = sheets.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Notes", "demo_race", "Fairness_Risk"]);
        assert_eq!(sheets[0].1, sample("Keep", 1.0));
        assert_eq!(sheets[1].1, sample("Fresh", 2.0));
    }

    #[test]
    fn test_reopen_keeps_formulas_and_dates_of_unrelated_sheets() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.xlsx");

        let mut workbook = XlsxWorkbook::new();
        let charts = workbook.add_worksheet().set_name("Charts").unwrap();
        charts.write_number(0, 0, 2.0).unwrap();
        charts.write_formula(1, 0, Formula::new("=A1*10").set_result("20")).unwrap();
        let date = Format::new().set_num_format("yyyy-mm-dd");
        charts.write_number_with_format(0, 1, 45000.0, &date).unwrap();
        workbook.save(&path).unwrap();

        let mut report = XlsxReport::open(&path).unwrap();
        report.write_sheet("Demo_Race", &sample("Adams", 4.0)).unwrap();
        report.save().unwrap();

        let mut reread = open_workbook_auto(&path).unwrap();
        assert_eq!(reread.sheet_names().to_vec(), vec!["Charts", "Demo_Race"]);
        let formulas = reread.worksheet_formula("Charts").unwrap();
        assert_eq!(formulas.get_value((1, 0)).map(String::as_str), Some("A1*10"));
        let values = reread.worksheet_range("Charts").unwrap();
        assert_eq!(values.get_value((0, 0)), Some(&Data::Float(2.0)));
        assert_eq!(values.get_value((1, 0)), Some(&Data::Float(20.0)));
        match values.get_value((0, 1)) {
            Some(Data::DateTime(dt)) => assert_eq!(dt.as_f64(), 45000.0),
            other => panic!("expected a date, got {other:?}"),
        }
    }

    #[test]
    fn test_repeat_run_is_stable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.xlsx");

        for _ in 0..2 {
            let mut report = XlsxReport::open(&path).unwrap();
            report.write_sheet("Demo_Race", &sample("Adams", 4.0)).unwrap();
            report.save().unwrap();
        }

        let sheets = reread(&path);
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].1, sample("Adams", 4.0));
    }

    #[test]
    fn test_unreadable_existing_report_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.xlsx");
        std::fs::write(&path, b"not a zip").unwrap();

        let err = XlsxReport::open(&path).err().unwrap();
        assert!(matches!(err, AnalysisError::Sink(_)), "got {err}");
    }

    #[test]
    fn test_range_offset_is_anchored_at_a1() {
        let mut range: Range<Data> = Range::new((1, 1), (2, 2));
        range.set_value((1, 1), Data::String("h".into()));
        range.set_value((2, 2), Data::Float(3.0));

        let table = range_to_table(&range);
        assert!(table.header.is_empty());
        assert_eq!(table.rows[0], vec![Cell::Empty, Cell::text("h")]);
        assert_eq!(table.rows[1], vec![Cell::Empty, Cell::Empty, Cell::Number(3.0)]);
    }
}
