use crate::error::AnalysisError;
use crate::model::Table;

/// Destination for finished tables, one named sheet per table.
///
/// Writing a name that already exists replaces that sheet in place.
pub trait SheetSink {
    fn write_sheet(&mut self, name: &str, table: &Table) -> Result<(), AnalysisError>;
}

/// In-memory sink, keeps sheets in first-write order.
#[derive(Debug, Default)]
pub struct MemorySink {
    sheets: Vec<(String, Table)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.sheets.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

impl SheetSink for MemorySink {
    fn write_sheet(&mut self, name: &str, table: &Table) -> Result<(), AnalysisError> {
        match self.sheets.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = table.clone(),
            None => self.sheets.push((name.to_string(), table.clone())),
        }
        Ok(())
    }
}
