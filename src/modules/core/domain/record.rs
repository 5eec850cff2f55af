//! Query results

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One result row, values in selected-column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    /// Pair column names with values; both must have the same length
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Value at a column position
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the first column with this name
    pub fn get_by_name(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Every row of a result plus its column names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as [`Record`]s
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.rows
            .iter()
            .map(|row| Record::new(self.columns.clone(), row.clone()))
    }

    pub fn first(&self) -> Option<Record> {
        self.records().next()
    }
}

/// Result of running a described statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// SELECT fetching one row
    Row(Option<Record>),
    /// SELECT fetching every row
    Rows(RowSet),
    /// INSERT, UPDATE or DELETE
    Affected(u64),
}

impl Outcome {
    pub fn into_row(self) -> Option<Record> {
        match self {
            Outcome::Row(row) => row,
            Outcome::Rows(rows) => rows.first(),
            Outcome::Affected(_) => None,
        }
    }

    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            Outcome::Affected(n) => Some(*n),
            _ => None,
        }
    }
}
