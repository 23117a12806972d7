//! Named-column batches passed between pipeline stages.
//!
//! A [`Frame`] keeps its columns in insertion order. Stages never sort or
//! re-key columns, so the order a frame was built with is the order the model
//! eventually sees.

use std::collections::HashSet;

use crate::error::{PipelineError, Stage};
use crate::Result;

/// Values of one column across all rows of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<String>),
    Numeric(Vec<f64>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(values) => values.len(),
            ColumnData::Numeric(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            ColumnData::Numeric(values) => Some(values),
            ColumnData::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            ColumnData::Text(values) => Some(values),
            ColumnData::Numeric(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn text(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }
}

/// An ordered batch of equally long, uniquely named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Frame {
    /// Build a frame, rejecting duplicate names and ragged columns.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let num_rows = columns.first().map_or(0, |c| c.data.len());

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(PipelineError::schema(
                    Stage::Validation,
                    format!("duplicate column '{}'", column.name),
                ));
            }
            if column.data.len() != num_rows {
                return Err(PipelineError::schema(
                    Stage::Validation,
                    format!(
                        "column '{}' has {} rows, expected {}",
                        column.name,
                        column.data.len(),
                        num_rows
                    ),
                ));
            }
        }

        Ok(Self { columns, num_rows })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Text value at `row` of column `name`, if that column is textual.
    pub fn text(&self, name: &str, row: usize) -> Option<&str> {
        self.column(name)?
            .data
            .as_text()?
            .get(row)
            .map(String::as_str)
    }

    /// Numeric value at `row` of column `name`, if that column is numeric.
    pub fn numeric(&self, name: &str, row: usize) -> Option<f64> {
        self.column(name)?.data.as_numeric()?.get(row).copied()
    }

    /// Swap data of the column at `index` in place, keeping its name and position.
    pub(crate) fn replace_data(&mut self, index: usize, data: ColumnData) {
        debug_assert_eq!(data.len(), self.num_rows);
        self.columns[index].data = data;
    }

    #[cfg(test)]
    pub(crate) fn swap_columns(&mut self, a: usize, b: usize) {
        self.columns.swap(a, b);
    }
}
