//! Bar chart preparation for the first two numeric columns.
//!
//! Produces a render-agnostic [`BarChart`]; drawing it is left to the
//! caller (the HTTP client, or the CLI's JSON output).

use serde::Serialize;

use crate::error::VisualizationError;
use crate::models::Table;

/// At most this many numeric columns are charted.
pub const MAX_SERIES: usize = 2;

/// One bar series: a numeric column's values at the charted rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

/// Bar chart data. `x` holds the row index labels shared by all series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub x: Vec<usize>,
    pub series: Vec<Series>,
}

/// Build a bar chart from the first two numeric columns of `table`.
///
/// Rows where any charted column is missing are dropped. The table itself
/// is not modified.
pub fn bar_chart(table: &Table) -> Result<BarChart, VisualizationError> {
    let numeric: Vec<_> = table
        .columns
        .iter()
        .filter(|c| c.is_numeric())
        .take(MAX_SERIES)
        .collect();

    if numeric.is_empty() {
        return Err(VisualizationError::NoNumericColumns);
    }

    let rows: Vec<usize> = (0..table.row_count())
        .filter(|&row| numeric.iter().all(|c| c.cells[row].as_number().is_some()))
        .collect();

    if rows.is_empty() {
        return Err(VisualizationError::NoData);
    }

    let series = numeric
        .iter()
        .map(|c| Series {
            name: c.name.clone(),
            values: rows.iter().filter_map(|&row| c.cells[row].as_number()).collect(),
        })
        .collect();

    Ok(BarChart {
        x: rows.iter().map(|&row| table.index[row]).collect(),
        series,
    })
}
