//! Column projection.

use crate::error::SelectionError;
use crate::models::{ColumnSelection, Table};

/// Restrict `table` to the selected columns.
///
/// The result always keeps the table's own column order, whatever order the
/// names were given in. Projection starts from the full table every time,
/// so changing the selection never compounds an earlier one.
pub fn select_columns(table: &Table, selection: &ColumnSelection) -> Result<Table, SelectionError> {
    let Some(names) = &selection.0 else {
        return Ok(table.clone());
    };

    if names.is_empty() {
        return Err(SelectionError::Empty);
    }

    if let Some(unknown) = names.iter().find(|n| table.column(n).is_none()) {
        return Err(SelectionError::UnknownColumn(unknown.clone()));
    }

    let columns = table
        .columns
        .iter()
        .filter(|c| names.contains(&c.name))
        .cloned()
        .collect();

    Ok(Table { columns, index: table.index.clone() })
}
