//! In-place cleaning operations on a [`Table`].
//!
//! Both operations are idempotent: running either one on an already clean
//! table changes nothing.

use std::collections::HashSet;

use crate::models::{Cell, CleaningOptions, Table};

/// Hashable view of a cell for duplicate detection.
#[derive(Hash, PartialEq, Eq)]
enum CellKey<'a> {
    Number(u64),
    Text(&'a str),
    Missing,
}

impl<'a> From<&'a Cell> for CellKey<'a> {
    fn from(cell: &'a Cell) -> Self {
        match cell {
            // -0.0 == 0.0 and all NaNs compare equal
            Cell::Number(n) if *n == 0.0 => CellKey::Number(0f64.to_bits()),
            Cell::Number(n) if n.is_nan() => CellKey::Number(f64::NAN.to_bits()),
            Cell::Number(n) => CellKey::Number(n.to_bits()),
            Cell::Text(s) => CellKey::Text(s),
            Cell::Missing => CellKey::Missing,
        }
    }
}

/// Remove rows that duplicate an earlier row across all columns.
///
/// The first occurrence is kept and the remaining rows keep their order and
/// index labels. Returns the number of rows removed.
pub fn remove_duplicates(table: &mut Table) -> usize {
    let rows = table.row_count();
    let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(rows);
    let keep: Vec<bool> = (0..rows)
        .map(|row| seen.insert(table.row(row).map(CellKey::from).collect()))
        .collect();
    drop(seen);

    let removed = keep.iter().filter(|k| !**k).count();
    if removed > 0 {
        table.retain_rows(&keep);
    }
    removed
}

/// Replace missing cells of every numeric column with that column's mean.
///
/// The mean is taken once over the non-missing values present when this
/// runs. Text columns, and numeric columns with no values at all, are left
/// as they are. Returns the number of cells filled.
pub fn fill_missing_numeric(table: &mut Table) -> usize {
    let mut filled = 0;

    for column in table.columns.iter_mut().filter(|c| c.is_numeric()) {
        let Some(mean) = column_mean(&column.cells) else {
            continue;
        };

        for cell in column.cells.iter_mut().filter(|c| c.is_missing()) {
            *cell = Cell::Number(mean);
            filled += 1;
        }
    }

    filled
}

/// Arithmetic mean of the numeric cells, `None` when there are none.
pub fn column_mean(cells: &[Cell]) -> Option<f64> {
    let (sum, count) = cells
        .iter()
        .filter_map(Cell::as_number)
        .fold((0.0, 0usize), |(sum, count), n| (sum + n, count + 1));

    (count > 0).then(|| sum / count as f64)
}

/// Outcome of [`apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningReport {
    /// Rows removed, when deduplication ran.
    pub duplicates_removed: Option<usize>,
    /// Cells filled, when imputation ran.
    pub cells_filled: Option<usize>,
}

/// Apply the enabled operations: deduplicate first, then fill.
pub fn apply(table: &mut Table, options: CleaningOptions) -> CleaningReport {
    let duplicates_removed = options.remove_duplicates.then(|| remove_duplicates(table));
    let cells_filled = options.fill_missing_numeric.then(|| fill_missing_numeric(table));

    CleaningReport { duplicates_removed, cells_filled }
}
