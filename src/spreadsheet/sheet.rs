use crate::spreadsheet::cell::Cell;

/// A worksheet read from a workbook: its non-empty cells in row-major order plus the used range.
#[derive(Debug)]
pub(crate) struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Worksheet name
    pub(crate) name: String,
    /// Non-empty cells, ordered by row then column
    pub(crate) cells: Vec<Cell>,
    /// Actual data range (determined from cell data)
    pub(crate) row_lower_bound: Option<usize>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell to the sheet, updating the used range.
    pub(crate) fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        self.cells.push(cell);
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_lower_bound.map(|lower| row < lower).unwrap_or(true) {
            self.row_lower_bound = Some(row);
        }
        if self.row_upper_bound.map(|upper| upper < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_lower_bound.map(|lower| col < lower).unwrap_or(true) {
            self.col_lower_bound = Some(col);
        }
        if self.col_upper_bound.map(|upper| upper < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Number of columns in the used range.
    pub(crate) fn width(&self) -> usize {
        match (self.col_lower_bound, self.col_upper_bound) {
            (Some(lower), Some(upper)) => upper - lower + 1,
            _ => 0,
        }
    }

    /// Lays the used range out as a dense grid, one record per row that holds at least one cell.
    /// Rows that hold no cell at all are left out.
    pub(crate) fn records(&self) -> Vec<Vec<Option<&Cell>>> {
        let (Some(col_lower), width) = (self.col_lower_bound, self.width()) else {
            return Vec::new();
        };
        let mut cells: Vec<&Cell> = self.cells.iter().collect();
        cells.sort_by_key(|cell| (cell.row, cell.col));

        let mut records = Vec::<Vec<Option<&Cell>>>::new();
        let mut current_row = None::<usize>;
        for cell in cells {
            if current_row != Some(cell.row) {
                records.push(vec![None; width]);
                current_row = Some(cell.row);
            }
            if let Some(record) = records.last_mut() {
                record[cell.col - col_lower] = Some(cell);
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellType;

    fn push(sheet: &mut Sheet, row: usize, col: usize, value: &str) {
        sheet.push(Cell {
            row,
            col,
            kind: CellType::InlineString,
            value: value.to_owned(),
        });
    }

    #[test]
    fn sheet_initial() {
        let sheet = Sheet::new("", "");

        assert!(sheet.is_empty());
        assert_eq!(sheet.row_lower_bound, None);
        assert_eq!(sheet.col_upper_bound, None);
        assert!(sheet.records().is_empty());
    }

    #[test]
    fn sheet_update() {
        let mut sheet = Sheet::new("", "");
        push(&mut sheet, 1, 1, "a");
        push(&mut sheet, 1, 3, "b");
        push(&mut sheet, 3, 1, "c");
        push(&mut sheet, 3, 3, "d");

        assert_eq!(sheet.row_lower_bound, Some(1));
        assert_eq!(sheet.row_upper_bound, Some(3));
        assert_eq!(sheet.col_lower_bound, Some(1));
        assert_eq!(sheet.col_upper_bound, Some(3));
        assert_eq!(sheet.width(), 3);
    }

    #[test]
    fn records_skip_empty_rows_and_fill_gaps() {
        let mut sheet = Sheet::new("", "");
        push(&mut sheet, 1, 1, "a");
        push(&mut sheet, 1, 3, "b");
        push(&mut sheet, 3, 2, "c");

        let records = sheet.records();
        assert_eq!(records.len(), 2);
        let values: Vec<Vec<Option<&str>>> = records
            .iter()
            .map(|record| record.iter().map(|cell| cell.map(|cell| cell.value.as_str())).collect())
            .collect();
        assert_eq!(values, vec![vec![Some("a"), None, Some("b")], vec![None, Some("c"), None]]);
    }
}
