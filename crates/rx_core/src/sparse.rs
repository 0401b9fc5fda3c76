//! Dense grids and their CSR compaction.
//!
//! A `SparseGrid` keeps three arrays:
//! - `values`: nonzero cells in row-major order
//! - `col_indices`: the column of each stored value
//! - `row_ptr`: `rows + 1` running counts; row `r` owns
//!   `values[row_ptr[r]..row_ptr[r + 1]]`
//!
//! Empty rows show up as two equal consecutive `row_ptr` entries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("{rows}x{cols} grid needs {expected} cells, got {found}")]
    Shape { rows: usize, cols: usize, expected: usize, found: usize },

    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged { row: usize, expected: usize, found: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SparseError {
    #[error("row pointer has {found} entries, expected {expected}")]
    RowPtrLength { expected: usize, found: usize },

    #[error("{values} values but {indices} column indices")]
    LengthMismatch { values: usize, indices: usize },

    #[error("row pointer must start at 0, starts at {0}")]
    RowPtrStart(usize),

    #[error("row pointer decreases at row {row}")]
    NonMonotonic { row: usize },

    #[error("row pointer ends at {found}, expected {expected}")]
    CountMismatch { expected: usize, found: usize },

    #[error("column {col} out of range for {cols} columns")]
    ColumnOutOfRange { col: usize, cols: usize },

    #[error("columns not strictly increasing in row {row}")]
    UnorderedColumns { row: usize },

    #[error("explicit zero stored at position {index}")]
    StoredZero { index: usize },
}

// =============================================================================
// Grid
// =============================================================================

/// Rectangular row-major grid of cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<i32>,
}

impl Grid {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, cells: vec![0; rows * cols] }
    }

    pub fn from_cells(rows: usize, cols: usize, cells: Vec<i32>) -> Result<Self, GridError> {
        let expected = rows * cols;
        if cells.len() != expected {
            return Err(GridError::Shape { rows, cols, expected, found: cells.len() });
        }
        Ok(Self { rows, cols, cells })
    }

    /// Build from nested rows. An empty input is a 0x0 grid.
    pub fn from_rows(rows: &[Vec<i32>]) -> Result<Self, GridError> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut cells = Vec::with_capacity(rows.len() * cols);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != cols {
                return Err(GridError::Ragged { row, expected: cols, found: values.len() });
            }
            cells.extend_from_slice(values);
        }
        Ok(Self { rows: rows.len(), cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cells(&self) -> &[i32] {
        &self.cells
    }

    pub fn row(&self, r: usize) -> &[i32] {
        &self.cells[r * self.cols..(r + 1) * self.cols]
    }

    pub fn get(&self, r: usize, c: usize) -> Option<i32> {
        if r < self.rows && c < self.cols {
            Some(self.cells[r * self.cols + c])
        } else {
            None
        }
    }

    pub fn set(&mut self, r: usize, c: usize, value: i32) {
        self.cells[r * self.cols + c] = value;
    }

    pub fn count_nonzero(&self) -> usize {
        self.cells.iter().filter(|&&v| v != 0).count()
    }
}

// =============================================================================
// SparseGrid
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SparseGrid {
    pub values: Vec<i32>,
    pub col_indices: Vec<usize>,
    pub row_ptr: Vec<usize>,
}

impl SparseGrid {
    /// Number of stored (nonzero) cells
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Check the structural invariants against a `rows x cols` shape.
    pub fn validate(&self, rows: usize, cols: usize) -> Result<(), SparseError> {
        if self.row_ptr.len() != rows + 1 {
            return Err(SparseError::RowPtrLength { expected: rows + 1, found: self.row_ptr.len() });
        }
        if self.values.len() != self.col_indices.len() {
            return Err(SparseError::LengthMismatch {
                values: self.values.len(),
                indices: self.col_indices.len(),
            });
        }
        if self.row_ptr[0] != 0 {
            return Err(SparseError::RowPtrStart(self.row_ptr[0]));
        }
        for row in 0..rows {
            let (start, end) = (self.row_ptr[row], self.row_ptr[row + 1]);
            if end < start {
                return Err(SparseError::NonMonotonic { row });
            }
            if end > self.values.len() {
                return Err(SparseError::CountMismatch { expected: self.values.len(), found: end });
            }
            let mut prev: Option<usize> = None;
            for idx in start..end {
                let col = self.col_indices[idx];
                if col >= cols {
                    return Err(SparseError::ColumnOutOfRange { col, cols });
                }
                if prev.is_some_and(|p| col <= p) {
                    return Err(SparseError::UnorderedColumns { row });
                }
                if self.values[idx] == 0 {
                    return Err(SparseError::StoredZero { index: idx });
                }
                prev = Some(col);
            }
        }
        let last = self.row_ptr[rows];
        if last != self.values.len() {
            return Err(SparseError::CountMismatch { expected: self.values.len(), found: last });
        }
        Ok(())
    }
}

/// Compact a dense grid. Zero cells are never stored.
pub fn encode(grid: &Grid) -> SparseGrid {
    let nnz = grid.count_nonzero();
    let mut values = Vec::with_capacity(nnz);
    let mut col_indices = Vec::with_capacity(nnz);
    let mut row_ptr = Vec::with_capacity(grid.rows() + 1);
    row_ptr.push(0);

    for r in 0..grid.rows() {
        for (c, &v) in grid.row(r).iter().enumerate() {
            if v != 0 {
                values.push(v);
                col_indices.push(c);
            }
        }
        row_ptr.push(values.len());
    }

    SparseGrid { values, col_indices, row_ptr }
}

/// Rebuild the dense grid. Inverse of [`encode`] for the original shape.
pub fn decode(sparse: &SparseGrid, rows: usize, cols: usize) -> Result<Grid, SparseError> {
    sparse.validate(rows, cols)?;
    let mut grid = Grid::zeros(rows, cols);
    for r in 0..rows {
        for idx in sparse.row_ptr[r]..sparse.row_ptr[r + 1] {
            grid.set(r, sparse.col_indices[idx], sparse.values[idx]);
        }
    }
    Ok(grid)
}
