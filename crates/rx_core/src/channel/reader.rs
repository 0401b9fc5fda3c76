//! Offline channel reconstruction
//!
//! Channels are never read back while a session runs; this is for analysis
//! afterwards and for `rx_extract inspect`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::sparse::{decode, Grid, SparseError, SparseGrid};

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("row {row}: cannot parse {value:?}")]
    Parse { row: usize, value: String },

    #[error("grid channel has {rows} rows, not a multiple of 3")]
    Truncated { rows: usize },

    #[error("frame {frame}: {source}")]
    Corrupt {
        frame: usize,
        #[source]
        source: SparseError,
    },
}

fn parse_row<T: FromStr>(row: usize, line: &str) -> Result<Vec<T>, ReadError> {
    // A blank line is an empty row
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }
    line.split(',')
        .map(|field| {
            field
                .trim()
                .parse::<T>()
                .map_err(|_| ReadError::Parse { row, value: field.to_string() })
        })
        .collect()
}

fn read_typed_rows<T: FromStr>(path: &Path) -> Result<Vec<Vec<T>>, ReadError> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for (row, line) in reader.lines().enumerate() {
        rows.push(parse_row(row, &line?)?);
    }
    Ok(rows)
}

/// Every row of a scalar or action channel
pub fn read_rows(path: &Path) -> Result<Vec<Vec<i64>>, ReadError> {
    read_typed_rows(path)
}

/// Every frame of a grid channel in its stored (sparse) form
pub fn read_sparse_channel(path: &Path) -> Result<Vec<SparseGrid>, ReadError> {
    let rows: Vec<Vec<i64>> = read_typed_rows(path)?;
    if rows.len() % 3 != 0 {
        return Err(ReadError::Truncated { rows: rows.len() });
    }

    let to_usize = |row: usize, values: &[i64]| -> Result<Vec<usize>, ReadError> {
        values
            .iter()
            .map(|&v| usize::try_from(v).map_err(|_| ReadError::Parse { row, value: v.to_string() }))
            .collect()
    };

    let mut frames = Vec::with_capacity(rows.len() / 3);
    for (frame, triple) in rows.chunks_exact(3).enumerate() {
        let base = frame * 3;
        let values = triple[0]
            .iter()
            .map(|&v| i32::try_from(v).map_err(|_| ReadError::Parse { row: base, value: v.to_string() }))
            .collect::<Result<Vec<i32>, _>>()?;
        frames.push(SparseGrid {
            values,
            col_indices: to_usize(base + 1, &triple[1])?,
            row_ptr: to_usize(base + 2, &triple[2])?,
        });
    }
    Ok(frames)
}

/// Every frame of a grid channel, decoded against the given shape
pub fn read_grid_channel(path: &Path, rows: usize, cols: usize) -> Result<Vec<Grid>, ReadError> {
    read_sparse_channel(path)?
        .iter()
        .enumerate()
        .map(|(frame, sparse)| decode(sparse, rows, cols).map_err(|source| ReadError::Corrupt { frame, source }))
        .collect()
}
