//! Packed plane → dense grid

use thiserror::Error;

use crate::snapshot::ImageData;
use crate::sparse::Grid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnpackError {
    #[error("plane is {width}x{height}, expected {expected}x{expected}")]
    SizeMismatch { expected: u32, width: u32, height: u32 },

    #[error("plane carries {found} bytes, expected {expected}")]
    DataLength { expected: usize, found: usize },

    #[error("unsupported bit depth {0}")]
    UnsupportedDepth(u8),
}

/// Unpack a plane into a `height x width` grid.
///
/// `resolution` is the configured side length; planes of any other size are
/// rejected rather than rescaled.
pub fn unpack_plane(plane: &ImageData, resolution: u32) -> Result<Grid, UnpackError> {
    if plane.width != resolution || plane.height != resolution {
        return Err(UnpackError::SizeMismatch {
            expected: resolution,
            width: plane.width,
            height: plane.height,
        });
    }

    let rows = plane.height as usize;
    let cols = plane.width as usize;
    let count = rows * cols;

    let expected = match plane.bits_per_pixel {
        1 => count.div_ceil(8),
        8 => count,
        16 => count * 2,
        32 => count * 4,
        other => return Err(UnpackError::UnsupportedDepth(other)),
    };
    if plane.data.len() != expected {
        return Err(UnpackError::DataLength { expected, found: plane.data.len() });
    }

    let data = &plane.data;
    let cells: Vec<i32> = match plane.bits_per_pixel {
        1 => (0..count).map(|i| ((data[i / 8] >> (7 - (i % 8))) & 1) as i32).collect(),
        8 => data.iter().map(|&b| b as i32).collect(),
        16 => data
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]) as i32)
            .collect(),
        _ => data
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    };

    // Length was checked against rows * cols above
    Grid::from_cells(rows, cols, cells).map_err(|_| UnpackError::DataLength { expected, found: data.len() })
}
