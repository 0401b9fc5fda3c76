//! Append-only output channels
//!
//! One channel per feature plus one for actions, each a comma-delimited text
//! file inside the session directory. Grid features take three rows per
//! frame (values, column indices, row pointer); everything else takes one.
//! An empty row (no nonzero cells, nothing selected) is a blank line.

mod layout;
pub mod reader;
mod registry;

pub use layout::{channel_path, SessionId, CHANNEL_EXT, MANIFEST_FILE};
pub use reader::{read_grid_channel, read_rows, read_sparse_channel, ReadError};
pub use registry::{ChannelError, ChannelHandle, ChannelRegistry, ChannelStats};
