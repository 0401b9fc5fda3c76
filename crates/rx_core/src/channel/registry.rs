//! Channel registry
//!
//! Arena of append-only writers, one per channel name. Handles are resolved
//! once and reused every frame; files are opened on first append, never
//! truncated, and reopened in append mode by later runs.

use rustc_hash::FxHashMap;
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::layout::channel_path;
use crate::sparse::SparseGrid;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to channel {channel}: {source}")]
    Write {
        channel: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to flush channel {channel}: {source}")]
    Flush {
        channel: String,
        #[source]
        source: std::io::Error,
    },
}

/// Index into the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStats {
    pub name: String,
    pub path: PathBuf,
    /// Rows appended during this session (three per grid frame)
    pub rows: u64,
}

struct Channel {
    name: String,
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    rows: u64,
}

pub struct ChannelRegistry {
    session_dir: PathBuf,
    dir_ready: bool,
    channels: Vec<Channel>,
    index: FxHashMap<String, ChannelHandle>,
}

impl ChannelRegistry {
    /// Nothing touches the filesystem until the first append
    pub fn new(session_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_dir: session_dir.into(),
            dir_ready: false,
            channels: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Create the session directory. Already existing is fine.
    pub fn ensure_dir(&mut self) -> Result<(), ChannelError> {
        if !self.dir_ready {
            fs::create_dir_all(&self.session_dir)
                .map_err(|source| ChannelError::Create { path: self.session_dir.clone(), source })?;
            self.dir_ready = true;
        }
        Ok(())
    }

    /// Resolve a channel name to its handle, registering it on first use
    pub fn handle(&mut self, name: &str) -> ChannelHandle {
        if let Some(&handle) = self.index.get(name) {
            return handle;
        }
        let handle = ChannelHandle(self.channels.len());
        self.channels.push(Channel {
            name: name.to_string(),
            path: channel_path(&self.session_dir, name),
            writer: None,
            rows: 0,
        });
        self.index.insert(name.to_string(), handle);
        handle
    }

    pub fn name(&self, handle: ChannelHandle) -> &str {
        &self.channels[handle.0].name
    }

    fn writer(&mut self, handle: ChannelHandle) -> Result<&mut csv::Writer<File>, ChannelError> {
        self.ensure_dir()?;
        let channel = &mut self.channels[handle.0];
        match channel.writer {
            Some(ref mut writer) => Ok(writer),
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&channel.path)
                    .map_err(|source| ChannelError::Create { path: channel.path.clone(), source })?;
                debug!(channel = %channel.name, path = %channel.path.display(), "channel opened");
                let writer = csv::WriterBuilder::new().has_headers(false).flexible(true).from_writer(file);
                Ok(channel.writer.insert(writer))
            }
        }
    }

    fn write_row<I>(&mut self, handle: ChannelHandle, fields: I) -> Result<(), ChannelError>
    where
        I: IntoIterator<Item = String>,
    {
        let writer = self.writer(handle)?;
        let fields: Vec<String> = fields.into_iter().collect();
        let result = if fields.is_empty() {
            // csv would quote an empty record; an empty row is a bare newline
            writer
                .flush()
                .and_then(|()| writer.get_ref().write_all(b"\n"))
                .map_err(csv::Error::from)
        } else {
            writer.write_record(&fields)
        };
        let channel = &mut self.channels[handle.0];
        result.map_err(|source| ChannelError::Write { channel: channel.name.clone(), source })?;
        channel.rows += 1;
        Ok(())
    }

    /// Append one row of values
    pub fn append<V: Display>(&mut self, handle: ChannelHandle, row: &[V]) -> Result<(), ChannelError> {
        self.write_row(handle, row.iter().map(|v| v.to_string()))
    }

    pub fn append_named<V: Display>(&mut self, name: &str, row: &[V]) -> Result<(), ChannelError> {
        let handle = self.handle(name);
        self.append(handle, row)
    }

    /// Append a grid as three consecutive rows: values, column indices, row pointer
    pub fn append_sparse(&mut self, handle: ChannelHandle, grid: &SparseGrid) -> Result<(), ChannelError> {
        self.append(handle, &grid.values)?;
        self.append(handle, &grid.col_indices)?;
        self.append(handle, &grid.row_ptr)
    }

    /// Push buffered rows of every open channel to disk
    pub fn flush(&mut self) -> Result<(), ChannelError> {
        for channel in &mut self.channels {
            if let Some(writer) = channel.writer.as_mut() {
                writer
                    .flush()
                    .map_err(|source| ChannelError::Flush { channel: channel.name.clone(), source })?;
            }
        }
        Ok(())
    }

    pub fn rows(&self, handle: ChannelHandle) -> u64 {
        self.channels[handle.0].rows
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels in registration order
    pub fn stats(&self) -> Vec<ChannelStats> {
        self.channels
            .iter()
            .map(|c| ChannelStats { name: c.name.clone(), path: c.path.clone(), rows: c.rows })
            .collect()
    }
}
