//! On-disk layout
//!
//! ```text
//! <output_root>/
//!   <session>_player_<id>/
//!     screen_height_map.txt
//!     ...
//!     action.txt
//!     session.json
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

/// Manifest file written next to the channels
pub const MANIFEST_FILE: &str = "session.json";

/// Channel file extension
pub const CHANNEL_EXT: &str = "txt";

/// Stable identity of one extraction session: source name + observed player.
///
/// The full name is kept; two sources sharing a prefix never share a
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId {
    name: String,
    player: u32,
}

impl SessionId {
    pub fn new(name: &str, player: u32) -> Self {
        Self { name: sanitize(name), player }
    }

    /// Name taken from the replay file stem
    pub fn from_replay_path(path: &Path, player: u32) -> Self {
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        Self::new(&stem, player)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn player(&self) -> u32 {
        self.player
    }

    pub fn dir_name(&self) -> String {
        format!("{}_player_{}", self.name, self.player)
    }

    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(self.dir_name())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

/// Path separators and drive colons would escape the session directory
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "session".to_string()
    } else {
        cleaned
    }
}

pub fn channel_path(session_dir: &Path, channel: &str) -> PathBuf {
    session_dir.join(format!("{channel}.{CHANNEL_EXT}"))
}
