//! Raw action wire form
//!
//! What the engine reports the observed player issued, with integer codes
//! exactly as received. Nothing here is validated.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: i32,
    pub y: i32,
}

impl RawPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRect {
    pub p0: RawPoint,
    pub p1: RawPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawTarget {
    Screen(RawPoint),
    Minimap(RawPoint),
}

/// One raw command
///
/// `select_type`, `action` and `panel_type` codes are 1-based on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawAction {
    UnitCommand {
        ability_id: u32,
        #[serde(default)]
        target: Option<RawTarget>,
        #[serde(default)]
        queue_command: bool,
    },
    ToggleAutocast {
        ability_id: u32,
    },
    CameraMove {
        center_minimap: RawPoint,
    },
    SelectPoint {
        point: RawPoint,
        select_type: i32,
    },
    SelectRect {
        rects: Vec<RawRect>,
        #[serde(default)]
        add: bool,
    },
    ControlGroup {
        action: i32,
        index: i32,
    },
    SelectIdleWorker {
        select_type: i32,
    },
    SelectArmy {
        #[serde(default)]
        add: bool,
    },
    SelectWarpGates {
        #[serde(default)]
        add: bool,
    },
    SelectLarva,
    MultiPanel {
        panel_type: i32,
        unit_index: i32,
    },
    CargoPanel {
        unit_index: i32,
    },
    ProductionPanel {
        unit_index: i32,
    },
    /// Chat carries no command
    Chat {
        message: String,
    },
}
