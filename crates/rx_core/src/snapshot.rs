//! Engine observation snapshot
//!
//! One frame of observable game state as the engine hands it over. The frame
//! loop treats it as opaque; only the feature decomposer looks inside.
//! Snapshots are immutable once produced.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Snapshot - Main Structure
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Engine game loop at observation time
    pub game_loop: u32,

    pub player_common: PlayerCommon,

    pub score: ScoreDetails,

    /// Packed screen/minimap planes keyed by layer name
    pub feature_layers: FeatureLayerPlanes,

    /// Function ids the observed player may issue this frame
    pub available_actions: Vec<u16>,

    pub single_select: Option<UnitInfo>,

    pub multi_select: Vec<UnitInfo>,

    pub cargo: Vec<UnitInfo>,

    pub cargo_slots_available: u32,

    pub build_queue: Vec<UnitInfo>,

    pub control_groups: Vec<ControlGroup>,

    /// Non-empty once the game has ended
    pub player_result: Vec<PlayerResult>,
}

impl Snapshot {
    /// True once the engine reports any player result
    pub fn is_terminal(&self) -> bool {
        !self.player_result.is_empty()
    }

    pub fn result_for(&self, player_id: u32) -> Option<Outcome> {
        self.player_result
            .iter()
            .find(|r| r.player_id == player_id)
            .map(|r| r.result)
    }
}

// ============================================================================
// Scalar blocks
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerCommon {
    pub player_id: u32,
    pub minerals: u32,
    pub vespene: u32,
    pub food_used: u32,
    pub food_cap: u32,
    pub food_army: u32,
    pub food_workers: u32,
    pub idle_worker_count: u32,
    pub army_count: u32,
    pub warp_gate_count: u32,
    pub larva_count: u32,
}

impl PlayerCommon {
    pub const LEN: usize = 11;

    pub fn to_row(&self) -> Vec<i64> {
        [
            self.player_id,
            self.minerals,
            self.vespene,
            self.food_used,
            self.food_cap,
            self.food_army,
            self.food_workers,
            self.idle_worker_count,
            self.army_count,
            self.warp_gate_count,
            self.larva_count,
        ]
        .iter()
        .map(|&v| i64::from(v))
        .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreDetails {
    pub score: i64,
    pub idle_production_time: i64,
    pub idle_worker_time: i64,
    pub total_value_units: i64,
    pub total_value_structures: i64,
    pub killed_value_units: i64,
    pub killed_value_structures: i64,
    pub collected_minerals: i64,
    pub collected_vespene: i64,
    pub collection_rate_minerals: i64,
    pub collection_rate_vespene: i64,
    pub spent_minerals: i64,
    pub spent_vespene: i64,
}

impl ScoreDetails {
    pub const LEN: usize = 13;

    pub fn to_row(&self) -> Vec<i64> {
        vec![
            self.score,
            self.idle_production_time,
            self.idle_worker_time,
            self.total_value_units,
            self.total_value_structures,
            self.killed_value_units,
            self.killed_value_structures,
            self.collected_minerals,
            self.collected_vespene,
            self.collection_rate_minerals,
            self.collection_rate_vespene,
            self.spent_minerals,
            self.spent_vespene,
        ]
    }
}

/// One unit row as shown in selection, cargo and build-queue panels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitInfo {
    pub unit_type: i64,
    pub player_relative: i64,
    pub health: i64,
    pub shields: i64,
    pub energy: i64,
    pub transport_slots_taken: i64,
    /// Percent complete (0-100)
    pub build_progress: i64,
}

impl UnitInfo {
    pub const LEN: usize = 7;

    pub fn to_row(&self) -> [i64; Self::LEN] {
        [
            self.unit_type,
            self.player_relative,
            self.health,
            self.shields,
            self.energy,
            self.transport_slots_taken,
            self.build_progress,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlGroup {
    pub group_index: u32,
    pub leader_unit_type: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub player_id: u32,
    pub result: Outcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Victory,
    Defeat,
    Tie,
    #[default]
    Undecided,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Outcome::Victory => "Victory",
            Outcome::Defeat => "Defeat",
            Outcome::Tie => "Tie",
            Outcome::Undecided => "Undecided",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Packed feature planes
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureLayerPlanes {
    pub screen: BTreeMap<String, ImageData>,
    pub minimap: BTreeMap<String, ImageData>,
}

/// A packed plane: `width * height` cells at `bits_per_pixel` each.
///
/// 1 bpp is MSB-first bit-packed, 16 and 32 bpp are little-endian.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub bits_per_pixel: u8,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageData {
    pub fn from_u8(width: u32, height: u32, cells: &[u8]) -> Self {
        Self { bits_per_pixel: 8, width, height, data: cells.to_vec() }
    }

    pub fn from_u16(width: u32, height: u32, cells: &[u16]) -> Self {
        let data = cells.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self { bits_per_pixel: 16, width, height, data }
    }

    pub fn from_i32(width: u32, height: u32, cells: &[i32]) -> Self {
        let data = cells.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self { bits_per_pixel: 32, width, height, data }
    }

    pub fn from_bits(width: u32, height: u32, cells: &[bool]) -> Self {
        let mut data = vec![0u8; cells.len().div_ceil(8)];
        for (i, &set) in cells.iter().enumerate() {
            if set {
                data[i / 8] |= 0x80 >> (i % 8);
            }
        }
        Self { bits_per_pixel: 1, width, height, data }
    }
}
