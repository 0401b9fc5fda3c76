//! Snapshot → FeatureBundle
//!
//! Every call yields one entry per feature of the closed enumeration. Layers a
//! snapshot does not carry come back as zero grids; layers that fail to unpack
//! are reported as issues and also come back as zero grids, so one broken
//! plane never costs the rest of the frame.

use strum::IntoEnumIterator;
use tracing::warn;

use super::names::{FeatureId, MinimapLayer, OtherFeature, ScreenLayer};
use super::unpack::{unpack_plane, UnpackError};
use crate::config::Resolutions;
use crate::snapshot::{ImageData, Snapshot, UnitInfo};
use crate::sparse::Grid;
use std::collections::BTreeMap;

/// Number of control groups the engine exposes
pub const CONTROL_GROUP_COUNT: usize = 10;

/// Feature decomposer trait
///
/// Implementations read the snapshot only; they never mutate it.
pub trait FeatureDecomposer {
    fn decompose(&self, snapshot: &Snapshot) -> FeatureBundle;
}

// =============================================================================
// FeatureBundle
// =============================================================================

/// A per-feature failure contained inside one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureIssue {
    pub feature: FeatureId,
    pub error: UnpackError,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureBundle {
    pub game_loop: u32,
    /// Screen then minimap layers, in enumeration order
    pub grids: Vec<(FeatureId, Grid)>,
    /// Other features, in enumeration order
    pub scalars: Vec<(FeatureId, Vec<i64>)>,
    pub issues: Vec<FeatureIssue>,
}

impl FeatureBundle {
    pub fn grid(&self, id: FeatureId) -> Option<&Grid> {
        self.grids.iter().find(|(f, _)| *f == id).map(|(_, g)| g)
    }

    pub fn scalar(&self, id: FeatureId) -> Option<&[i64]> {
        self.scalars.iter().find(|(f, _)| *f == id).map(|(_, v)| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.grids.len() + self.scalars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }
}

// =============================================================================
// LayerDecomposer
// =============================================================================

/// Decomposer for engine snapshots with packed feature planes
#[derive(Debug, Clone, Copy)]
pub struct LayerDecomposer {
    resolutions: Resolutions,
}

impl LayerDecomposer {
    pub fn new(resolutions: Resolutions) -> Self {
        Self { resolutions }
    }

    pub fn resolutions(&self) -> Resolutions {
        self.resolutions
    }

    fn plane_grid(
        &self,
        id: FeatureId,
        plane: Option<&ImageData>,
        resolution: u32,
        issues: &mut Vec<FeatureIssue>,
    ) -> Grid {
        let side = resolution as usize;
        match plane.map(|p| unpack_plane(p, resolution)) {
            None => Grid::zeros(side, side),
            Some(Ok(grid)) => grid,
            Some(Err(error)) => {
                warn!(feature = %id.channel_name(), %error, "feature layer unreadable, writing zeros");
                issues.push(FeatureIssue { feature: id, error });
                Grid::zeros(side, side)
            }
        }
    }

    fn screen_grids(&self, planes: &BTreeMap<String, ImageData>, out: &mut FeatureBundle) {
        for layer in ScreenLayer::iter() {
            let id = FeatureId::Screen(layer);
            let grid = self.plane_grid(id, planes.get(layer.name()), self.resolutions.screen, &mut out.issues);
            out.grids.push((id, grid));
        }
    }

    fn minimap_grids(&self, planes: &BTreeMap<String, ImageData>, out: &mut FeatureBundle) {
        for layer in MinimapLayer::iter() {
            let id = FeatureId::Minimap(layer);
            let grid = self.plane_grid(id, planes.get(layer.name()), self.resolutions.minimap, &mut out.issues);
            out.grids.push((id, grid));
        }
    }
}

impl FeatureDecomposer for LayerDecomposer {
    fn decompose(&self, snapshot: &Snapshot) -> FeatureBundle {
        let mut bundle = FeatureBundle {
            game_loop: snapshot.game_loop,
            grids: Vec::with_capacity(ScreenLayer::iter().len() + MinimapLayer::iter().len()),
            scalars: Vec::with_capacity(OtherFeature::iter().len()),
            issues: Vec::new(),
        };

        self.screen_grids(&snapshot.feature_layers.screen, &mut bundle);
        self.minimap_grids(&snapshot.feature_layers.minimap, &mut bundle);

        for feature in OtherFeature::iter() {
            bundle.scalars.push((FeatureId::Other(feature), scalar_value(feature, snapshot)));
        }

        bundle
    }
}

fn unit_rows(units: &[UnitInfo]) -> Vec<i64> {
    units.iter().flat_map(|u| u.to_row()).collect()
}

fn scalar_value(feature: OtherFeature, snapshot: &Snapshot) -> Vec<i64> {
    match feature {
        OtherFeature::Player => snapshot.player_common.to_row(),
        OtherFeature::GameLoop => vec![i64::from(snapshot.game_loop)],
        OtherFeature::ScoreCumulative => snapshot.score.to_row(),
        OtherFeature::AvailableActions => {
            let mut ids: Vec<i64> = snapshot.available_actions.iter().map(|&id| i64::from(id)).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        }
        OtherFeature::SingleSelect => snapshot
            .single_select
            .map(|u| u.to_row().to_vec())
            .unwrap_or_default(),
        OtherFeature::MultiSelect => unit_rows(&snapshot.multi_select),
        OtherFeature::Cargo => unit_rows(&snapshot.cargo),
        OtherFeature::CargoSlotsAvailable => vec![i64::from(snapshot.cargo_slots_available)],
        OtherFeature::BuildQueue => unit_rows(&snapshot.build_queue),
        OtherFeature::ControlGroups => {
            // (leader_unit_type, count) per group; groups the engine omits stay zero
            let mut row = vec![0i64; CONTROL_GROUP_COUNT * 2];
            for group in &snapshot.control_groups {
                let idx = group.group_index as usize;
                if idx < CONTROL_GROUP_COUNT {
                    row[idx * 2] = i64::from(group.leader_unit_type);
                    row[idx * 2 + 1] = i64::from(group.count);
                }
            }
            row
        }
    }
}
