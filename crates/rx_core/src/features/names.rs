//! Closed feature-name enumeration
//!
//! The set of features is fixed at compile time and never depends on what a
//! snapshot happens to contain. Channel names are derived from it.

use strum::IntoEnumIterator;
use strum_macros::{EnumIter, IntoStaticStr};

/// Name of the channel receiving translated actions
pub const ACTION_CHANNEL: &str = "action";

/// Screen feature layers, in engine plane order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ScreenLayer {
    HeightMap,
    VisibilityMap,
    Creep,
    Power,
    PlayerId,
    PlayerRelative,
    UnitType,
    Selected,
    UnitHitPoint,
    UnitHitPointRatio,
    UnitEnergy,
    UnitEnergyRatio,
    UnitShield,
    UnitShieldRatio,
    UnitDensity,
    UnitDensityRatio,
    Effects,
}

/// Minimap feature layers, in engine plane order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum MinimapLayer {
    HeightMap,
    VisibilityMap,
    Creep,
    Camera,
    PlayerId,
    PlayerRelative,
    Selected,
}

/// Non-spatial features, each rendered as one flat row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum OtherFeature {
    Player,
    GameLoop,
    ScoreCumulative,
    AvailableActions,
    SingleSelect,
    MultiSelect,
    Cargo,
    CargoSlotsAvailable,
    BuildQueue,
    ControlGroups,
}

impl ScreenLayer {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl MinimapLayer {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl OtherFeature {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureClass {
    /// Dense 2-D grid, persisted as a sparse triple
    Grid,
    /// Single value or flat list, persisted as one row
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureId {
    Screen(ScreenLayer),
    Minimap(MinimapLayer),
    Other(OtherFeature),
}

impl FeatureId {
    pub fn class(self) -> FeatureClass {
        match self {
            FeatureId::Screen(_) | FeatureId::Minimap(_) => FeatureClass::Grid,
            FeatureId::Other(_) => FeatureClass::Scalar,
        }
    }

    pub fn channel_name(self) -> String {
        match self {
            FeatureId::Screen(layer) => format!("screen_{}", layer.name()),
            FeatureId::Minimap(layer) => format!("minimap_{}", layer.name()),
            FeatureId::Other(feature) => feature.name().to_string(),
        }
    }

    /// Every feature: screen layers, then minimap layers, then the rest
    pub fn all() -> impl Iterator<Item = FeatureId> {
        ScreenLayer::iter()
            .map(FeatureId::Screen)
            .chain(MinimapLayer::iter().map(FeatureId::Minimap))
            .chain(OtherFeature::iter().map(FeatureId::Other))
    }
}

/// Feature ids with their channel names, resolved once per session
#[derive(Debug, Clone)]
pub struct FeatureCatalog {
    ids: Vec<FeatureId>,
    channels: Vec<String>,
}

impl FeatureCatalog {
    pub fn new() -> Self {
        let ids: Vec<FeatureId> = FeatureId::all().collect();
        let channels = ids.iter().map(|id| id.channel_name()).collect();
        Self { ids, channels }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[FeatureId] {
        &self.ids
    }

    pub fn channel_of(&self, id: FeatureId) -> &str {
        let idx = self.ids.iter().position(|&i| i == id).unwrap_or_default();
        &self.channels[idx]
    }

    /// Feature channels followed by the action channel
    pub fn all_channels(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(String::as_str).chain(std::iter::once(ACTION_CHANNEL))
    }
}

impl Default for FeatureCatalog {
    fn default() -> Self {
        Self::new()
    }
}
