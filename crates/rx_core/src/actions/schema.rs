//! Command schema
//!
//! Maps a command key (command kind + optional ability id) to the symbolic
//! function it corresponds to, along with that function's argument types.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use strum_macros::Display;

use crate::config::{ConfigError, Resolutions};

// =============================================================================
// Argument types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    Screen,
    Minimap,
    Screen2,
    Queued,
    ControlGroupAct,
    ControlGroupId,
    SelectPointAct,
    SelectAdd,
    SelectUnitAct,
    SelectUnitId,
    SelectWorker,
    BuildQueueId,
    UnloadId,
}

impl ArgType {
    pub fn is_spatial(self) -> bool {
        matches!(self, ArgType::Screen | ArgType::Minimap | ArgType::Screen2)
    }

    /// Exclusive upper bound of every component of this argument
    pub fn limit(self, resolutions: Resolutions) -> i64 {
        match self {
            ArgType::Screen | ArgType::Screen2 => i64::from(resolutions.screen),
            ArgType::Minimap => i64::from(resolutions.minimap),
            ArgType::Queued => 2,
            ArgType::ControlGroupAct => 5,
            ArgType::ControlGroupId => 10,
            ArgType::SelectPointAct => 4,
            ArgType::SelectAdd => 2,
            ArgType::SelectUnitAct => 4,
            ArgType::SelectUnitId => 500,
            ArgType::SelectWorker => 4,
            ArgType::BuildQueueId => 10,
            ArgType::UnloadId => 500,
        }
    }
}

// =============================================================================
// Command keys
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    NoOp,
    MoveCamera,
    SelectPoint,
    SelectRect,
    SelectControlGroup,
    SelectUnit,
    SelectIdleWorker,
    SelectArmy,
    SelectWarpGates,
    SelectLarva,
    Unload,
    BuildQueue,
    CmdQuick,
    CmdScreen,
    CmdMinimap,
    Autocast,
}

impl CommandKind {
    /// Argument types in call order
    pub fn arg_types(self) -> &'static [ArgType] {
        use ArgType::*;
        match self {
            CommandKind::NoOp => &[],
            CommandKind::MoveCamera => &[Minimap],
            CommandKind::SelectPoint => &[SelectPointAct, Screen],
            CommandKind::SelectRect => &[SelectAdd, Screen, Screen2],
            CommandKind::SelectControlGroup => &[ControlGroupAct, ControlGroupId],
            CommandKind::SelectUnit => &[SelectUnitAct, SelectUnitId],
            CommandKind::SelectIdleWorker => &[SelectWorker],
            CommandKind::SelectArmy => &[SelectAdd],
            CommandKind::SelectWarpGates => &[SelectAdd],
            CommandKind::SelectLarva => &[],
            CommandKind::Unload => &[UnloadId],
            CommandKind::BuildQueue => &[BuildQueueId],
            CommandKind::CmdQuick => &[Queued],
            CommandKind::CmdScreen => &[Queued, Screen],
            CommandKind::CmdMinimap => &[Queued, Minimap],
            CommandKind::Autocast => &[],
        }
    }

    /// Ability commands need an ability id to resolve
    pub fn is_ability(self) -> bool {
        matches!(
            self,
            CommandKind::CmdQuick | CommandKind::CmdScreen | CommandKind::CmdMinimap | CommandKind::Autocast
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandKey {
    pub kind: CommandKind,
    pub ability_id: Option<u32>,
}

impl CommandKey {
    pub fn ui(kind: CommandKind) -> Self {
        Self { kind, ability_id: None }
    }

    pub fn ability(kind: CommandKind, ability_id: u32) -> Self {
        Self { kind, ability_id: Some(ability_id) }
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.ability_id {
            Some(id) => write!(f, "{}({})", self.kind, id),
            None => write!(f, "{}", self.kind),
        }
    }
}

// =============================================================================
// Function table
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub id: u16,
    pub name: String,
    pub kind: CommandKind,
    #[serde(default)]
    pub ability_id: Option<u32>,
}

impl FunctionSpec {
    fn key(&self) -> CommandKey {
        CommandKey { kind: self.kind, ability_id: self.ability_id }
    }

    pub fn arg_types(&self) -> &'static [ArgType] {
        self.kind.arg_types()
    }
}

/// Command-schema lookup
pub trait CommandSchema {
    /// `None` when the key has no function
    fn resolve(&self, key: &CommandKey) -> Option<&FunctionSpec>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasSpec {
    /// Specific ability as reported by the engine
    pub ability_id: u32,
    /// General ability the function table is keyed by
    pub general_id: u32,
}

/// Schema file layout (YAML or JSON)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaFile {
    /// Start from the built-in table instead of an empty one
    pub extend_builtin: bool,
    pub functions: Vec<FunctionSpec>,
    pub aliases: Vec<AliasSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    by_key: FxHashMap<CommandKey, FunctionSpec>,
    aliases: FxHashMap<u32, u32>,
}

static BUILTIN: Lazy<Arc<FunctionTable>> = Lazy::new(|| Arc::new(FunctionTable::build_builtin()));

impl FunctionTable {
    /// Shared built-in table: interface functions plus common abilities
    pub fn builtin() -> Arc<FunctionTable> {
        Arc::clone(&BUILTIN)
    }

    pub fn from_specs(specs: Vec<FunctionSpec>, aliases: Vec<AliasSpec>) -> Self {
        let mut table = Self::default();
        for spec in specs {
            table.insert(spec);
        }
        for alias in aliases {
            table.aliases.insert(alias.ability_id, alias.general_id);
        }
        table
    }

    /// Load a schema file (`.yaml`/`.yml`, otherwise JSON)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let file: SchemaFile = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            _ => serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?,
        };
        Self::from_schema_file(file)
    }

    pub fn from_schema_file(file: SchemaFile) -> Result<Self, ConfigError> {
        for spec in &file.functions {
            if spec.kind.is_ability() != spec.ability_id.is_some() {
                return Err(ConfigError::Validation(format!(
                    "function {} ({}): {} requires ability_id to be {}",
                    spec.id,
                    spec.name,
                    spec.kind,
                    if spec.kind.is_ability() { "set" } else { "absent" }
                )));
            }
        }

        let mut table = if file.extend_builtin { (*Self::builtin()).clone() } else { Self::default() };
        for spec in file.functions {
            table.insert(spec);
        }
        for alias in file.aliases {
            table.aliases.insert(alias.ability_id, alias.general_id);
        }
        Ok(table)
    }

    pub fn insert(&mut self, spec: FunctionSpec) {
        self.by_key.insert(spec.key(), spec);
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    fn build_builtin() -> Self {
        use CommandKind::*;

        let ui = [
            (0, "no_op", NoOp),
            (1, "move_camera", MoveCamera),
            (2, "select_point", SelectPoint),
            (3, "select_rect", SelectRect),
            (4, "select_control_group", SelectControlGroup),
            (5, "select_unit", SelectUnit),
            (6, "select_idle_worker", SelectIdleWorker),
            (7, "select_army", SelectArmy),
            (8, "select_warp_gates", SelectWarpGates),
            (9, "select_larva", SelectLarva),
            (10, "unload", Unload),
            (11, "build_queue", BuildQueue),
        ];
        let abilities = [
            (12, "Attack_screen", CmdScreen, 3674),
            (13, "Attack_minimap", CmdMinimap, 3674),
            (42, "Build_Barracks_screen", CmdScreen, 321),
            (91, "Build_SupplyDepot_screen", CmdScreen, 319),
            (199, "Effect_Heal_autocast", Autocast, 386),
            (264, "Harvest_Gather_screen", CmdScreen, 3666),
            (269, "Harvest_Return_quick", CmdQuick, 3667),
            (274, "HoldPosition_quick", CmdQuick, 3793),
            (331, "Move_screen", CmdScreen, 16),
            (332, "Move_minimap", CmdMinimap, 16),
            (333, "Patrol_screen", CmdScreen, 17),
            (334, "Patrol_minimap", CmdMinimap, 17),
            (451, "Smart_screen", CmdScreen, 1),
            (452, "Smart_minimap", CmdMinimap, 1),
            (453, "Stop_quick", CmdQuick, 3665),
            (477, "Train_Marine_quick", CmdQuick, 560),
            (490, "Train_SCV_quick", CmdQuick, 524),
        ];
        // specific → general
        let aliases = [(23, 3674), (295, 3666), (296, 3667), (4, 3665), (18, 3793)];

        let specs = ui
            .iter()
            .map(|&(id, name, kind)| FunctionSpec { id, name: name.to_string(), kind, ability_id: None })
            .chain(abilities.iter().map(|&(id, name, kind, ability)| FunctionSpec {
                id,
                name: name.to_string(),
                kind,
                ability_id: Some(ability),
            }))
            .collect();
        let aliases = aliases
            .iter()
            .map(|&(ability_id, general_id)| AliasSpec { ability_id, general_id })
            .collect();

        Self::from_specs(specs, aliases)
    }
}

impl CommandSchema for FunctionTable {
    fn resolve(&self, key: &CommandKey) -> Option<&FunctionSpec> {
        if let Some(spec) = self.by_key.get(key) {
            return Some(spec);
        }
        let general = key.ability_id.and_then(|id| self.aliases.get(&id))?;
        self.by_key.get(&CommandKey { kind: key.kind, ability_id: Some(*general) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ui_functions() {
        let table = FunctionTable::builtin();
        let spec = table.resolve(&CommandKey::ui(CommandKind::SelectRect)).unwrap();
        assert_eq!(spec.id, 3);
        assert_eq!(spec.arg_types(), &[ArgType::SelectAdd, ArgType::Screen, ArgType::Screen2]);
    }

    #[test]
    fn test_specific_ability_resolves_through_alias() {
        let table = FunctionTable::builtin();
        let spec = table.resolve(&CommandKey::ability(CommandKind::CmdScreen, 23)).unwrap();
        assert_eq!(spec.name, "Attack_screen");

        assert!(table.resolve(&CommandKey::ability(CommandKind::CmdQuick, 23)).is_none());
        assert!(table.resolve(&CommandKey::ability(CommandKind::CmdScreen, 99_999)).is_none());
    }

    #[test]
    fn test_arg_limits_follow_resolutions() {
        let res = Resolutions { screen: 84, minimap: 64 };
        assert_eq!(ArgType::Screen2.limit(res), 84);
        assert_eq!(ArgType::Minimap.limit(res), 64);
        assert_eq!(ArgType::ControlGroupAct.limit(res), 5);
    }

    #[test]
    fn test_schema_file_extends_builtin() {
        let yaml = r#"
extend_builtin: true
functions:
  - id: 39
    name: Build_Armory_screen
    kind: cmd_screen
    ability_id: 331
aliases:
  - ability_id: 1000
    general_id: 331
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.yaml");
        fs::write(&path, yaml).unwrap();

        let table = FunctionTable::load(&path).unwrap();
        assert_eq!(table.len(), FunctionTable::builtin().len() + 1);
        let spec = table.resolve(&CommandKey::ability(CommandKind::CmdScreen, 1000)).unwrap();
        assert_eq!(spec.id, 39);
    }

    #[test]
    fn test_schema_file_rejects_missing_ability() {
        let file = SchemaFile {
            extend_builtin: false,
            functions: vec![FunctionSpec {
                id: 600,
                name: "Broken_quick".to_string(),
                kind: CommandKind::CmdQuick,
                ability_id: None,
            }],
            aliases: Vec::new(),
        };
        assert!(matches!(FunctionTable::from_schema_file(file), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(CommandKey::ability(CommandKind::CmdScreen, 16).to_string(), "cmd_screen(16)");
        assert_eq!(CommandKey::ui(CommandKind::NoOp).to_string(), "no_op");
    }
}
