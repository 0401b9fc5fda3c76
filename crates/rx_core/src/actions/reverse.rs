//! Raw action → symbolic action

use std::sync::Arc;
use thiserror::Error;

use super::raw::{RawAction, RawPoint, RawTarget};
use super::schema::{ArgType, CommandKey, CommandKind, CommandSchema, FunctionTable};
use crate::config::Resolutions;

/// Why an action could not be translated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Untranslatable {
    #[error("action carries no command")]
    NoCommand,

    #[error("no function for {0}")]
    UnknownCommand(CommandKey),

    #[error("{arg} value {value} outside [0, {limit})")]
    OutOfRange { arg: ArgType, value: i64, limit: i64 },

    #[error("argument list does not match {0}")]
    ArityMismatch(CommandKind),

    #[error("selection rectangle list is empty")]
    EmptySelection,
}

/// A function id with its arguments, one inner list per argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicAction {
    pub function: u16,
    pub name: String,
    pub arguments: Vec<Vec<i64>>,
}

impl SymbolicAction {
    /// `[frame, function, args...]` with arguments flattened in order
    pub fn to_row(&self, frame: u32) -> Vec<i64> {
        let mut row = Vec::with_capacity(2 + self.arguments.iter().map(Vec::len).sum::<usize>());
        row.push(i64::from(frame));
        row.push(i64::from(self.function));
        for arg in &self.arguments {
            row.extend_from_slice(arg);
        }
        row
    }
}

pub struct ActionMapper {
    schema: Arc<dyn CommandSchema + Send + Sync>,
    resolutions: Resolutions,
}

impl ActionMapper {
    pub fn new(schema: Arc<dyn CommandSchema + Send + Sync>, resolutions: Resolutions) -> Self {
        Self { schema, resolutions }
    }

    /// Mapper over the built-in function table
    pub fn builtin(resolutions: Resolutions) -> Self {
        Self::new(FunctionTable::builtin(), resolutions)
    }

    pub fn translate(&self, action: &RawAction) -> Result<SymbolicAction, Untranslatable> {
        let (key, arguments) = wire_arguments(action)?;
        let spec = self.schema.resolve(&key).ok_or(Untranslatable::UnknownCommand(key))?;

        let types = spec.arg_types();
        if types.len() != arguments.len() {
            return Err(Untranslatable::ArityMismatch(spec.kind));
        }
        for (&arg, values) in types.iter().zip(&arguments) {
            let expected = if arg.is_spatial() { 2 } else { 1 };
            if values.len() != expected {
                return Err(Untranslatable::ArityMismatch(spec.kind));
            }
            let limit = arg.limit(self.resolutions);
            if let Some(&value) = values.iter().find(|&&v| v < 0 || v >= limit) {
                return Err(Untranslatable::OutOfRange { arg, value, limit });
            }
        }

        Ok(SymbolicAction { function: spec.id, name: spec.name.clone(), arguments })
    }
}

fn point(p: RawPoint) -> Vec<i64> {
    vec![i64::from(p.x), i64::from(p.y)]
}

fn flag(b: bool) -> Vec<i64> {
    vec![i64::from(b)]
}

/// Wire codes are 1-based where the symbolic form is 0-based
fn code(v: i32) -> Vec<i64> {
    vec![i64::from(v) - 1]
}

fn index(v: i32) -> Vec<i64> {
    vec![i64::from(v)]
}

fn wire_arguments(action: &RawAction) -> Result<(CommandKey, Vec<Vec<i64>>), Untranslatable> {
    use CommandKind::*;

    let translated = match action {
        RawAction::UnitCommand { ability_id, target, queue_command } => match target {
            Some(RawTarget::Screen(p)) => {
                (CommandKey::ability(CmdScreen, *ability_id), vec![flag(*queue_command), point(*p)])
            }
            Some(RawTarget::Minimap(p)) => {
                (CommandKey::ability(CmdMinimap, *ability_id), vec![flag(*queue_command), point(*p)])
            }
            None => (CommandKey::ability(CmdQuick, *ability_id), vec![flag(*queue_command)]),
        },
        RawAction::ToggleAutocast { ability_id } => (CommandKey::ability(Autocast, *ability_id), vec![]),
        RawAction::CameraMove { center_minimap } => (CommandKey::ui(MoveCamera), vec![point(*center_minimap)]),
        RawAction::SelectPoint { point: p, select_type } => {
            (CommandKey::ui(SelectPoint), vec![code(*select_type), point(*p)])
        }
        RawAction::SelectRect { rects, add } => {
            let rect = rects.first().ok_or(Untranslatable::EmptySelection)?;
            (CommandKey::ui(SelectRect), vec![flag(*add), point(rect.p0), point(rect.p1)])
        }
        RawAction::ControlGroup { action, index: id } => {
            (CommandKey::ui(SelectControlGroup), vec![code(*action), index(*id)])
        }
        RawAction::SelectIdleWorker { select_type } => (CommandKey::ui(SelectIdleWorker), vec![code(*select_type)]),
        RawAction::SelectArmy { add } => (CommandKey::ui(SelectArmy), vec![flag(*add)]),
        RawAction::SelectWarpGates { add } => (CommandKey::ui(SelectWarpGates), vec![flag(*add)]),
        RawAction::SelectLarva => (CommandKey::ui(SelectLarva), vec![]),
        RawAction::MultiPanel { panel_type, unit_index } => {
            (CommandKey::ui(SelectUnit), vec![code(*panel_type), index(*unit_index)])
        }
        RawAction::CargoPanel { unit_index } => (CommandKey::ui(Unload), vec![index(*unit_index)]),
        RawAction::ProductionPanel { unit_index } => (CommandKey::ui(BuildQueue), vec![index(*unit_index)]),
        RawAction::Chat { .. } => return Err(Untranslatable::NoCommand),
    };
    Ok(translated)
}
