//! Action reverse-mapping
//!
//! Raw commands arrive in wire form (`raw`); the schema (`schema`) says which
//! symbolic function each command key stands for; the mapper (`reverse`)
//! combines the two and checks every argument against its type.
//!
//! Translation failures are values, never panics: the frame loop logs them,
//! skips the action and carries on.

mod raw;
mod reverse;
mod schema;

pub use raw::{RawAction, RawPoint, RawRect, RawTarget};
pub use reverse::{ActionMapper, SymbolicAction, Untranslatable};
pub use schema::{
    AliasSpec, ArgType, CommandKey, CommandKind, CommandSchema, FunctionSpec, FunctionTable, SchemaFile,
};
