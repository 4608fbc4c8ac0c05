//! Textual command surface for driving a scenario store.
//!
//! Lines such as `time add 2 day` or `rename <unit> 2 Bn` parse into typed
//! [`CommandPayload`] values. The crate only depends on `orbat_schema` so
//! front ends can validate input without pulling in the store itself.

mod command_text;
mod commands;

pub use command_text::{parse_command_line, parse_script, CommandParseError, ScriptError};
pub use commands::{CommandPayload, ShowTarget};
