//! Translate Sui normalized Move modules into a flat function/event ABI.

pub mod abi;
pub mod parser;
pub mod translator;
pub mod types;

pub use abi::{AbiAssembler, AbiEntry, AbiParam, AbiSummary, EntryKind};
pub use parser::{parse_json_modules, parse_module_map, ParseError};
pub use translator::{render_structure, RenameError, RenameMode, RenameTable, Translator, UNKNOWN_TYPE};
pub use types::*;
