//! Assemble function and event ABI entries from normalized modules.

use crate::translator::Translator;
use crate::types::{ModuleMap, NormalizedFunction, NormalizedStruct, TypeDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Function,
    Event,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Function => write!(f, "function"),
            EntryKind::Event => write!(f, "event"),
        }
    }
}

/// A named, typed slot: a function parameter, an event field, or a return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
}

impl AbiParam {
    pub fn new(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
        }
    }
}

/// One record of the exported ABI file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub inputs: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<AbiParam>>,
}

impl AbiEntry {
    pub fn is_event(&self) -> bool {
        self.kind == EntryKind::Event
    }
}

/// Number of entries of each kind produced for a package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbiSummary {
    pub events: usize,
    pub functions: usize,
}

impl AbiSummary {
    pub fn of(entries: &[AbiEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut acc, entry| {
            match entry.kind {
                EntryKind::Event => acc.events += 1,
                EntryKind::Function => acc.functions += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.events + self.functions
    }
}

pub struct AbiAssembler<'a> {
    translator: &'a Translator,
}

impl<'a> AbiAssembler<'a> {
    pub fn new(translator: &'a Translator) -> Self {
        Self { translator }
    }

    /// Every event struct and every exposed function of every module.
    pub fn assemble(&self, modules: &ModuleMap) -> Vec<AbiEntry> {
        let mut entries = Vec::new();

        for (module_name, module) in modules {
            for (struct_name, decl) in module.structs.iter().filter(|(_, s)| s.is_event()) {
                entries.push(self.event_entry(module_name, struct_name, decl));
            }
            for (function_name, decl) in &module.exposed_functions {
                entries.push(self.function_entry(module_name, function_name, decl));
            }
        }

        log_summary(&entries);
        entries
    }

    /// Only the functions that can be called directly from a transaction.
    pub fn assemble_entry_functions(&self, modules: &ModuleMap) -> Vec<AbiEntry> {
        let entries: Vec<AbiEntry> = modules
            .iter()
            .flat_map(|(module_name, module)| {
                module
                    .exposed_functions
                    .iter()
                    .filter(|(_, f)| f.is_entry)
                    .map(move |(function_name, decl)| {
                        debug!(function = %format!("{}::{}", module_name, function_name), "Processing entry function");
                        self.function_entry(module_name, function_name, decl)
                    })
            })
            .collect();

        log_summary(&entries);
        entries
    }

    /// Events only, named `package::module::Struct`.
    pub fn assemble_events_qualified(&self, package: &str, modules: &ModuleMap) -> Vec<AbiEntry> {
        let mut entries = Vec::new();

        for (module_name, module) in modules {
            for (struct_name, decl) in &module.structs {
                if !decl.is_event() {
                    debug!(module = %module_name, struct_name = %struct_name, "Struct is not an event");
                    continue;
                }
                let name = format!("{}::{}::{}", package, module_name, struct_name);
                let inputs = self.event_inputs(&name, decl);
                entries.push(AbiEntry {
                    name,
                    kind: EntryKind::Event,
                    inputs,
                    outputs: None,
                });
            }
        }

        log_summary(&entries);
        entries
    }

    pub fn event_entry(&self, module_name: &str, struct_name: &str, decl: &NormalizedStruct) -> AbiEntry {
        let name = if decl.is_generic() {
            let placeholders: Vec<String> = (0..decl.type_parameters.len())
                .map(|idx| format!("Ty{}", idx))
                .collect();
            format!("{}::{}<{}>", module_name, struct_name, placeholders.join(","))
        } else {
            format!("{}::{}", module_name, struct_name)
        };

        let inputs = self.event_inputs(&name, decl);
        AbiEntry {
            name,
            kind: EntryKind::Event,
            inputs,
            outputs: None,
        }
    }

    pub fn function_entry(
        &self,
        module_name: &str,
        function_name: &str,
        decl: &NormalizedFunction,
    ) -> AbiEntry {
        let name = format!("{}::{}", module_name, function_name);

        let mut inputs: Vec<AbiParam> = (0..decl.type_parameters.len())
            .map(|idx| AbiParam::new(format!("T{}", idx), format!("Type{}", idx)))
            .collect();

        for (idx, param) in decl.parameters.iter().enumerate() {
            if param.is_tx_context() {
                continue;
            }
            if let Some(param) = self.slot(&name, format!("Arg{}", idx), param) {
                inputs.push(param);
            }
        }

        let outputs = decl
            .returns
            .iter()
            .enumerate()
            .filter_map(|(idx, ret)| self.slot(&name, format!("result{}", idx), ret))
            .collect();

        AbiEntry {
            name,
            kind: EntryKind::Function,
            inputs,
            outputs: Some(outputs),
        }
    }

    fn event_inputs(&self, owner: &str, decl: &NormalizedStruct) -> Vec<AbiParam> {
        decl.fields
            .iter()
            .filter_map(|field| self.slot(owner, field.name.clone(), &field.field_type))
            .collect()
    }

    fn slot(&self, owner: &str, name: String, ty: &TypeDescriptor) -> Option<AbiParam> {
        match self.translator.render(ty) {
            Some(rendered) => Some(AbiParam {
                name,
                param_type: rendered,
            }),
            None => {
                warn!(
                    owner = owner,
                    slot = %name,
                    descriptor = %self.translator.format(ty),
                    "Dropping slot with unhandled type"
                );
                None
            }
        }
    }
}

fn log_summary(entries: &[AbiEntry]) {
    let summary = AbiSummary::of(entries);
    info!(
        events = summary.events,
        functions = summary.functions,
        "Assembled ABI entries"
    );
}
