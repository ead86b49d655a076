//! Type definitions for Sui normalized Move modules.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Module name -> normalized module, in the order the node returns them.
pub type ModuleMap = BTreeMap<String, NormalizedModule>;

/// A Move type as described by `sui_getNormalizedMoveModulesByPackage`.
///
/// Primitives arrive as bare strings (`"U64"`, `"Address"`), every other shape
/// as a single-key object (`{"Vector": ...}`, `{"TypeParameter": 0}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum TypeDescriptor {
    Primitive(String),
    Reference(Box<TypeDescriptor>),
    MutableReference(Box<TypeDescriptor>),
    Vector(Box<TypeDescriptor>),
    TypeParameter(u16),
    Struct(StructRef),
    /// A shape the node sent that none of the cases above describe. Holds the
    /// raw JSON text for diagnostics.
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructRef {
    pub address: String,
    pub module: String,
    pub name: String,
    #[serde(default, rename = "typeArguments", alias = "type_arguments")]
    pub type_arguments: Vec<TypeDescriptor>,
}

impl TypeDescriptor {
    pub fn primitive(name: impl Into<String>) -> Self {
        TypeDescriptor::Primitive(name.into())
    }

    pub fn reference(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Reference(Box::new(inner))
    }

    pub fn mutable_reference(inner: TypeDescriptor) -> Self {
        TypeDescriptor::MutableReference(Box::new(inner))
    }

    pub fn vector(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Vector(Box::new(inner))
    }

    pub fn structure(
        address: impl Into<String>,
        module: impl Into<String>,
        name: impl Into<String>,
        type_arguments: Vec<TypeDescriptor>,
    ) -> Self {
        TypeDescriptor::Struct(StructRef {
            address: address.into(),
            module: module.into(),
            name: name.into(),
            type_arguments,
        })
    }

    /// `&mut 0x2::tx_context::TxContext`, injected by the runtime into entry
    /// functions and never supplied by callers.
    pub fn tx_context() -> Self {
        Self::mutable_reference(Self::structure("0x2", "tx_context", "TxContext", Vec::new()))
    }

    pub fn is_tx_context(&self) -> bool {
        *self == Self::tx_context()
    }

    /// True when no `Unrecognized` node appears anywhere in the tree.
    pub fn is_recognized(&self) -> bool {
        match self {
            TypeDescriptor::Primitive(_) | TypeDescriptor::TypeParameter(_) => true,
            TypeDescriptor::Reference(inner)
            | TypeDescriptor::MutableReference(inner)
            | TypeDescriptor::Vector(inner) => inner.is_recognized(),
            TypeDescriptor::Struct(s) => s.type_arguments.iter().all(|t| t.is_recognized()),
            TypeDescriptor::Unrecognized(_) => false,
        }
    }

    /// Decode one node of the normalized type JSON.
    pub fn from_json(value: &Value) -> Self {
        let unrecognized = || TypeDescriptor::Unrecognized(value.to_string());

        let object = match value {
            Value::String(name) => return TypeDescriptor::Primitive(name.clone()),
            Value::Object(object) if object.len() == 1 => object,
            _ => return unrecognized(),
        };
        let Some((tag, body)) = object.iter().next() else {
            return unrecognized();
        };

        match tag.as_str() {
            "Reference" => Self::reference(Self::from_json(body)),
            "MutableReference" => Self::mutable_reference(Self::from_json(body)),
            "Vector" => Self::vector(Self::from_json(body)),
            "TypeParameter" => body
                .as_u64()
                .and_then(|idx| u16::try_from(idx).ok())
                .map(TypeDescriptor::TypeParameter)
                .unwrap_or_else(unrecognized),
            "Struct" => serde_json::from_value::<StructRef>(body.clone())
                .map(TypeDescriptor::Struct)
                .unwrap_or_else(|_| unrecognized()),
            _ => unrecognized(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            TypeDescriptor::Primitive(name) => Value::String(name.clone()),
            TypeDescriptor::Reference(inner) => json!({ "Reference": inner.to_json() }),
            TypeDescriptor::MutableReference(inner) => {
                json!({ "MutableReference": inner.to_json() })
            }
            TypeDescriptor::Vector(inner) => json!({ "Vector": inner.to_json() }),
            TypeDescriptor::TypeParameter(idx) => json!({ "TypeParameter": idx }),
            TypeDescriptor::Struct(s) => json!({
                "Struct": {
                    "address": s.address,
                    "module": s.module,
                    "name": s.name,
                    "typeArguments": s.type_arguments.iter().map(|t| t.to_json()).collect::<Vec<_>>(),
                }
            }),
            TypeDescriptor::Unrecognized(raw) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::Object(Map::new()))
            }
        }
    }
}

impl From<Value> for TypeDescriptor {
    fn from(value: Value) -> Self {
        TypeDescriptor::from_json(&value)
    }
}

impl From<TypeDescriptor> for Value {
    fn from(ty: TypeDescriptor) -> Self {
        ty.to_json()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Ability {
    Copy,
    Drop,
    Store,
    Key,
    Other(String),
}

impl From<String> for Ability {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Copy" => Ability::Copy,
            "Drop" => Ability::Drop,
            "Store" => Ability::Store,
            "Key" => Ability::Key,
            _ => Ability::Other(name),
        }
    }
}

impl From<Ability> for String {
    fn from(ability: Ability) -> Self {
        match ability {
            Ability::Copy => "Copy".to_string(),
            Ability::Drop => "Drop".to_string(),
            Ability::Store => "Store".to_string(),
            Ability::Key => "Key".to_string(),
            Ability::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilitySet {
    #[serde(default)]
    pub abilities: Vec<Ability>,
}

impl AbilitySet {
    pub fn contains(&self, ability: &Ability) -> bool {
        self.abilities.contains(ability)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructTypeParameter {
    #[serde(default)]
    pub constraints: AbilitySet,
    #[serde(default)]
    pub is_phantom: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: TypeDescriptor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedStruct {
    #[serde(default)]
    pub abilities: AbilitySet,
    #[serde(default)]
    pub type_parameters: Vec<StructTypeParameter>,
    #[serde(default)]
    pub fields: Vec<NormalizedField>,
}

impl NormalizedStruct {
    /// Structs that can be emitted as events: copyable and droppable, but not
    /// objects.
    pub fn is_event(&self) -> bool {
        self.abilities.contains(&Ability::Copy)
            && self.abilities.contains(&Ability::Drop)
            && !self.abilities.contains(&Ability::Key)
    }

    pub fn is_generic(&self) -> bool {
        !self.type_parameters.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedFunction {
    #[serde(default)]
    pub is_entry: bool,
    #[serde(default)]
    pub type_parameters: Vec<AbilitySet>,
    #[serde(default)]
    pub parameters: Vec<TypeDescriptor>,
    #[serde(default, rename = "return")]
    pub returns: Vec<TypeDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedModule {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub structs: BTreeMap<String, NormalizedStruct>,
    #[serde(default)]
    pub exposed_functions: BTreeMap<String, NormalizedFunction>,
}
