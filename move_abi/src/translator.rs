//! Render type descriptors into the flat ABI notation.
//!
//! Rendering happens in two passes: a structural pass that spells out the
//! descriptor tree (`&mut<struct<Coin<T0>>>`), then a rename pass that rewrites
//! well-known spellings anywhere in the result (`U64` -> `uint64`,
//! `struct<ID>` -> `Address`).

use crate::types::TypeDescriptor;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Sentinel emitted for descriptor shapes the translator does not understand.
pub const UNKNOWN_TYPE: &str = "UnknownType";

const DEFAULT_RENAMES: &[(&str, &str)] = &[
    ("U8", "uint8"),
    ("U16", "uint16"),
    ("U32", "uint32"),
    ("U64", "uint64"),
    ("U128", "uint128"),
    ("U256", "uint256"),
    ("Bool", "bool"),
    ("struct<String>", "String"),
    ("struct<ID>", "Address"),
];

#[derive(Error, Debug)]
pub enum RenameError {
    #[error("Invalid rename mode: {0}. Allowed values: token, substring")]
    InvalidMode(String),
    #[error("Rename key must not be empty")]
    EmptyKey,
    #[error("Failed to compile rename pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// How rename keys are matched against a rendered type string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenameMode {
    /// A key must not be glued to identifier characters, so `U64Wrapper` is
    /// left alone.
    #[default]
    Token,
    /// Every occurrence is replaced, even inside longer identifiers. The
    /// structural spelling is the same as in token mode.
    Substring,
}

impl fmt::Display for RenameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenameMode::Token => write!(f, "token"),
            RenameMode::Substring => write!(f, "substring"),
        }
    }
}

impl FromStr for RenameMode {
    type Err = RenameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "token" => Ok(RenameMode::Token),
            "substring" => Ok(RenameMode::Substring),
            _ => Err(RenameError::InvalidMode(s.to_string())),
        }
    }
}

/// Immutable spelling table applied after structural rendering.
#[derive(Debug, Clone)]
pub struct RenameTable {
    renames: BTreeMap<String, String>,
    pattern: Option<Regex>,
    mode: RenameMode,
}

impl RenameTable {
    /// The built-in table with `extra` pairs layered on top.
    pub fn with_overrides<I, K, V>(mode: RenameMode, extra: I) -> Result<Self, RenameError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut renames: BTreeMap<String, String> = DEFAULT_RENAMES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (k, v) in extra {
            renames.insert(k.into(), v.into());
        }
        Self::from_map(mode, renames)
    }

    pub fn from_map(mode: RenameMode, renames: BTreeMap<String, String>) -> Result<Self, RenameError> {
        if renames.keys().any(|k| k.is_empty()) {
            return Err(RenameError::EmptyKey);
        }

        // Longest first so the alternation prefers the widest key at a position.
        let mut keys: Vec<&String> = renames.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let pattern = if keys.is_empty() {
            None
        } else {
            let alternation = keys
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&alternation)?)
        };

        Ok(Self {
            renames,
            pattern,
            mode,
        })
    }

    pub fn mode(&self) -> RenameMode {
        self.mode
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.renames.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    pub fn apply(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in pattern.find_iter(text) {
            if self.mode == RenameMode::Token && !is_token_match(text, m.start(), m.end()) {
                continue;
            }
            out.push_str(&text[last..m.start()]);
            out.push_str(self.get(m.as_str()).unwrap_or(m.as_str()));
            last = m.end();
        }
        out.push_str(&text[last..]);
        out
    }
}

impl Default for RenameTable {
    fn default() -> Self {
        let renames = DEFAULT_RENAMES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        // The built-in keys are non-empty literals and always compile.
        Self::from_map(RenameMode::default(), renames).unwrap_or(Self {
            renames: BTreeMap::new(),
            pattern: None,
            mode: RenameMode::default(),
        })
    }
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_token_match(text: &str, start: usize, end: usize) -> bool {
    let key = &text[start..end];
    let starts_ident = key.chars().next().is_some_and(is_ident);
    let ends_ident = key.chars().next_back().is_some_and(is_ident);

    let clear_before = !starts_ident || !text[..start].chars().next_back().is_some_and(is_ident);
    let clear_after = !ends_ident || !text[end..].chars().next().is_some_and(is_ident);
    clear_before && clear_after
}

/// Structural rendering, before any renames.
pub fn render_structure(ty: &TypeDescriptor) -> String {
    match ty {
        TypeDescriptor::Primitive(name) => name.clone(),
        TypeDescriptor::Struct(s) if s.type_arguments.is_empty() => format!("struct<{}>", s.name),
        TypeDescriptor::Struct(s) => {
            let args: Vec<String> = s.type_arguments.iter().map(render_structure).collect();
            format!("struct<{}<{}>>", s.name, args.join(","))
        }
        TypeDescriptor::TypeParameter(idx) => format!("T{}", idx),
        TypeDescriptor::Vector(inner) => format!("vector<{}>", render_structure(inner)),
        TypeDescriptor::Reference(inner) => format!("&<{}>", render_structure(inner)),
        TypeDescriptor::MutableReference(inner) => format!("&mut<{}>", render_structure(inner)),
        TypeDescriptor::Unrecognized(raw) => {
            warn!(descriptor = %raw, "Unhandled type descriptor");
            UNKNOWN_TYPE.to_string()
        }
    }
}

/// Translates descriptors into ABI type strings using a fixed rename table.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    renames: RenameTable,
}

impl Translator {
    pub fn new(renames: RenameTable) -> Self {
        Self { renames }
    }

    /// Always produces a string; unknown shapes become `UnknownType`.
    pub fn format(&self, ty: &TypeDescriptor) -> String {
        self.renames.apply(&render_structure(ty))
    }

    /// Like [`Translator::format`], but yields nothing when any part of the
    /// descriptor is unrecognized.
    pub fn render(&self, ty: &TypeDescriptor) -> Option<String> {
        if !ty.is_recognized() {
            return None;
        }
        let rendered = self.format(ty);
        (!rendered.is_empty()).then_some(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn foo(args: Vec<TypeDescriptor>) -> TypeDescriptor {
        TypeDescriptor::structure("0xabc", "m", "Foo", args)
    }

    fn samples() -> Vec<TypeDescriptor> {
        vec![
            TypeDescriptor::primitive("U64"),
            TypeDescriptor::primitive("Address"),
            TypeDescriptor::TypeParameter(1),
            foo(Vec::new()),
            foo(vec![TypeDescriptor::primitive("U8"), TypeDescriptor::TypeParameter(0)]),
            TypeDescriptor::structure("0x2", "object", "ID", Vec::new()),
            TypeDescriptor::vector(TypeDescriptor::primitive("Bool")),
        ]
    }

    #[test]
    fn renames_primitives() {
        let translator = Translator::default();
        for (raw, expected) in DEFAULT_RENAMES.iter().filter(|(k, _)| !k.contains('<')) {
            assert_eq!(translator.format(&TypeDescriptor::primitive(*raw)), *expected);
        }
        assert_eq!(translator.format(&TypeDescriptor::primitive("Address")), "Address");
        assert_eq!(translator.format(&TypeDescriptor::primitive("Signer")), "Signer");
    }

    #[test]
    fn wrappers_follow_inner_rendering() {
        let translator = Translator::default();
        for d in samples() {
            let inner = translator.format(&d);
            assert_eq!(
                translator.format(&TypeDescriptor::vector(d.clone())),
                format!("vector<{}>", inner)
            );
            assert_eq!(
                translator.format(&TypeDescriptor::reference(d.clone())),
                format!("&<{}>", inner)
            );
            assert_eq!(
                translator.format(&TypeDescriptor::mutable_reference(d.clone())),
                format!("&mut<{}>", inner)
            );
        }
    }

    #[test]
    fn nested_struct_with_type_parameter() {
        let ty = TypeDescriptor::mutable_reference(foo(vec![TypeDescriptor::TypeParameter(0)]));
        assert_eq!(Translator::default().format(&ty), "&mut<struct<Foo<T0>>>");
    }

    #[test]
    fn renames_apply_at_any_depth() {
        let translator = Translator::default();

        let ty = TypeDescriptor::vector(TypeDescriptor::vector(TypeDescriptor::primitive("U64")));
        assert_eq!(translator.format(&ty), "vector<vector<uint64>>");

        let id = TypeDescriptor::structure("0x2", "object", "ID", Vec::new());
        assert_eq!(translator.format(&id), "Address");
        assert_eq!(translator.format(&TypeDescriptor::reference(id)), "&<Address>");

        let table = TypeDescriptor::structure(
            "0x2",
            "table",
            "Table",
            vec![
                TypeDescriptor::structure("0x1", "string", "String", Vec::new()),
                TypeDescriptor::primitive("U128"),
            ],
        );
        assert_eq!(translator.format(&table), "struct<Table<String,uint128>>");
    }

    #[test]
    fn token_mode_leaves_longer_identifiers_alone() {
        let ty = TypeDescriptor::vector(foo(Vec::new()));
        let wrapper = TypeDescriptor::structure("0x1", "w", "U64Wrapper", Vec::new());
        let suffixed = TypeDescriptor::structure("0x1", "w", "MyU8", Vec::new());

        let token = Translator::default();
        assert_eq!(token.format(&ty), "vector<struct<Foo>>");
        assert_eq!(token.format(&wrapper), "struct<U64Wrapper>");
        assert_eq!(token.format(&suffixed), "struct<MyU8>");

        let substring = Translator::new(
            RenameTable::with_overrides(RenameMode::Substring, Vec::<(String, String)>::new())
                .unwrap(),
        );
        assert_eq!(substring.format(&wrapper), "struct<uint64Wrapper>");
        assert_eq!(substring.format(&suffixed), "struct<Myuint8>");

        // Only the renames differ between modes, never the brackets.
        let id = TypeDescriptor::reference(TypeDescriptor::structure("0x2", "object", "ID", Vec::new()));
        assert_eq!(substring.format(&id), "&<Address>");
        assert_eq!(token.format(&id), "&<Address>");
    }

    #[test]
    fn overrides_extend_the_table() {
        let renames = RenameTable::with_overrides(
            RenameMode::Token,
            [("Address", "address"), ("U64", "u64")],
        )
        .unwrap();
        let translator = Translator::new(renames);

        assert_eq!(translator.format(&TypeDescriptor::primitive("Address")), "address");
        assert_eq!(translator.format(&TypeDescriptor::primitive("U64")), "u64");
        assert_eq!(translator.format(&TypeDescriptor::primitive("Bool")), "bool");
    }

    #[test]
    fn empty_rename_key_is_rejected() {
        let err = RenameTable::with_overrides(RenameMode::Token, [("", "x")]).unwrap_err();
        assert!(matches!(err, RenameError::EmptyKey));
    }

    #[test]
    fn unknown_shapes_render_sentinel_and_fail_render() {
        let translator = Translator::default();
        let ty = TypeDescriptor::vector(TypeDescriptor::from_json(&json!({ "Tuple": [] })));

        assert_eq!(translator.format(&ty), "vector<UnknownType>");
        assert_eq!(translator.render(&ty), None);
        assert_eq!(
            translator.render(&TypeDescriptor::primitive("U32")).as_deref(),
            Some("uint32")
        );
    }

    #[test]
    fn rename_mode_parsing() {
        assert_eq!("token".parse::<RenameMode>().unwrap(), RenameMode::Token);
        assert_eq!("Substring".parse::<RenameMode>().unwrap(), RenameMode::Substring);
        assert!("exact".parse::<RenameMode>().is_err());
    }
}
