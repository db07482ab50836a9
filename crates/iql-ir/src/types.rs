//! Type system for IQL parameters

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of an exposed function parameter.
///
/// Serialized externally tagged so catalogs read naturally in YAML:
/// `str`, `{list: int}`, `{union: [int, {context: City}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    // Primitives
    Int,
    Float,
    Str,
    Bool,

    // Composite
    List(Box<ParamType>),
    Union(Vec<ParamType>),
    Optional(Box<ParamType>),

    /// Caller-supplied context object of the named type
    Context(String),
}

impl ParamType {
    pub fn list(inner: ParamType) -> Self {
        ParamType::List(Box::new(inner))
    }

    pub fn optional(inner: ParamType) -> Self {
        ParamType::Optional(Box::new(inner))
    }

    pub fn context(type_name: impl Into<String>) -> Self {
        ParamType::Context(type_name.into())
    }

    /// Context type names reachable from this type, in declaration order.
    pub fn context_types(&self) -> Vec<&str> {
        let mut found = Vec::new();
        self.collect_contexts(&mut found);
        found
    }

    fn collect_contexts<'a>(&'a self, found: &mut Vec<&'a str>) {
        match self {
            ParamType::Context(name) => {
                if !found.contains(&name.as_str()) {
                    found.push(name);
                }
            }
            ParamType::List(inner) | ParamType::Optional(inner) => inner.collect_contexts(found),
            ParamType::Union(members) => {
                for member in members {
                    member.collect_contexts(found);
                }
            }
            ParamType::Int | ParamType::Float | ParamType::Str | ParamType::Bool => {}
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Int => write!(f, "int"),
            ParamType::Float => write!(f, "float"),
            ParamType::Str => write!(f, "str"),
            ParamType::Bool => write!(f, "bool"),
            ParamType::List(inner) => write!(f, "list[{}]", inner),
            ParamType::Optional(inner) => write!(f, "Optional[{}]", inner),
            ParamType::Context(name) => write!(f, "{}", name),
            ParamType::Union(members) => {
                write!(f, "Union[")?;
                for (idx, member) in members.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, "]")
            }
        }
    }
}
