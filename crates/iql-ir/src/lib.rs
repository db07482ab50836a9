//! IQL Intermediate Representation (IR)
//!
//! Validated call trees produced by the IQL parser. Trees are plain owned data:
//! they borrow nothing from the catalog or the contexts they were resolved
//! against, serialize deterministically, and render back to canonical IQL.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

mod types;
pub use types::*;

/// Boolean expression tree over exposed function calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    And { children: Vec<Node> },
    Or { children: Vec<Node> },
    Not { child: Box<Node> },
    Call(FunctionCall),
}

impl Node {
    pub fn not(child: Node) -> Self {
        Node::Not { child: Box::new(child) }
    }

    /// Every `FunctionCall` in the tree, left to right.
    pub fn calls(&self) -> Vec<&FunctionCall> {
        let mut out = Vec::new();
        self.collect_calls(&mut out);
        out
    }

    fn collect_calls<'a>(&'a self, out: &mut Vec<&'a FunctionCall>) {
        match self {
            Node::And { children } | Node::Or { children } => {
                for child in children {
                    child.collect_calls(out);
                }
            }
            Node::Not { child } => child.collect_calls(out),
            Node::Call(call) => out.push(call),
        }
    }

    fn is_bool_op(&self) -> bool {
        matches!(self, Node::And { .. } | Node::Or { .. })
    }
}

/// Call of an exposed function with resolved, validated arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Vec<Value>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Resolved argument value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Context(Context),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Value::Str(value.into())
    }

    /// Short name of the value's kind, used in validation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Context(_) => "context",
        }
    }
}

/// Caller-supplied object referenced from IQL by a bare identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Identifier used in IQL source
    pub alias: String,
    /// Type name matched against `ParamType::Context`
    pub type_name: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Context {
    pub fn new(alias: impl Into<String>, type_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            alias: alias.into(),
            type_name: type_name.into(),
            payload,
        }
    }
}

/// Validated IQL expression together with the source it was parsed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IqlQuery<T> {
    pub root: T,
    pub source: String,
}

impl<T: Serialize> IqlQuery<T> {
    /// SHA-256 of the canonical JSON form of the root, used as an audit key
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(&self.root).expect("IR should always serialize");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::And { children } => write_operands(f, children, " and "),
            Node::Or { children } => write_operands(f, children, " or "),
            Node::Not { child } if child.is_bool_op() => write!(f, "not ({})", child),
            Node::Not { child } => write!(f, "not {}", child),
            Node::Call(call) => write!(f, "{}", call),
        }
    }
}

fn write_operands(f: &mut fmt::Formatter<'_>, children: &[Node], op: &str) -> fmt::Result {
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            f.write_str(op)?;
        }
        if child.is_bool_op() {
            write!(f, "({})", child)?;
        } else {
            write!(f, "{}", child)?;
        }
    }
    Ok(())
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        write_comma_separated(f, &self.arguments)?;
        write!(f, ")")
    }
}

fn write_comma_separated(f: &mut fmt::Formatter<'_>, values: &[Value]) -> fmt::Result {
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", value)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(v) => write!(f, "{}", v),
            // Debug keeps the decimal point so the literal re-parses as a float
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Str(s) => {
                f.write_str("'")?;
                for c in s.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '\'' => f.write_str("\\'")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("'")
            }
            Value::List(items) => {
                f.write_str("[")?;
                write_comma_separated(f, items)?;
                f.write_str("]")
            }
            Value::Context(ctx) => f.write_str(&ctx.alias),
        }
    }
}
