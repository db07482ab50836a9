//! Function catalog exposed to IQL
//!
//! The data-source layer builds a [`Catalog`] explicitly and hands it to the
//! parser as plain data; nothing here inspects callables at runtime.

use iql_ir::ParamType;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

mod similarity;
pub use similarity::{ChoiceIndex, SimilarityError, SimilarityIndex};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Function {0} is registered more than once")]
    DuplicateFunction(String),

    #[error("Function {func} declares parameter {param} more than once")]
    DuplicateParameter { func: String, param: String },
}

/// Parameter of an exposed function
#[derive(Clone)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParamType,
    pub similarity: Option<Arc<dyn SimilarityIndex>>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            similarity: None,
        }
    }

    /// Attach a similarity index used to correct free-text literals
    pub fn with_similarity(mut self, index: Arc<dyn SimilarityIndex>) -> Self {
        self.similarity = Some(index);
        self
    }

    /// Context types this parameter admits; empty means contexts are rejected.
    pub fn context_types(&self) -> Vec<&str> {
        self.param_type.context_types()
    }

    pub fn accepts_context(&self, type_name: &str) -> bool {
        self.context_types().contains(&type_name)
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("param_type", &self.param_type)
            .field("similarity", &self.similarity.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.param_type)
    }
}

/// Function callable from IQL
#[derive(Debug, Clone)]
pub struct ExposedFunction {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
}

impl ExposedFunction {
    pub fn new(name: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

impl fmt::Display for ExposedFunction {
    /// Signature line as shown to the language model: `name(a: int, b: str)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (idx, param) in self.parameters.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")?;
        if let Some(description) = &self.description {
            write!(f, " - {}", description)?;
        }
        Ok(())
    }
}

/// Ordered set of functions legal in one parse
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    functions: Vec<ExposedFunction>,
}

impl Catalog {
    pub fn new(functions: Vec<ExposedFunction>) -> Result<Self, RegistryError> {
        let mut catalog = Self::default();
        for func in functions {
            catalog.register(func)?;
        }
        Ok(catalog)
    }

    pub fn register(&mut self, func: ExposedFunction) -> Result<(), RegistryError> {
        if self.functions.iter().any(|f| f.name == func.name) {
            return Err(RegistryError::DuplicateFunction(func.name));
        }
        for (idx, param) in func.parameters.iter().enumerate() {
            if func.parameters[..idx].iter().any(|p| p.name == param.name) {
                return Err(RegistryError::DuplicateParameter {
                    func: func.name.clone(),
                    param: param.name.clone(),
                });
            }
        }
        self.functions.push(func);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&ExposedFunction, RegistryError> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| RegistryError::FunctionNotFound(name.to_string()))
    }

    pub fn functions(&self) -> &[ExposedFunction] {
        &self.functions
    }

    /// One signature per line, in registration order
    pub fn describe(&self) -> String {
        self.functions
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
