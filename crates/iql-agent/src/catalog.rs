//! Catalog and context definitions loaded from YAML
//!
//! ```yaml
//! functions:
//!   - name: filter_by_city
//!     description: rows located in the given city
//!     parameters:
//!       - name: city
//!         type: str
//!         choices: [Cracow, Warsaw, Paris]
//! contexts:
//!   - alias: my_company
//!     type_name: Company
//!     payload: { id: 42 }
//! ```
//!
//! Parameters with `choices` get a [`ChoiceIndex`] so near-miss literals are
//! snapped to a known value.

use iql_ir::{Context, ParamType};
use iql_registry::{Catalog, ChoiceIndex, ExposedFunction, Parameter, RegistryError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid catalog: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    #[serde(rename = "type", with = "serde_yaml::with::singleton_map_recursive")]
    pub param_type: ParamType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    pub functions: Vec<FunctionDef>,
    #[serde(default)]
    pub contexts: Vec<Context>,
}

impl CatalogFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Build the catalog and hand back the contexts declared alongside it
    pub fn into_parts(self) -> Result<(Catalog, Vec<Context>), CatalogError> {
        let functions = self.functions.into_iter().map(FunctionDef::build).collect();
        Ok((Catalog::new(functions)?, self.contexts))
    }
}

impl FunctionDef {
    fn build(self) -> ExposedFunction {
        let parameters = self
            .parameters
            .into_iter()
            .map(|p| p.build(&self.name))
            .collect();
        let function = ExposedFunction::new(self.name, parameters);
        match self.description {
            Some(description) => function.with_description(description),
            None => function,
        }
    }
}

impl ParameterDef {
    fn build(self, function: &str) -> Parameter {
        let parameter = Parameter::new(self.name.clone(), self.param_type);
        if self.choices.is_empty() {
            return parameter;
        }
        let mut index = ChoiceIndex::new(format!("{}.{}", function, self.name), self.choices);
        if let Some(threshold) = self.threshold {
            index = index.with_threshold(threshold);
        }
        parameter.with_similarity(Arc::new(index))
    }
}

/// Contexts supplied in a separate file: a YAML list of `{alias, type_name, payload}`
pub fn load_contexts<P: AsRef<Path>>(path: P) -> Result<Vec<Context>, CatalogError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&contents)?)
}
