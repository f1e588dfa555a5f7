//! Source template model and loading
//!
//! A `SourceTemplate` is the parsed, read-only form of a CloudFormation
//! template: its `Resources` and `Outputs` sections in declaration order,
//! with every property value classified into a `CfnValue`.

pub mod kind;
pub mod value;

use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConvertError;

pub use kind::ResourceKind;
pub use value::{CfnValue, Intrinsic};

/// Template loading failure
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON template: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML template: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid template structure: {0}")]
    Structure(String),

    #[error(transparent)]
    Expression(#[from] ConvertError),
}

/// A resource declaration
#[derive(Debug, Clone, PartialEq)]
pub struct SourceResource {
    /// Logical id, unique within the template
    pub name: String,
    /// Raw CloudFormation type tag
    pub type_tag: String,
    /// Resolved kind; `None` when the tag is outside the allow-list
    pub kind: Option<ResourceKind>,
    pub properties: BTreeMap<String, CfnValue>,
    /// Explicit `DependsOn` entries
    pub depends_on: Vec<String>,
}

/// An output declaration
#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutput {
    pub name: String,
    pub value: CfnValue,
    pub description: Option<String>,
    pub export_name: Option<CfnValue>,
}

/// A parsed CloudFormation template
#[derive(Debug, Clone, Default)]
pub struct SourceTemplate {
    resources: Vec<SourceResource>,
    outputs: Vec<SourceOutput>,
    index: HashMap<String, usize>,
}

impl SourceTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a template from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, TemplateError> {
        let json: JsonValue = serde_json::from_str(text)?;
        Self::from_json_value(&json)
    }

    /// Parse a template from YAML text (long-form intrinsic keys only)
    pub fn from_yaml_str(text: &str) -> Result<Self, TemplateError> {
        let json: JsonValue = serde_yaml::from_str(text)?;
        Self::from_json_value(&json)
    }

    /// Load a template file, choosing the format by extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            _ => Self::from_json_str(&text),
        }
    }

    /// Build a template from an already-parsed JSON document
    pub fn from_json_value(root: &JsonValue) -> Result<Self, TemplateError> {
        let root = root
            .as_object()
            .ok_or_else(|| TemplateError::Structure("template root must be an object".into()))?;

        let mut template = SourceTemplate::new();

        let resources = root
            .get("Resources")
            .and_then(JsonValue::as_object)
            .ok_or_else(|| TemplateError::Structure("missing 'Resources' section".into()))?;
        for (name, decl) in resources {
            template.push_resource(parse_resource(name, decl)?);
        }

        if let Some(outputs) = root.get("Outputs") {
            let outputs = outputs
                .as_object()
                .ok_or_else(|| TemplateError::Structure("'Outputs' must be an object".into()))?;
            for (name, decl) in outputs {
                template.outputs.push(parse_output(name, decl)?);
            }
        }

        debug!(
            "Parsed template with {} resources and {} outputs",
            template.resources.len(),
            template.outputs.len()
        );
        Ok(template)
    }

    /// Append a resource declaration; a later declaration replaces an earlier one with the same name
    pub fn push_resource(&mut self, resource: SourceResource) {
        if let Some(&idx) = self.index.get(&resource.name) {
            self.resources[idx] = resource;
        } else {
            self.index.insert(resource.name.clone(), self.resources.len());
            self.resources.push(resource);
        }
    }

    pub fn push_output(&mut self, output: SourceOutput) {
        self.outputs.push(output);
    }

    pub fn resource(&self, name: &str) -> Option<&SourceResource> {
        self.index.get(name).map(|&i| &self.resources[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Resources in declaration order
    pub fn resources(&self) -> &[SourceResource] {
        &self.resources
    }

    /// Outputs in declaration order
    pub fn outputs(&self) -> &[SourceOutput] {
        &self.outputs
    }

    /// Same template with resources presented in a different order
    pub fn reordered(&self, order: &[&str]) -> Self {
        let mut out = SourceTemplate::new();
        for name in order {
            if let Some(r) = self.resource(name) {
                out.push_resource(r.clone());
            }
        }
        for r in &self.resources {
            if !out.contains(&r.name) {
                out.push_resource(r.clone());
            }
        }
        out.outputs = self.outputs.clone();
        out
    }
}

fn parse_resource(name: &str, decl: &JsonValue) -> Result<SourceResource, TemplateError> {
    let decl = decl
        .as_object()
        .ok_or_else(|| TemplateError::Structure(format!("resource '{}' must be an object", name)))?;

    let type_tag = decl
        .get("Type")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| TemplateError::Structure(format!("resource '{}' has no 'Type'", name)))?
        .to_string();

    if decl.contains_key("Condition") {
        return Err(TemplateError::Structure(format!(
            "resource '{}' uses a Condition, which is not supported",
            name
        )));
    }

    let mut properties = BTreeMap::new();
    if let Some(props) = decl.get("Properties") {
        let props = props.as_object().ok_or_else(|| {
            TemplateError::Structure(format!("resource '{}' Properties must be an object", name))
        })?;
        for (key, value) in props {
            properties.insert(
                key.clone(),
                CfnValue::from_json(value, &format!("{}.{}", name, key))?,
            );
        }
    }

    let depends_on = match decl.get("DependsOn") {
        None => vec![],
        Some(JsonValue::String(s)) => vec![s.clone()],
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    TemplateError::Structure(format!(
                        "resource '{}' DependsOn entries must be strings",
                        name
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(TemplateError::Structure(format!(
                "resource '{}' DependsOn must be a string or a list",
                name
            )))
        }
    };

    Ok(SourceResource {
        name: name.to_string(),
        kind: ResourceKind::from_type_tag(&type_tag),
        type_tag,
        properties,
        depends_on,
    })
}

fn parse_output(name: &str, decl: &JsonValue) -> Result<SourceOutput, TemplateError> {
    let value = decl
        .get("Value")
        .ok_or_else(|| TemplateError::Structure(format!("output '{}' has no 'Value'", name)))?;
    let description = decl
        .get("Description")
        .and_then(JsonValue::as_str)
        .map(str::to_string);
    let export_name = decl
        .get("Export")
        .and_then(|e| e.get("Name"))
        .map(|n| CfnValue::from_json(n, &format!("Outputs.{}.Export.Name", name)))
        .transpose()?;

    Ok(SourceOutput {
        name: name.to_string(),
        value: CfnValue::from_json(value, &format!("Outputs.{}", name))?,
        description,
        export_name,
    })
}
