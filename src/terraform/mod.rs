//! Terraform target graph
//!
//! The in-memory stand-in for the CDKTF construct tree: resources, data
//! sources and outputs keyed by Terraform address. Resources are records
//! owned by the stack; callers hold a `ResourceId` and mutate only through
//! the stack's named setters.

pub mod synth;
pub mod value;

use std::collections::BTreeMap;
use std::fmt;

pub use value::{Fragment, TfExpr, TfValue};

/// Whether an address names a managed resource or a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceMode {
    Managed,
    Data,
}

/// Terraform address, e.g. `aws_s3_bucket.Bucket` or `data.aws_iam_policy_document.Doc`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceAddress {
    pub mode: ResourceMode,
    pub resource_type: String,
    pub name: String,
}

impl ResourceAddress {
    pub fn managed(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Managed,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Data,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Deferred reference to one of this resource's attributes
    pub fn attr(&self, attribute: &str) -> TfExpr {
        TfExpr::new(format!("{}.{}", self, attribute))
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            ResourceMode::Managed => write!(f, "{}.{}", self.resource_type, self.name),
            ResourceMode::Data => write!(f, "data.{}.{}", self.resource_type, self.name),
        }
    }
}

/// Index of a resource inside its stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub(crate) usize);

/// Property bag of a Terraform resource
pub type Block = BTreeMap<String, TfValue>;

/// A resource or data source record
#[derive(Debug, Clone, PartialEq)]
pub struct TfResource {
    pub address: ResourceAddress,
    properties: Block,
    depends_on: Vec<ResourceAddress>,
}

impl TfResource {
    pub fn properties(&self) -> &Block {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&TfValue> {
        self.properties.get(key)
    }

    pub fn depends_on(&self) -> &[ResourceAddress] {
        &self.depends_on
    }
}

/// A named stack output
#[derive(Debug, Clone, PartialEq)]
pub struct TfOutput {
    pub name: String,
    pub value: TfValue,
    pub description: Option<String>,
}

/// `provider "aws"` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsProvider {
    pub region: String,
    pub profile: Option<String>,
}

/// Entry of `terraform.required_providers`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequirement {
    pub source: String,
    pub version: String,
}

/// Stack construction failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    #[error("duplicate Terraform address '{0}'")]
    DuplicateAddress(String),
}

/// The target graph produced by one conversion run
#[derive(Debug, Clone, Default)]
pub struct TerraformStack {
    pub name: String,
    provider: Option<AwsProvider>,
    required_providers: BTreeMap<String, ProviderRequirement>,
    resources: Vec<TfResource>,
    outputs: Vec<TfOutput>,
}

impl TerraformStack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Configure the AWS provider and its version constraint
    pub fn set_aws_provider(&mut self, provider: AwsProvider, version: impl Into<String>) {
        self.provider = Some(provider);
        self.required_providers.insert(
            "aws".to_string(),
            ProviderRequirement {
                source: "hashicorp/aws".to_string(),
                version: version.into(),
            },
        );
    }

    pub fn aws_provider(&self) -> Option<&AwsProvider> {
        self.provider.as_ref()
    }

    pub fn required_providers(&self) -> &BTreeMap<String, ProviderRequirement> {
        &self.required_providers
    }

    // =========================================================================
    // CONSTRUCTORS
    // =========================================================================

    /// Create a managed resource
    pub fn add_resource(
        &mut self,
        resource_type: &str,
        name: &str,
        properties: Block,
    ) -> Result<ResourceId, StackError> {
        self.insert(ResourceAddress::managed(resource_type, name), properties)
    }

    /// Create a data source
    pub fn add_data_source(
        &mut self,
        resource_type: &str,
        name: &str,
        properties: Block,
    ) -> Result<ResourceId, StackError> {
        self.insert(ResourceAddress::data(resource_type, name), properties)
    }

    fn insert(&mut self, address: ResourceAddress, properties: Block) -> Result<ResourceId, StackError> {
        if self.find(&address).is_some() {
            return Err(StackError::DuplicateAddress(address.to_string()));
        }
        self.resources.push(TfResource {
            address,
            properties,
            depends_on: vec![],
        });
        Ok(ResourceId(self.resources.len() - 1))
    }

    /// Register a stack output; a later output with the same name replaces it
    pub fn add_output(&mut self, name: &str, value: TfValue, description: Option<String>) {
        let output = TfOutput {
            name: name.to_string(),
            value,
            description,
        };
        match self.outputs.iter_mut().find(|o| o.name == name) {
            Some(existing) => *existing = output,
            None => self.outputs.push(output),
        }
    }

    // =========================================================================
    // SETTERS
    // =========================================================================

    /// Set (or overwrite) a property of an existing resource
    pub fn set_property(&mut self, id: ResourceId, key: &str, value: TfValue) {
        if let Some(resource) = self.resources.get_mut(id.0) {
            resource.properties.insert(key.to_string(), value);
        }
    }

    /// Add an explicit `depends_on` edge, ignoring duplicates and self-edges
    pub fn add_depends_on(&mut self, id: ResourceId, dependency: ResourceAddress) {
        if let Some(resource) = self.resources.get_mut(id.0) {
            if resource.address != dependency && !resource.depends_on.contains(&dependency) {
                resource.depends_on.push(dependency);
            }
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn resource(&self, id: ResourceId) -> Option<&TfResource> {
        self.resources.get(id.0)
    }

    pub fn find(&self, address: &ResourceAddress) -> Option<&TfResource> {
        self.resources.iter().find(|r| &r.address == address)
    }

    /// Look up by the rendered address string, e.g. `aws_s3_bucket.Bucket`
    pub fn find_by_str(&self, address: &str) -> Option<&TfResource> {
        self.resources.iter().find(|r| r.address.to_string() == address)
    }

    /// Resources and data sources in creation order
    pub fn resources(&self) -> &[TfResource] {
        &self.resources
    }

    pub fn managed_resources(&self) -> impl Iterator<Item = &TfResource> + '_ {
        self.resources
            .iter()
            .filter(|r| r.address.mode == ResourceMode::Managed)
    }

    pub fn data_sources(&self) -> impl Iterator<Item = &TfResource> + '_ {
        self.resources
            .iter()
            .filter(|r| r.address.mode == ResourceMode::Data)
    }

    pub fn outputs(&self) -> &[TfOutput] {
        &self.outputs
    }

    pub fn output(&self, name: &str) -> Option<&TfOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_rendering() {
        assert_eq!(
            ResourceAddress::managed("aws_s3_bucket", "B").to_string(),
            "aws_s3_bucket.B"
        );
        assert_eq!(
            ResourceAddress::data("aws_iam_policy_document", "D").attr("json").body(),
            "data.aws_iam_policy_document.D.json"
        );
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let mut stack = TerraformStack::new("s");
        stack.add_resource("aws_s3_bucket", "B", Block::new()).unwrap();
        let err = stack.add_resource("aws_s3_bucket", "B", Block::new()).unwrap_err();
        assert_eq!(err, StackError::DuplicateAddress("aws_s3_bucket.B".into()));
        // Same name, different mode is a different address
        assert!(stack.add_data_source("aws_s3_bucket", "B", Block::new()).is_ok());
    }

    #[test]
    fn test_setters_mutate_owned_record() {
        let mut stack = TerraformStack::new("s");
        let id = stack.add_resource("aws_lambda_function", "F", Block::new()).unwrap();
        stack.set_property(id, "publish", TfValue::Bool(true));
        let dep = ResourceAddress::managed("aws_iam_role", "R");
        stack.add_depends_on(id, dep.clone());
        stack.add_depends_on(id, dep.clone());

        let f = stack.resource(id).unwrap();
        assert_eq!(f.property("publish"), Some(&TfValue::Bool(true)));
        assert_eq!(f.depends_on(), &[dep]);
    }

    #[test]
    fn test_output_replaced_by_name() {
        let mut stack = TerraformStack::new("s");
        stack.add_output("o", TfValue::str("a"), None);
        stack.add_output("o", TfValue::str("b"), Some("d".into()));
        assert_eq!(stack.outputs().len(), 1);
        assert_eq!(stack.output("o").unwrap().value, TfValue::str("b"));
    }
}
