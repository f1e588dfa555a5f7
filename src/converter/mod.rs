//! Graph Resolver - memoized, demand-driven conversion of a template
//!
//! The converter walks the template's resource map in declaration order,
//! but a resource is actually converted the first time anything asks for
//! it: a `Ref`, a `Fn::GetAtt`, a `DependsOn` entry, or a mapper routine
//! that needs a sibling's handle. Converted handles are memoized, so every
//! resource is converted exactly once and the result does not depend on
//! the order the template lists its resources in.
//!
//! ## Pipeline
//!
//! ```text
//! SourceTemplate
//!      ↓  convert_all()      (declaration order, lazy recursion on references)
//! ConversionState.converted  (name → TargetHandle)
//!      ↓  emit_outputs()
//! TerraformStack             (resources + data sources + outputs)
//! ```
//!
//! A resource is marked in-progress while its routine runs; asking for it
//! again before it completes raises `CyclicReference` instead of recursing.

mod attributes;
mod evaluator;
mod outputs;

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::config::Cf2TfConfig;
use crate::error::{ConvertError, ConvertResult};
use crate::mapper;
use crate::reference_map::{DeploymentEnvironment, ReferenceMap};
use crate::remote_state::RemoteState;
use crate::template::{ResourceKind, SourceResource, SourceTemplate};
use crate::terraform::{
    AwsProvider, Block, ResourceAddress, ResourceId, TerraformStack, TfValue,
};

pub use attributes::{terraform_attribute, to_snake_case};

/// Default AWS provider version constraint
pub const DEFAULT_PROVIDER_VERSION: &str = "~> 2.0";

// =============================================================================
// TARGET HANDLES
// =============================================================================

/// What a converted source resource resolves to
#[derive(Debug, Clone, PartialEq)]
pub struct TargetHandle {
    pub kind: ResourceKind,
    /// Primary target resource (for aliases, the aliased resource)
    pub id: ResourceId,
    pub address: ResourceAddress,
    /// Value of `Ref` on the source resource
    pub identity: TfValue,
    /// Logical id of the resource this handle aliases, if it has no target resource of its own
    pub alias_of: Option<String>,
    attributes: BTreeMap<String, TfValue>,
    /// Target resources emitted alongside the primary one
    ancillaries: Vec<ResourceAddress>,
}

impl TargetHandle {
    /// Handle whose `Ref` is the given attribute of its own resource
    pub fn new(kind: ResourceKind, id: ResourceId, address: ResourceAddress, identity_attr: &str) -> Self {
        let identity = TfValue::Expr(address.attr(identity_attr));
        Self {
            kind,
            id,
            address,
            identity,
            alias_of: None,
            attributes: BTreeMap::new(),
            ancillaries: Vec::new(),
        }
    }

    /// Record an attribute whose value is known at conversion time.
    /// If it is the identity attribute, the identity becomes that value too.
    pub fn with_known_attribute(mut self, attribute: &str, value: TfValue) -> Self {
        if self.identity == TfValue::Expr(self.address.attr(attribute)) {
            self.identity = value.clone();
        }
        self.attributes.insert(attribute.to_string(), value);
        self
    }

    pub fn with_identity(mut self, identity: TfValue) -> Self {
        self.identity = identity;
        self
    }

    pub fn aliasing(mut self, logical_id: impl Into<String>) -> Self {
        self.alias_of = Some(logical_id.into());
        self
    }

    /// Record a target resource that belongs to this source resource
    pub fn with_ancillary(mut self, address: ResourceAddress) -> Self {
        if address != self.address && !self.ancillaries.contains(&address) {
            self.ancillaries.push(address);
        }
        self
    }

    pub fn ancillaries(&self) -> &[ResourceAddress] {
        &self.ancillaries
    }

    /// Everything a `DependsOn` on this source resource must wait for
    pub fn dependency_addresses(&self) -> Vec<ResourceAddress> {
        let mut addresses = vec![self.address.clone()];
        addresses.extend(self.ancillaries.iter().cloned());
        addresses
    }

    /// Attribute value: the literal if known, else a deferred reference
    pub fn attribute(&self, attribute: &str) -> TfValue {
        self.attributes
            .get(attribute)
            .cloned()
            .unwrap_or_else(|| TfValue::Expr(self.address.attr(attribute)))
    }

    /// Attribute value only if known at conversion time
    pub fn known_attribute(&self, attribute: &str) -> Option<&TfValue> {
        self.attributes.get(attribute)
    }
}

// =============================================================================
// CONVERSION STATE
// =============================================================================

/// Per-run memoization table. Owned and mutated only by the `Converter`.
#[derive(Debug)]
pub struct ConversionState {
    converted: HashMap<String, TargetHandle>,
    type_of: HashMap<String, ResourceKind>,
    in_progress: Vec<String>,
    /// Per in-progress resource: targets referenced only through literal values
    implicit_deps: Vec<Vec<ResourceAddress>>,
    conversion_order: Vec<String>,
    ref_map: ReferenceMap,
}

impl ConversionState {
    fn new(ref_map: ReferenceMap) -> Self {
        Self {
            converted: HashMap::new(),
            type_of: HashMap::new(),
            in_progress: Vec::new(),
            implicit_deps: Vec::new(),
            conversion_order: Vec::new(),
            ref_map,
        }
    }

    pub fn handle(&self, name: &str) -> Option<&TargetHandle> {
        self.converted.get(name)
    }

    pub fn is_converted(&self, name: &str) -> bool {
        self.converted.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ResourceKind> {
        self.type_of.get(name).copied()
    }

    /// Names in the order their conversion completed
    pub fn conversion_order(&self) -> &[String] {
        &self.conversion_order
    }
}

// =============================================================================
// CONVERTER
// =============================================================================

/// Converts one template into one Terraform stack
pub struct Converter<'t> {
    template: &'t SourceTemplate,
    remote_state: &'t dyn RemoteState,
    state: ConversionState,
    stack: TerraformStack,
}

impl<'t> Converter<'t> {
    pub fn new(
        template: &'t SourceTemplate,
        env: &DeploymentEnvironment,
        remote_state: &'t dyn RemoteState,
    ) -> Self {
        let mut stack = TerraformStack::new(env.stack_name.clone());
        stack.set_aws_provider(
            AwsProvider {
                region: env.region.clone(),
                profile: None,
            },
            DEFAULT_PROVIDER_VERSION,
        );
        Self {
            template,
            remote_state,
            state: ConversionState::new(ReferenceMap::new(env)),
            stack,
        }
    }

    /// Override the AWS provider profile and version constraint
    pub fn with_provider(mut self, profile: Option<String>, version: &str) -> Self {
        let region = self
            .stack
            .aws_provider()
            .map(|p| p.region.clone())
            .unwrap_or_default();
        self.stack
            .set_aws_provider(AwsProvider { region, profile }, version);
        self
    }

    pub fn state(&self) -> &ConversionState {
        &self.state
    }

    pub fn stack(&self) -> &TerraformStack {
        &self.stack
    }

    /// Direct access for declaring data sources before the run
    pub fn stack_mut(&mut self) -> &mut TerraformStack {
        &mut self.stack
    }

    pub fn template(&self) -> &'t SourceTemplate {
        self.template
    }

    /// Convert every resource, then register outputs
    pub fn run(mut self) -> ConvertResult<TerraformStack> {
        info!(
            "Converting {} resources and {} outputs into stack '{}'",
            self.template.resources().len(),
            self.template.outputs().len(),
            self.stack.name
        );
        self.convert_all()?;
        self.emit_outputs()?;
        info!(
            "Converted {} resources into {} Terraform blocks",
            self.state.converted.len(),
            self.stack.resources().len()
        );
        Ok(self.stack)
    }

    /// Convert every resource in declaration order
    pub fn convert_all(&mut self) -> ConvertResult<()> {
        let template = self.template;
        for resource in template.resources() {
            self.convert(&resource.name)?;
        }
        Ok(())
    }

    /// Convert one resource. Idempotent: a memoized name returns immediately.
    pub fn convert(&mut self, name: &str) -> ConvertResult<()> {
        if self.state.converted.contains_key(name) {
            return Ok(());
        }

        if let Some(start) = self.state.in_progress.iter().position(|n| n == name) {
            let mut chain = self.state.in_progress[start..].to_vec();
            chain.push(name.to_string());
            return Err(ConvertError::CyclicReference { chain });
        }

        let template = self.template;
        let resource = template
            .resource(name)
            .ok_or_else(|| ConvertError::unresolved(name))?;
        let kind = resource.kind.ok_or_else(|| ConvertError::UnsupportedType {
            resource: name.to_string(),
            tag: resource.type_tag.clone(),
        })?;
        self.state.type_of.entry(name.to_string()).or_insert(kind);

        self.state.in_progress.push(name.to_string());
        self.state.implicit_deps.push(Vec::new());
        let result = self.convert_in_progress(resource, kind);
        self.state.implicit_deps.pop();
        self.state.in_progress.pop();
        let handle = result?;

        debug!("Converted {} ({}) -> {}", name, kind, handle.address);
        self.state.converted.insert(name.to_string(), handle);
        self.state.conversion_order.push(name.to_string());
        Ok(())
    }

    fn convert_in_progress(
        &mut self,
        resource: &'t SourceResource,
        kind: ResourceKind,
    ) -> ConvertResult<TargetHandle> {
        let mut dependencies = Vec::with_capacity(resource.depends_on.len());
        for dep in &resource.depends_on {
            dependencies.extend(self.resolve(dep)?.dependency_addresses());
        }

        let handle = mapper::convert_resource(self, resource, kind)?;

        if let Some(implicit) = self.state.implicit_deps.last() {
            dependencies.extend(implicit.iter().cloned());
        }
        if handle.alias_of.is_none() {
            for dep in dependencies {
                self.stack.add_depends_on(handle.id, dep);
            }
        }
        Ok(handle)
    }

    /// Handle for `name`, converting it first if nothing has asked for it yet
    pub fn resolve(&mut self, name: &str) -> ConvertResult<TargetHandle> {
        if !self.state.converted.contains_key(name) {
            if !self.template.contains(name) {
                return Err(ConvertError::unresolved(name));
            }
            self.convert(name)?;
        }
        self.state
            .converted
            .get(name)
            .cloned()
            .ok_or_else(|| ConvertError::unresolved(name))
    }

    /// Keep the edge to a resource whose value was inlined as a literal
    pub(crate) fn note_literal_reference(&mut self, handle: &TargetHandle, value: &TfValue) {
        if !value.is_literal() {
            return;
        }
        if let Some(frame) = self.state.implicit_deps.last_mut() {
            if !frame.contains(&handle.address) {
                frame.push(handle.address.clone());
            }
        }
    }

    // =========================================================================
    // TARGET CONSTRUCTION (callback interface for mapper routines)
    // =========================================================================

    pub(crate) fn add_resource(
        &mut self,
        resource_type: &str,
        name: &str,
        properties: Block,
    ) -> ConvertResult<(ResourceId, ResourceAddress)> {
        let id = self.stack.add_resource(resource_type, name, properties)?;
        Ok((id, ResourceAddress::managed(resource_type, name)))
    }

    pub(crate) fn add_data_source(
        &mut self,
        resource_type: &str,
        name: &str,
        properties: Block,
    ) -> ConvertResult<(ResourceId, ResourceAddress)> {
        let id = self.stack.add_data_source(resource_type, name, properties)?;
        Ok((id, ResourceAddress::data(resource_type, name)))
    }

    pub(crate) fn set_property(&mut self, id: ResourceId, key: &str, value: TfValue) {
        self.stack.set_property(id, key, value);
    }

    pub(crate) fn add_depends_on(&mut self, id: ResourceId, dependency: ResourceAddress) {
        self.stack.add_depends_on(id, dependency);
    }
}

/// Convert a whole template in one call
pub fn convert_template(
    template: &SourceTemplate,
    env: &DeploymentEnvironment,
    remote_state: &dyn RemoteState,
) -> ConvertResult<TerraformStack> {
    Converter::new(template, env, remote_state).run()
}

/// Convert a template with everything a config file supplies: the
/// deployment environment, provider settings and import resolution
pub fn convert_with_config(
    template: &SourceTemplate,
    config: &Cf2TfConfig,
) -> ConvertResult<TerraformStack> {
    let remote_state = config.remote_state();
    let mut converter = Converter::new(template, &config.environment, remote_state.as_ref())
        .with_provider(config.provider.profile.clone(), &config.provider.version);
    if let Some(state) = config.terraform_remote_state() {
        state.declare(converter.stack_mut())?;
    }
    converter.run()
}
