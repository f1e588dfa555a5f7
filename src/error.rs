//! Conversion error model.
//!
//! Every conversion failure maps to exactly one `ConvertError` variant. All
//! variants are fatal: the run aborts with the first error raised during the
//! depth-first walk and no target stack is handed back to the caller.

use crate::terraform::StackError;

/// Result alias used throughout the converter core.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Fatal conversion failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// The resource's type tag is not in the supported allow-list.
    #[error("unsupported resource type '{tag}' (resource '{resource}')")]
    UnsupportedType { resource: String, tag: String },

    /// A `Ref`/`Fn::GetAtt` target is neither a template resource nor a pseudo-parameter.
    #[error("unresolved reference '{name}'")]
    UnresolvedReference { name: String },

    /// An intrinsic function received arguments of the wrong shape, or a
    /// property had a shape the conversion routine does not understand.
    #[error("malformed expression in {context}: {message}")]
    MalformedExpression { context: String, message: String },

    /// A required property of a resource is absent.
    #[error("resource '{resource}' is missing required property '{property}'")]
    MissingRequiredProperty { resource: String, property: String },

    /// A resource transitively depends on itself.
    #[error("cyclic reference: {}", chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },

    /// The remote-state accessor could not supply an imported value.
    #[error("cannot import value '{key}': {reason}")]
    ImportFailed { key: String, reason: String },

    /// Two target resources were given the same Terraform address.
    #[error(transparent)]
    Stack(#[from] StackError),
}

impl ConvertError {
    pub fn malformed(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedExpression {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn missing(resource: impl Into<String>, property: impl Into<String>) -> Self {
        Self::MissingRequiredProperty {
            resource: resource.into(),
            property: property.into(),
        }
    }

    pub fn unresolved(name: impl Into<String>) -> Self {
        Self::UnresolvedReference { name: name.into() }
    }
}
