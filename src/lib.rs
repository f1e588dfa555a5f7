//! cf2tf - CloudFormation to Terraform conversion
//!
//! Converts the CloudFormation templates a Serverless service generates into
//! Terraform resource graphs, ready for `cdktf synth` / `cdktf deploy`.
//!
//! ## Pipeline
//!
//! ```text
//! template JSON/YAML -> SourceTemplate -> Converter (resolver + evaluator + mapper)
//!                    -> TerraformStack -> synth (cdk.tf.json)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cf2tf::{convert_template, synth, DeploymentEnvironment, NoRemoteState, SourceTemplate};
//!
//! let template = SourceTemplate::from_path(".serverless/cloudformation-template-update-stack.json")?;
//! let env = DeploymentEnvironment::new("eu-west-1", "123456789012");
//! let stack = convert_template(&template, &env, &NoRemoteState)?;
//! synth::write(&stack, ".serverless/cdktf-update")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

// Error types
pub mod error;

// Source side: parsed CloudFormation
pub mod template;

// Pseudo parameters and cross-stack imports
pub mod reference_map;
pub mod remote_state;

// Target side: Terraform stack model and JSON synthesis
pub mod terraform;

// Graph resolver, intrinsic evaluator, output emitter
pub mod converter;

// Per-resource-type conversion routines
mod mapper;

// Configuration, CDKTF project plumbing, Serverless layout
pub mod cdktf;
pub mod config;
pub mod serverless;

pub use config::Cf2TfConfig;
pub use converter::{convert_template, convert_with_config, Converter, TargetHandle};
pub use error::{ConvertError, ConvertResult};
pub use reference_map::{DeploymentEnvironment, ReferenceMap};
pub use remote_state::{NoRemoteState, RemoteState, StaticRemoteState, TerraformRemoteState};
pub use template::{CfnValue, ResourceKind, SourceTemplate};
pub use terraform::{synth, TerraformStack, TfValue};
